//! Thin CLI front-end: loads an export request manifest (JSON) and drives
//! [`timeline_export_core::export`]. Render and container muxing are
//! external collaborators, so this binary supplies trivial reference
//! implementations good enough for a manual smoke test rather than
//! leaving the library uncallable from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde::Deserialize;

use timeline_export_core::audio::{clip_seed, parse_audio_url, AudioGraph, ClipVoice, MasteringChain, ProceduralSource};
use timeline_export_core::caption::{self, CaptionEntry};
use timeline_export_core::export::governance::Governance;
use timeline_export_core::export::preflight::StaticEffectRegistry;
use timeline_export_core::export::trace::TracingTraceSink;
use timeline_export_core::export::writer::{ContainerWriter, Fps, RenderDevice, VideoInputConfig, WriterStatus};
use timeline_export_core::frame::{CropRegion, FrameProcessorConfig, ScaleMode};
use timeline_export_core::graph::builder::{AssetCatalog, AssetInfo};
use timeline_export_core::graph::RenderGraph;
use timeline_export_core::timeline::model::{Timeline, TrackKind};
use timeline_export_core::{export, AudioPolicy, ExportRequest};

#[derive(Parser, Debug)]
#[command(name = "export", version)]
struct Cli {
    /// Export request manifest (JSON).
    #[arg(long)]
    manifest: PathBuf,

    /// Mux real output via the `media-ffmpeg`-gated ffmpeg writer instead of
    /// the per-frame PNG/PCM smoke-test writer. No-op without that feature.
    #[cfg(feature = "media-ffmpeg")]
    #[arg(long)]
    mp4: bool,
}

#[derive(Deserialize)]
struct FrameManifest {
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    background: Option<[u8; 4]>,
    #[serde(default)]
    crop: Option<CropRegion>,
}

fn default_mode() -> String {
    "fit".into()
}

impl Default for FrameManifest {
    fn default() -> Self {
        Self { mode: default_mode(), background: None, crop: None }
    }
}

#[derive(Deserialize)]
struct Manifest {
    timeline: Timeline,
    width: u32,
    height: u32,
    fps: i32,
    #[serde(default)]
    governance: Governance,
    #[serde(default = "default_audio_policy")]
    audio_policy: String,
    #[serde(default)]
    frame: FrameManifest,
    #[serde(default)]
    captions_path: Option<PathBuf>,
    #[serde(default = "default_caption_language")]
    caption_language: String,
    output: PathBuf,
    #[serde(default = "default_timeout")]
    timeout_seconds: f64,
}

fn default_audio_policy() -> String {
    "auto".into()
}

fn default_caption_language() -> String {
    "en".into()
}

fn default_timeout() -> f64 {
    60.0
}

fn parse_scale_mode(mode: &str) -> Result<ScaleMode> {
    match mode {
        "fill" => Ok(ScaleMode::Fill),
        "fit" => Ok(ScaleMode::Fit),
        "stretch" => Ok(ScaleMode::Stretch),
        "crop" => Ok(ScaleMode::Crop),
        other => anyhow::bail!("unknown frame mode '{other}' (expected fill/fit/stretch/crop)"),
    }
}

fn parse_audio_policy(policy: &str) -> Result<AudioPolicy> {
    match policy {
        "required" => Ok(AudioPolicy::Required),
        "auto" => Ok(AudioPolicy::Auto),
        "never" => Ok(AudioPolicy::Never),
        other => anyhow::bail!("unknown audio_policy '{other}' (expected required/auto/never)"),
    }
}

fn load_captions(path: &Path, language: &str) -> Result<Vec<CaptionEntry>> {
    let content = fs::read_to_string(path).with_context(|| format!("read captions '{}'", path.display()))?;
    let entries = match path.extension().and_then(|e| e.to_str()) {
        Some("srt") => caption::parse_srt(&content)?,
        Some("vtt") => caption::parse_vtt(&content)?,
        Some("json") => caption::read_json(&content)?,
        other => anyhow::bail!("unsupported caption extension {other:?} (expected srt/vtt/json)"),
    };
    tracing::info!(target: "export", language, count = entries.len(), "loaded captions");
    Ok(entries)
}

/// Collects every distinct effect id referenced by the timeline, so the CLI
/// preflight never rejects a manifest for an "unregistered" effect -- a real
/// deployment would instead hand `export` its actual render device's
/// effect catalog.
fn effect_registry_for(timeline: &Timeline) -> StaticEffectRegistry {
    let mut ids = Vec::new();
    for track in &timeline.tracks {
        for clip in &track.clips {
            for effect in &clip.effects {
                ids.push(effect.effect_id.clone());
            }
        }
    }
    StaticEffectRegistry::new(ids)
}

/// Returns [`AssetInfo::default`] for every asset: no scientific-image
/// tone-mapping routing. Real deployments supply their own catalog backed
/// by project metadata.
struct DefaultAssetCatalog;

impl AssetCatalog for DefaultAssetCatalog {
    fn info(&self, _asset_id: &str) -> AssetInfo {
        AssetInfo::default()
    }
}

/// Fills every frame with `frame.background`, ignoring graph content. Real
/// rasterization is an external collaborator; this exists purely so the
/// coordinator's control flow (progress events, writer lifecycle, underfeed
/// checks) can be smoke-tested end to end without a GPU backend. A 1x1
/// source is deliberate: bilinear-scaling a single solid-color pixel to any
/// target size still yields a uniform fill.
struct SolidFillRenderDevice {
    background: [u8; 4],
}

impl RenderDevice for SolidFillRenderDevice {
    fn render_frame(
        &mut self,
        _graph: &RenderGraph,
        _time_seconds: f64,
    ) -> timeline_export_core::ExportResult<timeline_export_core::frame::processor::RgbaImage> {
        let mut image = timeline_export_core::frame::processor::RgbaImage::new(1, 1);
        image.clear(self.background);
        Ok(image)
    }
}

/// Writes one PNG per video frame and raw interleaved `f32` PCM for audio
/// into `dir`. Not a real container/codec; a file layout good enough to
/// inspect by hand after a smoke-test run.
struct DirectoryWriter {
    dir: PathBuf,
    config: Option<VideoInputConfig>,
    frames_appended: u64,
    status: WriterStatus,
}

impl DirectoryWriter {
    fn new(dir: PathBuf) -> Self {
        Self { dir, config: None, frames_appended: 0, status: WriterStatus::Idle }
    }
}

impl ContainerWriter for DirectoryWriter {
    fn begin(&mut self, config: &VideoInputConfig, _output_path: &Path) -> timeline_export_core::ExportResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| timeline_export_core::ExportError::WriterFailed(err.to_string()))?;
        self.config = Some(config.clone());
        self.frames_appended = 0;
        self.status = WriterStatus::Writing;
        Ok(())
    }

    fn append_video_frame(
        &mut self,
        frame_index: u64,
        frame: &timeline_export_core::frame::processor::RgbaImage,
    ) -> timeline_export_core::ExportResult<()> {
        let path = self.dir.join(format!("frame_{frame_index:06}.png"));
        image::save_buffer_with_format(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|err| timeline_export_core::ExportError::AppendFailed(err.to_string()))?;
        self.frames_appended += 1;
        Ok(())
    }

    fn append_audio_chunk(
        &mut self,
        _start_sample: i64,
        channels: &[Vec<f64>],
    ) -> timeline_export_core::ExportResult<()> {
        let path = self.dir.join("audio.pcm");
        let mut bytes = Vec::with_capacity(channels.iter().map(|c| c.len()).sum::<usize>() * 4);
        if let Some(n) = channels.first().map(|c| c.len()) {
            for i in 0..n {
                for channel in channels {
                    bytes.extend_from_slice(&(channel[i] as f32).to_le_bytes());
                }
            }
        }
        use std::io::Write as _;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| timeline_export_core::ExportError::AppendFailed(err.to_string()))?;
        file.write_all(&bytes)
            .map_err(|err| timeline_export_core::ExportError::AppendFailed(err.to_string()))?;
        Ok(())
    }

    fn finish(&mut self) -> timeline_export_core::ExportResult<()> {
        self.status = WriterStatus::Finished;
        Ok(())
    }

    fn status(&self) -> WriterStatus {
        self.status
    }

    fn frames_appended(&self) -> u64 {
        self.frames_appended
    }

    fn delete_output(&mut self) -> timeline_export_core::ExportResult<()> {
        let _ = fs::remove_dir_all(&self.dir);
        self.status = WriterStatus::Failed;
        Ok(())
    }
}

/// Builds an [`AudioGraph`] directly from the timeline's audio tracks: each
/// clip's `asset_id` is parsed as an audio source URL and wired up as a
/// constant-gain voice. Real sampled-media decode is out of scope.
fn audio_graph_from_timeline(timeline: &Timeline, sample_rate: u32, channels: usize) -> AudioGraph {
    let mut graph = AudioGraph::new(sample_rate, channels);
    for track in &timeline.tracks {
        if track.kind != TrackKind::Audio {
            continue;
        }
        let mut bus = timeline_export_core::audio::TrackBus::default();
        for clip in &track.clips {
            let kind = parse_audio_url(&clip.asset_id);
            let start_sample = clip.range.start.to_sample_index(sample_rate);
            let end_sample = clip.range.end().to_sample_index(sample_rate);
            let offset_sample = clip.source_range.start.to_sample_index(sample_rate);
            let seed = clip_seed(&clip.id, "sine", start_sample, end_sample);
            bus.voices.push(ClipVoice {
                source: ProceduralSource::new(kind, sample_rate, seed),
                clip_start_sample: start_sample,
                clip_end_sample: end_sample,
                clip_offset: offset_sample,
                envelope: Box::new(|_t| 1.0),
            });
        }
        graph.bus.tracks.push(bus);
    }
    graph
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let manifest_text = fs::read_to_string(&cli.manifest)
        .with_context(|| format!("read manifest '{}'", cli.manifest.display()))?;
    let manifest: Manifest =
        serde_json::from_str(&manifest_text).with_context(|| "parse manifest JSON")?;

    manifest.timeline.validate().context("timeline failed validation")?;

    let mode = parse_scale_mode(&manifest.frame.mode)?;
    let frame_config = FrameProcessorConfig {
        target_width: manifest.width,
        target_height: manifest.height,
        mode,
        background: manifest.frame.background.unwrap_or([0, 0, 0, 255]),
        crop: manifest.frame.crop.or_else(|| (mode == ScaleMode::Crop).then(CropRegion::full)),
    };
    frame_config.validate().context("invalid frame configuration")?;

    let audio_policy = parse_audio_policy(&manifest.audio_policy)?;

    let captions = match &manifest.captions_path {
        Some(path) => load_captions(path, &manifest.caption_language)?,
        None => Vec::new(),
    };

    let sample_rate = timeline_export_core::audio::DEFAULT_SAMPLE_RATE;
    let channels = timeline_export_core::audio::DEFAULT_CHANNELS;
    let needs_audio = match audio_policy {
        AudioPolicy::Never => false,
        AudioPolicy::Required => true,
        AudioPolicy::Auto => manifest.timeline.has_audio_tracks(),
    };
    let audio_source: Option<Box<dyn timeline_export_core::audio::AudioChunkSource + Send>> = needs_audio
        .then(|| Box::new(audio_graph_from_timeline(&manifest.timeline, sample_rate, channels)) as Box<_>);

    let registry = effect_registry_for(&manifest.timeline);
    let catalog: Arc<dyn AssetCatalog + Send + Sync> = Arc::new(DefaultAssetCatalog);

    #[cfg(feature = "media-ffmpeg")]
    let (device, writer): (Box<dyn RenderDevice>, Box<dyn ContainerWriter + Send>) = if cli.mp4 {
        (
            Box::new(timeline_export_core::export::SolidGrayRenderDevice {
                width: manifest.width,
                height: manifest.height,
            }),
            Box::new(timeline_export_core::export::FfmpegContainerWriter::default()),
        )
    } else {
        (
            Box::new(SolidFillRenderDevice { background: frame_config.background }),
            Box::new(DirectoryWriter::new(manifest.output.clone())),
        )
    };
    #[cfg(not(feature = "media-ffmpeg"))]
    let (device, writer): (Box<dyn RenderDevice>, Box<dyn ContainerWriter + Send>) = (
        Box::new(SolidFillRenderDevice { background: frame_config.background }),
        Box::new(DirectoryWriter::new(manifest.output.clone())),
    );

    let mastering = MasteringChain::default();
    let trace = Arc::new(TracingTraceSink);

    let request = ExportRequest {
        timeline: manifest.timeline,
        width: manifest.width,
        height: manifest.height,
        fps: Fps(manifest.fps),
        governance: manifest.governance,
        audio_policy,
        frame_config,
        captions,
        caption_style: Default::default(),
        caption_font: None,
        output_path: manifest.output,
        timeout_seconds: manifest.timeout_seconds,
    };

    let summary = export(&request, catalog, &registry, device, writer, mastering, audio_source, None, trace)?;

    eprintln!(
        "exported {} / {} frames ({} audio frames) to {}",
        summary.frames_appended,
        summary.expected_frames,
        summary.audio_frames_appended,
        request.output_path.display()
    );

    Ok(())
}
