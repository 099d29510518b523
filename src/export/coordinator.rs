//! Export Coordinator. Runs governance validation and feature
//! preflight synchronously, then drives video rendering and audio
//! rendering concurrently on their own threads, both appending into a
//! shared [`ContainerWriter`], and finalizes with an underfeed check.
//!
//! The video/audio split mirrors the dual-path processing pattern used
//! elsewhere in the corpus for real-time + offline audio work: two
//! independent producers, a `crossbeam_channel` for completion signaling,
//! and `parking_lot` guarding the state they share.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::audio::mastering::MasteringChain;
use crate::audio::render::{render_offline, AudioChunkSource, AudioRenderConfig};
use crate::caption::{burn_captions, CaptionCache, CaptionEntry, CaptionStyle, GlyphRasterizer, TextLayoutEngine};
use crate::error::{ExportError, ExportResult};
use crate::export::governance::{validate_governance, Governance, QualityProfile};
use crate::export::preflight::{preflight, EffectRegistry};
use crate::export::trace::{emit, emit_with, TraceSink};
use crate::export::writer::{
    AudioInputConfig, ContainerWriter, Fps, RenderDevice, VideoInputConfig,
};
use crate::foundation::RationalTime;
use crate::frame::processor::{process as process_frame, FrameProcessorConfig, RgbaImage};
use crate::graph::builder::{build_graph, AssetCatalog};
use crate::graph::nodes::RenderGraph;
use crate::timeline::model::Timeline;
use crate::timeline::resolver::{resolve, Segment};

/// Whether the coordinator should render and mux an audio track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioPolicy {
    /// Fail with `Validation` if no `audio_source` is supplied.
    Required,
    /// Render audio only if the timeline has audio tracks and a source is
    /// supplied; otherwise export video-only.
    Auto,
    /// Never render audio, even if a source is supplied.
    Never,
}

/// Render device capping: at most this many `render.video.progress` events
/// are emitted per export, evenly spaced across the frame range.
const MAX_PROGRESS_EVENTS: u64 = 120;

pub struct ExportRequest {
    pub timeline: Timeline,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub governance: Governance,
    pub audio_policy: AudioPolicy,
    pub frame_config: FrameProcessorConfig,
    pub captions: Vec<CaptionEntry>,
    pub caption_style: CaptionStyle,
    pub caption_font: Option<Vec<u8>>,
    pub output_path: PathBuf,
    pub timeout_seconds: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ExportSummary {
    pub frames_appended: u64,
    pub expected_frames: u64,
    pub audio_frames_appended: i64,
}

fn bitrate_floor(width: u32, height: u32, fps: Fps) -> u64 {
    let computed = 0.08 * width as f64 * height as f64 * fps.as_f64();
    (8_000_000.0_f64).max(computed) as u64
}

fn expected_frame_count(timeline: &Timeline, fps: Fps) -> u64 {
    (timeline.duration().seconds() * fps.as_f64()).round().max(0.0) as u64
}

/// Runs governance validation, feature preflight, then the parallel
/// render/write pipeline. On any failure after the writer has begun, the
/// partial output is deleted before the error is returned.
#[allow(clippy::too_many_arguments)]
pub fn export(
    request: &ExportRequest,
    catalog: Arc<dyn AssetCatalog + Send + Sync>,
    effects: &dyn EffectRegistry,
    device: Box<dyn RenderDevice>,
    writer: Box<dyn ContainerWriter + Send>,
    mastering: MasteringChain,
    audio_source: Option<Box<dyn AudioChunkSource + Send>>,
    rasterizer: Option<Box<dyn GlyphRasterizer + Send>>,
    trace: Arc<dyn TraceSink + Send + Sync>,
) -> ExportResult<ExportSummary> {
    emit(trace.as_ref(), "export.begin");

    if let Err(err) = validate_governance(
        &request.governance,
        &QualityProfile { width: request.width, height: request.height },
    ) {
        emit_with(trace.as_ref(), "export.error", &[("reason", err.to_string())]);
        return Err(err);
    }

    if let Err(err) = preflight(&request.timeline, effects) {
        emit_with(trace.as_ref(), "export.error", &[("reason", err.to_string())]);
        return Err(err);
    }

    let render_audio = match request.audio_policy {
        AudioPolicy::Never => false,
        AudioPolicy::Required => {
            if audio_source.is_none() {
                let err = ExportError::validation("AudioPolicy::Required but no audio_source supplied");
                emit_with(trace.as_ref(), "export.error", &[("reason", err.to_string())]);
                return Err(err);
            }
            true
        }
        AudioPolicy::Auto => audio_source.is_some() && request.timeline.has_audio_tracks(),
    };

    let expected_frames = expected_frame_count(&request.timeline, request.fps);
    if expected_frames == 0 {
        let err = ExportError::InvalidFrameRate(format!(
            "expected_frames must be > 0, got duration={}s fps={}",
            request.timeline.duration().seconds(),
            request.fps.as_f64()
        ));
        emit_with(trace.as_ref(), "export.error", &[("reason", err.to_string())]);
        return Err(err);
    }
    let bitrate_bps = bitrate_floor(request.width, request.height, request.fps);
    let config = VideoInputConfig {
        width: request.width,
        height: request.height,
        fps: request.fps,
        bitrate_bps,
        keyframe_interval: request.fps.0.max(1) as u32,
        audio: render_audio.then(|| AudioInputConfig { sample_rate: 48_000, channel_count: 2 }),
    };

    let writer = Arc::new(Mutex::new(writer));
    writer.lock().begin(&config, &request.output_path).map_err(|err| {
        emit_with(trace.as_ref(), "export.error", &[("reason", err.to_string())]);
        err
    })?;

    let result = run_render_pipeline(
        request,
        catalog,
        device,
        Arc::clone(&writer),
        mastering,
        audio_source.filter(|_| render_audio),
        rasterizer,
        Arc::clone(&trace),
        expected_frames,
    );

    match result {
        Ok(summary) => {
            writer.lock().finish()?;
            emit_with(
                trace.as_ref(),
                "export.end",
                &[("frames_appended", summary.frames_appended.to_string())],
            );
            Ok(summary)
        }
        Err(err) => {
            let _ = writer.lock().delete_output();
            emit_with(trace.as_ref(), "export.error", &[("reason", err.to_string())]);
            Err(err)
        }
    }
}

enum TaskResult {
    Video(ExportResult<u64>),
    Audio(ExportResult<i64>),
}

#[allow(clippy::too_many_arguments)]
fn run_render_pipeline(
    request: &ExportRequest,
    catalog: Arc<dyn AssetCatalog + Send + Sync>,
    device: Box<dyn RenderDevice>,
    writer: Arc<Mutex<Box<dyn ContainerWriter + Send>>>,
    mastering: MasteringChain,
    audio_source: Option<Box<dyn AudioChunkSource + Send>>,
    rasterizer: Option<Box<dyn GlyphRasterizer + Send>>,
    trace: Arc<dyn TraceSink + Send + Sync>,
    expected_frames: u64,
) -> ExportResult<ExportSummary> {
    let (tx, rx) = crossbeam_channel::bounded::<TaskResult>(2);
    let mut expected_messages = 1;

    {
        let tx = tx.clone();
        let trace = Arc::clone(&trace);
        let writer = Arc::clone(&writer);
        let timeline = request.timeline.clone();
        let frame_config = request.frame_config.clone();
        let captions = request.captions.clone();
        let caption_style = request.caption_style.clone();
        let caption_font = request.caption_font.clone();
        let fps = request.fps;
        thread::spawn(move || {
            let result = render_video(
                &timeline,
                catalog.as_ref(),
                device,
                &frame_config,
                &captions,
                &caption_style,
                caption_font.as_deref(),
                rasterizer,
                writer,
                fps,
                expected_frames,
                trace.as_ref(),
            );
            let _ = tx.send(TaskResult::Video(result));
        });
    }

    if let Some(mut source) = audio_source {
        expected_messages += 1;
        let tx = tx.clone();
        let trace = Arc::clone(&trace);
        let writer = Arc::clone(&writer);
        let duration_seconds = request.timeline.duration().seconds();
        thread::spawn(move || {
            let default_config = AudioRenderConfig::default();
            let total_frames = (duration_seconds * default_config.sample_rate as f64).round() as i64;
            let config = AudioRenderConfig { total_frames, ..default_config };
            emit(trace.as_ref(), "render.audio.begin");
            let result = render_offline(source.as_mut(), &mastering, &config, |chunk| {
                writer.lock().append_audio_chunk(chunk.start_sample, &chunk.channels)
            });
            emit_with(
                trace.as_ref(),
                "render.audio.end",
                &[("ok", result.is_ok().to_string())],
            );
            let _ = tx.send(TaskResult::Audio(result));
        });
    }

    let deadline = Instant::now() + Duration::from_secs_f64(request.timeout_seconds.max(0.0));
    let mut frames_appended: u64 = 0;
    let mut audio_frames_appended: i64 = 0;
    let mut received = 0;

    while received < expected_messages {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(TaskResult::Video(result)) => {
                frames_appended = result?;
            }
            Ok(TaskResult::Audio(result)) => {
                audio_frames_appended = result?;
            }
            Err(_) => {
                return Err(ExportError::Timeout {
                    kind: "render pipeline".into(),
                    seconds: request.timeout_seconds,
                });
            }
        }
        received += 1;
    }

    if frames_appended < (expected_frames as f64 * 0.85) as u64 {
        return Err(ExportError::Underfeed { appended: frames_appended, expected: expected_frames });
    }

    Ok(ExportSummary { frames_appended, expected_frames, audio_frames_appended })
}

#[allow(clippy::too_many_arguments)]
fn render_video(
    timeline: &Timeline,
    catalog: &dyn AssetCatalog,
    mut device: Box<dyn RenderDevice>,
    frame_config: &FrameProcessorConfig,
    captions: &[CaptionEntry],
    caption_style: &CaptionStyle,
    caption_font: Option<&[u8]>,
    mut rasterizer: Option<Box<dyn GlyphRasterizer + Send>>,
    writer: Arc<Mutex<Box<dyn ContainerWriter + Send>>>,
    fps: Fps,
    expected_frames: u64,
    trace: &dyn TraceSink,
) -> ExportResult<u64> {
    let segments = resolve(timeline);
    let mut layout_engine = TextLayoutEngine::new();
    let mut caption_cache = CaptionCache::default();
    let mut segment_cursor = 0usize;
    let mut cached_graph: Option<(usize, RenderGraph)> = None;
    let progress_stride = (expected_frames / MAX_PROGRESS_EVENTS.max(1)).max(1);

    for frame_index in 0..expected_frames {
        let t_seconds = frame_index as f64 / fps.as_f64();
        let t = RationalTime::from_seconds(t_seconds);

        while segment_cursor < segments.len() && segments[segment_cursor].range.end().le(t) {
            segment_cursor += 1;
        }
        let active_segment = segments
            .get(segment_cursor)
            .filter(|segment| segment.range.contains(t));

        let rendered = match active_segment {
            Some(segment) => {
                let graph = graph_for_segment(&mut cached_graph, segment_cursor, segment, catalog)?;
                if frame_index == 0 || segment_cursor == 0 {
                    emit_with(trace, "render.compile.begin", &[("frame", frame_index.to_string())]);
                }
                emit_with(trace, "render.dispatch.begin", &[("frame", frame_index.to_string())]);
                let frame = device.render_frame(graph, t_seconds)?;
                emit_with(trace, "render.dispatch.end", &[("frame", frame_index.to_string())]);
                frame
            }
            None => {
                let mut blank = RgbaImage::new(frame_config.target_width, frame_config.target_height);
                blank.clear(frame_config.background);
                blank
            }
        };

        let mut processed = process_frame(&rendered, frame_config)?;

        if let Some(rasterizer) = rasterizer.as_deref_mut() {
            if let Some(font) = caption_font {
                burn_captions(
                    captions,
                    t,
                    &mut processed,
                    caption_style,
                    font,
                    &mut layout_engine,
                    rasterizer,
                    &mut caption_cache,
                )?;
            }
        }

        writer.lock().append_video_frame(frame_index, &processed)?;

        if frame_index % progress_stride == 0 {
            emit_with(
                trace,
                "render.video.progress",
                &[("frame", frame_index.to_string()), ("total", expected_frames.to_string())],
            );
        }
        if frame_index + 1 == expected_frames {
            emit_with(trace, "render.compile.end", &[("frame", frame_index.to_string())]);
        }
    }

    Ok(writer.lock().frames_appended())
}

fn graph_for_segment<'a>(
    cached: &'a mut Option<(usize, RenderGraph)>,
    segment_index: usize,
    segment: &Segment,
    catalog: &dyn AssetCatalog,
) -> ExportResult<&'a RenderGraph> {
    let needs_rebuild = match cached {
        Some((idx, _)) => *idx != segment_index,
        None => true,
    };
    if needs_rebuild {
        let graph = build_graph(segment, catalog)?;
        *cached = Some((segment_index, graph));
    }
    Ok(&cached.as_ref().unwrap().1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_floor_uses_computed_value_above_floor() {
        let bitrate = bitrate_floor(3840, 2160, Fps(60));
        assert!(bitrate > 8_000_000);
    }

    #[test]
    fn bitrate_floor_enforces_minimum_for_small_output() {
        let bitrate = bitrate_floor(320, 240, Fps(24));
        assert_eq!(bitrate, 8_000_000);
    }

    #[test]
    fn expected_frame_count_matches_duration_times_fps() {
        use crate::timeline::model::{Clip, Track, TrackKind};
        let rt = |n: i64| RationalTime::new(n, 1).unwrap();
        let range = crate::foundation::TimeRange::new(rt(0), rt(10)).unwrap();
        let clip = Clip::new("c", "c", "a", range, range).unwrap();
        let mut track = Track::new("t0", TrackKind::Video);
        track.clips.push(clip);
        let timeline = Timeline { id: "tl".into(), name: "tl".into(), tracks: vec![track] };
        assert_eq!(expected_frame_count(&timeline, Fps(30)), 300);
    }

    #[test]
    fn export_rejects_zero_expected_frames_before_writer_begin() {
        use crate::export::governance::Governance;
        use crate::export::preflight::StaticEffectRegistry;
        use crate::export::trace::InMemoryTraceSink;
        use crate::export::writer::InMemoryWriter;
        use crate::graph::builder::{AssetCatalog, AssetInfo};

        struct NoAssets;
        impl AssetCatalog for NoAssets {
            fn info(&self, _asset_id: &str) -> AssetInfo {
                AssetInfo::default()
            }
        }
        struct UnusedDevice;
        impl RenderDevice for UnusedDevice {
            fn render_frame(
                &mut self,
                _graph: &RenderGraph,
                _time_seconds: f64,
            ) -> ExportResult<RgbaImage> {
                panic!("must not render when expected_frames is 0");
            }
        }

        let timeline = Timeline { id: "tl".into(), name: "tl".into(), tracks: vec![] };
        let request = ExportRequest {
            timeline,
            width: 16,
            height: 16,
            fps: Fps(30),
            governance: Governance::default(),
            audio_policy: AudioPolicy::Never,
            frame_config: FrameProcessorConfig {
                target_width: 16,
                target_height: 16,
                mode: crate::frame::ScaleMode::Stretch,
                background: [0, 0, 0, 255],
                crop: None,
            },
            captions: Vec::new(),
            caption_style: Default::default(),
            caption_font: None,
            output_path: std::env::temp_dir().join("timeline-export-core-test-zero-frames.mov"),
            timeout_seconds: 5.0,
        };

        let result = export(
            &request,
            Arc::new(NoAssets),
            &StaticEffectRegistry::default(),
            Box::new(UnusedDevice),
            Box::new(InMemoryWriter::new()),
            MasteringChain::default(),
            None,
            None,
            Arc::new(InMemoryTraceSink::default()),
        );

        assert!(matches!(result, Err(ExportError::InvalidFrameRate(_))));
    }
}
