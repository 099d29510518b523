//! Reference [`ContainerWriter`]/[`RenderDevice`] pairing that shells out to a
//! system `ffmpeg`, mirroring the teacher's `encode::ffmpeg::FfmpegSink`.
//! Gated behind the `media-ffmpeg` feature -- the coordinator is written
//! purely against the traits and never depends on this module directly.
//!
//! Unlike the teacher's sink, which streams frames into `ffmpeg` over a live
//! stdin pipe, this writer spools video and audio to scratch files on
//! `append_*` and spawns `ffmpeg` once in `finish()`. The coordinator's two
//! render tasks append video and audio independently and in parallel (see
//! `export::coordinator`), so a single shared stdin pipe would force them
//! back into lockstep; muxing from two already-complete raw streams keeps
//! them decoupled. See DESIGN.md.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ExportError, ExportResult};
use crate::frame::processor::RgbaImage;
use crate::graph::nodes::RenderGraph;

use super::writer::{AudioInputConfig, ContainerWriter, RenderDevice, VideoInputConfig, WriterStatus};

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn ensure_parent_dir(path: &Path) -> ExportResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ExportError::WriterFailed(format!("failed to create output directory '{}': {e}", parent.display())))?;
    }
    Ok(())
}

fn scratch_path(kind: &str) -> PathBuf {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("timeline-export-core-{}-{}-{}.raw", std::process::id(), kind, n))
}

/// Options controlling the muxed output; `overwrite` maps to ffmpeg's `-y`/`-n`.
#[derive(Clone, Debug)]
pub struct FfmpegWriterOpts {
    pub overwrite: bool,
}

impl Default for FfmpegWriterOpts {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// [`ContainerWriter`] that spools raw RGBA8 video and interleaved f32 PCM
/// audio to scratch files, then muxes both through one `ffmpeg` invocation
/// in [`ContainerWriter::finish`].
pub struct FfmpegContainerWriter {
    opts: FfmpegWriterOpts,
    config: Option<VideoInputConfig>,
    output_path: Option<PathBuf>,

    video_scratch: Option<PathBuf>,
    video_writer: Option<BufWriter<File>>,
    audio_scratch: Option<PathBuf>,
    audio_writer: Option<BufWriter<File>>,

    frame_count: u64,
    last_frame_index: Option<u64>,
    last_audio_start: Option<i64>,
    status: WriterStatus,
}

impl Default for FfmpegContainerWriter {
    fn default() -> Self {
        Self::new(FfmpegWriterOpts::default())
    }
}

impl FfmpegContainerWriter {
    pub fn new(opts: FfmpegWriterOpts) -> Self {
        Self {
            opts,
            config: None,
            output_path: None,
            video_scratch: None,
            video_writer: None,
            audio_scratch: None,
            audio_writer: None,
            frame_count: 0,
            last_frame_index: None,
            last_audio_start: None,
            status: WriterStatus::Idle,
        }
    }

    fn cleanup_scratch(&mut self) {
        self.video_writer = None;
        self.audio_writer = None;
        if let Some(p) = self.video_scratch.take() {
            let _ = std::fs::remove_file(p);
        }
        if let Some(p) = self.audio_scratch.take() {
            let _ = std::fs::remove_file(p);
        }
    }
}

impl ContainerWriter for FfmpegContainerWriter {
    fn begin(&mut self, config: &VideoInputConfig, output_path: &Path) -> ExportResult<()> {
        if config.width == 0 || config.height == 0 {
            return Err(ExportError::InvalidDimensions(format!("width/height must be non-zero: got {}x{}", config.width, config.height)));
        }
        if !config.width.is_multiple_of(2) || !config.height.is_multiple_of(2) {
            return Err(ExportError::WriterFailed(
                "ffmpeg writer requires even width/height (yuv420p output)".into(),
            ));
        }
        ensure_parent_dir(output_path)?;
        if !self.opts.overwrite && output_path.exists() {
            return Err(ExportError::WriterFailed(format!(
                "output file '{}' already exists",
                output_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(ExportError::WriterFailed(
                "ffmpeg is required for media-ffmpeg output but was not found on PATH".into(),
            ));
        }

        let video_scratch = scratch_path("video");
        let video_file = File::create(&video_scratch)
            .map_err(|e| ExportError::WriterFailed(format!("failed to create video scratch file: {e}")))?;

        let (audio_scratch, audio_writer) = if config.audio.is_some() {
            let path = scratch_path("audio");
            let file = File::create(&path)
                .map_err(|e| ExportError::WriterFailed(format!("failed to create audio scratch file: {e}")))?;
            (Some(path), Some(BufWriter::new(file)))
        } else {
            (None, None)
        };

        self.config = Some(config.clone());
        self.output_path = Some(output_path.to_path_buf());
        self.video_scratch = Some(video_scratch);
        self.video_writer = Some(BufWriter::new(video_file));
        self.audio_scratch = audio_scratch;
        self.audio_writer = audio_writer;
        self.frame_count = 0;
        self.last_frame_index = None;
        self.last_audio_start = None;
        self.status = WriterStatus::Writing;
        Ok(())
    }

    fn append_video_frame(&mut self, frame_index: u64, frame: &RgbaImage) -> ExportResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ExportError::WriterFailed("ffmpeg writer not started".into()))?;
        if let Some(last) = self.last_frame_index {
            if frame_index <= last {
                return Err(ExportError::WriterFailed("frames appended out of order".into()));
            }
        }
        if frame.width != config.width || frame.height != config.height {
            return Err(ExportError::InvalidDimensions(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, config.width, config.height
            )));
        }
        let writer = self
            .video_writer
            .as_mut()
            .ok_or_else(|| ExportError::WriterFailed("ffmpeg writer is already finalized".into()))?;
        writer
            .write_all(&frame.data)
            .map_err(|e| ExportError::WriterFailed(format!("failed to write video frame: {e}")))?;
        self.last_frame_index = Some(frame_index);
        self.frame_count += 1;
        Ok(())
    }

    fn append_audio_chunk(&mut self, start_sample: i64, channels: &[Vec<f64>]) -> ExportResult<()> {
        if let Some(last) = self.last_audio_start {
            if start_sample <= last {
                return Err(ExportError::WriterFailed("audio chunks appended out of order".into()));
            }
        }
        let writer = self
            .audio_writer
            .as_mut()
            .ok_or_else(|| ExportError::WriterFailed("ffmpeg writer has no audio input configured".into()))?;
        let frame_count = channels.first().map_or(0, Vec::len);
        for i in 0..frame_count {
            for ch in channels {
                let sample = ch[i] as f32;
                writer
                    .write_all(&sample.to_le_bytes())
                    .map_err(|e| ExportError::WriterFailed(format!("failed to write audio chunk: {e}")))?;
            }
        }
        self.last_audio_start = Some(start_sample);
        Ok(())
    }

    fn finish(&mut self) -> ExportResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ExportError::WriterFailed("ffmpeg writer not started".into()))?
            .clone();
        let output_path = self
            .output_path
            .clone()
            .ok_or_else(|| ExportError::WriterFailed("ffmpeg writer not started".into()))?;

        if let Some(w) = self.video_writer.as_mut() {
            w.flush().map_err(|e| ExportError::WriterFailed(format!("failed to flush video scratch: {e}")))?;
        }
        if let Some(w) = self.audio_writer.as_mut() {
            w.flush().map_err(|e| ExportError::WriterFailed(format!("failed to flush audio scratch: {e}")))?;
        }
        self.video_writer = None;
        self.audio_writer = None;

        let video_scratch = self
            .video_scratch
            .clone()
            .ok_or_else(|| ExportError::WriterFailed("ffmpeg writer has no video scratch file".into()))?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.0.to_string(),
            "-i",
        ]);
        cmd.arg(&video_scratch);

        if let (Some(audio_cfg), Some(audio_scratch)) = (config.audio.as_ref(), self.audio_scratch.as_ref()) {
            push_audio_input(&mut cmd, audio_cfg, audio_scratch);
            cmd.args([
                "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest", "-movflags", "+faststart",
            ]);
        } else {
            cmd.args(["-an", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"]);
        }
        cmd.arg(&output_path);

        let output = cmd
            .output()
            .map_err(|e| ExportError::WriterFailed(format!("failed to spawn ffmpeg (is it on PATH?): {e}")))?;

        self.cleanup_scratch();

        if !output.status.success() {
            self.status = WriterStatus::Failed;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::WriterFailed(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        self.status = WriterStatus::Finished;
        Ok(())
    }

    fn status(&self) -> WriterStatus {
        self.status
    }

    fn frames_appended(&self) -> u64 {
        self.frame_count
    }

    fn delete_output(&mut self) -> ExportResult<()> {
        self.cleanup_scratch();
        if let Some(path) = &self.output_path {
            let _ = std::fs::remove_file(path);
        }
        self.status = WriterStatus::Failed;
        Ok(())
    }
}

fn push_audio_input(cmd: &mut Command, audio: &AudioInputConfig, path: &Path) {
    cmd.args([
        "-f",
        "f32le",
        "-ar",
        &audio.sample_rate.to_string(),
        "-ac",
        &audio.channel_count.to_string(),
        "-i",
    ])
    .arg(path);
}

/// [`RenderDevice`] that fills every frame with a solid mid-gray. Exists only
/// so `media-ffmpeg`-enabled binaries have a concrete device to smoke-test
/// the writer with; real rasterization is an external collaborator (see
/// crate-level Non-goals).
#[derive(Clone, Copy, Debug, Default)]
pub struct SolidGrayRenderDevice {
    pub width: u32,
    pub height: u32,
}

impl RenderDevice for SolidGrayRenderDevice {
    fn render_frame(&mut self, _graph: &RenderGraph, _time_seconds: f64) -> ExportResult<RgbaImage> {
        let mut image = RgbaImage::new(self.width, self.height);
        image.clear([128, 128, 128, 255]);
        Ok(image)
    }
}
