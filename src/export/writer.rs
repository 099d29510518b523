//! External collaborator interfaces the Export Coordinator renders and
//! writes through: `RenderDevice` executes a compiled render graph into
//! pixels, `ContainerWriter` appends those pixels (and PCM audio) to an
//! output container. Neither GPU execution nor container/codec muxing is
//! this crate's concern (Non-goal); these traits are the seam, mirrored on
//! the teacher's own `RenderBackend`/`FrameSink` split.

use std::path::Path;

use crate::error::ExportResult;
use crate::frame::processor::RgbaImage;
use crate::graph::nodes::RenderGraph;

/// Integer-only frame rate. The teacher's own `render_to_mp4` carries the
/// same restriction ("currently requires integer fps"); kept here rather
/// than widened to a full `RationalTime` so presentation timestamps reduce
/// to `(frame_index, fps)` without an extra reduction step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fps(pub i32);

impl Fps {
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

/// A renderer that can execute a compiled [`RenderGraph`] into one RGBA8
/// frame. Implementations own whatever GPU/CPU rasterization backend they
/// wrap; this crate only ever calls through the trait.
pub trait RenderDevice: Send {
    fn render_frame(&mut self, graph: &RenderGraph, time_seconds: f64) -> ExportResult<RgbaImage>;
}

/// Raw PCM audio input configuration for writers that support audio muxing.
#[derive(Debug, Clone)]
pub struct AudioInputConfig {
    pub sample_rate: u32,
    pub channel_count: u16,
}

/// Configuration handed to a [`ContainerWriter`] before the first frame.
#[derive(Debug, Clone)]
pub struct VideoInputConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub bitrate_bps: u64,
    pub keyframe_interval: u32,
    pub audio: Option<AudioInputConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterStatus {
    Idle,
    Writing,
    Finished,
    Failed,
}

/// Sink contract for consuming rendered video frames and mastered audio
/// chunks and muxing them into a container. `append_video_frame` is called
/// in strictly increasing frame-index order; `append_audio_chunk` in
/// strictly increasing `start_sample` order. Both may be called from
/// different threads, never concurrently with each other for the *same*
/// method, so implementations that serialize internally (e.g. behind a
/// mutex) are sufficient.
pub trait ContainerWriter: Send {
    fn begin(&mut self, config: &VideoInputConfig, output_path: &Path) -> ExportResult<()>;
    fn append_video_frame(&mut self, frame_index: u64, frame: &RgbaImage) -> ExportResult<()>;
    fn append_audio_chunk(&mut self, start_sample: i64, channels: &[Vec<f64>]) -> ExportResult<()>;
    fn finish(&mut self) -> ExportResult<()>;
    fn status(&self) -> WriterStatus;
    fn frames_appended(&self) -> u64;
    fn delete_output(&mut self) -> ExportResult<()>;
}

/// In-memory writer for tests: records frame indices and audio chunk
/// sample-starts without doing any real encoding.
#[derive(Default)]
pub struct InMemoryWriter {
    config: Option<VideoInputConfig>,
    video_frames: Vec<u64>,
    audio_starts: Vec<i64>,
    status: Option<WriterStatus>,
}

impl InMemoryWriter {
    pub fn new() -> Self {
        Self { status: Some(WriterStatus::Idle), ..Default::default() }
    }

    pub fn video_frame_indices(&self) -> &[u64] {
        &self.video_frames
    }

    pub fn audio_chunk_starts(&self) -> &[i64] {
        &self.audio_starts
    }
}

impl ContainerWriter for InMemoryWriter {
    fn begin(&mut self, config: &VideoInputConfig, _output_path: &Path) -> ExportResult<()> {
        self.config = Some(config.clone());
        self.video_frames.clear();
        self.audio_starts.clear();
        self.status = Some(WriterStatus::Writing);
        Ok(())
    }

    fn append_video_frame(&mut self, frame_index: u64, _frame: &RgbaImage) -> ExportResult<()> {
        self.video_frames.push(frame_index);
        Ok(())
    }

    fn append_audio_chunk(&mut self, start_sample: i64, _channels: &[Vec<f64>]) -> ExportResult<()> {
        self.audio_starts.push(start_sample);
        Ok(())
    }

    fn finish(&mut self) -> ExportResult<()> {
        self.status = Some(WriterStatus::Finished);
        Ok(())
    }

    fn status(&self) -> WriterStatus {
        self.status.unwrap_or(WriterStatus::Idle)
    }

    fn frames_appended(&self) -> u64 {
        self.video_frames.len() as u64
    }

    fn delete_output(&mut self) -> ExportResult<()> {
        self.status = Some(WriterStatus::Failed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_writer_tracks_frames_and_status() {
        let mut writer = InMemoryWriter::new();
        let config = VideoInputConfig {
            width: 1920,
            height: 1080,
            fps: Fps(30),
            bitrate_bps: 8_000_000,
            keyframe_interval: 30,
            audio: None,
        };
        writer.begin(&config, Path::new("/tmp/out.mp4")).unwrap();
        assert_eq!(writer.status(), WriterStatus::Writing);
        writer.append_video_frame(0, &RgbaImage::new(1920, 1080)).unwrap();
        writer.append_video_frame(1, &RgbaImage::new(1920, 1080)).unwrap();
        assert_eq!(writer.frames_appended(), 2);
        writer.finish().unwrap();
        assert_eq!(writer.status(), WriterStatus::Finished);
    }

    #[test]
    fn delete_output_marks_failed() {
        let mut writer = InMemoryWriter::new();
        writer.delete_output().unwrap();
        assert_eq!(writer.status(), WriterStatus::Failed);
    }
}
