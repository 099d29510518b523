//! Export Coordinator: governance validation, feature preflight, and
//! the parallel render/encode pipeline that drives a [`writer::ContainerWriter`]
//! and [`writer::RenderDevice`] to completion.

pub mod coordinator;
#[cfg(feature = "media-ffmpeg")]
pub mod ffmpeg_writer;
pub mod governance;
pub mod preflight;
pub mod trace;
pub mod writer;

pub use coordinator::{export, AudioPolicy, ExportRequest, ExportSummary};
#[cfg(feature = "media-ffmpeg")]
pub use ffmpeg_writer::{is_ffmpeg_on_path, FfmpegContainerWriter, FfmpegWriterOpts, SolidGrayRenderDevice};
pub use governance::{validate_governance, Governance, ProjectLicense, QualityProfile, UserPlan, WatermarkSpec};
pub use preflight::{preflight, EffectRegistry, StaticEffectRegistry, ALLOWED_VIDEO_EFFECT_PORTS};
pub use trace::{emit, emit_with, InMemoryTraceSink, TraceRecord, TraceSink, TracingTraceSink};
pub use writer::{AudioInputConfig, ContainerWriter, Fps, InMemoryWriter, RenderDevice, VideoInputConfig, WriterStatus};
