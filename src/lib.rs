//! Deterministic timeline-to-media export core.
//!
//! Resolves a [`timeline::model::Timeline`] into per-frame render graphs and
//! mastered audio chunks, then drives an external [`export::writer::RenderDevice`]
//! and [`export::writer::ContainerWriter`] to completion through
//! [`export::coordinator::export`]. Every stage is a pure function of its
//! inputs: no wall-clock time, no hidden RNG, no filesystem reads outside
//! the writer/asset boundary.

#![forbid(unsafe_code)]

pub mod audio;
pub mod caption;
pub mod color;
pub mod error;
pub mod export;
pub mod foundation;
pub mod frame;
pub mod graph;
pub mod keyframe;
pub mod pool;
pub mod timeline;

pub use error::{ExportError, ExportResult};
pub use export::coordinator::{export, AudioPolicy, ExportRequest, ExportSummary};
