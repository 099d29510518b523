//! Audio graph, procedural sample generation and offline rendering / mastering.

pub mod graph;
pub mod mastering;
pub mod render;
pub mod source;

pub use graph::{AudioBus, AudioGraph, ClipVoice, TrackBus};
pub use mastering::{DialogCleanupPreset, MasteringChain};
pub use render::{render_offline, AudioChunkSource, AudioRenderConfig};
pub use source::{clip_seed, parse_audio_url, AudioSourceKind, ProceduralSource};

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNELS: usize = 2;
