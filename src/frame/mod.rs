//! Aspect-ratio reframing and face/saliency-driven smart cropping.

pub mod processor;
pub mod reframer;

pub use processor::{process, CropRegion, FrameProcessorConfig, ScaleMode};
pub use reframer::{ReframeState, SmartReframer, Subject};
