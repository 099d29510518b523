pub type ExportResult<T> = Result<T, ExportError>;

/// Error taxonomy for the timeline-to-media export core.
///
/// Grouped by concern (validation, governance,
/// resolution/evaluation, resource, I/O & coding, concurrency); variant names
/// match the taxonomy terms directly so call sites can match on them.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("invalid duration: clip range.duration does not equal source_range.duration")]
    InvalidDuration,

    #[error("invalid transition duration: {0} must be >= 0")]
    InvalidTransitionDuration(String),

    #[error("invalid crop region: {0}")]
    InvalidRegion(String),

    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(String),

    #[error("unknown feature referenced by timeline: {0}")]
    UnknownFeature(String),

    #[error("unsupported effect input port '{port}' on effect '{effect}'")]
    UnsupportedEffectInputPort { effect: String, port: String },

    #[error("watermark required by project license but no watermark_spec provided")]
    WatermarkRequired,

    #[error("requested resolution {requested} exceeds maximum allowed {max_allowed}")]
    ResolutionNotAllowed { requested: u32, max_allowed: u32 },

    #[error("keyframe track is empty")]
    EmptyTrack,

    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("buffer allocation failed: {0}")]
    BufferAllocationFailed(String),

    #[error("pixel/sample format creation failed: {0}")]
    FormatCreationFailed(String),

    #[error("writer failed: {0}")]
    WriterFailed(String),

    #[error("append to writer failed: {0}")]
    AppendFailed(String),

    #[error("underfeed: appended {appended} of {expected} expected frames")]
    Underfeed { appended: u64, expected: u64 },

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("timeout waiting on {kind} after {seconds}s")]
    Timeout { kind: String, seconds: f64 },

    #[error("engine failed: {0}")]
    EngineFailed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExportError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition_duration(msg: impl Into<String>) -> Self {
        Self::InvalidTransitionDuration(msg.into())
    }

    pub fn invalid_region(msg: impl Into<String>) -> Self {
        Self::InvalidRegion(msg.into())
    }

    pub fn unknown_feature(id: impl Into<String>) -> Self {
        Self::UnknownFeature(id.into())
    }

    pub fn writer_failed(msg: impl Into<String>) -> Self {
        Self::WriterFailed(msg.into())
    }

    pub fn engine_failed(msg: impl Into<String>) -> Self {
        Self::EngineFailed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert!(ExportError::validation("x").to_string().contains("validation error:"));
        assert_eq!(
            ExportError::Underfeed {
                appended: 50,
                expected: 100
            }
            .to_string(),
            "underfeed: appended 50 of 100 expected frames"
        );
        assert_eq!(
            ExportError::ResolutionNotAllowed {
                requested: 2160,
                max_allowed: 1080
            }
            .to_string(),
            "requested resolution 2160 exceeds maximum allowed 1080"
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ExportError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
