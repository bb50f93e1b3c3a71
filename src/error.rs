//! Error types for the fallible, non-realtime parts of the equalizer.

/// Returned from [`EqProcessor::prepare()`][crate::processor::EqProcessor::prepare()] when the
/// stream configuration cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PrepareError {
    #[error("unsupported channel count {0}, only mono and stereo are supported")]
    UnsupportedChannelCount(u32),
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f32),
    #[error("the maximum buffer size must be at least one sample")]
    InvalidBufferSize,
}

/// Returned when restoring saved parameter state fails.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not parse the state: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported state version {0}")]
    UnsupportedVersion(u32),
}
