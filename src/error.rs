// src/error.rs

use thiserror::Error;

/// Errors surfaced by the streaming pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Metadata or configuration that cannot size a session.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Passed through verbatim from the decoder's error event.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A frame batch whose layout cannot be normalized to planar f32.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The audio sink could not open or start a stream.
    #[error("audio output error: {0}")]
    Output(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        StreamError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Serialization(e.to_string())
    }
}

/// Result type for pipeline operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Decoded length ran past the preallocated store. Non-fatal: the excess
/// frames were dropped and the session continues.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("store overflow: {requested} frames requested at offset {offset}, {applied} applied (capacity {capacity})")]
pub struct OverflowWarning {
    pub offset: usize,
    pub requested: usize,
    pub applied: usize,
    pub capacity: usize,
}

impl OverflowWarning {
    pub fn dropped(&self) -> usize {
        self.requested - self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_reports_dropped_frames() {
        let w = OverflowWarning {
            offset: 479_500,
            requested: 1500,
            applied: 500,
            capacity: 480_000,
        };
        assert_eq!(w.dropped(), 1000);
        assert!(w.to_string().contains("500 applied"));
    }

    #[test]
    fn io_errors_convert() {
        let e: StreamError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, StreamError::Io(ref m) if m.contains("gone")));
    }
}
