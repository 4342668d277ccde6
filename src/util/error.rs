//! Error types for animpack.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for compression and container operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input values (non-finite components, inconsistent arrays)
    #[error("Format error: {0}")]
    Format(String),

    /// Declared sample count exceeds the samples actually present
    #[error("Corrupt data: {declared} samples declared, {available} available")]
    CorruptData { declared: usize, available: usize },

    /// Chunk payload ends before a declared field or array
    #[error("Truncated chunk: needed {needed} bytes, {available} available")]
    TruncatedChunk { needed: usize, available: usize },

    /// Key times are not strictly ascending
    #[error("Key times not strictly ascending at index {index}")]
    UnsortedKeys { index: usize },

    /// Unknown controller or container version tag
    #[error("Unsupported version: {0:#06x}")]
    UnsupportedVersion(u16),

    /// Unknown value or time format tag
    #[error("Unsupported {kind} format tag: {tag}")]
    UnsupportedFormat { kind: &'static str, tag: u16 },

    /// Not enough samples to derive a base frame
    #[error("Degenerate animation: {0}")]
    DegenerateAnimation(String),

    /// Invalid compression settings or policy
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Container does not start with the expected magic
    #[error("Invalid container: expected ANPK magic bytes")]
    InvalidMagic,

    /// Container is shorter than its header
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Write operation failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether a reader may skip the offending controller and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Format(_)
                | Self::CorruptData { .. }
                | Self::TruncatedChunk { .. }
                | Self::UnsortedKeys { .. }
                | Self::UnsupportedVersion(_)
                | Self::UnsupportedFormat { .. }
        )
    }
}

/// Result type alias for animpack operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::TruncatedChunk { needed: 64, available: 12 };
        assert!(e.to_string().contains("64"));
        assert!(e.to_string().contains("12"));

        let e = Error::UnsupportedVersion(0x0830);
        assert!(e.to_string().contains("0x0830"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::UnsortedKeys { index: 3 }.is_recoverable());
        assert!(Error::UnsupportedFormat { kind: "rotation", tag: 77 }.is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
    }
}
