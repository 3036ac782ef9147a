//! Tagged error kinds shared across every subsystem.
//!
//! These map directly onto the six error kinds every subsystem boundary
//! resolves to before it ever reaches the scheduler: the scheduler itself
//! never sees a `MediaError`, only the fact that a subsystem deactivated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("format unsupported: {0}")]
    FormatUnsupported(String),

    #[error("too large: {0}")]
    TooLarge(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("short read: expected {expected}, got {got}")]
    IoShort { expected: usize, got: usize },
}

impl MediaError {
    /// Short label suitable for the ~2s red-box overlay used by
    /// `FormatUnsupported`/`TooLarge` failures.
    pub fn overlay_label(&self) -> &str {
        match self {
            MediaError::NotFound(_) => "not found",
            MediaError::FormatUnsupported(_) => "unsupported format",
            MediaError::TooLarge(_) => "file too large",
            MediaError::DecodeError(_) => "decode error",
            MediaError::OutOfMemory => "out of memory",
            MediaError::IoShort { .. } => "short read",
        }
    }

    /// Whether this kind is retried in place (mid-stream decode errors are
    /// skipped-and-retried by audio, pretended-past by video) rather than
    /// terminal to the current operation.
    pub fn is_retryable_mid_stream(&self) -> bool {
        matches!(self, MediaError::DecodeError(_) | MediaError::IoShort { .. })
    }
}

pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_short_counts_as_decode_error_for_retry_purposes() {
        let e = MediaError::IoShort { expected: 4, got: 1 };
        assert!(e.is_retryable_mid_stream());
    }

    #[test]
    fn out_of_memory_is_not_retryable() {
        assert!(!MediaError::OutOfMemory.is_retryable_mid_stream());
    }

    #[test]
    fn overlay_labels_are_short() {
        assert!(MediaError::NotFound("x".into()).overlay_label().len() < 32);
    }
}
