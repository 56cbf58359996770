//! Error types for router-spine

use thiserror::Error;

/// Spine I/O and validation errors.
///
/// Per spec §7, transient I/O is logged and the caller continues; only
/// startup-time failures (an unreadable spine directory) are allowed to
/// propagate as a hard error.
#[derive(Error, Debug)]
pub enum SpineError {
    #[error("spine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed line skipped: {0}")]
    MalformedLine(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

/// Result type alias for router-spine
pub type Result<T> = std::result::Result<T, SpineError>;
