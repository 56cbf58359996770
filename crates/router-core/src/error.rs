//! Error types for router-core

use thiserror::Error;

/// Core synthesis errors.
///
/// These never cross the runtime loop boundary (spec §7): the loop treats
/// every `Err` here as a reason to skip the current symbol or event, not as
/// grounds to propagate a failure upward.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unresolved regime for symbol: {0}")]
    UnresolvedRegime(String),

    #[error("malformed allocation: {0}")]
    MalformedAllocation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for router-core
pub type Result<T> = std::result::Result<T, CoreError>;
