//! Error types for router-authority

use thiserror::Error;

/// Certificate and authority-binding errors.
///
/// None of these propagate out of `bind_authority`: every variant here
/// corresponds to a fail-closed-to-`v0.1` path (spec §4.7), and is logged
/// rather than surfaced as a hard failure.
#[derive(Error, Debug)]
pub enum AuthorityError {
    #[error("certificate not found at {0}")]
    CertificateMissing(String),

    #[error("certificate parse error: {0}")]
    CertificateParse(String),

    #[error("unsupported certificate version: {0}")]
    UnsupportedVersion(String),

    #[error("certificate signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("legacy certificate rejected: no cert_sig and allow_legacy is false")]
    LegacyRejected,

    #[error("build-meta mismatch: cert={cert}, build={build}")]
    BuildMetaMismatch { cert: String, build: String },

    #[error("signing error: {0}")]
    Signing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for router-authority
pub type Result<T> = std::result::Result<T, AuthorityError>;
