//! Certificate-bound authority tiers, monotonic demotion, and Ed25519
//! signing for the router.
//!
//! Binds a starting [`level::AuthorityLevel`] at startup from a signed
//! promotion certificate, then runs a [`authority::DemotionWatcher`] after
//! every event that can only ever lower it.

pub mod authority;
pub mod certificate;
pub mod error;
pub mod level;
pub mod signing;

pub use authority::{
    bind_authority, create_build_meta_check, create_violation_active_check, AuthorityState,
    CheckContext, DemotionCheck, DemotionEvent, DemotionWatcher,
};
pub use certificate::{
    compute_build_metadata, compute_cert_body_sha256, sha256_file, verify_build_meta_match,
    verify_certificate_integrity, BuildMeta, Certificate, EXPECTED_CERT_VERSION,
};
pub use error::{AuthorityError, Result};
pub use level::AuthorityLevel;
