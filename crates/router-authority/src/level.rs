//! Authority tiers and their total order.

use serde::{Deserialize, Serialize};

/// Capability level of the emitter, bound at startup by certificate and
/// monotonically non-increasing within a session (spec §3/§4.7).
///
/// Declaration order below is also discriminant order, so `#[derive(Ord)]`
/// gives the real total order `v0.1 < v0.2 < v0.3 < v1.0` directly, in
/// place of the Python original's linear `order.index()` scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    #[serde(rename = "v0.1")]
    V01,
    #[serde(rename = "v0.2")]
    V02,
    #[serde(rename = "v0.3")]
    V03,
    #[serde(rename = "v1.0")]
    V10,
}

impl AuthorityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorityLevel::V01 => "v0.1",
            AuthorityLevel::V02 => "v0.2",
            AuthorityLevel::V03 => "v0.3",
            AuthorityLevel::V10 => "v1.0",
        }
    }

    /// `v0.2+` may emit non-flat intents and write to the inbox.
    pub fn can_emit_non_flat(self) -> bool {
        self >= AuthorityLevel::V02
    }

    /// `v0.3+` may execute. Out of scope for this crate; exposed for
    /// completeness of the capability table (spec §4.7).
    pub fn can_execute(self) -> bool {
        self >= AuthorityLevel::V03
    }

    /// `v0.1` is shadow-only: it observes but never emits non-flat intents.
    pub fn is_shadow_only(self) -> bool {
        self == AuthorityLevel::V01
    }
}
