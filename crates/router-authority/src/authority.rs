//! `AuthorityState`, `bind_authority`, and the demotion watcher (spec
//! §4.7/§4.8). Ported from `router/authority.py`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::certificate::{
    compute_cert_body_sha256, verify_build_meta_match, verify_certificate_integrity,
    BuildMeta, Certificate, EXPECTED_CERT_VERSION,
};
use crate::level::AuthorityLevel;

/// A recorded demotion: irreversible within the session once it happens
/// (spec invariants I1/I3/I4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemotionEvent {
    pub from: AuthorityLevel,
    pub to: AuthorityLevel,
    pub trigger: String,
    pub at: String,
}

/// `{level, cert_path, cert_body_sha256, build_meta_sha256, promoted_at,
/// demotions, started_at}` (spec §3). `level` is owned by the runtime loop;
/// the demotion watcher borrows it mutably (spec §9 "Ownership").
#[derive(Debug, Clone)]
pub struct AuthorityState {
    pub level: AuthorityLevel,
    pub cert_path: Option<String>,
    pub cert_body_sha256: Option<String>,
    pub build_meta_sha256: Option<String>,
    pub promoted_at: Option<String>,
    pub demotions: Vec<DemotionEvent>,
    pub started_at: String,
}

impl AuthorityState {
    fn shadow(started_at: String, cert_path: Option<String>) -> Self {
        AuthorityState {
            level: AuthorityLevel::V01,
            cert_path,
            cert_body_sha256: None,
            build_meta_sha256: None,
            promoted_at: None,
            demotions: Vec::new(),
            started_at,
        }
    }

    pub fn can_emit_non_flat(&self) -> bool {
        self.level.can_emit_non_flat()
    }

    /// Atomically demotes to v0.1. A no-op if already at v0.1 (demotion is
    /// monotonic and irreversible within a session, spec I1/I4).
    pub fn demote(&mut self, trigger: &str, at: &str) -> Option<DemotionEvent> {
        if self.level == AuthorityLevel::V01 {
            return None;
        }
        let event = DemotionEvent {
            from: self.level,
            to: AuthorityLevel::V01,
            trigger: trigger.to_string(),
            at: at.to_string(),
        };
        self.level = AuthorityLevel::V01;
        self.demotions.push(event.clone());
        Some(event)
    }
}

/// `bind_authority(cert_path, build_meta, allow_legacy) -> AuthorityState`
/// (spec §4.7). Every failure path falls closed to `v0.1`; none of them
/// propagate as a hard error — each is logged by the caller (the runtime
/// loop) and binding simply returns the shadow-only state.
pub fn bind_authority(
    cert_path: Option<&Path>,
    build_meta: &BuildMeta,
    allow_legacy: bool,
    started_at: String,
) -> AuthorityState {
    let cert_path_str = cert_path.map(|p| p.display().to_string());

    let path = match cert_path {
        Some(p) => p,
        None => return AuthorityState::shadow(started_at, cert_path_str),
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return AuthorityState::shadow(started_at, cert_path_str),
    };

    let cert_json: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(_) => return AuthorityState::shadow(started_at, cert_path_str),
    };

    let cert: Certificate = match serde_json::from_value(cert_json.clone()) {
        Ok(c) => c,
        Err(_) => return AuthorityState::shadow(started_at, cert_path_str),
    };

    if cert.cert_version != EXPECTED_CERT_VERSION {
        return AuthorityState::shadow(started_at, cert_path_str);
    }

    if verify_certificate_integrity(&cert, &cert_json, allow_legacy).is_err() {
        return AuthorityState::shadow(started_at, cert_path_str);
    }

    if verify_build_meta_match(&cert, build_meta).is_err() {
        return AuthorityState::shadow(started_at, cert_path_str);
    }

    AuthorityState {
        level: AuthorityLevel::V02,
        cert_path: cert_path_str,
        cert_body_sha256: Some(compute_cert_body_sha256(&cert_json)),
        build_meta_sha256: Some(build_meta.combined_sha256.clone()),
        promoted_at: Some(cert.promoted_at.clone()),
        demotions: Vec::new(),
        started_at,
    }
}

/// Inputs a demotion check needs: the observable facts a trigger condition
/// reads, independent of how `AuthorityState` itself is represented.
pub struct CheckContext<'a> {
    pub violation_active: bool,
    pub current_build_meta_sha256: &'a str,
    pub cert_build_meta_sha256: Option<&'a str>,
}

/// A demotion check: a predicate returning `None` or a trigger string
/// (spec §4.8).
pub type DemotionCheck = Box<dyn Fn(&CheckContext) -> Option<String> + Send + Sync>;

/// Triggered when `state.violation_active` is true.
pub fn create_violation_active_check() -> DemotionCheck {
    Box::new(|ctx: &CheckContext| {
        if ctx.violation_active {
            Some("violation_active_true".to_string())
        } else {
            None
        }
    })
}

/// Triggered when the currently observable build-meta hash differs from
/// the certificate's (live-patching defense).
pub fn create_build_meta_check() -> DemotionCheck {
    Box::new(|ctx: &CheckContext| match ctx.cert_build_meta_sha256 {
        Some(cert_hash) if cert_hash != ctx.current_build_meta_sha256 => {
            Some("build_meta_mismatch".to_string())
        }
        _ => None,
    })
}

/// Holds the ordered sequence of demotion checks and runs them after every
/// event, once the authority level is above `v0.1` (spec §4.8).
pub struct DemotionWatcher {
    checks: Vec<DemotionCheck>,
}

impl DemotionWatcher {
    pub fn new(checks: Vec<DemotionCheck>) -> Self {
        DemotionWatcher { checks }
    }

    /// The default watcher: both required built-in checks, in order.
    pub fn with_default_checks() -> Self {
        DemotionWatcher::new(vec![
            create_violation_active_check(),
            create_build_meta_check(),
        ])
    }

    /// Runs all checks in order; the first non-`None` trigger performs an
    /// atomic demotion and short-circuits the rest. A no-op once already at
    /// `v0.1`.
    pub fn check(
        &self,
        authority: &mut AuthorityState,
        ctx: &CheckContext,
        at: &str,
    ) -> Option<DemotionEvent> {
        if authority.level == AuthorityLevel::V01 {
            return None;
        }
        for check in &self.checks {
            if let Some(trigger) = check(ctx) {
                return authority.demote(&trigger, at);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_meta(hash: &str) -> BuildMeta {
        BuildMeta {
            source_files: Default::default(),
            combined_sha256: hash.to_string(),
            critical_files: vec![],
        }
    }

    #[test]
    fn no_cert_path_starts_at_v01() {
        let state = bind_authority(None, &build_meta("x"), false, "t0".to_string());
        assert_eq!(state.level, AuthorityLevel::V01);
    }

    #[test]
    fn missing_cert_file_starts_at_v01() {
        let state = bind_authority(
            Some(Path::new("/nonexistent/cert.json")),
            &build_meta("x"),
            false,
            "t0".to_string(),
        );
        assert_eq!(state.level, AuthorityLevel::V01);
    }

    #[test]
    fn demotion_is_monotonic_and_idempotent() {
        let mut state = AuthorityState {
            level: AuthorityLevel::V02,
            cert_path: None,
            cert_body_sha256: None,
            build_meta_sha256: None,
            promoted_at: None,
            demotions: Vec::new(),
            started_at: "t0".to_string(),
        };
        let event = state.demote("violation_active_true", "t1").unwrap();
        assert_eq!(event.from, AuthorityLevel::V02);
        assert_eq!(event.to, AuthorityLevel::V01);
        assert_eq!(state.demotions.len(), 1);

        // Second demotion attempt is a no-op.
        assert!(state.demote("build_meta_mismatch", "t2").is_none());
        assert_eq!(state.demotions.len(), 1);
    }

    #[test]
    fn watcher_skips_checks_once_at_v01() {
        let mut state = AuthorityState {
            level: AuthorityLevel::V01,
            cert_path: None,
            cert_body_sha256: None,
            build_meta_sha256: None,
            promoted_at: None,
            demotions: Vec::new(),
            started_at: "t0".to_string(),
        };
        let watcher = DemotionWatcher::with_default_checks();
        let ctx = CheckContext {
            violation_active: true,
            current_build_meta_sha256: "a",
            cert_build_meta_sha256: Some("a"),
        };
        assert!(watcher.check(&mut state, &ctx, "t1").is_none());
    }

    #[test]
    fn watcher_demotes_on_violation() {
        let mut state = AuthorityState {
            level: AuthorityLevel::V02,
            cert_path: None,
            cert_body_sha256: None,
            build_meta_sha256: None,
            promoted_at: None,
            demotions: Vec::new(),
            started_at: "t0".to_string(),
        };
        let watcher = DemotionWatcher::with_default_checks();
        let ctx = CheckContext {
            violation_active: true,
            current_build_meta_sha256: "a",
            cert_build_meta_sha256: Some("a"),
        };
        let event = watcher.check(&mut state, &ctx, "t1").unwrap();
        assert_eq!(event.trigger, "violation_active_true");
        assert_eq!(state.level, AuthorityLevel::V01);
    }

    #[test]
    fn watcher_demotes_on_build_meta_drift() {
        let mut state = AuthorityState {
            level: AuthorityLevel::V02,
            cert_path: None,
            cert_body_sha256: None,
            build_meta_sha256: None,
            promoted_at: None,
            demotions: Vec::new(),
            started_at: "t0".to_string(),
        };
        let watcher = DemotionWatcher::with_default_checks();
        let ctx = CheckContext {
            violation_active: false,
            current_build_meta_sha256: "patched",
            cert_build_meta_sha256: Some("original"),
        };
        let event = watcher.check(&mut state, &ctx, "t1").unwrap();
        assert_eq!(event.trigger, "build_meta_mismatch");
    }
}
