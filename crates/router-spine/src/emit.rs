//! Appends `router.intent` / `router.veto` records to the spine.
//!
//! Ports `io/intent_writer.py`'s `intent_id` digest scheme combined with
//! `router/emit.py`'s canonicalize-then-validate-then-write sequence, with
//! the fail-closed-to-surface-veto behavior from spec.md §4.6/§7 (the
//! retrieved `emit.py` predates schema validation at the emission
//! boundary; this supersedes it).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use router_authority::DemotionEvent;
use router_core::model::{AllocationResult, Envelope, VetoReason};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::canonical::canonicalize;
use crate::error::Result;
use crate::schema::{validate_router_intent, validate_router_veto};

fn veto_reason_str(reason: VetoReason) -> &'static str {
    match reason {
        VetoReason::InvariantViolation => "invariant_violation",
        VetoReason::InputUnavailable => "input_unavailable",
        VetoReason::AuthorityGate => "authority_gate",
        VetoReason::RegimeUnresolved => "regime_unresolved",
        VetoReason::NoEdge => "no_edge",
        VetoReason::RegimeVolatile => "regime_volatile",
    }
}

fn direction_str(direction: router_core::model::Direction) -> &'static str {
    use router_core::model::Direction;
    match direction {
        Direction::Flat => "flat",
        Direction::Long => "long",
        Direction::Short => "short",
    }
}

fn risk_cap_str(risk_cap: router_core::model::RiskCap) -> &'static str {
    use router_core::model::RiskCap;
    match risk_cap {
        RiskCap::Zero => "zero",
        RiskCap::Low => "low",
        RiskCap::Medium => "medium",
    }
}

fn envelope_json(envelope: &Envelope) -> Value {
    json!({
        "p_flat": envelope.p_flat,
        "p_long": envelope.p_long,
        "p_short": envelope.p_short,
        "p_vetoed": envelope.p_vetoed,
        "size_min": envelope.size_min,
        "size_max": envelope.size_max,
        "kernel": envelope.kernel,
        "version": envelope.version,
    })
}

/// Builds the `router.intent` payload: `{symbol, direction, size_pct_q,
/// size_pct_scale, risk_cap, rationale, envelope}` (spec §4.6).
pub fn build_intent_payload(symbol: &str, result: &AllocationResult, envelope: &Envelope) -> Value {
    json!({
        "symbol": symbol,
        "direction": direction_str(result.direction),
        "size_pct_q": result.size_pct_q,
        "size_pct_scale": result.size_pct_scale,
        "risk_cap": risk_cap_str(result.risk_cap),
        "rationale": result.rationale,
        "envelope": envelope_json(envelope),
    })
}

/// Builds the `router.veto` payload: `{symbol, veto_reason, envelope}`
/// (spec §4.6).
pub fn build_veto_payload(symbol: &str, reason: VetoReason, envelope: &Envelope) -> Value {
    json!({
        "symbol": symbol,
        "veto_reason": veto_reason_str(reason),
        "envelope": envelope_json(envelope),
    })
}

/// `intent_id = sha256(source_event_id + canonical_json(payload))`
/// (`io/intent_writer.py`).
fn record_id(source_event_id: &str, payload: &Value) -> String {
    let material = format!("{source_event_id}{}", canonicalize(payload));
    hex::encode(Sha256::digest(material.as_bytes()))
}

fn append_record(
    spine_path: &Path,
    event_type: &str,
    payload: &Value,
    source_event_id: &str,
    source_ts: &str,
) -> Result<()> {
    let record_id = record_id(source_event_id, payload);
    // The record's own `timestamp` is the triggering event's timestamp, not
    // wall-clock time: the core has no clock, and replay must be
    // byte-identical across runs (spec §5 "Replay determinism").
    let record = json!({
        "event_type": event_type,
        "event_id": record_id,
        "timestamp": source_ts,
        "payload": payload,
        "source_event_id": source_event_id,
        "source_ts": source_ts,
    });

    let line = canonicalize(&record);
    let mut file = OpenOptions::new().create(true).append(true).open(spine_path)?;
    writeln!(file, "{line}")?;
    file.flush()?;
    Ok(())
}

/// Emits a `router.intent`. Canonicalizes and validates the payload first;
/// on validation failure, emits a surface veto instead
/// (`veto_reason=regime_unresolved`, `surface_invalid=<error>`) rather than
/// writing a malformed intent (spec §4.6/§7, invariant "no flat intent" and
/// the schema-violation-on-emit policy).
pub fn emit_intent(
    spine_path: &Path,
    symbol: &str,
    result: &AllocationResult,
    envelope: Envelope,
    source_event_id: &str,
    source_ts: &str,
) -> Result<()> {
    let payload = build_intent_payload(symbol, result, &envelope);
    match validate_router_intent(&payload) {
        Ok(()) => {
            info!(symbol, direction = ?result.direction, size_pct_q = result.size_pct_q, "emitting router.intent");
            append_record(spine_path, "router.intent", &payload, source_event_id, source_ts)
        }
        Err(e) => {
            error!(symbol, error = %e, "intent failed schema validation, emitting surface veto instead");
            let mut veto_payload =
                build_veto_payload(symbol, VetoReason::RegimeUnresolved, &Envelope::vetoed("surface", "n/a"));
            veto_payload["surface_invalid"] = json!(e.to_string());
            append_record(spine_path, "router.veto", &veto_payload, source_event_id, source_ts)
        }
    }
}

/// Emits a `router.veto`.
pub fn emit_veto(
    spine_path: &Path,
    symbol: &str,
    reason: VetoReason,
    envelope: Envelope,
    source_event_id: &str,
    source_ts: &str,
) -> Result<()> {
    let payload = build_veto_payload(symbol, reason, &envelope);
    if let Err(e) = validate_router_veto(&payload) {
        error!(symbol, error = %e, "internal veto payload failed validation");
        return Err(e);
    }
    info!(symbol, veto_reason = veto_reason_str(reason), "emitting router.veto");
    append_record(spine_path, "router.veto", &payload, source_event_id, source_ts)
}

/// Emits a durable `router.authority_demotion` record to the spine, and
/// optionally a sidecar JSON file (spec §4.8: "records demotions durably,
/// to spine and sidecar"). Demotions are rare and auditable; a sidecar
/// write failure is logged and does not fail the spine write.
pub fn emit_demotion(
    spine_path: &Path,
    demotion: &DemotionEvent,
    sidecar_dir: Option<&Path>,
    source_event_id: &str,
    source_ts: &str,
) -> Result<()> {
    let payload = json!({
        "from": demotion.from.as_str(),
        "to": demotion.to.as_str(),
        "trigger": demotion.trigger,
    });

    if let Some(dir) = sidecar_dir {
        if let Err(e) = write_demotion_sidecar(dir, demotion, &payload) {
            warn!(error = %e, "failed to write demotion sidecar file");
        }
    }

    append_record(
        spine_path,
        "router.authority_demotion",
        &payload,
        source_event_id,
        source_ts,
    )
}

fn write_demotion_sidecar(dir: &Path, demotion: &DemotionEvent, payload: &Value) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let file_name = format!(
        "demotion-{}-{}.json",
        demotion.trigger,
        hex::encode(Sha256::digest(demotion.at.as_bytes()))
    );
    let path = dir.join(file_name);
    std::fs::write(path, canonicalize(payload))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_core::model::{Direction, RiskCap, SIZE_PCT_SCALE};
    use std::fs;

    fn tmp_spine(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("router-spine-emit-test-{}-{}", std::process::id(), name));
        let _ = fs::remove_file(&p);
        p
    }

    fn sample_allocation() -> AllocationResult {
        AllocationResult {
            direction: Direction::Long,
            size_pct_q: 700,
            size_pct_scale: SIZE_PCT_SCALE,
            risk_cap: RiskCap::Low,
            rationale: vec!["regime=drift".to_string()],
            base_allocation_q: 2500,
            entropy_factor: 0.35,
            uncertainty_discount: 0.8,
            final_factor: 0.28,
        }
    }

    #[test]
    fn emit_intent_appends_one_canonical_line() {
        let path = tmp_spine("intent");
        let envelope = Envelope::vetoed("mock", "mock_v1");
        emit_intent(&path, "BTC", &sample_allocation(), envelope, "e1", "t1").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        let value: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(value["event_type"], "router.intent");
        assert_eq!(value["source_event_id"], "e1");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn invalid_allocation_fails_closed_to_surface_veto() {
        let path = tmp_spine("surface");
        let mut bad = sample_allocation();
        bad.size_pct_q = 0; // non-flat direction with zero size -> invalid
        let envelope = Envelope::vetoed("mock", "mock_v1");
        emit_intent(&path, "BTC", &bad, envelope, "e1", "t1").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(value["event_type"], "router.veto");
        assert_eq!(value["payload"]["veto_reason"], "regime_unresolved");
        assert!(value["payload"]["surface_invalid"].is_string());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn emit_veto_appends_collapsed_envelope() {
        let path = tmp_spine("veto");
        let envelope = Envelope::vetoed("mock", "mock_v1");
        emit_veto(&path, "ETH", VetoReason::NoEdge, envelope, "e2", "t2").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(value["payload"]["veto_reason"], "no_edge");
        assert_eq!(value["payload"]["envelope"]["p_vetoed"], 1.0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn record_id_is_deterministic() {
        let payload = json!({"a": 1});
        assert_eq!(record_id("e1", &payload), record_id("e1", &payload));
        assert_ne!(record_id("e1", &payload), record_id("e2", &payload));
    }

    #[test]
    fn emit_demotion_writes_spine_and_sidecar() {
        let path = tmp_spine("demotion");
        let mut sidecar_dir = std::env::temp_dir();
        sidecar_dir.push(format!("router-spine-demotions-{}", std::process::id()));
        let _ = fs::remove_dir_all(&sidecar_dir);

        let demotion = router_authority::DemotionEvent {
            from: router_authority::AuthorityLevel::V02,
            to: router_authority::AuthorityLevel::V01,
            trigger: "violation_active_true".to_string(),
            at: "2026-01-01T00:00:01Z".to_string(),
        };
        emit_demotion(&path, &demotion, Some(&sidecar_dir), "e3", "2026-01-01T00:00:01Z").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(value["event_type"], "router.authority_demotion");
        assert_eq!(value["payload"]["trigger"], "violation_active_true");

        let sidecar_files: Vec<_> = fs::read_dir(&sidecar_dir).unwrap().collect();
        assert_eq!(sidecar_files.len(), 1);

        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir_all(&sidecar_dir);
    }
}
