//! `router.intent` / `router.veto` payload validation (spec §4.10).
//!
//! Two accepted intent shapes: the quantized v0.2 form (primary, the only
//! form the emitter ever produces) and a legacy float `size_pct` form
//! (compatibility-only — accepted here because downstream consumers may
//! still expect it, never emitted). Ports `schemas/router_intent.py`'s
//! legacy path and adds the quantized path spec.md §4.10/§9 mandates.

use serde_json::Value;

use crate::error::{Result, SpineError};

const QUANTIZED_RISK_CAPS: &[&str] = &["zero", "low", "medium"];
const LEGACY_RISK_CAPS: &[&str] = &["low", "normal", "high"];
const VETO_REASONS: &[&str] = &[
    "invariant_violation",
    "input_unavailable",
    "authority_gate",
    "regime_unresolved",
    "no_edge",
    "regime_volatile",
];

fn fail(msg: impl Into<String>) -> SpineError {
    SpineError::SchemaViolation(msg.into())
}

fn validate_rationale(payload: &Value) -> Result<()> {
    let rationale = payload
        .get("rationale")
        .and_then(Value::as_array)
        .ok_or_else(|| fail("rationale must be an array"))?;
    if rationale.is_empty() {
        return Err(fail("rationale must be non-empty"));
    }
    if !rationale.iter().all(Value::is_string) {
        return Err(fail("rationale must be an array of strings"));
    }
    Ok(())
}

/// Validates a `router.intent` payload. `direction` must never be `flat`.
/// Accepts exactly one of the quantized form (`size_pct_q` +
/// `size_pct_scale`) or the legacy form (`size_pct`), never both.
pub fn validate_router_intent(payload: &Value) -> Result<()> {
    let direction = payload
        .get("direction")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("direction must be a string"))?;
    if direction != "long" && direction != "short" {
        return Err(fail(format!(
            "direction must be 'long' or 'short', got '{direction}'"
        )));
    }

    let has_quantized =
        payload.get("size_pct_q").is_some() || payload.get("size_pct_scale").is_some();
    let has_legacy = payload.get("size_pct").is_some();

    if has_quantized && has_legacy {
        return Err(fail("mixed legacy and quantized size fields"));
    }

    if has_quantized {
        validate_quantized(payload, direction)?;
    } else if has_legacy {
        validate_legacy(payload)?;
    } else {
        return Err(fail("missing size fields"));
    }

    validate_rationale(payload)
}

fn validate_quantized(payload: &Value, direction: &str) -> Result<()> {
    let size_pct_q = payload
        .get("size_pct_q")
        .and_then(Value::as_i64)
        .ok_or_else(|| fail("size_pct_q must be an integer"))?;
    let size_pct_scale = payload
        .get("size_pct_scale")
        .and_then(Value::as_i64)
        .ok_or_else(|| fail("size_pct_scale must be an integer"))?;

    if size_pct_q < 0 {
        return Err(fail("size_pct_q must be >= 0"));
    }
    if size_pct_scale != 10_000 {
        return Err(fail("size_pct_scale must be 10000"));
    }
    if size_pct_q == 0 && direction != "flat" {
        return Err(fail("non-flat direction with zero size_pct_q"));
    }

    let risk_cap = payload
        .get("risk_cap")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("risk_cap must be a string"))?;
    if !QUANTIZED_RISK_CAPS.contains(&risk_cap) {
        return Err(fail(format!("risk_cap '{risk_cap}' not in quantized set")));
    }
    Ok(())
}

fn validate_legacy(payload: &Value) -> Result<()> {
    let size_pct = payload
        .get("size_pct")
        .and_then(Value::as_f64)
        .ok_or_else(|| fail("size_pct must be a finite number"))?;
    if !size_pct.is_finite() || size_pct < 0.0 {
        return Err(fail("size_pct must be a finite non-negative number"));
    }

    let risk_cap = payload
        .get("risk_cap")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("risk_cap must be a string"))?;
    if !LEGACY_RISK_CAPS.contains(&risk_cap) {
        return Err(fail(format!("risk_cap '{risk_cap}' not in legacy set")));
    }
    Ok(())
}

/// Validates a `router.veto` payload: non-empty `symbol`, `veto_reason` in
/// the closed set.
pub fn validate_router_veto(payload: &Value) -> Result<()> {
    let symbol = payload
        .get("symbol")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("symbol must be a string"))?;
    if symbol.is_empty() {
        return Err(fail("symbol must be non-empty"));
    }
    let veto_reason = payload
        .get("veto_reason")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("veto_reason must be a string"))?;
    if !VETO_REASONS.contains(&veto_reason) {
        return Err(fail(format!("veto_reason '{veto_reason}' not recognized")));
    }
    Ok(())
}
