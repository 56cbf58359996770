//! Canonical JSON serialization: sorted keys, minimal separators, and fixed
//! decimal float formatting so replay is byte-identical across platforms
//! (spec §5 "Replay determinism", §6 "Canonical serialization").

use serde_json::{Map, Number, Value};

/// Decimal places every float is rounded to before being written. Matches
/// the precision the envelope kernels already round their own outputs to
/// (`router-core::envelope`/`mc_envelope`), so re-canonicalizing here is
/// idempotent rather than introducing a second rounding pass.
const FLOAT_DECIMALS: i32 = 6;

fn round_floats(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => {
            let factor = 10f64.powi(FLOAT_DECIMALS);
            let rounded = (n.as_f64().unwrap() * factor).round() / factor;
            Number::from_f64(rounded)
                .map(Value::Number)
                .unwrap_or_else(|| value.clone())
        }
        Value::Number(_) => value.clone(),
        Value::Array(items) => Value::Array(items.iter().map(round_floats).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), round_floats(v));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Canonicalizes a JSON value: rounds floats to a fixed precision and
/// serializes with sorted keys and minimal separators.
///
/// Relies on `serde_json::Map`'s default (non-`preserve_order`) `BTreeMap`
/// backing: constructing the rounded copy via `Map::insert` in arbitrary
/// order still serializes with keys sorted lexicographically.
pub fn canonicalize(value: &Value) -> String {
    let rounded = round_floats(value);
    serde_json::to_string(&rounded).expect("canonical Value serialization cannot fail")
}
