//! Core data model: regimes, postures, allocations, envelopes.

use serde::{Deserialize, Serialize};

/// A discrete market-condition label, derived from an input string by a
/// fixed synonym table (see [`crate::regime::infer_regime`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Chop,
    HighVol,
    Drift,
    Breakout,
    Unknown,
}

/// Exposure direction. `Flat` is a valid allocator output but is never a
/// valid emitted intent (spec §4.3 invariant 2: "no flat intent").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Flat,
    Long,
    Short,
}

/// Quantized risk ceiling attached to an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCap {
    Zero,
    Low,
    Medium,
}

/// A typed silence: the exhaustive, closed set of reasons the router can
/// abstain. No extensibility without amendment (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoReason {
    InvariantViolation,
    InputUnavailable,
    AuthorityGate,
    RegimeUnresolved,
    NoEdge,
    RegimeVolatile,
}

/// `{regime_confidence, regime_age_seconds, transition_proximity}` — the
/// triple that modulates allocation size by confidence, staleness, and
/// transition proximity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyState {
    pub regime_confidence: f64,
    pub regime_age_seconds: f64,
    pub transition_proximity: f64,
}

impl Default for EntropyState {
    /// The default entropy used when an event carries none: confidence 0.5,
    /// age 0, transition proximity 0.3 — matches `compute_allocation_from_state`
    /// in the original source, which never threads a real entropy reading
    /// through the allocator (no upstream event carries one yet).
    fn default() -> Self {
        EntropyState {
            regime_confidence: 0.5,
            regime_age_seconds: 0.0,
            transition_proximity: 0.3,
        }
    }
}

impl EntropyState {
    /// `regime_confidence · max(0, 1 − age/3600) · (1 − transition_proximity)`,
    /// clamped to `[0,1]`.
    pub fn combined_entropy(&self) -> f64 {
        let staleness = (1.0 - self.regime_age_seconds / 3600.0).max(0.0);
        let combined = self.regime_confidence * staleness * (1.0 - self.transition_proximity);
        combined.clamp(0.0, 1.0)
    }
}

/// The frozen per-regime posture: direction, base allocation (in
/// ten-thousandths), uncertainty discount, risk cap, and a fixed rationale
/// line. Changes to this table are constitutional (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct RegimePosture {
    pub direction: Direction,
    pub base_allocation_q: i64,
    pub uncertainty_discount: f64,
    pub risk_cap: RiskCap,
    pub rationale: &'static str,
}

/// `size_pct_scale` is always this value.
pub const SIZE_PCT_SCALE: i64 = 10_000;

/// `{direction, size_pct_q, size_pct_scale, risk_cap, rationale, ...}` —
/// the allocator's output. See spec §3 for the field invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub direction: Direction,
    pub size_pct_q: i64,
    pub size_pct_scale: i64,
    pub risk_cap: RiskCap,
    pub rationale: Vec<String>,
    pub base_allocation_q: i64,
    pub entropy_factor: f64,
    pub uncertainty_discount: f64,
    pub final_factor: f64,
}

/// `{p_flat, p_long, p_short, p_vetoed, size_min, size_max, kernel, version}`.
/// Probabilities sum to 1. Veto state collapses to `(0,0,0,1,0,0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub p_flat: f64,
    pub p_long: f64,
    pub p_short: f64,
    pub p_vetoed: f64,
    pub size_min: f64,
    pub size_max: f64,
    pub kernel: String,
    pub version: String,
}

impl Envelope {
    /// The collapsed envelope every veto payload carries (spec invariant 6).
    pub fn vetoed(kernel: &str, version: &str) -> Envelope {
        Envelope {
            p_flat: 0.0,
            p_long: 0.0,
            p_short: 0.0,
            p_vetoed: 1.0,
            size_min: 0.0,
            size_max: 0.0,
            kernel: kernel.to_string(),
            version: version.to_string(),
        }
    }
}
