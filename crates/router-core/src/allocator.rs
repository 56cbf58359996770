//! The epistemic allocator: regime + entropy → `AllocationResult`.

use crate::model::{
    AllocationResult, Direction, EntropyState, Regime, RegimePosture, RiskCap, SIZE_PCT_SCALE,
};
use crate::state::{RouterState, SymbolState};

/// The frozen regime→posture map (spec §3). Chop, high-vol, and unknown are
/// all flat/zero; drift and breakout carry the only non-zero postures.
fn posture(regime: Regime) -> RegimePosture {
    match regime {
        Regime::Chop => RegimePosture {
            direction: Direction::Flat,
            base_allocation_q: 0,
            uncertainty_discount: 0.0,
            risk_cap: RiskCap::Zero,
            rationale: "regime=chop",
        },
        Regime::HighVol => RegimePosture {
            direction: Direction::Flat,
            base_allocation_q: 0,
            uncertainty_discount: 0.0,
            risk_cap: RiskCap::Zero,
            rationale: "regime=high_vol",
        },
        Regime::Unknown => RegimePosture {
            direction: Direction::Flat,
            base_allocation_q: 0,
            uncertainty_discount: 0.0,
            risk_cap: RiskCap::Zero,
            rationale: "regime=unknown",
        },
        Regime::Drift => RegimePosture {
            direction: Direction::Long,
            base_allocation_q: 2500,
            uncertainty_discount: 0.8,
            risk_cap: RiskCap::Low,
            rationale: "regime=drift",
        },
        Regime::Breakout => RegimePosture {
            direction: Direction::Long,
            base_allocation_q: 5000,
            uncertainty_discount: 0.6,
            risk_cap: RiskCap::Medium,
            rationale: "regime=breakout",
        },
    }
}

/// Round-half-up on a non-negative float, matching Python's `int(x + 0.5)`.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Pure function `allocate(regime, entropy, max_q) -> AllocationResult`
/// (spec §4.1).
pub fn allocate(regime: Regime, entropy: &EntropyState, max_q: i64) -> AllocationResult {
    let p = posture(regime);
    let entropy_factor = entropy.combined_entropy();
    let final_factor = entropy_factor * p.uncertainty_discount;
    let raw = round_half_up(p.base_allocation_q as f64 * final_factor);
    let mut size_pct_q = raw.clamp(0, max_q);
    if p.direction == Direction::Flat {
        size_pct_q = 0;
    }

    let rationale = vec![
        p.rationale.to_string(),
        format!("entropy_factor={:.2}", entropy_factor),
        format!("final_allocation={}/{}", size_pct_q, SIZE_PCT_SCALE),
    ];

    AllocationResult {
        direction: p.direction,
        size_pct_q,
        size_pct_scale: SIZE_PCT_SCALE,
        risk_cap: p.risk_cap,
        rationale,
        base_allocation_q: p.base_allocation_q,
        entropy_factor,
        uncertainty_discount: p.uncertainty_discount,
        final_factor,
    }
}

/// Internal veto tags distinct from the public [`crate::model::VetoReason`]
/// wire enum — mirrors the Python original's use of short internal tag
/// strings versus public wire reasons. The constraint layer maps one to the
/// other (spec §4.3's table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VetoTag {
    InputUnavailable,
    ViolationActive,
    RegimeUnresolved,
    RegimeChop,
    RegimeHighVol,
}

/// Bridge function: `compute_allocation_from_state(state, symbol) ->
/// (AllocationResult, Option<VetoTag>)` (spec §4.1). Ordering of the
/// short-circuits is part of the contract: unavailable listener, then
/// active violation, then unresolved regime, then regime-specific vetoes.
pub fn compute_allocation_from_state(
    state: &RouterState,
    symbol: &str,
) -> (AllocationResult, Option<VetoTag>) {
    let empty = AllocationResult {
        direction: Direction::Flat,
        size_pct_q: 0,
        size_pct_scale: SIZE_PCT_SCALE,
        risk_cap: RiskCap::Zero,
        rationale: vec!["no_allocation".to_string()],
        base_allocation_q: 0,
        entropy_factor: 0.0,
        uncertainty_discount: 0.0,
        final_factor: 0.0,
    };

    if !state.system.listener_alive {
        return (empty, Some(VetoTag::InputUnavailable));
    }
    if state.system.violation_active {
        return (empty, Some(VetoTag::ViolationActive));
    }

    let sym: Option<&SymbolState> = state.symbols.get(symbol);
    let regime = match sym.and_then(|s| s.regime) {
        Some(r) => r,
        None => return (empty, Some(VetoTag::RegimeUnresolved)),
    };

    match regime {
        Regime::Chop => return (empty, Some(VetoTag::RegimeChop)),
        Regime::HighVol => return (empty, Some(VetoTag::RegimeHighVol)),
        _ => {}
    }

    let entropy = EntropyState::default();
    let result = allocate(regime, &entropy, SIZE_PCT_SCALE);
    (result, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RouterState, SymbolState};

    #[test]
    fn drift_default_entropy_matches_s1() {
        // Scenario S1: default entropy (0.5, 0, 0.3) -> combined 0.35,
        // final_factor = 0.35 * 0.8 = 0.28, raw = round(2500 * 0.28) = 700.
        let entropy = EntropyState::default();
        assert!((entropy.combined_entropy() - 0.35).abs() < 1e-9);
        let result = allocate(Regime::Drift, &entropy, SIZE_PCT_SCALE);
        assert_eq!(result.direction, Direction::Long);
        assert_eq!(result.size_pct_q, 700);
        assert_eq!(result.risk_cap, RiskCap::Low);
    }

    #[test]
    fn chop_and_high_vol_and_unknown_are_flat_zero() {
        let entropy = EntropyState::default();
        for regime in [Regime::Chop, Regime::HighVol, Regime::Unknown] {
            let result = allocate(regime, &entropy, SIZE_PCT_SCALE);
            assert_eq!(result.direction, Direction::Flat);
            assert_eq!(result.size_pct_q, 0);
        }
    }

    #[test]
    fn clamped_to_max_q() {
        let entropy = EntropyState {
            regime_confidence: 1.0,
            regime_age_seconds: 0.0,
            transition_proximity: 0.0,
        };
        let result = allocate(Regime::Breakout, &entropy, 1000);
        assert_eq!(result.size_pct_q, 1000);
    }

    #[test]
    fn round_half_up_matches_python_semantics() {
        assert_eq!(round_half_up(699.5), 700);
        assert_eq!(round_half_up(699.4999), 699);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn ordering_input_unavailable_before_violation_before_regime() {
        let mut state = RouterState::new();
        state.system.listener_alive = false;
        state.system.violation_active = true;
        let (_, tag) = compute_allocation_from_state(&state, "BTC");
        assert_eq!(tag, Some(VetoTag::InputUnavailable));
    }

    #[test]
    fn regime_unresolved_when_no_regime_known() {
        let mut state = RouterState::new();
        state.system.listener_alive = true;
        state
            .symbols
            .insert("BTC".to_string(), SymbolState::default());
        let (_, tag) = compute_allocation_from_state(&state, "BTC");
        assert_eq!(tag, Some(VetoTag::RegimeUnresolved));
    }
}
