//! The constraint layer: a pure function from state + symbol to either an
//! allocation or a typed veto. XOR-disjoint by construction (spec §4.3).

use crate::allocator::{compute_allocation_from_state, VetoTag};
use crate::model::{AllocationResult, Direction, RiskCap, VetoReason};
use crate::state::RouterState;

fn map_veto_tag(tag: VetoTag) -> VetoReason {
    match tag {
        VetoTag::InputUnavailable => VetoReason::InputUnavailable,
        VetoTag::ViolationActive => VetoReason::InvariantViolation,
        VetoTag::RegimeUnresolved => VetoReason::RegimeUnresolved,
        VetoTag::RegimeChop => VetoReason::NoEdge,
        VetoTag::RegimeHighVol => VetoReason::RegimeVolatile,
    }
}

/// `evaluate_constraints(state, symbol) -> Result<AllocationResult, VetoReason>`
/// (spec §4.3). `Result` here is a domain sum type, not an I/O error channel:
/// both variants are ordinary, infallible outcomes.
pub fn evaluate_constraints(
    state: &RouterState,
    symbol: &str,
) -> Result<AllocationResult, VetoReason> {
    let (allocation, tag) = compute_allocation_from_state(state, symbol);
    if let Some(tag) = tag {
        return Err(map_veto_tag(tag));
    }

    // Flat is never an intent.
    if allocation.direction == Direction::Flat {
        return Err(VetoReason::RegimeUnresolved);
    }

    // Surface validation, defense-in-depth.
    if allocation.direction != Direction::Flat && allocation.size_pct_q == 0 {
        return Err(VetoReason::RegimeUnresolved);
    }
    if !matches!(
        allocation.risk_cap,
        RiskCap::Zero | RiskCap::Low | RiskCap::Medium
    ) {
        return Err(VetoReason::RegimeUnresolved);
    }
    if allocation.size_pct_scale != 10_000 {
        return Err(VetoReason::RegimeUnresolved);
    }
    if allocation.rationale.is_empty() {
        return Err(VetoReason::RegimeUnresolved);
    }

    Ok(allocation)
}

/// `should_emit(current, last)` (spec §4.3): true iff `last` is absent or
/// `(direction, size_pct_q, risk_cap)` differs. Rationale is ignored.
pub fn should_emit(current: &AllocationResult, last: Option<&AllocationResult>) -> bool {
    match last {
        None => true,
        Some(last) => {
            current.direction != last.direction
                || current.size_pct_q != last.size_pct_q
                || current.risk_cap != last.risk_cap
        }
    }
}

/// Dedup check for vetoes: two consecutive vetoes for a symbol must differ
/// in `veto_reason` to both be emitted (spec §8 invariant 4).
pub fn should_emit_veto(current: VetoReason, last: Option<VetoReason>) -> bool {
    match last {
        None => true,
        Some(last) => current != last,
    }
}
