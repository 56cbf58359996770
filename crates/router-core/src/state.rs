//! Event-sourced router state: everything here is derived exclusively from
//! observed events (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{AllocationResult, Regime, VetoReason};
use crate::regime::infer_regime;

/// An inbound spine record: `{event_type, event_id, timestamp, payload}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub event_id: Value,
    pub timestamp: Value,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Both `event_id` and `timestamp` must be strings for emission to
    /// proceed (spec §4.5). Returns them if so.
    pub fn string_fields(&self) -> Option<(&str, &str)> {
        Some((self.event_id.as_str()?, self.timestamp.as_str()?))
    }
}

/// System-wide fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub listener_alive: bool,
    pub last_listener_event_ts: Option<String>,
    pub violation_active: bool,
    pub last_violation_ts: Option<String>,
}

/// The three "last emitted" slots are XOR: setting one clears the other
/// two. Representing them as a single enum enforces that structurally
/// instead of relying on hand-maintained clearing (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LastOutcome {
    Intent(AllocationResult),
    Allocation(AllocationResult),
    Veto(VetoReason),
}

/// Per-symbol state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolState {
    pub regime: Option<Regime>,
    pub last_regime_ts: Option<String>,
    pub last_outcome: Option<LastOutcome>,
}

impl SymbolState {
    /// The allocation/intent from the last outcome, if the last outcome was
    /// an allocation or an intent (used by `should_emit`'s dedup check).
    pub fn last_allocation(&self) -> Option<&AllocationResult> {
        match &self.last_outcome {
            Some(LastOutcome::Intent(a)) | Some(LastOutcome::Allocation(a)) => Some(a),
            _ => None,
        }
    }

    pub fn last_veto_reason(&self) -> Option<VetoReason> {
        match &self.last_outcome {
            Some(LastOutcome::Veto(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Two parts: system-wide fields, and the per-symbol map. Optionally scoped
/// by an authority epoch timestamp that gates which violations count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterState {
    pub system: SystemState,
    pub symbols: HashMap<String, SymbolState>,
    pub authority_epoch_ts: Option<String>,
}

impl RouterState {
    pub fn new() -> Self {
        RouterState::default()
    }

    /// Per-event update (spec §4.4). Unrecognized event types are a no-op.
    pub fn update_from_event(&mut self, event: &Event) {
        match event.event_type.as_str() {
            "listener.start" => {
                self.system.listener_alive = true;
                self.system.last_listener_event_ts = event.timestamp.as_str().map(String::from);
            }
            "listener.crash" => {
                self.system.listener_alive = false;
            }
            "invariant.violation" => {
                let in_epoch = match (&self.authority_epoch_ts, event.timestamp.as_str()) {
                    (None, _) => true,
                    (Some(epoch), Some(ts)) => ts >= epoch.as_str(),
                    (Some(_), None) => false,
                };
                if in_epoch {
                    self.system.violation_active = true;
                    self.system.last_violation_ts = event.timestamp.as_str().map(String::from);
                }
            }
            "market.regime" => {
                if let (Some(symbol), Some(regime_str)) = (
                    event.payload.get("symbol").and_then(Value::as_str),
                    event.payload.get("regime").and_then(Value::as_str),
                ) {
                    self.set_symbol_regime(symbol, regime_str, event.timestamp.as_str());
                }
            }
            "market.regime_change" => {
                if let (Some(symbol), Some(regime_str)) = (
                    event.payload.get("symbol").and_then(Value::as_str),
                    event.payload.get("to").and_then(Value::as_str),
                ) {
                    self.set_symbol_regime(symbol, regime_str, event.timestamp.as_str());
                }
            }
            _ => {}
        }
    }

    fn set_symbol_regime(&mut self, symbol: &str, regime_str: &str, ts: Option<&str>) {
        let entry = self.symbols.entry(symbol.to_string()).or_default();
        entry.regime = Some(infer_regime(regime_str));
        entry.last_regime_ts = ts.map(String::from);
    }

    /// Records an emitted intent, clearing the other two "last" slots.
    pub fn record_intent(&mut self, symbol: &str, result: AllocationResult) {
        self.symbols
            .entry(symbol.to_string())
            .or_default()
            .last_outcome = Some(LastOutcome::Intent(result));
    }

    /// Records a veto, clearing the other two "last" slots.
    pub fn record_veto(&mut self, symbol: &str, reason: VetoReason) {
        self.symbols
            .entry(symbol.to_string())
            .or_default()
            .last_outcome = Some(LastOutcome::Veto(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, ts: &str, payload: Value) -> Event {
        Event {
            event_type: event_type.to_string(),
            event_id: json!("e1"),
            timestamp: json!(ts),
            payload,
        }
    }

    #[test]
    fn listener_start_and_crash_toggle_liveness() {
        let mut state = RouterState::new();
        state.update_from_event(&event("listener.start", "2026-01-01T00:00:00Z", Value::Null));
        assert!(state.system.listener_alive);
        state.update_from_event(&event("listener.crash", "2026-01-01T00:01:00Z", Value::Null));
        assert!(!state.system.listener_alive);
    }

    #[test]
    fn violation_without_epoch_always_activates() {
        let mut state = RouterState::new();
        state.update_from_event(&event(
            "invariant.violation",
            "2026-01-01T00:00:00Z",
            Value::Null,
        ));
        assert!(state.system.violation_active);
    }

    #[test]
    fn violation_before_epoch_is_ignored() {
        let mut state = RouterState::new();
        state.authority_epoch_ts = Some("2026-01-10T00:00:00Z".to_string());
        state.update_from_event(&event(
            "invariant.violation",
            "2025-12-21T00:46:16Z",
            Value::Null,
        ));
        assert!(!state.system.violation_active);
    }

    #[test]
    fn violation_at_or_after_epoch_activates() {
        let mut state = RouterState::new();
        state.authority_epoch_ts = Some("2026-01-10T00:00:00Z".to_string());
        state.update_from_event(&event(
            "invariant.violation",
            "2026-01-10T00:00:01Z",
            Value::Null,
        ));
        assert!(state.system.violation_active);
    }

    #[test]
    fn violation_is_sticky() {
        let mut state = RouterState::new();
        state.update_from_event(&event(
            "invariant.violation",
            "2026-01-01T00:00:00Z",
            Value::Null,
        ));
        assert!(state.system.violation_active);
        // A later, out-of-epoch-irrelevant event must not clear it; there is
        // no event type that resets violation_active once set.
        state.update_from_event(&event("listener.start", "2026-01-01T00:01:00Z", Value::Null));
        assert!(state.system.violation_active);
    }

    #[test]
    fn market_regime_sets_symbol_regime() {
        let mut state = RouterState::new();
        state.update_from_event(&event(
            "market.regime",
            "2026-01-01T00:00:00Z",
            json!({"symbol": "BTC", "regime": "drift"}),
        ));
        assert_eq!(state.symbols.get("BTC").unwrap().regime, Some(Regime::Drift));
    }

    #[test]
    fn market_regime_change_uses_to_field() {
        let mut state = RouterState::new();
        state.update_from_event(&event(
            "market.regime_change",
            "2026-01-01T00:00:00Z",
            json!({"symbol": "BTC", "from": "chop", "to": "breakout"}),
        ));
        assert_eq!(
            state.symbols.get("BTC").unwrap().regime,
            Some(Regime::Breakout)
        );
    }

    #[test]
    fn last_outcome_slots_are_mutually_exclusive() {
        let mut state = RouterState::new();
        let alloc = crate::allocator::allocate(
            Regime::Drift,
            &crate::model::EntropyState::default(),
            10_000,
        );
        state.record_intent("BTC", alloc);
        assert!(state.symbols["BTC"].last_allocation().is_some());
        assert!(state.symbols["BTC"].last_veto_reason().is_none());

        state.record_veto("BTC", VetoReason::NoEdge);
        assert!(state.symbols["BTC"].last_allocation().is_none());
        assert_eq!(
            state.symbols["BTC"].last_veto_reason(),
            Some(VetoReason::NoEdge)
        );
    }
}
