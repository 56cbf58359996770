//! Router deterministic synthesis core.
//!
//! Pure, I/O-free: the regime allocator, both envelope kernels, the
//! constraint/veto layer, and the event-sourced state machine. Everything
//! in this crate is unit-testable without a spine, a certificate, or a
//! clock.

pub mod allocator;
pub mod constraints;
pub mod envelope;
pub mod error;
pub mod mc_envelope;
pub mod model;
pub mod regime;
pub mod state;

pub use error::{CoreError, Result};
pub use model::{
    AllocationResult, Direction, Envelope, EntropyState, Regime, RegimePosture, RiskCap,
    VetoReason, SIZE_PCT_SCALE,
};
pub use regime::infer_regime;
pub use state::{Event, LastOutcome, RouterState, SymbolState, SystemState};
