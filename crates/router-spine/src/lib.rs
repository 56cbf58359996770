//! Event spine I/O: tailing/replay, canonical JSON encoding,
//! `router.intent`/`router.veto` schema validation, and emission.

pub mod canonical;
pub mod emit;
pub mod error;
pub mod reader;
pub mod schema;

pub use canonical::canonicalize;
pub use emit::{build_intent_payload, build_veto_payload, emit_demotion, emit_intent, emit_veto};
pub use error::{Result, SpineError};
pub use reader::SpineReader;
pub use schema::{validate_router_intent, validate_router_veto};
