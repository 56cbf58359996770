//! The runtime loop: read -> state-update -> demotion-check ->
//! constraint-eval -> authority-gate -> emit (spec §4.5).
//!
//! `process_event` services both `run` (tailing) and `replay` (one-shot);
//! the only difference between the two modes is the input iterator (spec
//! §9 "Replay vs tail... do not fork logic between modes").

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use router_authority::{compute_build_metadata, AuthorityState, CheckContext, DemotionWatcher};
use router_core::constraints::{evaluate_constraints, should_emit, should_emit_veto};
use router_core::envelope::make_mock_envelope;
use router_core::model::{Direction, VetoReason};
use router_core::state::{Event, RouterState};
use router_spine::{emit_demotion, emit_intent, emit_veto, SpineReader};
use tracing::{debug, info, warn};

/// Recognized inbound event types (spec §3). Any other type is ignored.
pub const ALLOWED_EVENT_TYPES: &[&str] = &[
    "listener.start",
    "listener.crash",
    "invariant.violation",
    "market.regime",
    "market.regime_change",
];

/// The source files whose combined hash gates authority promotion (spec
/// §4.7/§9). Must include the embedded public key and every
/// governance-critical module: the allocator, the constraint layer, the
/// state machine, the certificate/authority/signing logic, and the schema
/// validator/emitter that enforces the emission boundary.
pub const CRITICAL_SOURCE_FILES: &[&str] = &[
    "crates/router-authority/src/public_key.b64",
    "crates/router-authority/src/signing.rs",
    "crates/router-authority/src/certificate.rs",
    "crates/router-authority/src/authority.rs",
    "crates/router-authority/src/level.rs",
    "crates/router-core/src/allocator.rs",
    "crates/router-core/src/constraints.rs",
    "crates/router-core/src/state.rs",
    "crates/router-spine/src/schema.rs",
    "crates/router-spine/src/emit.rs",
];

/// Symbols a given event affects: for `market.*` events, the payload
/// symbol; for system-wide events, every known symbol (spec §4.5).
fn affected_symbols(event: &Event, state: &RouterState) -> Vec<String> {
    match event.event_type.as_str() {
        "market.regime" | "market.regime_change" => event
            .payload
            .get("symbol")
            .and_then(|v| v.as_str())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        "listener.start" | "listener.crash" | "invariant.violation" => {
            state.symbols.keys().cloned().collect()
        }
        _ => Vec::new(),
    }
}

/// Shared context the per-event step needs, grouped so `process_event`
/// doesn't thread a long parameter list.
pub struct RuntimeContext<'a> {
    pub state: &'a mut RouterState,
    pub authority: &'a mut AuthorityState,
    pub watcher: &'a DemotionWatcher,
    pub spine_path: &'a Path,
    pub demotions_dir: Option<&'a Path>,
    /// Root the critical source files are resolved against, to re-hash them
    /// live on every tick for the build-meta drift check (spec §4.8).
    pub workspace_root: &'a Path,
}

/// Processes a single spine event through the full pipeline. Never
/// propagates a hard error: I/O failures from emission are logged and
/// swallowed (spec §7 "the system never raises across the main loop
/// boundary").
pub fn process_event(ctx: &mut RuntimeContext, event: &Event) {
    if !ALLOWED_EVENT_TYPES.contains(&event.event_type.as_str()) {
        return;
    }

    let Some((source_event_id, source_ts)) = event.string_fields() else {
        debug!(event_type = %event.event_type, "event missing string event_id/timestamp, skipping emission");
        ctx.state.update_from_event(event);
        return;
    };

    ctx.state.update_from_event(event);

    let critical_files: Vec<String> = CRITICAL_SOURCE_FILES.iter().map(|s| s.to_string()).collect();
    let current_build_meta_sha256 = match compute_build_metadata(ctx.workspace_root, &critical_files) {
        Ok(meta) => meta.combined_sha256,
        Err(e) => {
            // Can't re-hash this tick (source tree unreadable): skip the
            // drift comparison rather than manufacture a false mismatch.
            warn!(error = %e, "failed to re-hash critical source files for build-meta drift check");
            ctx.authority.build_meta_sha256.clone().unwrap_or_default()
        }
    };
    let check_ctx = CheckContext {
        violation_active: ctx.state.system.violation_active,
        current_build_meta_sha256: &current_build_meta_sha256,
        cert_build_meta_sha256: ctx.authority.build_meta_sha256.as_deref(),
    };
    if let Some(demotion) = ctx.watcher.check(ctx.authority, &check_ctx, source_ts) {
        warn!(from = demotion.from.as_str(), to = demotion.to.as_str(), trigger = %demotion.trigger, "authority demoted");
        if let Err(e) = emit_demotion(
            ctx.spine_path,
            &demotion,
            ctx.demotions_dir,
            source_event_id,
            source_ts,
        ) {
            warn!(error = %e, "failed to emit demotion record");
        }
    }

    let targets = affected_symbols(event, ctx.state);
    for symbol in targets {
        step_symbol(ctx, &symbol, source_event_id, source_ts);
    }
}

fn step_symbol(ctx: &mut RuntimeContext, symbol: &str, source_event_id: &str, source_ts: &str) {
    let outcome = evaluate_constraints(ctx.state, symbol);
    match outcome {
        Err(reason) => emit_veto_if_changed(ctx, symbol, reason, source_event_id, source_ts),
        Ok(allocation) => {
            if allocation.direction != Direction::Flat && !ctx.authority.can_emit_non_flat() {
                emit_veto_if_changed(
                    ctx,
                    symbol,
                    VetoReason::AuthorityGate,
                    source_event_id,
                    source_ts,
                );
                return;
            }

            let last = ctx
                .state
                .symbols
                .get(symbol)
                .and_then(|s| s.last_allocation())
                .cloned();
            if should_emit(&allocation, last.as_ref()) {
                let envelope = make_mock_envelope(
                    allocation.direction,
                    allocation.entropy_factor,
                    false,
                    allocation.size_pct_q as f64 / allocation.size_pct_scale as f64,
                );
                if let Err(e) = emit_intent(
                    ctx.spine_path,
                    symbol,
                    &allocation,
                    envelope,
                    source_event_id,
                    source_ts,
                ) {
                    warn!(symbol, error = %e, "failed to emit intent");
                }
                ctx.state.record_intent(symbol, allocation);
            }
        }
    }
}

fn emit_veto_if_changed(
    ctx: &mut RuntimeContext,
    symbol: &str,
    reason: VetoReason,
    source_event_id: &str,
    source_ts: &str,
) {
    let last = ctx.state.symbols.get(symbol).and_then(|s| s.last_veto_reason());
    if !should_emit_veto(reason, last) {
        return;
    }
    let envelope = make_mock_envelope(Direction::Flat, 0.0, true, 0.0);
    if let Err(e) = emit_veto(ctx.spine_path, symbol, reason, envelope, source_event_id, source_ts) {
        warn!(symbol, error = %e, "failed to emit veto");
    }
    ctx.state.record_veto(symbol, reason);
}

/// Runs the tailing loop against `spine_path`, sleeping `poll` between
/// ticks that return no new events (spec §4.5, §5 "Scheduling").
pub fn run(
    spine_path: PathBuf,
    poll_seconds: u64,
    mut authority: AuthorityState,
    demotions_dir: Option<PathBuf>,
    workspace_root: PathBuf,
) -> anyhow::Result<()> {
    let watcher = DemotionWatcher::with_default_checks();
    let mut state = RouterState::new();
    state.authority_epoch_ts = authority.promoted_at.clone();

    let mut reader = SpineReader::new(&spine_path);
    info!(spine = %spine_path.display(), level = authority.level.as_str(), "router runtime starting");

    loop {
        let events = reader.poll_tick()?;
        if events.is_empty() {
            thread::sleep(Duration::from_secs(poll_seconds));
            continue;
        }
        let mut ctx = RuntimeContext {
            state: &mut state,
            authority: &mut authority,
            watcher: &watcher,
            spine_path: &spine_path,
            demotions_dir: demotions_dir.as_deref(),
            workspace_root: &workspace_root,
        };
        for event in &events {
            process_event(&mut ctx, event);
        }
    }
}

/// One-shot replay: reads `input` from the start, writes emissions to
/// `output`, and returns. Uses the same `process_event` pipeline as `run`.
pub fn replay(
    input: &Path,
    output: &Path,
    mut authority: AuthorityState,
    workspace_root: PathBuf,
) -> anyhow::Result<()> {
    let watcher = DemotionWatcher::with_default_checks();
    let mut state = RouterState::new();
    state.authority_epoch_ts = authority.promoted_at.clone();

    let events = SpineReader::replay(input)?;
    info!(input = %input.display(), output = %output.display(), count = events.len(), "replaying spine");

    let mut ctx = RuntimeContext {
        state: &mut state,
        authority: &mut authority,
        watcher: &watcher,
        spine_path: output,
        demotions_dir: None,
        workspace_root: &workspace_root,
    };
    for event in &events {
        process_event(&mut ctx, event);
    }
    Ok(())
}
