//! `router` binary entrypoint: logging setup, authority binding, and
//! dispatch to `run`/`replay` (spec §6).

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use router_cli::cli::{Cli, Command};
use router_cli::runtime::{self, CRITICAL_SOURCE_FILES};

/// The workspace root, resolved at compile time from this crate's manifest
/// directory (`crates/router-cli`), two levels up.
fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("router-cli is always nested two levels under the workspace root")
        .to_path_buf()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn bind(
    cert: Option<PathBuf>,
    allow_legacy_cert: bool,
    started_at: &str,
) -> anyhow::Result<router_authority::AuthorityState> {
    let root = workspace_root();
    let critical_files: Vec<String> = CRITICAL_SOURCE_FILES.iter().map(|s| s.to_string()).collect();
    let build_meta = router_authority::compute_build_metadata(&root, &critical_files)
        .context("computing build metadata over critical source files")?;

    let authority = router_authority::bind_authority(
        cert.as_deref(),
        &build_meta,
        allow_legacy_cert,
        started_at.to_string(),
    );
    tracing::info!(level = authority.level.as_str(), "authority bound");
    Ok(authority)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let authority = bind(args.cert, args.allow_legacy_cert, "runtime-start")?;
            runtime::run(args.spine, args.poll, authority, args.demotions_dir, workspace_root())
        }
        Command::Replay(args) => {
            let authority = bind(args.cert, args.allow_legacy_cert, "replay-start")?;
            runtime::replay(&args.input, &args.output, authority, workspace_root())
        }
    }
}
