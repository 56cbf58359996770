//! CLI surface: a `run` subcommand (tailing runtime) and a `replay`
//! subcommand (spec §6).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "router", version, about = "Authority-gated deterministic intent/veto synthesizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tail the spine and emit intents/vetoes as events arrive.
    Run(RunArgs),
    /// Replay an input spine to an output spine in one shot.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the append-only JSON-lines spine file.
    #[arg(long)]
    pub spine: PathBuf,

    /// Poll interval in seconds when no new lines are available.
    #[arg(long, default_value_t = 1)]
    pub poll: u64,

    /// Path to the signed promotion certificate.
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Directory to write demotion sidecar files into.
    #[arg(long)]
    pub demotions_dir: Option<PathBuf>,

    /// Accept an unsigned certificate via its deprecated self-hash.
    #[arg(long, default_value_t = false)]
    pub allow_legacy_cert: bool,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Input spine to replay from the start.
    pub input: PathBuf,

    /// Output spine to append emissions to.
    pub output: PathBuf,

    /// Path to the signed promotion certificate.
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Accept an unsigned certificate via its deprecated self-hash.
    #[arg(long, default_value_t = false)]
    pub allow_legacy_cert: bool,
}
