//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Run budget in effect for the current run (for JSON error details).
pub static LAST_BUDGET_MS: OnceLock<u64> = OnceLock::new();

/// Default wall-clock budget for one run.
pub const DEFAULT_MAX_RUN_MS: u64 = 10 * 60 * 1000;

#[derive(Parser, Debug)]
#[command(name = "trackrig", version, about = "Catheter trackability rig CLI")]
pub struct Cli {
    /// Path to config TOML (typed). Built-in defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one insertion and retraction cycle on the simulated rig
    Run {
        /// Session TOML (targets and curve checkpoints)
        #[arg(long, value_name = "FILE")]
        session: PathBuf,
        /// Abort the run after this many milliseconds
        #[arg(long, value_name = "MS")]
        max_run_ms: Option<u64>,
        /// Turn the bath heater on and wait whenever the interlock requires it
        #[arg(long, action = ArgAction::SetTrue)]
        auto_heat: bool,
    },
    /// Parse and validate the config and a session file
    Validate {
        #[arg(long, value_name = "FILE")]
        session: PathBuf,
    },
    /// Connect to the simulated rig and take one reading
    SelfCheck,
}
