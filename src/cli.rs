use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use crate::fields::Role;

/// Terminal kanban client.
/// Settings default to ~/.kanban/config.toml, overridable via KB_* env vars.
#[derive(Parser)]
#[command(name = "kb", version, about = "Kanban board, table and calendar in the terminal")]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project id to act on.
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Act with this role instead of looking it up among the project members.
    #[arg(long, global = true, value_enum)]
    pub role: Option<Role>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
