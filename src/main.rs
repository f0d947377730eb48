//! # kb - Kanban Board CLI
//!
//! A terminal client for a hosted kanban service: one project's tasks shown as
//! a board, a sortable table or a month calendar, with a scriptable CLI for the
//! same operations.
//!
//! ## Key Features
//!
//! - **Board View**: Columns per status. Moving a card updates the board
//!   immediately and syncs the new status in the background
//! - **Calendar View**: Drop a card on a day to set its deadline, or on
//!   "Unscheduled" to clear it
//! - **Table View**: Sort by status, name, priority or deadline
//! - **Roles**: Viewers browse; only members and above can move cards
//! - **Local Layout**: Column and card order are kept per project in a local file
//!
//! ## Quick Start
//!
//! ```bash
//! export KB_API_URL=https://kanban.example.com/api KB_TOKEN=... KB_PROJECT=p1
//!
//! # Open the board
//! kb ui
//!
//! # Move a task, then give it a deadline
//! kb move "Write docs" done
//! kb schedule "Write docs" friday
//!
//! # List tasks by deadline
//! kb tasks --sort deadline
//! ```
//!
//! Settings are read from `~/.kanban/config.toml`, then `KB_*` environment
//! variables, then `--project`/`--role` flags. The TUI logs to `~/.kanban/kb.log`.

use clap::Parser;

pub mod api;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod fields;
pub mod format;
pub mod layout;
pub mod logging;
pub mod projection;
pub mod reconciler;
pub mod sync;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod board;
    pub mod calendar;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod table;
}

use cli::Cli;
use cmd::*;
use config::{Config, Overrides};
use logging::LogSink;

fn main() {
    let cli = Cli::parse();

    // Completions need neither a config nor the network
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    let overrides = Overrides {
        project: cli.project.clone(),
        role: cli.role,
    };
    let config = match Config::load(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let sink = if cli.command.is_interactive() {
        LogSink::File(&config.data_dir)
    } else {
        LogSink::Stderr
    };
    let _guard = logging::init(cli.verbose, sink);

    if let Err(e) = run(cli.command, config) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
