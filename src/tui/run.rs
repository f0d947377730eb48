//! TUI entry point and setup.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, prelude::CrosstermBackend, Terminal};
use tracing::info;

use crate::cmd::Session;
use crate::fields::{MutationTarget, ViewKind};
use crate::layout::layout_path;
use crate::tui::app::App;

/// Redraw at least this often so background refetches show up.
const TICK: Duration = Duration::from_millis(100);

/// Initialise and run the terminal user interface.
pub fn run_tui(session: Session, view: ViewKind, local_only: bool) -> io::Result<()> {
    let Session {
        config,
        runtime,
        sync,
        role,
    } = session;
    // Background persistence and refetches are spawned from the key handlers.
    let _enter = runtime.enter();

    let sync = if local_only {
        sync.retarget(MutationTarget::LocalOnly)
    } else {
        sync
    };
    let mut app = App::new(sync, role, view, layout_path(&config.data_dir, &config.project));
    info!(project = %config.project, ?view, local_only, "ui started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut app, &mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

fn event_loop<B: Backend>(app: &mut App, terminal: &mut Terminal<B>) -> io::Result<()> {
    loop {
        terminal.draw(|f| app.render(f))?;
        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    return Ok(());
                }
            }
        }
    }
}
