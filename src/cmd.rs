//! Command implementations for the CLI interface.
//!
//! Every command runs against a `Session`: the resolved configuration, a
//! loaded task cache, the caller's role and the runtime that drives the API.
//! Moves and scheduling go through the same drag pipeline as the TUI.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::api::{HttpApi, TaskApi};
use crate::cache::{MoveState, TaskCache};
use crate::cli::Cli;
use crate::config::Config;
use crate::fields::*;
use crate::format::*;
use crate::projection::{project_columns, project_table, Column, TaskFilter};
use crate::reconciler::{calendar_bucket_id, start_of_day_utc, DragResult, Intent, Location, UNSCHEDULED_BUCKET};
use crate::sync::{BoardSync, Dispatch};
use crate::task::{NewStatus, NewTask, Status, StatusPatch, Task, TaskPatch};
use crate::tui::run::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive board.
    Ui {
        /// View to start in.
        #[arg(long, value_enum, default_value_t = ViewKind::Board)]
        view: ViewKind,
        /// Keep board moves in this session only; column changes are not sent to the server.
        #[arg(long)]
        local_only: bool,
    },

    /// Print the table view.
    Tasks {
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Status)]
        sort: SortKey,
        /// Only tasks whose name or description contains this text.
        #[arg(long)]
        search: Option<String>,
        /// Only tasks with this priority.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Only tasks assigned to this user id or name.
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Move a task to another column.
    Move {
        /// Task id or name.
        task: String,
        /// Status id or name.
        status: String,
    },

    /// Set or clear a task's deadline.
    Schedule {
        /// Task id or name.
        task: String,
        /// YYYY-MM-DD, "today", "friday", "in 3d", ... or "none" to clear.
        date: String,
    },

    /// Create a task.
    Add {
        /// Task name.
        name: String,
        /// Status id or name (default: first column).
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Deadline, same formats as `schedule`.
        #[arg(long)]
        due: Option<String>,
        /// Parent task id or name; makes this a subtask.
        #[arg(long)]
        parent: Option<String>,
        /// Assignee user ids. May be repeated.
        #[arg(long = "assignee")]
        assignees: Vec<String>,
    },

    /// Update fields on a task.
    Update {
        /// Task id or name.
        task: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Hours spent so far.
        #[arg(long)]
        time: Option<f64>,
        /// Replace the assignees with these user ids. May be repeated.
        #[arg(long = "assignee")]
        assignees: Vec<String>,
    },

    /// Delete a task.
    Delete {
        /// Task id or name.
        task: String,
    },

    /// List the subtasks of a task.
    Subtasks {
        /// Task id or name.
        task: String,
    },

    /// Manage columns.
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },

    /// Show or add comments on a task.
    Comments {
        /// Task id or name.
        task: String,
        /// Add a comment with this text.
        #[arg(long)]
        add: Option<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Commands {
    /// Commands that take over the terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Commands::Ui { .. })
    }
}

#[derive(Subcommand)]
pub enum StatusAction {
    /// List columns in board order.
    List,
    /// Add a column.
    Add {
        name: String,
        #[arg(long)]
        position: Option<i64>,
    },
    /// Rename and/or reposition a column.
    Rename {
        /// Status id or name.
        status: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        position: Option<i64>,
    },
    /// Delete a column.
    Delete {
        /// Status id or name.
        status: String,
    },
}

/// Everything a command needs: config, runtime, loaded cache and role.
pub struct Session {
    pub config: Config,
    pub runtime: Runtime,
    pub sync: BoardSync,
    pub role: Role,
}

impl Session {
    pub fn open(config: Config) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to start async runtime")?;
        let api: Arc<dyn TaskApi> = Arc::new(HttpApi::new(&config));
        let sync = BoardSync::new(api, TaskCache::new(), &config.project, MutationTarget::Status);
        runtime
            .block_on(sync.refresh())
            .with_context(|| format!("Failed to load project '{}'", config.project))?;
        let role = runtime.block_on(resolve_role(&**sync.api(), &config));
        info!(project = %config.project, ?role, "session opened");
        Ok(Session {
            config,
            runtime,
            sync,
            role,
        })
    }

    fn tasks(&self) -> Vec<Task> {
        self.sync.cache().tasks(self.sync.project())
    }

    fn statuses(&self) -> Vec<Status> {
        self.sync.cache().statuses(self.sync.project())
    }

    fn columns(&self) -> Vec<Column> {
        project_columns(&self.tasks(), &self.statuses())
    }

    fn resolve_task(&self, identifier: &str) -> Result<String> {
        resolve_task_identifier(identifier, &self.tasks()).map_err(anyhow::Error::msg)
    }

    /// Resolve against the visible columns, so the default buckets work too.
    fn resolve_status(&self, identifier: &str) -> Result<String> {
        let known: Vec<Status> = self
            .columns()
            .iter()
            .map(|c| Status::new(&c.id, &c.title, None))
            .collect();
        resolve_status_identifier(identifier, &known).map_err(anyhow::Error::msg)
    }
}

/// The caller's role: forced by config/flag, else looked up among the members.
/// Anything unresolvable falls back to read-only.
pub async fn resolve_role(api: &dyn TaskApi, config: &Config) -> Role {
    if let Some(role) = config.role {
        return role;
    }
    let Some(user_id) = &config.user_id else {
        warn!("no user id configured, acting as viewer");
        return Role::Viewer;
    };
    match api.list_members().await {
        Ok(members) => match members.iter().find(|m| &m.user_id == user_id) {
            Some(member) => member.role,
            None => {
                warn!(%user_id, "not a member of this project, acting as viewer");
                Role::Viewer
            }
        },
        Err(e) => {
            warn!(error = %e, "failed to load members, acting as viewer");
            Role::Viewer
        }
    }
}

fn ensure_can_edit(role: Role) -> Result<()> {
    if role == Role::Viewer {
        bail!("Viewers cannot change tasks");
    }
    Ok(())
}

fn ensure_can_manage_columns(role: Role) -> Result<()> {
    if !matches!(role, Role::Owner | Role::Admin) {
        bail!("Only owners and admins can change columns");
    }
    Ok(())
}

/// Build the drag a card would make from its current column to `status_id`.
pub fn card_drag_to_column(columns: &[Column], task: &Task, status_id: &str) -> DragResult {
    let source = columns
        .iter()
        .find_map(|c| {
            c.cards
                .iter()
                .position(|t| t.id == task.id)
                .map(|i| Location::new(&c.id, i))
        })
        .unwrap_or_else(|| Location::new(&task.status_id, 0));
    let destination = if source.droppable_id == status_id {
        source.clone()
    } else {
        let len = columns
            .iter()
            .find(|c| c.id == status_id)
            .map_or(0, |c| c.cards.len());
        Location::new(status_id, len)
    };
    DragResult::card(&task.id, source, Some(destination))
}

/// Build the drag a card would make from its current calendar bucket to `deadline`'s day.
pub fn card_drag_to_day(task: &Task, deadline: Option<DateTime<Utc>>) -> DragResult {
    let bucket = |d: Option<DateTime<Utc>>| match d {
        Some(d) => calendar_bucket_id(d.date_naive()),
        None => UNSCHEDULED_BUCKET.to_string(),
    };
    DragResult::card(
        &task.id,
        Location::new(&bucket(task.deadline), 0),
        Some(Location::new(&bucket(deadline), 0)),
    )
}

/// Parse a deadline argument; `Ok(None)` means "clear".
fn parse_deadline_arg(input: &str) -> Result<Option<DateTime<Utc>>> {
    if matches!(input.trim().to_lowercase().as_str(), "none" | "clear" | "-") {
        return Ok(None);
    }
    let today = Local::now().date_naive();
    let day = parse_date_input(input, today).with_context(|| format!("Could not understand date '{input}'"))?;
    Ok(Some(start_of_day_utc(day)))
}

fn finish_dispatch(session: &Session, dispatch: Dispatch) -> Result<()> {
    match dispatch {
        Dispatch::Ignored(Intent::Denied) => {
            println!("Not changed: the {:?} role is read-only.", session.role);
            Ok(())
        }
        Dispatch::Ignored(_) => {
            println!("Already there, nothing to do.");
            Ok(())
        }
        Dispatch::Local(_) => Ok(()),
        Dispatch::Remote { handle, .. } => match session.runtime.block_on(handle)? {
            MoveState::Confirmed => {
                println!("Done.");
                Ok(())
            }
            _ => bail!("The server did not accept the change; the board was reloaded from the server."),
        },
    }
}

/// Launch the terminal user interface.
pub fn cmd_ui(session: Session, view: ViewKind, local_only: bool) -> Result<()> {
    run_tui(session, view, local_only).context("UI error")
}

/// Print the table view.
pub fn cmd_tasks(session: &Session, sort: SortKey, filter: TaskFilter) {
    let tasks = filter.apply(&session.tasks());
    let rows = project_table(&tasks, &session.statuses(), sort);
    if rows.is_empty() {
        println!("No tasks.");
        return;
    }
    print_table(&rows);
}

/// Move a task to another column.
pub fn cmd_move(session: &Session, task: &str, status: &str) -> Result<()> {
    let task_id = session.resolve_task(task)?;
    let status_id = session.resolve_status(status)?;
    let task = session
        .sync
        .cache()
        .task(session.sync.project(), &task_id)
        .context("Task disappeared from the cache")?;
    let drag = card_drag_to_column(&session.columns(), &task, &status_id);
    let _enter = session.runtime.enter();
    let dispatch = session.sync.dispatch(session.role, &drag);
    finish_dispatch(session, dispatch)
}

/// Set or clear a task's deadline.
pub fn cmd_schedule(session: &Session, task: &str, date: &str) -> Result<()> {
    let task_id = session.resolve_task(task)?;
    let deadline = parse_deadline_arg(date)?;
    let task = session
        .sync
        .cache()
        .task(session.sync.project(), &task_id)
        .context("Task disappeared from the cache")?;
    let drag = card_drag_to_day(&task, deadline);
    let calendar = session.sync.retarget(MutationTarget::Deadline);
    let _enter = session.runtime.enter();
    let dispatch = calendar.dispatch(session.role, &drag);
    finish_dispatch(session, dispatch)
}

/// Create a task.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    session: &Session,
    name: String,
    status: Option<String>,
    desc: Option<String>,
    priority: Priority,
    due: Option<String>,
    parent: Option<String>,
    assignees: Vec<String>,
) -> Result<()> {
    ensure_can_edit(session.role)?;
    if name.trim().is_empty() {
        bail!("Task name cannot be empty");
    }
    let status_id = match status {
        Some(s) => session.resolve_status(&s)?,
        None => session
            .columns()
            .first()
            .map(|c| c.id.clone())
            .context("Project has no columns")?,
    };
    let deadline = match due {
        Some(d) => parse_deadline_arg(&d)?,
        None => None,
    };
    let parent_task_id = parent.map(|p| session.resolve_task(&p)).transpose()?;

    let new_task = NewTask {
        name,
        description: desc,
        priority,
        status_id,
        deadline,
        parent_task_id,
        assignee_ids: assignees,
    };
    let api = session.sync.api();
    let created = session.runtime.block_on(api.create_task(&new_task))?;
    println!("Created task {}: {}", created.id, created.name);
    Ok(())
}

/// Update fields on a task.
#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    session: &Session,
    task: &str,
    name: Option<String>,
    desc: Option<String>,
    priority: Option<Priority>,
    time: Option<f64>,
    assignees: Vec<String>,
) -> Result<()> {
    ensure_can_edit(session.role)?;
    let task_id = session.resolve_task(task)?;
    if let Some(hours) = time {
        if !hours.is_finite() || hours < 0.0 {
            bail!("Time must be a non-negative number of hours");
        }
    }
    let patch = TaskPatch {
        name,
        description: desc,
        priority,
        actual_time: time,
        assignee_ids: if assignees.is_empty() { None } else { Some(assignees) },
        ..Default::default()
    };
    if patch.is_empty() {
        bail!("Nothing to update");
    }
    let updated = session
        .runtime
        .block_on(session.sync.api().update_task(&task_id, &patch))?;
    println!("Updated task {}: {}", updated.id, updated.name);
    Ok(())
}

/// Delete a task.
pub fn cmd_delete(session: &Session, task: &str) -> Result<()> {
    ensure_can_edit(session.role)?;
    let task_id = session.resolve_task(task)?;
    session
        .runtime
        .block_on(session.sync.api().delete_task(&task_id))?;
    session.sync.cache().remove_task(session.sync.project(), &task_id);
    println!("Deleted task {task_id}");
    Ok(())
}

/// List the subtasks of a task.
pub fn cmd_subtasks(session: &Session, task: &str) -> Result<()> {
    let task_id = session.resolve_task(task)?;
    let subtasks: Vec<Task> = session
        .tasks()
        .into_iter()
        .filter(|t| t.parent_task_id.as_deref() == Some(task_id.as_str()))
        .map(|mut t| {
            // Show them as top-level rows.
            t.parent_task_id = None;
            t
        })
        .collect();
    if subtasks.is_empty() {
        println!("No subtasks.");
        return Ok(());
    }
    print_table(&project_table(&subtasks, &session.statuses(), SortKey::Status));
    Ok(())
}

/// Manage columns.
pub fn cmd_status(session: &Session, action: StatusAction) -> Result<()> {
    let api = session.sync.api();
    match action {
        StatusAction::List => {
            for column in session.columns() {
                println!("{:<12} {:<20} {} cards", column.id, column.title, column.cards.len());
            }
        }
        StatusAction::Add { name, position } => {
            ensure_can_manage_columns(session.role)?;
            if name.trim().is_empty() {
                bail!("Column name cannot be empty");
            }
            let created = session
                .runtime
                .block_on(api.create_status(&NewStatus { name, position }))?;
            println!("Created column {}: {}", created.id, created.name);
        }
        StatusAction::Rename { status, name, position } => {
            ensure_can_manage_columns(session.role)?;
            let status_id = session.resolve_status(&status)?;
            let patch = StatusPatch { name, position };
            if patch == StatusPatch::default() {
                bail!("Nothing to update");
            }
            let updated = session.runtime.block_on(api.update_status(&status_id, &patch))?;
            println!("Updated column {}: {}", updated.id, updated.name);
        }
        StatusAction::Delete { status } => {
            ensure_can_manage_columns(session.role)?;
            let status_id = session.resolve_status(&status)?;
            let cards = session
                .columns()
                .iter()
                .find(|c| c.id == status_id)
                .map_or(0, |c| c.cards.len());
            if cards > 0 {
                warn!(%status_id, cards, "deleting a column that still holds cards");
            }
            session.runtime.block_on(api.delete_status(&status_id))?;
            println!("Deleted column {status_id}");
        }
    }
    Ok(())
}

/// Show or add comments.
pub fn cmd_comments(session: &Session, task: &str, add: Option<String>) -> Result<()> {
    let task_id = session.resolve_task(task)?;
    let api = session.sync.api();
    if let Some(content) = add {
        ensure_can_edit(session.role)?;
        if content.trim().is_empty() {
            bail!("Comment cannot be empty");
        }
        session.runtime.block_on(api.add_comment(&task_id, &content))?;
    }
    let comments = session.runtime.block_on(api.list_comments(&task_id))?;
    if comments.is_empty() {
        println!("No comments.");
    }
    for c in comments {
        let when = c
            .created_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!("[{}] {}: {}", when, c.author.name, c.content);
    }
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kb", &mut io::stdout());
}

/// Run a command that needs a session.
pub fn run(command: Commands, config: Config) -> Result<()> {
    if let Commands::Completions { shell } = command {
        cmd_completions(shell);
        return Ok(());
    }
    let session = Session::open(config)?;
    match command {
        Commands::Ui { view, local_only } => cmd_ui(session, view, local_only),
        Commands::Tasks { sort, search, priority, assignee } => {
            let filter = TaskFilter {
                text: search,
                priority,
                assignee,
            };
            cmd_tasks(&session, sort, filter);
            Ok(())
        }
        Commands::Move { task, status } => cmd_move(&session, &task, &status),
        Commands::Schedule { task, date } => cmd_schedule(&session, &task, &date),
        Commands::Add { name, status, desc, priority, due, parent, assignees } =>
            cmd_add(&session, name, status, desc, priority, due, parent, assignees),
        Commands::Update { task, name, desc, priority, time, assignees } =>
            cmd_update(&session, &task, name, desc, priority, time, assignees),
        Commands::Delete { task } => cmd_delete(&session, &task),
        Commands::Subtasks { task } => cmd_subtasks(&session, &task),
        Commands::Status { action } => cmd_status(&session, action),
        Commands::Comments { task, add } => cmd_comments(&session, &task, add),
        Commands::Completions { .. } => unreachable!("completions handled above"),
    }
}
