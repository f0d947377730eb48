//! Interactive board application state.
//!
//! `App` owns the view state (selection, scroll, keyboard drag, filter) and
//! nothing else: tasks and statuses are read from the shared cache on every
//! frame, and every card or column drop goes through `BoardSync::dispatch`.
//! Rendering of the three views lives in `board`, `table` and `calendar`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, Months, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use parking_lot::Mutex;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, TableState, Wrap},
    Frame,
};
use tracing::{debug, warn};

use crate::cache::MoveState;
use crate::fields::*;
use crate::format::{format_assignees, format_deadline_relative, format_priority};
use crate::layout::BoardLayout;
use crate::projection::*;
use crate::reconciler::{authorize_drag, move_between, reorder, DragResult, Intent, Location};
use crate::sync::{BoardSync, Dispatch};
use crate::task::{Comment, Task};
use crate::tui::colors::{ACCENT, GOLD};
use crate::tui::enums::{AppState, DragState};
use crate::tui::input::InputField;

/// Droppable id of the board itself, the container columns are dragged in.
pub const BOARD_DROPPABLE: &str = "board";

/// Main application state
pub struct App {
    /// Board pipeline: writes statuses, or nothing in local-only mode.
    pub(super) sync: BoardSync,
    /// Calendar pipeline: writes deadlines.
    pub(super) calendar_sync: BoardSync,
    pub(super) role: Role,
    pub(super) view: ViewKind,
    pub(super) state: AppState,
    pub(super) layout: BoardLayout,
    pub(super) layout_path: PathBuf,
    pub(super) filter: InputField,

    pub(super) selected_column: usize,
    pub(super) selected_card: usize,
    pub(super) column_scroll_offsets: Vec<usize>,

    pub(super) table_state: TableState,
    pub(super) sort: SortKey,

    /// First day of the month shown by the calendar.
    pub(super) month: NaiveDate,
    /// 0 is the unscheduled bucket, then the days of the month.
    pub(super) selected_bucket: usize,
    pub(super) selected_bucket_card: usize,

    pub(super) drag: Option<DragState>,
    pub(super) detail_task_id: Option<String>,
    /// Filled by a background fetch when the detail popup opens.
    pub(super) comments: Arc<Mutex<Option<Vec<Comment>>>>,
    pub(super) status_message: String,
}

impl App {
    pub fn new(sync: BoardSync, role: Role, view: ViewKind, layout_path: PathBuf) -> Self {
        let calendar_sync = sync.retarget(MutationTarget::Deadline);
        let layout = BoardLayout::load(&layout_path);
        let mut table_state = TableState::default();
        table_state.select(Some(0));
        App {
            sync,
            calendar_sync,
            role,
            view,
            state: AppState::Browse,
            layout,
            layout_path,
            filter: InputField::new(),
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: Vec::new(),
            table_state,
            sort: SortKey::default(),
            month: month_start(Local::now().date_naive()),
            selected_bucket: 0,
            selected_bucket_card: 0,
            drag: None,
            detail_task_id: None,
            comments: Arc::new(Mutex::new(None)),
            status_message: String::new(),
        }
    }

    fn task_filter(&self) -> TaskFilter {
        let text = self.filter.value.trim();
        TaskFilter {
            text: (!text.is_empty()).then(|| text.to_string()),
            ..Default::default()
        }
    }

    pub(super) fn visible_tasks(&self) -> Vec<Task> {
        self.task_filter()
            .apply(&self.sync.cache().tasks(self.sync.project()))
    }

    pub(super) fn columns(&self) -> Vec<Column> {
        let statuses = self.sync.cache().statuses(self.sync.project());
        apply_layout(project_columns(&self.visible_tasks(), &statuses), &self.layout)
    }

    pub(super) fn table_rows(&self) -> Vec<TableRow> {
        let statuses = self.sync.cache().statuses(self.sync.project());
        project_table(&self.visible_tasks(), &statuses, self.sort)
    }

    pub(super) fn calendar(&self) -> CalendarProjection {
        project_calendar(&self.visible_tasks(), self.month)
    }

    /// Pipeline for drops in the current view.
    fn active_sync(&self) -> &BoardSync {
        match self.view {
            ViewKind::Calendar => &self.calendar_sync,
            _ => &self.sync,
        }
    }

    /// Id and card count of every drop bucket in the current view.
    fn buckets(&self) -> Vec<(String, usize)> {
        match self.view {
            ViewKind::Calendar => {
                let calendar = self.calendar();
                (0..calendar.bucket_count())
                    .filter_map(|i| calendar.bucket(i).map(|(id, cards)| (id.to_string(), cards.len())))
                    .collect()
            }
            _ => self.columns().into_iter().map(|c| (c.id, c.cards.len())).collect(),
        }
    }

    pub(super) fn selected_task(&self) -> Option<Task> {
        match self.view {
            ViewKind::Board => self
                .columns()
                .get(self.selected_column)
                .and_then(|c| c.cards.get(self.selected_card).cloned()),
            ViewKind::Table => {
                let index = self.table_state.selected()?;
                self.table_rows().into_iter().nth(index).map(|r| r.task)
            }
            ViewKind::Calendar => {
                let calendar = self.calendar();
                let (_, cards) = calendar.bucket(self.selected_bucket)?;
                cards.get(self.selected_bucket_card).cloned()
            }
        }
    }

    /// Keep every selection index inside what is currently projected.
    pub(super) fn clamp_selection(&mut self) {
        let columns = self.columns();
        if self.selected_column >= columns.len() {
            self.selected_column = columns.len().saturating_sub(1);
        }
        let cards = columns.get(self.selected_column).map_or(0, |c| c.cards.len());
        if self.selected_card >= cards {
            self.selected_card = cards.saturating_sub(1);
        }
        if self.column_scroll_offsets.len() != columns.len() {
            self.column_scroll_offsets.resize(columns.len(), 0);
        }

        let rows = self.table_rows().len();
        match self.table_state.selected() {
            _ if rows == 0 => self.table_state.select(None),
            Some(i) if i >= rows => self.table_state.select(Some(rows - 1)),
            None => self.table_state.select(Some(0)),
            _ => {}
        }

        let calendar = self.calendar();
        if self.selected_bucket >= calendar.bucket_count() {
            self.selected_bucket = calendar.bucket_count() - 1;
        }
        let in_bucket = calendar.bucket(self.selected_bucket).map_or(0, |(_, c)| c.len());
        if self.selected_bucket_card >= in_bucket {
            self.selected_bucket_card = in_bucket.saturating_sub(1);
        }
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    /// Handle one key press. Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.state {
            AppState::Filter => {
                self.handle_filter_key(key);
                return false;
            }
            AppState::Detail | AppState::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('h')) {
                    self.state = AppState::Browse;
                    self.detail_task_id = None;
                }
                return false;
            }
            AppState::Browse => {}
        }

        if self.drag.is_some() {
            self.handle_drag_key(key);
            return false;
        }

        self.status_message.clear();
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab => {
                self.view = self.view.next();
                self.set_status_message(format!("{:?} view", self.view));
            }
            KeyCode::Char('/') => {
                self.state = AppState::Filter;
            }
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('h') | KeyCode::Char('?') => self.state = AppState::Help,
            KeyCode::Enter => self.open_detail(),
            KeyCode::Char(' ') => self.pick_up(),
            _ => match self.view {
                ViewKind::Board => self.handle_board_key(key),
                ViewKind::Table => self.handle_table_key(key),
                ViewKind::Calendar => self.handle_calendar_key(key),
            },
        }
        self.clamp_selection();
        false
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.filter.clear();
                self.state = AppState::Browse;
                self.status_message.clear();
            }
            KeyCode::Enter => {
                self.state = AppState::Browse;
                if self.filter.value.is_empty() {
                    self.set_status_message("Filter cleared");
                } else {
                    let shown = self.visible_tasks().len();
                    self.set_status_message(format!("Filter: '{}' ({shown} tasks shown)", self.filter.value));
                }
            }
            KeyCode::Backspace => self.filter.handle_backspace(),
            KeyCode::Delete => self.filter.handle_delete(),
            KeyCode::Left => self.filter.move_cursor_left(),
            KeyCode::Right => self.filter.move_cursor_right(),
            KeyCode::Char(c) => self.filter.handle_char(c),
            _ => {}
        }
        self.clamp_selection();
    }

    fn handle_board_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Left if ctrl => self.move_column(false),
            KeyCode::Right if ctrl => self.move_column(true),
            KeyCode::Left => {
                self.selected_column = self.selected_column.saturating_sub(1);
            }
            KeyCode::Right => {
                self.selected_column += 1;
            }
            KeyCode::Up => {
                self.selected_card = self.selected_card.saturating_sub(1);
            }
            KeyCode::Down => {
                self.selected_card += 1;
            }
            _ => {}
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => {
                let i = self.table_state.selected().unwrap_or(0);
                self.table_state.select(Some(i.saturating_sub(1)));
            }
            KeyCode::Down => {
                let i = self.table_state.selected().map_or(0, |i| i + 1);
                self.table_state.select(Some(i));
            }
            KeyCode::Char('s') => {
                self.sort = self.sort.next();
                self.set_status_message(format!("Sorted by {:?}", self.sort));
            }
            _ => {}
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('[') => self.shift_month(false),
            KeyCode::Char(']') => self.shift_month(true),
            KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down => {
                self.selected_bucket = self.step_bucket(self.selected_bucket, key.code);
                self.selected_bucket_card = 0;
            }
            KeyCode::Char('k') => {
                self.selected_bucket_card = self.selected_bucket_card.saturating_sub(1);
            }
            KeyCode::Char('j') => {
                self.selected_bucket_card += 1;
            }
            _ => {}
        }
    }

    /// Move a calendar bucket index: left/right by a day, up/down by a week.
    /// The unscheduled bucket sits before the first day.
    fn step_bucket(&self, bucket: usize, code: KeyCode) -> usize {
        let last = self.calendar().bucket_count() - 1;
        match code {
            KeyCode::Left => bucket.saturating_sub(1),
            KeyCode::Right => (bucket + 1).min(last),
            KeyCode::Up => bucket.saturating_sub(7),
            KeyCode::Down if bucket == 0 => 1.min(last),
            KeyCode::Down => (bucket + 7).min(last),
            _ => bucket,
        }
    }

    fn shift_month(&mut self, forward: bool) {
        let shifted = if forward {
            self.month.checked_add_months(Months::new(1))
        } else {
            self.month.checked_sub_months(Months::new(1))
        };
        if let Some(month) = shifted {
            self.month = month;
        }
        self.set_status_message(self.month.format("%B %Y").to_string());
    }

    /// Pick up the selected card.
    fn pick_up(&mut self) {
        if !authorize_drag(self.role) || self.view == ViewKind::Table {
            return;
        }
        let Some(task) = self.selected_task() else {
            return;
        };
        let (bucket, index) = match self.view {
            ViewKind::Calendar => (self.selected_bucket, self.selected_bucket_card),
            _ => (self.selected_column, self.selected_card),
        };
        let Some((bucket_id, _)) = self.buckets().into_iter().nth(bucket) else {
            return;
        };
        self.drag = Some(DragState::new(&task.id, Location::new(&bucket_id, index), bucket));
        self.set_status_message(format!("Moving '{}': arrows to choose, space to drop, esc to cancel", task.name));
    }

    fn handle_drag_key(&mut self, key: KeyEvent) {
        let buckets = self.buckets();
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let max_index = |bucket: usize, drag: &DragState| {
            let len = buckets.get(bucket).map_or(0, |(_, n)| *n);
            let same = buckets.get(bucket).is_some_and(|(id, _)| *id == drag.source.droppable_id);
            if same { len.saturating_sub(1) } else { len }
        };

        match key.code {
            KeyCode::Esc => self.cancel_drag(),
            KeyCode::Char(' ') | KeyCode::Enter => self.drop_card(),
            KeyCode::Char('[') | KeyCode::Char(']') if self.view == ViewKind::Calendar => {
                self.shift_month(key.code == KeyCode::Char(']'));
            }
            KeyCode::Left | KeyCode::Right if self.view == ViewKind::Board => {
                let bucket = match key.code {
                    KeyCode::Left => drag.bucket.saturating_sub(1),
                    _ => (drag.bucket + 1).min(buckets.len().saturating_sub(1)),
                };
                drag.bucket = bucket;
                drag.index = drag.index.min(max_index(bucket, &*drag));
            }
            KeyCode::Up if self.view == ViewKind::Board => {
                drag.index = drag.index.saturating_sub(1);
            }
            KeyCode::Down if self.view == ViewKind::Board => {
                drag.index = (drag.index + 1).min(max_index(drag.bucket, &*drag));
            }
            code @ (KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down) => {
                let bucket = drag.bucket;
                let next = self.step_bucket(bucket, code);
                if let Some(drag) = self.drag.as_mut() {
                    drag.bucket = next;
                    drag.index = max_index(next, &*drag);
                }
            }
            _ => {}
        }
    }

    /// Abandon the drag. The gesture still goes through the pipeline, which
    /// treats a drop with no destination as nothing to do.
    fn cancel_drag(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        let result = DragResult::card(&drag.task_id, drag.source, None);
        let dispatch = self.active_sync().dispatch(self.role, &result);
        debug!(intent = ?dispatch.intent(), "drag cancelled");
        self.set_status_message("Move cancelled");
    }

    fn drop_card(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        let Some((bucket_id, _)) = self.buckets().into_iter().nth(drag.bucket) else {
            return;
        };
        let result = DragResult::card(
            &drag.task_id,
            drag.source.clone(),
            Some(Location::new(&bucket_id, drag.index)),
        );
        let before = self.columns();
        let dispatch = self.active_sync().dispatch(self.role, &result);
        self.apply_dispatch(dispatch, before);

        // Selection follows the card to wherever the projection put it.
        let (bucket, index) = self.locate_card(&drag.task_id).unwrap_or((drag.bucket, drag.index));
        match self.view {
            ViewKind::Calendar => {
                self.selected_bucket = bucket;
                self.selected_bucket_card = index;
            }
            _ => {
                self.selected_column = bucket;
                self.selected_card = index;
            }
        }
        self.clamp_selection();
    }

    /// Bucket and index of a card in the current board or calendar projection.
    fn locate_card(&self, task_id: &str) -> Option<(usize, usize)> {
        let find = |cards: &[Task]| cards.iter().position(|t| t.id == task_id);
        match self.view {
            ViewKind::Calendar => {
                let calendar = self.calendar();
                (0..calendar.bucket_count())
                    .find_map(|i| calendar.bucket(i).and_then(|(_, cards)| find(cards)).map(|j| (i, j)))
            }
            _ => self
                .columns()
                .iter()
                .enumerate()
                .find_map(|(i, column)| find(&column.cards).map(|j| (i, j))),
        }
    }

    /// Move the selected column one step left or right.
    fn move_column(&mut self, forward: bool) {
        let columns = self.columns();
        let from = self.selected_column;
        let to = if forward { from + 1 } else { from.wrapping_sub(1) };
        if from >= columns.len() || to >= columns.len() {
            return;
        }
        let result = DragResult::column(
            &columns[from].id,
            Location::new(BOARD_DROPPABLE, from),
            Some(Location::new(BOARD_DROPPABLE, to)),
        );
        let dispatch = self.sync.dispatch(self.role, &result);
        self.apply_dispatch(dispatch, columns);
    }

    /// Apply what the pipeline decided. `before` is the board as it was
    /// projected before the drop.
    fn apply_dispatch(&mut self, dispatch: Dispatch, before: Vec<Column>) {
        match dispatch {
            Dispatch::Ignored(intent) => debug!(?intent, "drop ignored"),
            Dispatch::Local(intent) => self.apply_local(intent, before),
            Dispatch::Remote { intent, .. } => {
                let what = match intent {
                    Intent::SetDeadline { deadline: None, .. } => "Clearing deadline…",
                    Intent::SetDeadline { .. } => "Saving deadline…",
                    _ => "Saving…",
                };
                self.set_status_message(what);
            }
        }
    }

    fn apply_local(&mut self, intent: Intent, mut before: Vec<Column>) {
        match intent {
            Intent::ReorderColumns { from, to } => {
                if reorder(&mut before, from, to) {
                    self.layout.record_columns(&before);
                    self.selected_column = to.min(before.len().saturating_sub(1));
                    self.save_layout();
                }
            }
            Intent::ReorderCards { bucket_id, from, to, .. } => {
                // Calendar days have no stored order.
                if self.view == ViewKind::Calendar || !self.can_record_cards() {
                    return;
                }
                if let Some(column) = before.iter_mut().find(|c| c.id == bucket_id) {
                    if reorder(&mut column.cards, from, to) {
                        self.layout.record_cards(column);
                        self.save_layout();
                    }
                }
            }
            Intent::MoveLocal { task_id, status_id, index } => {
                self.set_status_message("Moved locally (not saved to the server)");
                if !self.can_record_cards() {
                    return;
                }
                let source = before
                    .iter()
                    .enumerate()
                    .find_map(|(i, c)| c.cards.iter().position(|t| t.id == task_id).map(|p| (i, p)));
                let target = before.iter().position(|c| c.id == status_id);
                if let (Some((s, from)), Some(d)) = (source, target) {
                    if s == d {
                        return;
                    }
                    let (src, dst) = pair_mut(&mut before, s, d);
                    if move_between(&mut src.cards, from, &mut dst.cards, index) {
                        self.layout.record_cards(&before[s]);
                        self.layout.record_cards(&before[d]);
                        self.save_layout();
                    }
                }
            }
            other => debug!(intent = ?other, "nothing to apply locally"),
        }
    }

    /// Card order can only be recorded while every card is visible.
    fn can_record_cards(&mut self) -> bool {
        if self.filter.value.trim().is_empty() {
            return true;
        }
        self.set_status_message("Clear the filter to reorder cards");
        false
    }

    fn save_layout(&mut self) {
        if let Err(e) = self.layout.save(&self.layout_path) {
            warn!(path = %self.layout_path.display(), error = %e, "failed to save board layout");
            self.set_status_message(format!("Could not save layout: {e}"));
        }
    }

    /// Reload tasks and statuses in the background.
    fn refresh(&mut self) {
        let sync = self.sync.clone();
        tokio::spawn(async move {
            if let Err(e) = sync.refresh().await {
                warn!(error = %e, "refresh failed");
            }
        });
        self.set_status_message("Refreshing…");
    }

    /// Show the selected task and fetch its detail and comments.
    fn open_detail(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        self.state = AppState::Detail;
        self.detail_task_id = Some(task.id.clone());
        *self.comments.lock() = None;

        let api = self.sync.api().clone();
        let cache = self.sync.cache().clone();
        let comments = self.comments.clone();
        tokio::spawn(async move {
            match api.fetch_task(&task.id).await {
                Ok(detail) => cache.replace_detail(detail),
                Err(e) => warn!(task_id = %task.id, error = %e, "failed to load task detail"),
            }
            let loaded = api.list_comments(&task.id).await.unwrap_or_else(|e| {
                warn!(task_id = %task.id, error = %e, "failed to load comments");
                Vec::new()
            });
            *comments.lock() = Some(loaded);
        });
    }

    /// Draw the whole screen.
    pub fn render(&mut self, f: &mut Frame) {
        self.clamp_selection();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // View
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        match self.view {
            ViewKind::Board => self.render_board(f, chunks[1]),
            ViewKind::Table => self.render_table(f, chunks[1]),
            ViewKind::Calendar => self.render_calendar(f, chunks[1]),
        }
        self.render_status_bar(f, chunks[2]);

        match self.state {
            AppState::Detail => self.render_detail_popup(f),
            AppState::Help => self.render_help_popup(f),
            _ => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let mode = match self.sync.target() {
            MutationTarget::LocalOnly => "  [local only]",
            _ => "",
        };
        let header_text = vec![Line::from(vec![
            Span::styled(format!("{:?}", self.view).to_uppercase(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("Project: {}{mode}", self.sync.project()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];

        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if self.state == AppState::Filter {
            format!("Filter: {} | Enter to apply, Esc to clear", self.filter.value)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let pending = self.sync.cache().pending_moves();
            let pending = if pending > 0 { format!(" | {pending} saving") } else { String::new() };
            let filter = if self.filter.value.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.filter.value)
            };
            format!(
                "{:?}{pending}{filter} | Tab: View | Space: Move | /: Filter | r: Refresh | h: Help | q: Quit",
                self.role
            )
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(ACCENT).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_detail_popup(&self, f: &mut Frame) {
        let Some(task_id) = &self.detail_task_id else {
            return;
        };
        let cache = self.sync.cache();
        let Some(task) = cache
            .detail(task_id)
            .or_else(|| cache.task(self.sync.project(), task_id))
        else {
            return;
        };

        let popup_area = centered(f.area(), 80, 80);
        f.render_widget(Clear, popup_area);

        let today = Local::now().date_naive();
        let statuses = cache.statuses(self.sync.project());
        let status = statuses
            .iter()
            .find(|s| s.id == task.status_id)
            .map_or(task.status_id.as_str(), |s| s.name.as_str());
        let saving = match cache.move_state(&task.id) {
            MoveState::OptimisticallyMoved => " (saving…)",
            _ => "",
        };

        let mut lines = vec![
            Line::from(vec![Span::styled(
                format!("{}: {}", task.id, task.name),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!("Status:     {status}{saving}")),
            Line::from(format!("Priority:   {}", format_priority(task.priority))),
            Line::from(format!("Deadline:   {}", format_deadline_relative(task.deadline, today))),
            Line::from(format!("Assignees:  {}", format_assignees(&task))),
            Line::from(format!("Time spent: {:.1}h", task.actual_time)),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.description.clone().unwrap_or_else(|| "-".into())),
            Line::from(""),
            Line::from(Span::styled("Comments:", Style::default().add_modifier(Modifier::BOLD))),
        ];
        match self.comments.lock().as_ref() {
            None => lines.push(Line::from("Loading…")),
            Some(comments) if comments.is_empty() => lines.push(Line::from("-")),
            Some(comments) => {
                for c in comments {
                    lines.push(Line::from(format!("{}: {}", c.author.name, c.content)));
                }
            }
        }

        let popup = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Task Details (Enter to close)")
                    .title_alignment(Alignment::Center)
                    .border_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            )
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, popup_area);
    }

    fn render_help_popup(&self, f: &mut Frame) {
        let popup_area = centered(f.area(), 60, 70);
        f.render_widget(Clear, popup_area);
        let lines: Vec<Line> = [
            "Tab          switch board / table / calendar",
            "Arrows       select",
            "Space        pick up a card, space again to drop",
            "Esc          cancel a move",
            "Ctrl+←/→     move the selected column",
            "Enter        task details and comments",
            "/            filter by text",
            "r            reload from the server",
            "s            change table sort",
            "[ ]          previous / next month",
            "j k          select a card within a day",
            "q            quit",
        ]
        .into_iter()
        .map(Line::from)
        .collect();
        let popup = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Help").border_style(Style::default().fg(GOLD)))
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, popup_area);
    }
}

/// Two distinct elements of a slice, mutably.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// A rect `percent_x` by `percent_y` of `area`, centered in it.
pub(super) fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let scale = |len: u16, percent: u16| (u32::from(len) * u32::from(percent.min(100)) / 100) as u16;
    let width = scale(area.width, percent_x);
    let height = scale(area.height, percent_y);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::TempDir;

    use super::*;
    use crate::api::mock::MockApi;
    use crate::cache::TaskCache;
    use crate::task::Status;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    fn board() -> (Vec<Task>, Vec<Status>) {
        let statuses = vec![
            Status::new("todo", "To Do", Some(0)),
            Status::new("done", "Done", Some(1)),
        ];
        let tasks = vec![Task::new("t1", "Write docs", "todo"), Task::new("t2", "Ship it", "todo")];
        (tasks, statuses)
    }

    async fn app_with(api: &MockApi, role: Role, target: MutationTarget, dir: &TempDir) -> App {
        let sync = BoardSync::new(Arc::new(api.clone()), TaskCache::new(), "p1", target);
        sync.refresh().await.unwrap();
        App::new(sync, role, ViewKind::Board, dir.path().join("p1_layout.json"))
    }

    async fn settle(app: &App) {
        for _ in 0..100 {
            if app.sync.cache().pending_moves() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    fn task(app: &App, id: &str) -> Task {
        app.sync.cache().task("p1", id).unwrap()
    }

    #[tokio::test]
    async fn test_viewer_drag_keys_do_nothing() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Viewer, MutationTarget::Status, &dir).await;

        for code in [KeyCode::Char(' '), KeyCode::Right, KeyCode::Char(' ')] {
            app.handle_key(key(code));
        }
        app.handle_key(ctrl(KeyCode::Right));
        settle(&app).await;

        assert!(app.drag.is_none());
        assert!(api.mutation_calls().is_empty());
        assert_eq!(task(&app, "t1").status_id, "todo");
        assert_eq!(app.columns()[0].id, "todo");
        assert!(!app.layout_path.exists());
    }

    #[tokio::test]
    async fn test_member_moves_card_between_columns() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses).gated();
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.drag.is_some());
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Char(' ')));

        // Visible before the server has answered.
        assert_eq!(task(&app, "t1").status_id, "done");
        assert_eq!(app.sync.cache().move_state("t1"), MoveState::OptimisticallyMoved);
        assert_eq!((app.selected_column, app.selected_card), (1, 0));

        api.release();
        settle(&app).await;
        assert_eq!(api.mutation_calls(), vec!["update_task_status t1 done".to_string()]);
        assert_eq!(task(&app, "t1").status_id, "done");
    }

    #[tokio::test]
    async fn test_selection_follows_card_to_its_projected_slot() {
        let statuses = board().1;
        let tasks = vec![
            Task::new("t1", "Write docs", "todo"),
            Task::new("t2", "Ship it", "todo"),
            Task::new("t3", "Released", "done"),
        ];
        let api = MockApi::new(tasks, statuses).gated();
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;

        // Pick up the second card and aim below t3 in Done.
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.drag.as_ref().map(|d| d.index), Some(1));
        app.handle_key(key(KeyCode::Char(' ')));

        // Server order puts t2 ahead of t3, and the selection goes with it.
        assert_eq!((app.selected_column, app.selected_card), (1, 0));
        assert_eq!(app.selected_task().map(|t| t.id), Some("t2".to_string()));

        api.release();
        settle(&app).await;
        assert_eq!(app.selected_task().map(|t| t.id), Some("t2".to_string()));
    }

    #[test]
    fn test_centered_handles_wide_terminals() {
        let area = centered(Rect::new(0, 0, 1000, 300), 60, 50);
        assert_eq!(area, Rect::new(200, 75, 600, 150));

        let full = centered(Rect::new(5, 5, u16::MAX - 5, 10), 100, 100);
        assert_eq!((full.x, full.width), (5, u16::MAX - 5));
    }

    #[tokio::test]
    async fn test_escape_cancels_without_calls() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;

        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Esc));
        settle(&app).await;

        assert!(app.drag.is_none());
        assert!(api.mutation_calls().is_empty());
        assert_eq!(task(&app, "t1").status_id, "todo");
    }

    #[tokio::test]
    async fn test_column_reorder_is_local_and_saved() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;
        let calls_before = api.calls().len();

        app.handle_key(ctrl(KeyCode::Right));

        assert_eq!(api.calls().len(), calls_before);
        let ids: Vec<String> = app.columns().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["done", "todo"]);
        assert_eq!(app.selected_column, 1);
        let saved = BoardLayout::load(&app.layout_path);
        assert_eq!(saved.column_order, vec!["done", "todo"]);
    }

    #[tokio::test]
    async fn test_card_reorder_within_column_is_saved() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;

        for code in [KeyCode::Char(' '), KeyCode::Down, KeyCode::Char(' ')] {
            app.handle_key(key(code));
        }

        assert!(api.mutation_calls().is_empty());
        let order: Vec<String> = app.columns()[0].cards.iter().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec!["t2", "t1"]);
        assert_eq!(BoardLayout::load(&app.layout_path).card_order["todo"], vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn test_local_only_move_never_reaches_server() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Owner, MutationTarget::LocalOnly, &dir).await;

        for code in [KeyCode::Char(' '), KeyCode::Right, KeyCode::Char(' ')] {
            app.handle_key(key(code));
        }
        settle(&app).await;

        assert!(api.mutation_calls().is_empty());
        assert_eq!(task(&app, "t1").status_id, "done");
        assert_eq!(api.server_tasks()[0].status_id, "todo");
    }

    #[tokio::test]
    async fn test_calendar_drop_on_unscheduled_clears_deadline() {
        let statuses = vec![Status::new("todo", "To Do", None)];
        let mut due = Task::new("t1", "Release", "todo");
        due.deadline = Some(Utc.with_ymd_and_hms(2025, 9, 10, 0, 0, 0).unwrap());
        let api = MockApi::new(vec![due], statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;
        app.view = ViewKind::Calendar;
        app.month = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        app.selected_bucket = 10;

        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.drag.as_ref().map(|d| d.source.droppable_id.as_str()), Some("calendar-day-2025-09-10"));
        for _ in 0..2 {
            app.handle_key(key(KeyCode::Up));
        }
        assert_eq!(app.drag.as_ref().map(|d| d.bucket), Some(0));
        app.handle_key(key(KeyCode::Char(' ')));

        assert_eq!(task(&app, "t1").deadline, None);
        settle(&app).await;
        let calls = api.mutation_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("update_task t1"));
        assert!(calls[0].contains("\"deadline\":null"));
    }

    #[tokio::test]
    async fn test_filter_narrows_columns() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;

        app.handle_key(key(KeyCode::Char('/')));
        for c in "ship".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.state, AppState::Browse);
        let cards: Vec<String> = app.columns()[0].cards.iter().map(|t| t.id.clone()).collect();
        assert_eq!(cards, vec!["t2"]);
    }

    #[tokio::test]
    async fn test_renders_every_view() {
        let (tasks, statuses) = board();
        let api = MockApi::new(tasks, statuses);
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&api, Role::Member, MutationTarget::Status, &dir).await;
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();

        for _ in 0..3 {
            terminal.draw(|f| app.render(f)).unwrap();
            let text: String = terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect();
            match app.view {
                ViewKind::Board => assert!(text.contains("To Do") && text.contains("Write docs")),
                ViewKind::Table => assert!(text.contains("Ship it")),
                ViewKind::Calendar => assert!(text.contains("Unscheduled")),
            }
            app.handle_key(key(KeyCode::Tab));
        }
    }
}
