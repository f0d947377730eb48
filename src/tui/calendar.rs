//! Month calendar rendering.
//!
//! The unscheduled bucket is drawn as a side panel; the days of the month are
//! laid out in Monday-first weeks.

use chrono::{Datelike, Local};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::cache::MoveState;
use crate::format::truncate;
use crate::task::Task;
use crate::tui::app::App;
use crate::tui::colors::{ACCENT, DARK_PURPLE, GOLD};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

impl App {
    pub(super) fn render_calendar(&self, f: &mut Frame, area: Rect) {
        let calendar = self.calendar();
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(0)])
            .split(area);

        self.render_bucket(f, chunks[0], 0, "Unscheduled".to_string(), &calendar.unscheduled);

        let offset = calendar.month.weekday().num_days_from_monday() as usize;
        let weeks = (offset + calendar.days.len()).div_ceil(7);

        let grid = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} - '[' / ']' to change month", calendar.month.format("%B %Y")));
        let inner = grid.inner(chunks[1]);
        f.render_widget(grid, chunks[1]);

        let mut row_constraints = vec![Constraint::Length(1)];
        row_constraints.extend((0..weeks).map(|_| Constraint::Ratio(1, weeks as u32)));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(row_constraints)
            .split(inner);
        let cells = |row: Rect| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Ratio(1, 7); 7])
                .split(row)
        };

        for (i, area) in cells(rows[0]).iter().enumerate() {
            let label = Paragraph::new(WEEKDAYS[i]).style(Style::default().add_modifier(Modifier::BOLD));
            f.render_widget(label, *area);
        }

        let today = Local::now().date_naive();
        for (day_index, day) in calendar.days.iter().enumerate() {
            let slot = offset + day_index;
            let week_cells = cells(rows[1 + slot / 7]);
            let mut title = day.date.day().to_string();
            if day.date == today {
                title.push_str(" •");
            }
            self.render_bucket(f, week_cells[slot % 7], day_index + 1, title, &day.cards);
        }
    }

    /// One calendar bucket: a bordered cell listing its cards.
    fn render_bucket(&self, f: &mut Frame, area: Rect, bucket: usize, title: String, cards: &[Task]) {
        let is_selected = bucket == self.selected_bucket;
        let is_target = self.drag.as_ref().is_some_and(|d| d.bucket == bucket);
        let border_style = if is_target {
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD)
        } else if is_selected {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let width = area.width.saturating_sub(2).max(1) as usize;
        let lines: Vec<Line> = cards
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let dragged = self.drag.as_ref().is_some_and(|d| d.task_id == task.id);
                let pending = self.sync.cache().move_state(&task.id) == MoveState::OptimisticallyMoved;
                let style = if dragged {
                    Style::default().bg(GOLD).fg(Color::Black)
                } else if is_selected && i == self.selected_bucket_card && self.drag.is_none() {
                    Style::default().bg(ACCENT).fg(Color::White)
                } else if pending {
                    Style::default().bg(DARK_PURPLE)
                } else {
                    Style::default()
                };
                Line::from(truncate(&task.name, width)).style(style)
            })
            .collect();

        let cell = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border_style),
        );
        f.render_widget(cell, area);
    }
}
