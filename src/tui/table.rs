//! Table view rendering.

use chrono::Local;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use crate::format::{format_assignees, format_deadline_relative, format_priority};
use crate::fields::Priority;
use crate::tui::app::App;
use crate::tui::colors::ACCENT;

impl App {
    pub(super) fn render_table(&mut self, f: &mut Frame, area: Rect) {
        let today = Local::now().date_naive();
        let rows = self.table_rows();
        let total = self.sync.cache().tasks(self.sync.project()).len();

        let header_cells = ["ID", "Name", "Status", "Priority", "Deadline", "Assignees"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells)
            .style(Style::default().bg(ACCENT).fg(Color::White))
            .height(1);

        let body: Vec<Row> = rows
            .iter()
            .map(|row| {
                let task = &row.task;
                let style = match task.priority {
                    Priority::High => Style::default().fg(Color::LightRed),
                    Priority::Low => Style::default().fg(Color::Gray),
                    Priority::Medium => Style::default().fg(Color::White),
                };
                Row::new(vec![
                    Cell::from(task.id.clone()),
                    Cell::from(task.name.clone()),
                    Cell::from(row.status.clone()),
                    Cell::from(format_priority(task.priority)),
                    Cell::from(format_deadline_relative(task.deadline, today)),
                    Cell::from(format_assignees(task)),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(10), // ID
            Constraint::Min(25),    // Name
            Constraint::Length(14), // Status
            Constraint::Length(9),  // Priority
            Constraint::Length(10), // Deadline
            Constraint::Length(20), // Assignees
        ];

        let table = Table::new(body, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Tasks ({}/{}) sorted by {:?} - 's' to change",
                rows.len(),
                total,
                self.sort
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.table_state);
    }
}
