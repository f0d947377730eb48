//! Kanban board rendering.
//!
//! One column per status, cards stacked top to bottom with per-column
//! scrolling. While a card is being moved the target column is outlined and
//! titled with the drop position.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::cache::MoveState;
use crate::format::{format_priority, truncate};
use crate::projection::Column;
use crate::task::Task;
use crate::tui::app::App;
use crate::tui::colors::{priority_color, ACCENT, DARK_PURPLE, GOLD};

const CARD_HEIGHT: usize = 5;

impl App {
    pub(super) fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let columns = self.columns();
        if columns.is_empty() {
            f.render_widget(Paragraph::new("No columns").block(Block::default().borders(Borders::ALL)), area);
            return;
        }
        let constraints: Vec<Constraint> = (0..columns.len())
            .map(|_| Constraint::Ratio(1, columns.len() as u32))
            .collect();
        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, (column, &column_area)) in columns.iter().zip(columns_layout.iter()).enumerate() {
            self.render_column(f, column_area, i, column);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize, column: &Column) {
        let is_selected = column_index == self.selected_column;
        let drop_target = self.drag.as_ref().filter(|d| d.bucket == column_index).map(|d| d.index);

        let (border_style, title) = match drop_target {
            Some(index) => (
                Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
                format!("{} ({}) ⇣ {}", column.title, column.cards.len(), index + 1),
            ),
            None if is_selected => (
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                format!("{} ({})", column.title, column.cards.len()),
            ),
            None => (Style::default(), format!("{} ({})", column.title, column.cards.len())),
        };

        let block = Block::default().borders(Borders::ALL).title(title).border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        if column.cards.is_empty() {
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = (available_height / CARD_HEIGHT).max(1);

        // Keep the selected card (or the drop position) on screen.
        let focus = drop_target.or(is_selected.then_some(self.selected_card));
        let offset = self.column_scroll_offsets.get(column_index).copied().unwrap_or(0);
        let scroll_offset = match focus {
            Some(focus) if focus < offset => focus,
            Some(focus) if focus >= offset + visible_cards => focus + 1 - visible_cards,
            _ => offset,
        }
        .min(column.cards.len().saturating_sub(1));
        if let Some(slot) = self.column_scroll_offsets.get_mut(column_index) {
            *slot = scroll_offset;
        }

        let mut current_y = 0;
        let mut rendered_cards = 0;
        for (card_index, task) in column.cards.iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: CARD_HEIGHT as u16,
            };
            let selected = is_selected && card_index == self.selected_card && self.drag.is_none();
            self.render_card(f, card_area, task, selected);
            current_y += CARD_HEIGHT;
            rendered_cards += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{scroll_offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { height: 1, ..inner });
        }
        let remaining = column.cards.len() - scroll_offset - rendered_cards;
        if remaining > 0 && inner.height > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    y: inner.y + inner.height - 1,
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, is_selected: bool) {
        let dragged = self.drag.as_ref().is_some_and(|d| d.task_id == task.id);
        let pending = self.sync.cache().move_state(&task.id) == MoveState::OptimisticallyMoved;

        let style = if dragged {
            Style::default().bg(GOLD).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else if is_selected {
            Style::default().bg(ACCENT).fg(Color::White).add_modifier(Modifier::BOLD)
        } else if pending {
            Style::default().bg(DARK_PURPLE)
        } else {
            Style::default().bg(Color::DarkGray)
        };

        let width = area.width.saturating_sub(2) as usize;
        let mut card_text = vec![Line::from(truncate(&task.name, width.max(1)))];
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            card_text.push(Line::from(truncate(description, width.max(1))).style(Style::default().fg(Color::Gray)));
        }
        let mut footer = format_priority(task.priority).to_string();
        if !task.assignees.is_empty() {
            footer.push_str(&format!(" | {} assigned", task.assignees.len()));
        }
        if pending {
            footer.push_str(" | saving…");
        }
        card_text.push(Line::from(footer));

        let card = Paragraph::new(card_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(priority_color(task.priority))),
            )
            .style(style)
            .wrap(Wrap { trim: true });
        f.render_widget(card, area);
    }
}
