//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Priority;

/// Selection and borders of the focused column.
pub const ACCENT: Color = Color::Rgb(0, 95, 135);
/// Card being dragged and its drop marker.
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Cards waiting on the server.
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);
/// High priority.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Low priority.
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => DARK_RED,
        Priority::Medium => Color::DarkGray,
        Priority::Low => DARK_GREEN,
    }
}
