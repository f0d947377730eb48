//! Parsing and formatting helpers shared by the CLI and the TUI.
//!
//! Natural-language date input, relative deadline display, identifier
//! resolution (id or name) and the plain-text table printer.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};

use crate::fields::Priority;
use crate::projection::TableRow;
use crate::task::{Status, Task};

/// Parse human-readable date input relative to `today`.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "monday" .. "sunday" (and "next monday" etc.)
/// - "end of week", "end of month"
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD"
pub fn parse_date_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => return Some(start_end_of_week(today).1),
        "end of month" | "eom" => {
            let first = today.with_day(1)?;
            let next = first.checked_add_months(chrono::Months::new(1))?;
            return Some(next - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Duration::try_days(days).and_then(|d| today.checked_add_signed(d));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Duration::try_weeks(weeks).and_then(|w| today.checked_add_signed(w));
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];
    let current = today.weekday().num_days_from_monday() as i64;
    for (name, target) in weekdays {
        let days_ahead = (target + 7 - current) % 7;
        if s == name || s == format!("this {name}") {
            return Some(today + Duration::days(days_ahead));
        }
        if s == format!("next {name}") {
            let days = if days_ahead == 0 { 7 } else { days_ahead + 7 };
            return Some(today + Duration::days(days));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Start and end of the ISO week (Monday to Sunday) containing `day`.
pub fn start_end_of_week(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day - Duration::days(day.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

/// Format a deadline relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_deadline_relative(deadline: Option<DateTime<Utc>>, today: NaiveDate) -> String {
    match deadline {
        None => "-".into(),
        Some(d) => {
            let days = (d.date_naive() - today).num_days();
            match days {
                0 => "today".into(),
                1 => "tomorrow".into(),
                n if n > 1 => format!("in {n}d"),
                n => format!("{}d late", -n),
            }
        }
    }
}

pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
    }
}

pub fn format_assignees(task: &Task) -> String {
    if task.assignees.is_empty() {
        "-".into()
    } else {
        task.assignees
            .iter()
            .map(|u| u.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Truncate a string to a maximum width, adding an ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Print table rows as aligned plain text.
pub fn print_table(rows: &[TableRow]) {
    println!(
        "{:<10} {:<14} {:<7} {:<10} {:<18} {}",
        "ID", "Status", "Pri", "Deadline", "Assignees", "Name"
    );
    let today = Local::now().date_naive();
    for row in rows {
        let t = &row.task;
        println!(
            "{:<10} {:<14} {:<7} {:<10} {:<18} {}",
            truncate(&t.id, 10),
            truncate(&row.status, 14),
            format_priority(t.priority),
            format_deadline_relative(t.deadline, today),
            truncate(&format_assignees(t), 18),
            t.name
        );
    }
}

/// Resolve a task identifier (either id or name) to a task id.
/// Names are matched case-insensitively; ambiguous names are an error.
pub fn resolve_task_identifier(identifier: &str, tasks: &[Task]) -> Result<String, String> {
    if let Some(task) = tasks.iter().find(|t| t.id == identifier) {
        return Ok(task.id.clone());
    }

    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.name.eq_ignore_ascii_case(identifier))
        .collect();

    match matches.len() {
        0 => Err(format!("No task found with id or name '{identifier}'")),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let mut msg = format!("Multiple tasks found with name '{identifier}':\n");
            for task in matches {
                msg.push_str(&format!("  {}: {}\n", task.id, task.name));
            }
            msg.push_str("Please use the specific id instead.");
            Err(msg)
        }
    }
}

/// Resolve a status identifier (either id or name) to a status id.
pub fn resolve_status_identifier(identifier: &str, statuses: &[Status]) -> Result<String, String> {
    statuses
        .iter()
        .find(|s| s.id == identifier)
        .or_else(|| statuses.iter().find(|s| s.name.eq_ignore_ascii_case(identifier)))
        .map(|s| s.id.clone())
        .ok_or_else(|| format!("No status found with id or name '{identifier}'"))
}
