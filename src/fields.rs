//! Enumerations and field types shared across the board.
//!
//! This module defines the small closed vocabularies used by tasks, members
//! and views: priorities, project roles, drag types, mutation targets, sort
//! keys and the three board views.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task priority as sent by the API.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[serde(alias = "low")]
    Low,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

/// Permission level of a project member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[serde(alias = "owner")]
    Owner,
    #[serde(alias = "admin")]
    Admin,
    #[serde(alias = "member")]
    Member,
    #[serde(alias = "viewer")]
    Viewer,
}

/// What is being dragged: a whole column or a single card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragType {
    Column,
    #[default]
    Card,
}

/// Where a cross-bucket card drop is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MutationTarget {
    /// Board columns: the drop changes the task's status.
    Status,
    /// Calendar days: the drop changes the task's deadline.
    Deadline,
    /// Nothing leaves the client; moves only touch the local cache.
    LocalOnly,
}

/// Available sorting options for the table view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    #[default]
    Status,
    Name,
    Priority,
    Deadline,
}

impl SortKey {
    /// Next key in the cycle used by the table view.
    pub fn next(self) -> Self {
        match self {
            SortKey::Status => SortKey::Name,
            SortKey::Name => SortKey::Priority,
            SortKey::Priority => SortKey::Deadline,
            SortKey::Deadline => SortKey::Status,
        }
    }
}

/// The three synchronised views over one project's tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ViewKind {
    #[default]
    Board,
    Table,
    Calendar,
}

impl ViewKind {
    pub fn next(self) -> Self {
        match self {
            ViewKind::Board => ViewKind::Table,
            ViewKind::Table => ViewKind::Calendar,
            ViewKind::Calendar => ViewKind::Board,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_wire_format() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"HIGH\"");
        let p: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn test_role_accepts_lowercase_alias() {
        let r: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(r, Role::Viewer);
        let r: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(r, Role::Admin);
    }

    #[test]
    fn test_view_cycle_returns_to_board() {
        assert_eq!(ViewKind::Board.next().next().next(), ViewKind::Board);
        assert_eq!(SortKey::Status.next().next().next().next(), SortKey::Status);
    }
}
