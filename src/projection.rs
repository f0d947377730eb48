//! Column and view projections.
//!
//! Every view is derived state: the board columns, the table rows and the
//! calendar buckets are recomputed from the latest task and status snapshots
//! and never mutate them. A task's column is purely a function of its
//! `status_id`; a task's calendar day is purely a function of its deadline.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use crate::fields::{Priority, SortKey};
use crate::layout::BoardLayout;
use crate::reconciler::{calendar_bucket_id, UNSCHEDULED_BUCKET};
use crate::task::{Status, Task};

/// Buckets shown before a project's own statuses have loaded.
pub const DEFAULT_BUCKETS: [(&str, &str); 3] = [("todo", "To Do"), ("inprogress", "In Progress"), ("done", "Done")];

/// Table label for tasks whose status id matches no known status.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// A board column: one status and the cards currently in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: String,
    pub title: String,
    pub cards: Vec<Task>,
}

/// Statuses in display order. Sorted by `position` only when every status
/// has one; otherwise the source order is kept as is.
pub fn ordered_statuses(statuses: &[Status]) -> Vec<&Status> {
    let mut ordered: Vec<&Status> = statuses.iter().collect();
    if ordered.iter().all(|s| s.position.is_some()) {
        // Stable, so equal positions keep source order.
        ordered.sort_by_key(|s| s.position);
    }
    ordered
}

/// Partition the top-level tasks into one column per status.
pub fn project_columns(tasks: &[Task], statuses: &[Status]) -> Vec<Column> {
    let buckets: Vec<(String, String)> = if statuses.is_empty() {
        DEFAULT_BUCKETS
            .iter()
            .map(|(id, title)| (id.to_string(), title.to_string()))
            .collect()
    } else {
        ordered_statuses(statuses)
            .into_iter()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect()
    };

    buckets
        .into_iter()
        .map(|(id, title)| {
            let cards = tasks
                .iter()
                .filter(|t| !t.is_subtask() && t.status_id == id)
                .cloned()
                .collect();
            Column { id, title, cards }
        })
        .collect()
}

/// Reorder columns and cards by a locally saved layout. Ids the layout does
/// not mention keep their projected order after the ones it does.
pub fn apply_layout(columns: Vec<Column>, layout: &BoardLayout) -> Vec<Column> {
    let mut columns = order_by_ids(columns, &layout.column_order, |c| c.id.as_str());
    for column in columns.iter_mut() {
        if let Some(order) = layout.card_order.get(&column.id) {
            let cards = std::mem::take(&mut column.cards);
            column.cards = order_by_ids(cards, order, |t| t.id.as_str());
        }
    }
    columns
}

fn order_by_ids<T>(items: Vec<T>, order: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    if order.is_empty() {
        return items;
    }
    let rank = |item: &T| {
        order
            .iter()
            .position(|id| id == id_of(item))
            .unwrap_or(usize::MAX)
    };
    let mut ranked: Vec<(usize, T)> = items.into_iter().map(|item| (rank(&item), item)).collect();
    ranked.sort_by_key(|(r, _)| *r);
    ranked.into_iter().map(|(_, item)| item).collect()
}

/// Free-text, priority and assignee filter applied before any projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.priority.is_none()
            && self.assignee.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let name_matches = task.name.to_lowercase().contains(&needle);
            let desc_matches = task
                .description
                .as_ref()
                .map_or(false, |d| d.to_lowercase().contains(&needle));
            if !name_matches && !desc_matches {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(assignee) = &self.assignee {
            let assigned = task
                .assignees
                .iter()
                .any(|u| &u.id == assignee || u.name.eq_ignore_ascii_case(assignee));
            if !assigned {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

/// One row of the table view.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub task: Task,
    pub status: String,
}

/// Every top-level task with its status label, sorted by `sort`.
pub fn project_table(tasks: &[Task], statuses: &[Status], sort: SortKey) -> Vec<TableRow> {
    let columns = project_columns(&[], statuses);
    let column_rank = |status_id: &str| columns.iter().position(|c| c.id == status_id);

    let mut rows: Vec<TableRow> = tasks
        .iter()
        .filter(|t| !t.is_subtask())
        .map(|t| TableRow {
            status: columns
                .iter()
                .find(|c| c.id == t.status_id)
                .map(|c| c.title.clone())
                .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            task: t.clone(),
        })
        .collect();

    match sort {
        SortKey::Status => rows.sort_by_key(|r| column_rank(&r.task.status_id).unwrap_or(usize::MAX)),
        SortKey::Name => rows.sort_by_key(|r| r.task.name.to_lowercase()),
        SortKey::Priority => rows.sort_by(|a, b| b.task.priority.cmp(&a.task.priority)),
        // Undated tasks last.
        SortKey::Deadline => rows.sort_by_key(|r| (r.task.deadline.is_none(), r.task.deadline)),
    }
    rows
}

/// One day of the calendar view.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub id: String,
    pub date: NaiveDate,
    pub cards: Vec<Task>,
}

/// A month of day buckets plus the tasks that have no deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarProjection {
    /// First day of the projected month.
    pub month: NaiveDate,
    pub days: Vec<DayBucket>,
    pub unscheduled: Vec<Task>,
}

impl CalendarProjection {
    /// Bucket id and cards by flat index: 0 is the unscheduled bucket, then the days.
    pub fn bucket(&self, index: usize) -> Option<(&str, &[Task])> {
        if index == 0 {
            return Some((UNSCHEDULED_BUCKET, &self.unscheduled));
        }
        self.days
            .get(index - 1)
            .map(|d| (d.id.as_str(), d.cards.as_slice()))
    }

    pub fn bucket_count(&self) -> usize {
        self.days.len() + 1
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Calendar day a deadline falls on.
pub fn deadline_day(deadline: DateTime<Utc>) -> NaiveDate {
    deadline.date_naive()
}

/// Place top-level tasks into the days of `month`. Tasks due outside the
/// month are not shown; tasks without a deadline go to the unscheduled bucket.
pub fn project_calendar(tasks: &[Task], month: NaiveDate) -> CalendarProjection {
    let first = month_start(month);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);

    let days = first
        .iter_days()
        .take_while(|d| *d < next)
        .map(|date| DayBucket {
            id: calendar_bucket_id(date),
            date,
            cards: tasks
                .iter()
                .filter(|t| !t.is_subtask() && t.deadline.map(deadline_day) == Some(date))
                .cloned()
                .collect(),
        })
        .collect();

    let unscheduled = tasks
        .iter()
        .filter(|t| !t.is_subtask() && t.deadline.is_none())
        .cloned()
        .collect();

    CalendarProjection {
        month: first,
        days,
        unscheduled,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;

    fn task(id: &str, status: &str) -> Task {
        Task::new(id, &format!("Task {id}"), status)
    }

    fn ids(cards: &[Task]) -> Vec<&str> {
        cards.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_columns_partition_tasks_by_status() {
        let statuses = vec![Status::new("a", "A", None), Status::new("b", "B", None)];
        let tasks = vec![task("1", "a"), task("2", "b"), task("3", "a"), task("4", "zzz")];
        let columns = project_columns(&tasks, &statuses);

        assert_eq!(columns.len(), 2);
        assert_eq!(ids(&columns[0].cards), vec!["1", "3"]);
        assert_eq!(ids(&columns[1].cards), vec!["2"]);

        // Disjoint, and the union is exactly the tasks with a known status.
        let mut seen = HashSet::new();
        for column in &columns {
            for card in &column.cards {
                assert!(seen.insert(card.id.clone()), "card {} in two columns", card.id);
            }
        }
        let expected: HashSet<String> = tasks
            .iter()
            .filter(|t| statuses.iter().any(|s| s.id == t.status_id))
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_partition_holds_across_many_shapes() {
        let statuses = vec![
            Status::new("s0", "S0", Some(2)),
            Status::new("s1", "S1", Some(0)),
            Status::new("s2", "S2", Some(1)),
        ];
        for n in 0..30 {
            let tasks: Vec<Task> = (0..n)
                .map(|i| {
                    let mut t = task(&i.to_string(), &format!("s{}", i % 4));
                    if i % 7 == 3 {
                        t.parent_task_id = Some("0".into());
                    }
                    t
                })
                .collect();
            let columns = project_columns(&tasks, &statuses);
            let total: usize = columns.iter().map(|c| c.cards.len()).sum();
            let expected = tasks
                .iter()
                .filter(|t| !t.is_subtask() && t.status_id != "s3")
                .count();
            assert_eq!(total, expected, "n = {n}");
            for column in &columns {
                assert!(column.cards.iter().all(|t| t.status_id == column.id));
            }
        }
    }

    #[test]
    fn test_empty_statuses_fall_back_to_default_buckets() {
        let tasks = vec![task("1", "done"), task("2", "todo"), task("3", "inprogress")];
        let columns = project_columns(&tasks, &[]);
        let titles: Vec<&str> = columns.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["To Do", "In Progress", "Done"]);
        assert_eq!(ids(&columns[0].cards), vec!["2"]);
        assert_eq!(ids(&columns[2].cards), vec!["1"]);
    }

    #[test]
    fn test_subtasks_are_not_cards() {
        let mut sub = task("2", "a");
        sub.parent_task_id = Some("1".into());
        let columns = project_columns(&[task("1", "a"), sub], &[Status::new("a", "A", None)]);
        assert_eq!(ids(&columns[0].cards), vec!["1"]);
    }

    #[test]
    fn test_status_order_uses_position_only_when_complete() {
        let full = vec![
            Status::new("c", "C", Some(3)),
            Status::new("a", "A", Some(1)),
            Status::new("b", "B", Some(1)),
        ];
        let order: Vec<&str> = ordered_statuses(&full).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        let partial = vec![
            Status::new("c", "C", Some(3)),
            Status::new("a", "A", None),
            Status::new("b", "B", Some(1)),
        ];
        let order: Vec<&str> = ordered_statuses(&partial).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_projection_does_not_touch_inputs() {
        let statuses = vec![Status::new("b", "B", Some(2)), Status::new("a", "A", Some(1))];
        let tasks = vec![task("1", "b")];
        let before = (tasks.clone(), statuses.clone());
        let _ = project_columns(&tasks, &statuses);
        assert_eq!((tasks, statuses), before);
    }

    #[test]
    fn test_layout_overlay_orders_columns_and_cards() {
        let statuses = vec![
            Status::new("a", "A", None),
            Status::new("b", "B", None),
            Status::new("c", "C", None),
        ];
        let tasks = vec![task("1", "a"), task("2", "a"), task("3", "a")];
        let mut layout = BoardLayout::default();
        layout.column_order = vec!["c".into(), "a".into()];
        layout.card_order.insert("a".into(), vec!["3".into(), "1".into()]);

        let columns = apply_layout(project_columns(&tasks, &statuses), &layout);
        let order: Vec<&str> = columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(ids(&columns[1].cards), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_filter_by_text_priority_and_assignee() {
        let mut t1 = task("1", "a");
        t1.name = "Fix login bug".into();
        t1.priority = Priority::High;
        t1.assignees.push(crate::task::UserRef {
            id: "u1".into(),
            name: "Sam".into(),
            email: None,
        });
        let mut t2 = task("2", "a");
        t2.description = Some("about the LOGIN page".into());

        let by_text = TaskFilter {
            text: Some("login".into()),
            ..Default::default()
        };
        assert_eq!(by_text.apply(&[t1.clone(), t2.clone()]).len(), 2);

        let by_priority = TaskFilter {
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert_eq!(ids(&by_priority.apply(&[t1.clone(), t2.clone()])), vec!["1"]);

        let by_assignee = TaskFilter {
            assignee: Some("sam".into()),
            ..Default::default()
        };
        assert_eq!(ids(&by_assignee.apply(&[t1, t2])), vec!["1"]);
        assert!(TaskFilter::default().is_empty());
    }

    #[test]
    fn test_table_labels_unmatched_status_as_unknown() {
        let statuses = vec![Status::new("a", "Alpha", None)];
        let rows = project_table(&[task("1", "a"), task("2", "gone")], &statuses, SortKey::Status);
        assert_eq!(rows[0].status, "Alpha");
        assert_eq!(rows[1].status, UNKNOWN_STATUS);
    }

    #[test]
    fn test_table_sorts_deadline_with_undated_last() {
        let mut early = task("1", "a");
        early.deadline = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let mut late = task("2", "a");
        late.deadline = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let undated = task("3", "a");
        let rows = project_table(&[undated, late, early], &[], SortKey::Deadline);
        let order: Vec<&str> = rows.iter().map(|r| r.task.id.as_str()).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_calendar_buckets_by_deadline_day() {
        let mut due = task("1", "a");
        due.deadline = Some(Utc.with_ymd_and_hms(2025, 9, 1, 15, 30, 0).unwrap());
        let mut other_month = task("2", "a");
        other_month.deadline = Some(Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap());
        let undated = task("3", "a");

        let month = NaiveDate::from_ymd_opt(2025, 9, 17).unwrap();
        let cal = project_calendar(&[due, other_month, undated], month);
        assert_eq!(cal.month, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert_eq!(cal.days.len(), 30);
        assert_eq!(cal.days[0].id, "calendar-day-2025-09-01");
        assert_eq!(ids(&cal.days[0].cards), vec!["1"]);
        assert!(cal.days.iter().skip(1).all(|d| d.cards.is_empty()));
        assert_eq!(ids(&cal.unscheduled), vec!["3"]);

        assert_eq!(cal.bucket(0).map(|(id, _)| id), Some(UNSCHEDULED_BUCKET));
        assert_eq!(cal.bucket(1).map(|(id, _)| id), Some("calendar-day-2025-09-01"));
        assert_eq!(cal.bucket_count(), 31);
        assert!(cal.bucket(31).is_none());
    }
}
