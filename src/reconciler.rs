//! Drag reconciler.
//!
//! Turns the outcome of one drag gesture into the single intent the board
//! should act on. The same reconciler serves the board, the calendar and the
//! local-only board; only its `MutationTarget` differs.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::fields::{DragType, MutationTarget, Role};

/// Droppable id of the calendar bucket holding tasks without a deadline.
pub const UNSCHEDULED_BUCKET: &str = "unscheduled";

/// Prefix of calendar day droppable ids, followed by `YYYY-MM-DD`.
pub const CALENDAR_DAY_PREFIX: &str = "calendar-day-";

/// A position inside a droppable bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub droppable_id: String,
    pub index: usize,
}

impl Location {
    pub fn new(droppable_id: &str, index: usize) -> Self {
        Location {
            droppable_id: droppable_id.to_string(),
            index,
        }
    }
}

/// Outcome of a drag gesture. `destination` is `None` when the drop was
/// cancelled or landed outside any bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragResult {
    pub draggable_id: String,
    pub drag_type: DragType,
    pub source: Location,
    pub destination: Option<Location>,
}

impl DragResult {
    pub fn card(draggable_id: &str, source: Location, destination: Option<Location>) -> Self {
        DragResult {
            draggable_id: draggable_id.to_string(),
            drag_type: DragType::Card,
            source,
            destination,
        }
    }

    pub fn column(draggable_id: &str, source: Location, destination: Option<Location>) -> Self {
        DragResult {
            draggable_id: draggable_id.to_string(),
            drag_type: DragType::Column,
            source,
            destination,
        }
    }
}

/// What a drag resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// The caller may not drag.
    Denied,
    /// Nothing to do.
    NoOp,
    /// Move a column within the view's column order.
    ReorderColumns { from: usize, to: usize },
    /// Move a card within its own bucket.
    ReorderCards {
        bucket_id: String,
        task_id: String,
        from: usize,
        to: usize,
    },
    /// Move a card to another bucket without telling the server.
    MoveLocal {
        task_id: String,
        status_id: String,
        index: usize,
    },
    /// Persist a new status for the task.
    MoveStatus { task_id: String, status_id: String },
    /// Persist a new deadline for the task; `None` clears it.
    SetDeadline {
        task_id: String,
        deadline: Option<DateTime<Utc>>,
    },
}

impl Intent {
    /// Whether acting on this intent needs a server round trip.
    pub fn is_remote(&self) -> bool {
        matches!(self, Intent::MoveStatus { .. } | Intent::SetDeadline { .. })
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Intent::ReorderCards { task_id, .. }
            | Intent::MoveLocal { task_id, .. }
            | Intent::MoveStatus { task_id, .. }
            | Intent::SetDeadline { task_id, .. } => Some(task_id.as_str()),
            _ => None,
        }
    }
}

/// The one place that decides whether a role may drag. Denial is silent.
pub fn authorize_drag(role: Role) -> bool {
    !matches!(role, Role::Viewer)
}

/// Drag reconciler parameterised by where cross-bucket drops are written.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    target: MutationTarget,
}

impl Reconciler {
    pub fn new(target: MutationTarget) -> Self {
        Reconciler { target }
    }

    pub fn target(&self) -> MutationTarget {
        self.target
    }

    pub fn reconcile(&self, role: Role, drag: &DragResult) -> Intent {
        if !authorize_drag(role) {
            return Intent::Denied;
        }
        let Some(destination) = &drag.destination else {
            return Intent::NoOp;
        };
        if *destination == drag.source {
            return Intent::NoOp;
        }

        if drag.drag_type == DragType::Column {
            return Intent::ReorderColumns {
                from: drag.source.index,
                to: destination.index,
            };
        }

        if destination.droppable_id == drag.source.droppable_id {
            return Intent::ReorderCards {
                bucket_id: destination.droppable_id.clone(),
                task_id: drag.draggable_id.clone(),
                from: drag.source.index,
                to: destination.index,
            };
        }

        let task_id = drag.draggable_id.clone();
        match self.target {
            MutationTarget::Status => Intent::MoveStatus {
                task_id,
                status_id: destination.droppable_id.clone(),
            },
            MutationTarget::LocalOnly => Intent::MoveLocal {
                task_id,
                status_id: destination.droppable_id.clone(),
                index: destination.index,
            },
            MutationTarget::Deadline => {
                if destination.droppable_id == UNSCHEDULED_BUCKET {
                    return Intent::SetDeadline { task_id, deadline: None };
                }
                match parse_calendar_bucket(&destination.droppable_id) {
                    Some(day) => Intent::SetDeadline {
                        task_id,
                        deadline: Some(start_of_day_utc(day)),
                    },
                    None => {
                        debug!(bucket = %destination.droppable_id, "drop on unknown calendar bucket");
                        Intent::NoOp
                    }
                }
            }
        }
    }
}

pub fn calendar_bucket_id(day: NaiveDate) -> String {
    format!("{CALENDAR_DAY_PREFIX}{}", day.format("%Y-%m-%d"))
}

pub fn parse_calendar_bucket(id: &str) -> Option<NaiveDate> {
    let day = id.strip_prefix(CALENDAR_DAY_PREFIX)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Midnight UTC at the start of `day`.
pub fn start_of_day_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Splice the element at `from` out and reinsert it at `to` (clamped to the
/// end). Returns false when `from` is out of range.
pub fn reorder<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() {
        return false;
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
    true
}

/// Move the element at `from` in `source` to index `to` of `destination`.
pub fn move_between<T>(source: &mut Vec<T>, from: usize, destination: &mut Vec<T>, to: usize) -> bool {
    if from >= source.len() {
        return false;
    }
    let item = source.remove(from);
    let to = to.min(destination.len());
    destination.insert(to, item);
    true
}
