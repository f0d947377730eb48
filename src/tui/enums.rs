//! Enumerations for TUI state management.

use crate::reconciler::Location;

/// What the main area is showing on top of the current view.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AppState {
    Browse,
    Detail,
    Filter,
    Help,
}

/// A card picked up with the keyboard. `bucket`/`index` is where it would
/// land if dropped now.
#[derive(Clone, PartialEq, Debug)]
pub struct DragState {
    pub task_id: String,
    pub source: Location,
    pub bucket: usize,
    pub index: usize,
}

impl DragState {
    pub fn new(task_id: &str, source: Location, bucket: usize) -> Self {
        let index = source.index;
        DragState {
            task_id: task_id.to_string(),
            source,
            bucket,
            index,
        }
    }
}
