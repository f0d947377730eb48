//! Shared task cache.
//!
//! The cache is the single shared mutable resource of the client: every view
//! reads from it, optimistic patches write to it and refetches replace it.
//! Writes are read-then-replace on whole lists, so the last writer wins.
//!
//! Optimistic patches are remembered per task while their server call is in
//! flight, and re-applied on top of every list the server hands back. A
//! refetch triggered by one drag therefore cannot undo another drag that is
//! still waiting for its answer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::task::{Status, Task, TaskPatch};

/// Where a single task is in the life of one drag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MoveState {
    #[default]
    Settled,
    OptimisticallyMoved,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Default)]
struct ProjectEntry {
    tasks: Vec<Task>,
    tasks_stale: bool,
    tasks_loaded: bool,
    statuses: Vec<Status>,
    statuses_loaded: bool,
}

#[derive(Debug)]
struct DetailEntry {
    task: Task,
    stale: bool,
}

/// Optimistic changes to one task whose server calls have not answered yet.
#[derive(Debug)]
struct PendingPatch {
    project: String,
    patch: TaskPatch,
    in_flight: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    projects: HashMap<String, ProjectEntry>,
    details: HashMap<String, DetailEntry>,
    moves: HashMap<String, MoveState>,
    pending: HashMap<String, PendingPatch>,
}

impl CacheInner {
    fn patch_in_place(&mut self, project: &str, task_id: &str, f: impl FnOnce(&mut Task)) -> Option<Task> {
        let entry = self.projects.get_mut(project)?;
        let idx = entry.tasks.iter().position(|t| t.id == task_id)?;
        let previous = entry.tasks[idx].clone();

        let mut next = entry.tasks.clone();
        f(&mut next[idx]);
        entry.tasks = next;

        let patched = entry.tasks[idx].clone();
        if let Some(detail) = self.details.get_mut(task_id) {
            detail.task = patched;
        }
        Some(previous)
    }
}

/// Cheaply cloneable handle to the shared cache.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a project's task list.
    pub fn tasks(&self, project: &str) -> Vec<Task> {
        self.inner
            .read()
            .projects
            .get(project)
            .map(|p| p.tasks.clone())
            .unwrap_or_default()
    }

    pub fn task(&self, project: &str, task_id: &str) -> Option<Task> {
        let inner = self.inner.read();
        inner
            .projects
            .get(project)?
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
    }

    pub fn statuses(&self, project: &str) -> Vec<Status> {
        self.inner
            .read()
            .projects
            .get(project)
            .map(|p| p.statuses.clone())
            .unwrap_or_default()
    }

    /// True once a task list has been installed for the project.
    pub fn is_loaded(&self, project: &str) -> bool {
        self.inner
            .read()
            .projects
            .get(project)
            .map_or(false, |p| p.tasks_loaded && p.statuses_loaded)
    }

    /// True when the task list has been invalidated and not yet refetched.
    pub fn is_stale(&self, project: &str) -> bool {
        self.inner
            .read()
            .projects
            .get(project)
            .map_or(true, |p| p.tasks_stale || !p.tasks_loaded)
    }

    /// Install a fresh task list from the server.
    pub fn replace_tasks(&self, project: &str, tasks: Vec<Task>) {
        let mut inner = self.inner.write();
        let CacheInner { projects, pending, .. } = &mut *inner;
        let entry = projects.entry(project.to_string()).or_default();
        entry.tasks = tasks;
        entry.tasks_stale = false;
        entry.tasks_loaded = true;

        for (task_id, p) in pending.iter().filter(|(_, p)| p.project == project) {
            if let Some(task) = entry.tasks.iter_mut().find(|t| &t.id == task_id) {
                p.patch.apply_to(task);
            }
        }
    }

    pub fn replace_statuses(&self, project: &str, statuses: Vec<Status>) {
        let mut inner = self.inner.write();
        let entry = inner.projects.entry(project.to_string()).or_default();
        entry.statuses = statuses;
        entry.statuses_loaded = true;
    }

    /// Replace the task list with a copy in which `f` has been applied to the
    /// task with `task_id`. Returns the task as it was before the patch, or
    /// `None` when the task is not cached.
    pub fn patch_task(&self, project: &str, task_id: &str, f: impl FnOnce(&mut Task)) -> Option<Task> {
        self.inner.write().patch_in_place(project, task_id, f)
    }

    /// Apply `patch` now and keep re-applying it over refetched lists until
    /// `finish_optimistic` has been called once for every call to this.
    /// The task is marked `OptimisticallyMoved` even when it is not cached.
    pub fn apply_optimistic(&self, project: &str, task_id: &str, patch: TaskPatch) -> Option<Task> {
        let mut inner = self.inner.write();
        let previous = inner.patch_in_place(project, task_id, |t| patch.apply_to(t));
        let pending = inner.pending.entry(task_id.to_string()).or_insert_with(|| PendingPatch {
            project: project.to_string(),
            patch: TaskPatch::default(),
            in_flight: 0,
        });
        pending.patch.merge(patch);
        pending.in_flight += 1;
        inner
            .moves
            .insert(task_id.to_string(), MoveState::OptimisticallyMoved);
        previous
    }

    /// One server call for the task has answered. Once none are left the
    /// pending patch is dropped, so the next refetch shows the server's value,
    /// and the move state becomes `outcome`. While later calls for the same
    /// task are still in flight the task stays `OptimisticallyMoved`.
    pub fn finish_optimistic(&self, task_id: &str, outcome: MoveState) {
        let mut inner = self.inner.write();
        let done = match inner.pending.get_mut(task_id) {
            Some(p) => {
                p.in_flight = p.in_flight.saturating_sub(1);
                p.in_flight == 0
            }
            None => true,
        };
        if done {
            inner.pending.remove(task_id);
            inner.moves.insert(task_id.to_string(), outcome);
        }
    }

    /// Clear the move state unless another call for the task is in flight.
    pub fn settle(&self, task_id: &str) {
        let mut inner = self.inner.write();
        if !inner.pending.contains_key(task_id) {
            inner.moves.remove(task_id);
        }
    }

    /// Remove a task from the cached list, e.g. after a delete.
    pub fn remove_task(&self, project: &str, task_id: &str) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.projects.get_mut(project) {
            entry.tasks.retain(|t| t.id != task_id);
        }
        inner.details.remove(task_id);
        inner.moves.remove(task_id);
        inner.pending.remove(task_id);
    }

    /// Mark the task list for refetch. Views keep showing the old list until
    /// the refetch lands.
    pub fn invalidate_tasks(&self, project: &str) {
        if let Some(entry) = self.inner.write().projects.get_mut(project) {
            entry.tasks_stale = true;
        }
    }

    pub fn detail(&self, task_id: &str) -> Option<Task> {
        self.inner.read().details.get(task_id).map(|d| d.task.clone())
    }

    pub fn is_detail_stale(&self, task_id: &str) -> bool {
        self.inner.read().details.get(task_id).map_or(true, |d| d.stale)
    }

    pub fn replace_detail(&self, mut task: Task) {
        let mut inner = self.inner.write();
        if let Some(p) = inner.pending.get(&task.id) {
            p.patch.apply_to(&mut task);
        }
        inner.details.insert(
            task.id.clone(),
            DetailEntry { task, stale: false },
        );
    }

    pub fn invalidate_task(&self, task_id: &str) {
        if let Some(detail) = self.inner.write().details.get_mut(task_id) {
            detail.stale = true;
        }
    }

    pub fn move_state(&self, task_id: &str) -> MoveState {
        self.inner.read().moves.get(task_id).copied().unwrap_or_default()
    }

    /// Number of tasks with a move that has not settled yet.
    pub fn pending_moves(&self) -> usize {
        self.inner.read().moves.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> TaskCache {
        let cache = TaskCache::new();
        cache.replace_tasks("p", vec![Task::new("t1", "One", "todo"), Task::new("t2", "Two", "todo")]);
        cache.replace_statuses("p", vec![Status::new("todo", "To Do", Some(0))]);
        cache
    }

    #[test]
    fn test_patch_replaces_list_and_returns_previous() {
        let cache = seeded();
        let before = cache.tasks("p");
        let previous = cache.patch_task("p", "t1", |t| t.status_id = "done".into());

        assert_eq!(previous.map(|t| t.status_id), Some("todo".to_string()));
        assert_eq!(cache.task("p", "t1").unwrap().status_id, "done");
        // Earlier snapshots are unaffected.
        assert_eq!(before[0].status_id, "todo");
        assert!(cache.patch_task("p", "missing", |t| t.name.clear()).is_none());
        assert!(cache.patch_task("other", "t1", |t| t.name.clear()).is_none());
    }

    #[test]
    fn test_patch_keeps_detail_entry_in_step() {
        let cache = seeded();
        cache.replace_detail(Task::new("t1", "One", "todo"));
        cache.patch_task("p", "t1", |t| t.status_id = "done".into());
        assert_eq!(cache.detail("t1").unwrap().status_id, "done");
    }

    #[test]
    fn test_invalidate_then_replace_clears_staleness() {
        let cache = seeded();
        assert!(!cache.is_stale("p"));
        cache.invalidate_tasks("p");
        assert!(cache.is_stale("p"));
        assert_eq!(cache.tasks("p").len(), 2);
        cache.replace_tasks("p", vec![]);
        assert!(!cache.is_stale("p"));
        assert!(cache.is_stale("unknown"));

        cache.replace_detail(Task::new("t1", "One", "todo"));
        assert!(!cache.is_detail_stale("t1"));
        cache.invalidate_task("t1");
        assert!(cache.is_detail_stale("t1"));
    }

    #[test]
    fn test_move_states_count_until_settled() {
        let cache = seeded();
        assert_eq!(cache.move_state("t1"), MoveState::Settled);
        cache.apply_optimistic("p", "t1", TaskPatch::deadline(None));
        cache.apply_optimistic("p", "t2", TaskPatch::deadline(None));
        cache.finish_optimistic("t2", MoveState::RolledBack);
        assert_eq!(cache.move_state("t2"), MoveState::RolledBack);
        assert_eq!(cache.pending_moves(), 2);
        cache.finish_optimistic("t1", MoveState::Confirmed);
        cache.settle("t1");
        assert_eq!(cache.pending_moves(), 1);
        assert_eq!(cache.move_state("t1"), MoveState::Settled);
    }

    #[test]
    fn test_clones_share_state() {
        let cache = seeded();
        let other = cache.clone();
        other.remove_task("p", "t2");
        assert_eq!(cache.tasks("p").len(), 1);
        assert!(cache.is_loaded("p"));
    }

    fn to_done() -> TaskPatch {
        TaskPatch {
            status_id: Some("done".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_refetch_keeps_other_in_flight_patches() {
        let cache = seeded();
        cache.apply_optimistic("p", "t1", to_done());
        cache.apply_optimistic("p", "t2", to_done());

        // t1's call answered; the server has t1 moved but not t2 yet.
        cache.finish_optimistic("t1", MoveState::Confirmed);
        cache.replace_tasks("p", vec![Task::new("t1", "One", "done"), Task::new("t2", "Two", "todo")]);

        assert_eq!(cache.task("p", "t1").unwrap().status_id, "done");
        assert_eq!(cache.task("p", "t2").unwrap().status_id, "done");
        assert_eq!(cache.move_state("t2"), MoveState::OptimisticallyMoved);
        cache.settle("t1");
        assert_eq!(cache.pending_moves(), 1);

        // Once t2 answers too, the server's value is shown as is.
        cache.finish_optimistic("t2", MoveState::RolledBack);
        cache.replace_tasks("p", vec![Task::new("t1", "One", "done"), Task::new("t2", "Two", "todo")]);
        assert_eq!(cache.task("p", "t2").unwrap().status_id, "todo");
        cache.settle("t2");
        assert_eq!(cache.pending_moves(), 0);
    }

    #[test]
    fn test_second_move_of_same_task_outlives_the_first_answer() {
        let cache = seeded();
        cache.replace_detail(Task::new("t1", "One", "todo"));
        cache.apply_optimistic("p", "t1", TaskPatch {
            status_id: Some("doing".into()),
            ..Default::default()
        });
        cache.apply_optimistic("p", "t1", to_done());

        cache.finish_optimistic("t1", MoveState::Confirmed);
        cache.settle("t1");
        assert_eq!(cache.move_state("t1"), MoveState::OptimisticallyMoved);

        cache.replace_tasks("p", vec![Task::new("t1", "One", "doing"), Task::new("t2", "Two", "todo")]);
        cache.replace_detail(Task::new("t1", "One", "doing"));
        assert_eq!(cache.task("p", "t1").unwrap().status_id, "done");
        assert_eq!(cache.detail("t1").unwrap().status_id, "done");

        cache.finish_optimistic("t1", MoveState::Confirmed);
        assert_eq!(cache.move_state("t1"), MoveState::Confirmed);
        cache.settle("t1");
        assert_eq!(cache.move_state("t1"), MoveState::Settled);
    }
}
