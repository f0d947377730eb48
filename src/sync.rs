//! Board synchronisation.
//!
//! `BoardSync` ties a drag to the cache and the API: reconcile the gesture,
//! patch the cache synchronously, then persist in the background and refetch
//! once the server answers. Failures roll back by refetching and are never
//! surfaced to the views.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::TaskApi;
use crate::cache::{MoveState, TaskCache};
use crate::error::ApiError;
use crate::fields::{MutationTarget, Role};
use crate::reconciler::{DragResult, Intent, Reconciler};
use crate::task::TaskPatch;

/// What `dispatch` did with a drag.
#[derive(Debug)]
pub enum Dispatch {
    /// Denied or nothing to do. No state changed.
    Ignored(Intent),
    /// A view-local change for the caller to apply to its layout.
    Local(Intent),
    /// The cache was patched and a server call is in flight. The handle
    /// resolves to `Confirmed` or `RolledBack` once the refetch has landed.
    Remote {
        intent: Intent,
        handle: JoinHandle<MoveState>,
    },
}

impl Dispatch {
    pub fn intent(&self) -> &Intent {
        match self {
            Dispatch::Ignored(intent) | Dispatch::Local(intent) => intent,
            Dispatch::Remote { intent, .. } => intent,
        }
    }
}

/// Drag-to-mutation pipeline for one project.
#[derive(Clone)]
pub struct BoardSync {
    api: Arc<dyn TaskApi>,
    cache: TaskCache,
    project: String,
    reconciler: Reconciler,
}

impl BoardSync {
    pub fn new(api: Arc<dyn TaskApi>, cache: TaskCache, project: &str, target: MutationTarget) -> Self {
        BoardSync {
            api,
            cache,
            project: project.to_string(),
            reconciler: Reconciler::new(target),
        }
    }

    /// Same pipeline writing cross-bucket drops to a different target.
    pub fn retarget(&self, target: MutationTarget) -> Self {
        BoardSync {
            reconciler: Reconciler::new(target),
            ..self.clone()
        }
    }

    pub fn api(&self) -> &Arc<dyn TaskApi> {
        &self.api
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn target(&self) -> MutationTarget {
        self.reconciler.target()
    }

    /// Load the task and status lists into the cache.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let (tasks, statuses) = tokio::try_join!(self.api.fetch_tasks(), self.api.fetch_statuses())?;
        debug!(project = %self.project, tasks = tasks.len(), statuses = statuses.len(), "refreshed");
        self.cache.replace_tasks(&self.project, tasks);
        self.cache.replace_statuses(&self.project, statuses);
        Ok(())
    }

    /// Act on one drag. The optimistic patch is in the cache by the time this
    /// returns; the server call runs on the tokio runtime.
    pub fn dispatch(&self, role: Role, drag: &DragResult) -> Dispatch {
        let intent = self.reconciler.reconcile(role, drag);
        if matches!(intent, Intent::Denied | Intent::NoOp) {
            return Dispatch::Ignored(intent);
        }
        if let Intent::MoveLocal { task_id, status_id, .. } = &intent {
            let status_id = status_id.clone();
            self.cache
                .patch_task(&self.project, task_id, |t| t.status_id = status_id);
        }
        if !intent.is_remote() {
            return Dispatch::Local(intent);
        }

        self.apply_optimistic(&intent);
        let this = self.clone();
        let pending = intent.clone();
        let handle = tokio::spawn(async move { this.persist(pending).await });
        Dispatch::Remote { intent, handle }
    }

    fn apply_optimistic(&self, intent: &Intent) {
        let (task_id, patch) = match intent {
            Intent::MoveStatus { task_id, status_id } => (
                task_id,
                TaskPatch {
                    status_id: Some(status_id.clone()),
                    ..Default::default()
                },
            ),
            Intent::SetDeadline { task_id, deadline } => (task_id, TaskPatch::deadline(*deadline)),
            _ => return,
        };
        if self.cache.apply_optimistic(&self.project, task_id, patch).is_none() {
            debug!(%task_id, "task not cached, nothing to patch");
        }
    }

    async fn persist(&self, intent: Intent) -> MoveState {
        let result = match &intent {
            Intent::MoveStatus { task_id, status_id } => self
                .api
                .update_task_status(task_id, status_id)
                .await
                .map(|_| ()),
            Intent::SetDeadline { task_id, deadline } => self
                .api
                .update_task(task_id, &TaskPatch::deadline(*deadline))
                .await
                .map(|_| ()),
            _ => Ok(()),
        };
        let task_id = intent.task_id().unwrap_or_default();
        match result {
            Ok(()) => self.settle_success(task_id).await,
            Err(err) => self.settle_failure(task_id, err).await,
        }
    }

    async fn settle_success(&self, task_id: &str) -> MoveState {
        info!(%task_id, project = %self.project, "move confirmed");
        self.cache.finish_optimistic(task_id, MoveState::Confirmed);
        self.revalidate(task_id).await;
        self.cache.settle(task_id);
        MoveState::Confirmed
    }

    /// The soft-fail policy for drag mutations: log, roll back by refetching
    /// the server's lists, and never hand the error to the caller.
    async fn settle_failure(&self, task_id: &str, err: ApiError) -> MoveState {
        warn!(%task_id, project = %self.project, error = %err, "move failed, rolling back to server state");
        self.cache.finish_optimistic(task_id, MoveState::RolledBack);
        self.revalidate(task_id).await;
        self.cache.settle(task_id);
        MoveState::RolledBack
    }

    /// Invalidate and refetch the task list and the task's detail entry.
    async fn revalidate(&self, task_id: &str) {
        self.cache.invalidate_tasks(&self.project);
        self.cache.invalidate_task(task_id);
        match self.api.fetch_tasks().await {
            Ok(tasks) => self.cache.replace_tasks(&self.project, tasks),
            Err(e) => warn!(project = %self.project, error = %e, "refetch failed, task list left stale"),
        }
        if self.cache.detail(task_id).is_some() {
            match self.api.fetch_task(task_id).await {
                Ok(task) => self.cache.replace_detail(task),
                Err(e) => warn!(%task_id, error = %e, "detail refetch failed"),
            }
        }
    }
}
