//! REST client for the task backend.
//!
//! `TaskApi` is the seam between the board logic and the network: the real
//! implementation is `HttpApi`, the tests use an in-memory double. Every
//! request carries the bearer token and the active project header.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::task::{Comment, Member, NewStatus, NewTask, Status, StatusPatch, Task, TaskPatch};

/// Header naming the project the request acts on.
pub const PROJECT_HEADER: &str = "X-Project-Id";

/// Operations the client needs from the backend, scoped to one active project.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiError>;

    async fn fetch_task(&self, task_id: &str) -> Result<Task, ApiError>;

    async fn fetch_statuses(&self) -> Result<Vec<Status>, ApiError>;

    async fn update_task_status(&self, task_id: &str, status_id: &str) -> Result<Task, ApiError>;

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, ApiError>;

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError>;

    async fn delete_task(&self, task_id: &str) -> Result<(), ApiError>;

    async fn create_status(&self, status: &NewStatus) -> Result<Status, ApiError>;

    async fn update_status(&self, status_id: &str, patch: &StatusPatch) -> Result<Status, ApiError>;

    async fn delete_status(&self, status_id: &str) -> Result<(), ApiError>;

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, ApiError>;

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ApiError>;

    async fn list_members(&self) -> Result<Vec<Member>, ApiError>;
}

/// `TaskApi` over HTTP with `reqwest`.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
    project: String,
}

impl HttpApi {
    pub fn new(config: &Config) -> Self {
        HttpApi {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            project: config.project.clone(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Base URL with `segments` appended. Each segment is percent-encoded, so
    /// ids containing `/`, `?` or spaces stay a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let bad = |reason: String| ApiError::BadUrl {
            base: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| bad(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| bad("not a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<(RequestBuilder, String), ApiError> {
        let url = self.url(segments)?;
        let label = url.to_string();
        let builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(PROJECT_HEADER, &self.project);
        Ok((builder, label))
    }

    async fn send(builder: RequestBuilder, url: &str) -> Result<reqwest::Response, ApiError> {
        debug!(%url, "api request");
        let resp = builder.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ApiError> {
        let (builder, url) = self.request(Method::GET, path)?;
        let resp = Self::send(builder, &url).await?;
        resp.json::<T>().await.map_err(|source| ApiError::Decode { url, source })
    }

    async fn send_json<B, T>(&self, method: Method, path: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let (builder, url) = self.request(method, path)?;
        let resp = Self::send(builder.json(body), &url).await?;
        resp.json::<T>().await.map_err(|source| ApiError::Decode { url, source })
    }

    async fn delete(&self, path: &[&str]) -> Result<(), ApiError> {
        let (builder, url) = self.request(Method::DELETE, path)?;
        Self::send(builder, &url).await?;
        Ok(())
    }
}

/// Keep the valid records of a task list. One bad record should not hide
/// the rest of the board, so invalid ones are logged and skipped.
fn checked_tasks(tasks: Vec<Task>) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| match task.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "skipping invalid task record");
                false
            }
        })
        .collect()
}

fn checked_task(task: Task) -> Result<Task, ApiError> {
    task.validate()?;
    Ok(task)
}

fn checked_status(status: Status) -> Result<Status, ApiError> {
    status.validate()?;
    Ok(status)
}

#[async_trait]
impl TaskApi for HttpApi {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let tasks = self.get_json(&["projects", self.project.as_str(), "tasks"]).await?;
        Ok(checked_tasks(tasks))
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Task, ApiError> {
        checked_task(self.get_json(&["tasks", task_id]).await?)
    }

    async fn fetch_statuses(&self) -> Result<Vec<Status>, ApiError> {
        let statuses: Vec<Status> = self.get_json(&["projects", self.project.as_str(), "statuses"]).await?;
        statuses.iter().try_for_each(Status::validate)?;
        Ok(statuses)
    }

    async fn update_task_status(&self, task_id: &str, status_id: &str) -> Result<Task, ApiError> {
        let body = serde_json::json!({ "statusId": status_id });
        let task = self
            .send_json(Method::PATCH, &["tasks", task_id, "status"], &body)
            .await?;
        checked_task(task)
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, ApiError> {
        let task = self.send_json(Method::PATCH, &["tasks", task_id], patch).await?;
        checked_task(task)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let created = self
            .send_json(Method::POST, &["projects", self.project.as_str(), "tasks"], task)
            .await?;
        checked_task(created)
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), ApiError> {
        self.delete(&["tasks", task_id]).await
    }

    async fn create_status(&self, status: &NewStatus) -> Result<Status, ApiError> {
        let created = self
            .send_json(Method::POST, &["projects", self.project.as_str(), "statuses"], status)
            .await?;
        checked_status(created)
    }

    async fn update_status(&self, status_id: &str, patch: &StatusPatch) -> Result<Status, ApiError> {
        let updated = self
            .send_json(Method::PATCH, &["statuses", status_id], patch)
            .await?;
        checked_status(updated)
    }

    async fn delete_status(&self, status_id: &str) -> Result<(), ApiError> {
        self.delete(&["statuses", status_id]).await
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.get_json(&["tasks", task_id, "comments"]).await
    }

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ApiError> {
        let body = serde_json::json!({ "content": content });
        self.send_json(Method::POST, &["tasks", task_id, "comments"], &body)
            .await
    }

    async fn list_members(&self) -> Result<Vec<Member>, ApiError> {
        self.get_json(&["projects", self.project.as_str(), "members"]).await
    }
}

/// In-memory backend for tests. Holds the server's view of the project and
/// records every call. Status updates can be held back behind a gate to
/// observe the client before the response arrives.
#[cfg(test)]
pub mod mock {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use super::*;

    #[derive(Default)]
    struct ServerState {
        tasks: Vec<Task>,
        statuses: Vec<Status>,
        comments: Vec<Comment>,
        members: Vec<Member>,
        calls: Vec<String>,
        fail_mutations: bool,
    }

    #[derive(Clone, Default)]
    pub struct MockApi {
        state: Arc<Mutex<ServerState>>,
        gate: Option<Arc<Semaphore>>,
    }

    fn server_error(what: &str) -> ApiError {
        ApiError::Status {
            url: format!("mock://{what}"),
            status: 500,
            body: "boom".into(),
        }
    }

    impl MockApi {
        pub fn new(tasks: Vec<Task>, statuses: Vec<Status>) -> Self {
            let api = MockApi::default();
            {
                let mut state = api.state.lock();
                state.tasks = tasks;
                state.statuses = statuses;
            }
            api
        }

        /// Hold every mutation until `release` is called.
        pub fn gated(mut self) -> Self {
            self.gate = Some(Arc::new(Semaphore::new(0)));
            self
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        pub fn fail_mutations(&self) {
            self.state.lock().fail_mutations = true;
        }

        pub fn with_members(self, members: Vec<Member>) -> Self {
            self.state.lock().members = members;
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.state.lock().calls.clone()
        }

        pub fn mutation_calls(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| !c.starts_with("fetch") && !c.starts_with("list"))
                .collect()
        }

        pub fn server_tasks(&self) -> Vec<Task> {
            self.state.lock().tasks.clone()
        }

        fn record(&self, call: String) {
            self.state.lock().calls.push(call);
        }

        async fn wait_gate(&self) {
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
            }
        }

        fn mutate_task(&self, task_id: &str, f: impl FnOnce(&mut Task)) -> Result<Task, ApiError> {
            let mut state = self.state.lock();
            if state.fail_mutations {
                return Err(server_error(task_id));
            }
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| server_error(task_id))?;
            f(task);
            Ok(task.clone())
        }
    }

    #[async_trait]
    impl TaskApi for MockApi {
        async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiError> {
            self.record("fetch_tasks".into());
            Ok(self.state.lock().tasks.clone())
        }

        async fn fetch_task(&self, task_id: &str) -> Result<Task, ApiError> {
            self.record(format!("fetch_task {task_id}"));
            let state = self.state.lock();
            state
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
                .ok_or_else(|| server_error(task_id))
        }

        async fn fetch_statuses(&self) -> Result<Vec<Status>, ApiError> {
            self.record("fetch_statuses".into());
            Ok(self.state.lock().statuses.clone())
        }

        async fn update_task_status(&self, task_id: &str, status_id: &str) -> Result<Task, ApiError> {
            self.record(format!("update_task_status {task_id} {status_id}"));
            self.wait_gate().await;
            let status_id = status_id.to_string();
            self.mutate_task(task_id, move |t| t.status_id = status_id)
        }

        async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, ApiError> {
            let body = serde_json::to_string(patch).unwrap_or_default();
            self.record(format!("update_task {task_id} {body}"));
            self.wait_gate().await;
            self.mutate_task(task_id, |t| patch.apply_to(t))
        }

        async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
            self.record(format!("create_task {}", task.name));
            let mut state = self.state.lock();
            let mut created = Task::new(&format!("t{}", state.tasks.len() + 1), &task.name, &task.status_id);
            created.description = task.description.clone();
            created.priority = task.priority;
            created.deadline = task.deadline;
            created.parent_task_id = task.parent_task_id.clone();
            state.tasks.push(created.clone());
            Ok(created)
        }

        async fn delete_task(&self, task_id: &str) -> Result<(), ApiError> {
            self.record(format!("delete_task {task_id}"));
            self.state.lock().tasks.retain(|t| t.id != task_id);
            Ok(())
        }

        async fn create_status(&self, status: &NewStatus) -> Result<Status, ApiError> {
            self.record(format!("create_status {}", status.name));
            let mut state = self.state.lock();
            let created = Status::new(&format!("s{}", state.statuses.len() + 1), &status.name, status.position);
            state.statuses.push(created.clone());
            Ok(created)
        }

        async fn update_status(&self, status_id: &str, patch: &StatusPatch) -> Result<Status, ApiError> {
            self.record(format!("update_status {status_id}"));
            let mut state = self.state.lock();
            let status = state
                .statuses
                .iter_mut()
                .find(|s| s.id == status_id)
                .ok_or_else(|| server_error(status_id))?;
            if let Some(name) = &patch.name {
                status.name = name.clone();
            }
            if patch.position.is_some() {
                status.position = patch.position;
            }
            Ok(status.clone())
        }

        async fn delete_status(&self, status_id: &str) -> Result<(), ApiError> {
            self.record(format!("delete_status {status_id}"));
            self.state.lock().statuses.retain(|s| s.id != status_id);
            Ok(())
        }

        async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, ApiError> {
            self.record(format!("list_comments {task_id}"));
            let state = self.state.lock();
            Ok(state.comments.iter().filter(|c| c.task_id == task_id).cloned().collect())
        }

        async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ApiError> {
            self.record(format!("add_comment {task_id}"));
            let mut state = self.state.lock();
            let comment = Comment {
                id: format!("c{}", state.comments.len() + 1),
                task_id: task_id.to_string(),
                author: crate::task::UserRef {
                    id: "u1".into(),
                    name: "Tester".into(),
                    email: None,
                },
                content: content.to_string(),
                created_at: None,
            };
            state.comments.push(comment.clone());
            Ok(comment)
        }

        async fn list_members(&self) -> Result<Vec<Member>, ApiError> {
            self.record("list_members".into());
            Ok(self.state.lock().members.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> Config {
        Config {
            api_url: url.to_string(),
            token: "secret".into(),
            project: "p1".into(),
            user_id: None,
            role: None,
            data_dir: std::path::PathBuf::from("/tmp"),
        }
    }

    #[test]
    fn test_url_joins_without_double_slashes() {
        let api = HttpApi::new(&config("https://api.example.com/v1/"));
        assert_eq!(
            api.url(&["projects", "p1", "tasks"]).unwrap().as_str(),
            "https://api.example.com/v1/projects/p1/tasks"
        );
        assert_eq!(api.url(&["tasks", "t1"]).unwrap().as_str(), "https://api.example.com/v1/tasks/t1");
        assert_eq!(api.project(), "p1");

        let bare = HttpApi::new(&config("https://api.example.com"));
        assert_eq!(bare.url(&["tasks", "t1"]).unwrap().as_str(), "https://api.example.com/tasks/t1");
    }

    #[test]
    fn test_ids_stay_one_path_segment() {
        let api = HttpApi::new(&config("https://api.example.com/v1"));
        let url = api.url(&["tasks", "a/b c?x", "status"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/tasks/a%2Fb%20c%3Fx/status");
        assert_eq!(url.path_segments().unwrap().count(), 4);
        assert!(url.query().is_none());
    }

    #[test]
    fn test_unparseable_base_url_is_an_error() {
        let api = HttpApi::new(&config("not a url"));
        assert!(matches!(api.url(&["tasks"]), Err(ApiError::BadUrl { .. })));
        assert!(api.request(Method::GET, &["tasks"]).is_err());
    }

    #[test]
    fn test_request_carries_token_and_project_header() {
        let api = HttpApi::new(&config("https://api.example.com"));
        let (builder, url) = api.request(Method::GET, &["projects", "p1", "statuses"]).unwrap();
        let req = builder.build().unwrap();
        assert_eq!(url, "https://api.example.com/projects/p1/statuses");
        assert_eq!(req.headers()["authorization"], "Bearer secret");
        assert_eq!(req.headers()[PROJECT_HEADER], "p1");
    }

    #[test]
    fn test_checked_tasks_skips_invalid_records() {
        let good = Task::new("t1", "Ok", "todo");
        let bad = Task::new("t2", "", "todo");
        let also_good = Task::new("t3", "Fine", "done");
        assert_eq!(
            checked_tasks(vec![good.clone(), bad, also_good.clone()]),
            vec![good, also_good]
        );
        assert!(checked_tasks(vec![Task::new("", "No id", "todo")]).is_empty());
    }
}
