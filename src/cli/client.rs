//! HTTP client for the `find` and `status` commands.

use crate::server::{CreateTaskResponse, TaskView};
use crate::types::{TaskId, TaskStatus};
use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Thin client over the request server's JSON API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn create_task(&self, from: &str, to: &str) -> Result<TaskId> {
        let response = self
            .http
            .post(format!("{}/api/tasks", self.base_url))
            .json(&serde_json::json!({ "from": from, "to": to }))
            .send()
            .await?;

        let created: CreateTaskResponse = decode(response).await?;
        Ok(created.id)
    }

    pub async fn get_task(&self, id: &str) -> Result<TaskView> {
        let response = self
            .http
            .get(format!("{}/api/tasks/{}", self.base_url, id))
            .send()
            .await?;
        decode(response).await
    }

    /// Poll until the task is done or `timeout` elapses.
    pub async fn wait_for(&self, id: &str, poll: Duration, timeout: Duration) -> Result<TaskView> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.get_task(id).await?;
            if task.status == TaskStatus::Done {
                return Ok(task);
            }
            debug!(task_id = id, status = %task.status, "waiting for the task");

            if tokio::time::Instant::now() + poll > deadline {
                bail!("task {} still {} after {:?}", id, task.status, timeout);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => Err(anyhow!("{} ({}): {}", status, body.code, body.message)),
        Err(_) => Err(anyhow!("request failed with {}", status)),
    }
}

/// Human-readable rendering of a task.
pub fn render_task(task: &TaskView) -> String {
    match (&task.status, &task.path) {
        (TaskStatus::Done, Some(path)) if path.is_empty() => format!(
            "{}: no path from '{}' to '{}' within the distance threshold",
            task.id, task.from, task.to
        ),
        (TaskStatus::Done, Some(path)) => format!(
            "{}: {} hop(s)\n{}",
            task.id,
            path.len().saturating_sub(1),
            path.join(" -> ")
        ),
        (status, _) => format!("{}: {} ('{}' -> '{}')", task.id, status, task.from, task.to),
    }
}
