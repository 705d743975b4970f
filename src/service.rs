//! Request service: create and read path-finding tasks.

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::queue::Producer;
use crate::types::{Task, TaskCounts, TaskId};
use tracing::{error, info};

#[derive(Clone)]
pub struct PathService {
    db: Database,
    producer: Producer,
}

impl PathService {
    pub fn new(db: Database, producer: Producer) -> Self {
        Self { db, producer }
    }

    /// Create a task for `from -> to` and schedule it. Returns the new task's id.
    ///
    /// A task whose enqueue fails stays `Pending` in the store and is reported as a
    /// failure to the caller.
    pub async fn find_shortest_path(&self, from: &str, to: &str) -> ServiceResult<TaskId> {
        let from = from.trim();
        let to = to.trim();
        if from.is_empty() {
            return Err(ServiceError::missing_field("from"));
        }
        if to.is_empty() {
            return Err(ServiceError::missing_field("to"));
        }

        let task = self.db.create_task(from, to).map_err(|e| {
            error!(error = %e, "failed to create a task");
            ServiceError::database()
        })?;

        self.producer.enqueue(task.id).await.map_err(|e| {
            error!(task_id = %task.id, error = %e, "failed to enqueue a task");
            ServiceError::enqueue_failed()
        })?;

        info!(task_id = %task.id, from, to, "task created");
        Ok(task.id)
    }

    pub fn get_task(&self, id: &str) -> ServiceResult<Task> {
        let task_id: TaskId = id
            .parse()
            .map_err(|_| ServiceError::invalid_value("id", "id must be a UUID"))?;

        self.db.get_task(task_id).map_err(|e| {
            if e.is_not_found() {
                ServiceError::task_not_found(id)
            } else {
                error!(task_id = %task_id, error = %e, "failed to load a task");
                ServiceError::database()
            }
        })
    }

    pub fn task_counts(&self) -> ServiceResult<TaskCounts> {
        self.db.count_tasks_by_status().map_err(|e| {
            error!(error = %e, "failed to count tasks");
            ServiceError::database()
        })
    }
}
