//! Task handler: drives one task from delivery to completion.

use crate::bfs::{EngineError, ShortestPathEngine};
use crate::db::{now_ms, Database, StoreError};
use crate::queue::DeliveryHandler;
use crate::types::{TaskId, TaskResult, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("search failed: {0}")]
    Engine(#[from] EngineError),

    #[error("task {0} was advanced by another worker before completion")]
    CompletionLost(TaskId),
}

/// What a single invocation did with its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The task was already done.
    AlreadyDone,
    /// Another worker holds a live claim on the task.
    Claimed,
    /// This invocation ran the search and completed the task.
    Completed(TaskResult),
}

pub struct PathTaskHandler {
    db: Database,
    engine: Arc<ShortestPathEngine>,
    stale_after: Duration,
}

impl PathTaskHandler {
    /// `stale_after` is how old a processing claim must be before a redelivery may take it over.
    pub fn new(db: Database, engine: Arc<ShortestPathEngine>, stale_after: Duration) -> Self {
        Self {
            db,
            engine,
            stale_after,
        }
    }

    pub async fn handle_task(&self, task_id: TaskId) -> Result<Outcome, HandlerError> {
        let task = self.db.get_task(task_id)?;

        match task.status {
            TaskStatus::Done => {
                debug!("task is already done");
                return Ok(Outcome::AlreadyDone);
            }
            TaskStatus::Processing => {
                let stale_ms = i64::try_from(self.stale_after.as_millis()).unwrap_or(i64::MAX);
                let stale_before = now_ms().saturating_sub(stale_ms);
                if !self.db.claim_stale(task_id, stale_before)? {
                    debug!("task is being processed elsewhere");
                    return Ok(Outcome::Claimed);
                }
                warn!(claimed_at = ?task.claimed_at, "took over a stalled task");
            }
            TaskStatus::Pending => {
                if !self
                    .db
                    .compare_and_set_status(task_id, TaskStatus::Pending, TaskStatus::Processing)?
                {
                    debug!("lost the race to start the task");
                    return Ok(Outcome::Claimed);
                }
            }
        }

        info!(from = %task.from, to = %task.to, "processing the task");

        let path = match self.engine.find_shortest_path(&task.from, &task.to).await {
            Ok(path) => path,
            Err(e) => {
                if let Err(release) = self.db.release_claim(task_id) {
                    warn!(error = %release, "failed to release the claim");
                }
                return Err(e.into());
            }
        };

        let result = TaskResult::new(path);
        self.db.set_result(task_id, &result)?;

        if !self
            .db
            .compare_and_set_status(task_id, TaskStatus::Processing, TaskStatus::Done)?
        {
            return Err(HandlerError::CompletionLost(task_id));
        }

        info!(
            hops = result.shortest_path.len().saturating_sub(1),
            unreachable = result.is_unreachable(),
            "task completed"
        );
        Ok(Outcome::Completed(result))
    }
}

#[async_trait]
impl DeliveryHandler for PathTaskHandler {
    async fn handle(&self, task_id: TaskId) -> anyhow::Result<()> {
        self.handle_task(task_id)
            .instrument(info_span!("task", task_id = %task_id))
            .await?;
        Ok(())
    }
}
