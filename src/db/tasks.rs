//! Task store: creation, lookup and guarded lifecycle transitions.
//!
//! Every status change is a single conditional `UPDATE` keyed on the status the
//! caller expects to replace, so concurrent handlers (in this process or another)
//! can never both win the same transition.

use super::{now_ms, Database, StoreError, StoreResult};
use crate::types::{Task, TaskCounts, TaskId, TaskResult, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const SELECT_TASK: &str = "SELECT id, created_at, updated_at, from_page, to_page, status, result, claimed_at
     FROM tasks WHERE id = ?1";

/// Raw column values of a `tasks` row, decoded into a [`Task`] outside the row callback.
struct TaskRow {
    id: String,
    created_at: i64,
    updated_at: i64,
    from: String,
    to: String,
    status: i64,
    result: Option<String>,
    claimed_at: Option<i64>,
}

fn read_task_row(row: &Row) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get("id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        from: row.get("from_page")?,
        to: row.get("to_page")?,
        status: row.get("status")?,
        result: row.get("result")?,
        claimed_at: row.get("claimed_at")?,
    })
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> StoreResult<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::Corrupt(format!("task id '{}': {}", row.id, e)))?;
        let status = TaskStatus::from_i64(row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("task {} has status {}", id, row.status)))?;
        let result = row
            .result
            .map(|json| serde_json::from_str::<TaskResult>(&json))
            .transpose()?;

        Ok(Task {
            id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            from: row.from,
            to: row.to,
            status,
            result,
            claimed_at: row.claimed_at,
        })
    }
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: TaskId) -> StoreResult<Option<Task>> {
    let row = conn
        .query_row(SELECT_TASK, params![task_id.to_string()], read_task_row)
        .optional()?;

    row.map(Task::try_from).transpose()
}

impl Database {
    /// Create a new pending task for `(from, to)`.
    pub fn create_task(&self, from: &str, to: &str) -> StoreResult<Task> {
        let task_id = Uuid::now_v7();
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO tasks (id, created_at, updated_at, from_page, to_page, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    task_id.to_string(),
                    now,
                    now,
                    from,
                    to,
                    TaskStatus::Pending.as_i64(),
                ],
            )?;

            tx.commit()?;

            Ok(Task {
                id: task_id,
                created_at: now,
                updated_at: now,
                from: from.to_string(),
                to: to.to_string(),
                status: TaskStatus::Pending,
                result: None,
                claimed_at: None,
            })
        })
    }

    /// Get a task by ID. Fails with [`StoreError::NotFound`] if it does not exist.
    pub fn get_task(&self, task_id: TaskId) -> StoreResult<Task> {
        self.with_conn(|conn| {
            get_task_internal(conn, task_id)?.ok_or(StoreError::NotFound(task_id))
        })
    }

    /// Atomically move a task from `expected` to `next`.
    ///
    /// Returns `Ok(false)` when the stored status is not `expected` (someone else
    /// already advanced the task) or when `next` is not the successor of `expected`.
    /// Entering `Processing` stamps a fresh claim; leaving it clears the claim.
    pub fn compare_and_set_status(
        &self,
        task_id: TaskId,
        expected: TaskStatus,
        next: TaskStatus,
    ) -> StoreResult<bool> {
        if !expected.is_valid_transition(next) {
            return Ok(false);
        }

        let now = now_ms();
        let claimed_at = (next == TaskStatus::Processing).then_some(now);

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET status = ?1, claimed_at = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    next.as_i64(),
                    claimed_at,
                    now,
                    task_id.to_string(),
                    expected.as_i64(),
                ],
            )?;
            Ok(updated == 1)
        })
    }

    /// Persist the computed path. Only applies while the task is processing.
    pub fn set_result(&self, task_id: TaskId, result: &TaskResult) -> StoreResult<()> {
        let json = serde_json::to_string(result)?;
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET result = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                params![json, now, task_id.to_string(), TaskStatus::Processing.as_i64()],
            )?;

            if updated == 1 {
                return Ok(());
            }

            match get_task_internal(conn, task_id)? {
                None => Err(StoreError::NotFound(task_id)),
                Some(_) => Err(StoreError::NotProcessing(task_id)),
            }
        })
    }

    /// Take over a processing task whose claim is missing or older than `stale_before`.
    ///
    /// Status stays `Processing`; only the claim timestamp moves. Exactly one caller
    /// wins for a given stale claim.
    pub fn claim_stale(&self, task_id: TaskId, stale_before: i64) -> StoreResult<bool> {
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET claimed_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = ?3 AND (claimed_at IS NULL OR claimed_at < ?4)",
                params![
                    now,
                    task_id.to_string(),
                    TaskStatus::Processing.as_i64(),
                    stale_before,
                ],
            )?;
            Ok(updated == 1)
        })
    }

    /// Drop the claim on a processing task so the next delivery can take it over.
    pub fn release_claim(&self, task_id: TaskId) -> StoreResult<bool> {
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET claimed_at = NULL, updated_at = ?1 WHERE id = ?2 AND status = ?3",
                params![now, task_id.to_string(), TaskStatus::Processing.as_i64()],
            )?;
            Ok(updated == 1)
        })
    }

    /// Count tasks in each status.
    pub fn count_tasks_by_status(&self) -> StoreResult<TaskCounts> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut counts = TaskCounts::default();
            for (status, count) in rows {
                match TaskStatus::from_i64(status) {
                    Some(TaskStatus::Pending) => counts.pending = count,
                    Some(TaskStatus::Processing) => counts.processing = count,
                    Some(TaskStatus::Done) => counts.done = count,
                    None => {
                        return Err(StoreError::Corrupt(format!("unknown status {}", status)));
                    }
                }
            }
            Ok(counts)
        })
    }
}
