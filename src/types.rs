//! Core types for the wiki-graph task service.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a path-finding task.
pub type TaskId = Uuid;

/// Lifecycle state of a task.
///
/// Stored as a small integer: 1=Pending, 2=Processing, 3=Done.
/// Transitions only ever move one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Done,
}

impl TaskStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            TaskStatus::Pending => 1,
            TaskStatus::Processing => 2,
            TaskStatus::Done => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(TaskStatus::Pending),
            2 => Some(TaskStatus::Processing),
            3 => Some(TaskStatus::Done),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
        }
    }

    /// The only status this one may advance to.
    pub fn successor(self) -> Option<Self> {
        match self {
            TaskStatus::Pending => Some(TaskStatus::Processing),
            TaskStatus::Processing => Some(TaskStatus::Done),
            TaskStatus::Done => None,
        }
    }

    pub fn is_valid_transition(self, next: TaskStatus) -> bool {
        self.successor() == Some(next)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed outcome of a search, persisted as a self-describing JSON document.
///
/// An empty `shortest_path` means the target is unreachable within the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub shortest_path: Vec<String>,
}

impl TaskResult {
    pub fn new(shortest_path: Vec<String>) -> Self {
        Self { shortest_path }
    }

    pub fn is_unreachable(&self) -> bool {
        self.shortest_path.is_empty()
    }
}

/// A path-finding task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub created_at: i64,
    pub updated_at: i64,
    pub from: String,
    pub to: String,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    /// Start of the current processing claim, if one is live.
    pub claimed_at: Option<i64>,
}

/// Task counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
}
