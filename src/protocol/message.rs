use serde::{Deserialize, Serialize};

use crate::domain::{ArticleRecord, JobId};

/// Messages exchanged between the supervisor and a worker.
///
/// Server → worker: `StatusQuery`, `Task`, `Shutdown`.
/// Worker → server: everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Sent once by a worker after its summarizer is loaded
    Ready { pid: u32, name: String },
    StatusQuery,
    Status { busy: bool },
    Task { id: JobId, article: ArticleRecord },
    TaskStarted { id: JobId },
    TaskCompleted { id: JobId, summary: String },
    TaskFailed { id: JobId, error: String },
    /// The worker was still busy when the task arrived
    TaskRejected { id: JobId },
    Shutdown,
}

impl Message {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Ready { .. } => "ready",
            Message::StatusQuery => "status_query",
            Message::Status { .. } => "status",
            Message::Task { .. } => "task",
            Message::TaskStarted { .. } => "task_started",
            Message::TaskCompleted { .. } => "task_completed",
            Message::TaskFailed { .. } => "task_failed",
            Message::TaskRejected { .. } => "task_rejected",
            Message::Shutdown => "shutdown",
        }
    }
}
