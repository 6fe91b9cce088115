//! Streaming events emitted while a workflow run progresses.

use crate::output::Nl2SqlOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// One step finished and produced `payload`.
    StepCompleted {
        run_id: Uuid,
        executor_id: String,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    },
    /// Terminal: the run produced its output.
    Completed { run_id: Uuid, output: Nl2SqlOutput },
    /// Terminal: the run aborted with a fatal error.
    Failed { run_id: Uuid, error: String },
}

impl WorkflowEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowEvent::StepCompleted { .. })
    }

    pub fn executor_id(&self) -> Option<&str> {
        match self {
            WorkflowEvent::StepCompleted { executor_id, .. } => Some(executor_id),
            _ => None,
        }
    }
}
