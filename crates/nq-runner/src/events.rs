//! Event sink for streaming runs. A sink without a channel drops everything.

use crate::RunnerError;
use chrono::Utc;
use nq_core::event::WorkflowEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSink {
    run_id: Uuid,
    tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl EventSink {
    pub fn new(run_id: Uuid, tx: mpsc::Sender<WorkflowEvent>) -> Self {
        Self {
            run_id,
            tx: Some(tx),
        }
    }

    pub fn disabled(run_id: Uuid) -> Self {
        Self { run_id, tx: None }
    }

    /// Emit a step event. Fails once the receiver is gone.
    pub async fn step_completed<T: Serialize>(
        &self,
        executor_id: &str,
        payload: &T,
    ) -> Result<(), RunnerError> {
        let Some(tx) = &self.tx else { return Ok(()) };
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::warn!(executor_id, "Event payload not serializable: {e}");
            serde_json::Value::Null
        });
        let event = WorkflowEvent::StepCompleted {
            run_id: self.run_id,
            executor_id: executor_id.to_string(),
            payload,
            at: Utc::now(),
        };
        if tx.send(event).await.is_err() || tx.is_closed() {
            tracing::info!(run_id = %self.run_id, executor_id, "Event receiver dropped, stopping run");
            return Err(RunnerError::Fatal("stream receiver dropped".into()));
        }
        Ok(())
    }

    pub async fn finish(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                tracing::debug!(run_id = %self.run_id, "Event receiver dropped");
            }
        }
    }
}
