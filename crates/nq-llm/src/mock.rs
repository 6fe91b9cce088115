//! Scripted `LlmClient` for tests and offline runs.

use crate::client::{LlmClient, LlmRequest, Purpose};
use crate::error::LlmError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Replies are queued per `Purpose`, so concurrent steps never steal each
/// other's responses. When a queue is empty the sticky reply for that
/// purpose is used, if any.
#[derive(Default)]
pub struct MockLlm {
    queues: Mutex<HashMap<Purpose, VecDeque<Result<String, String>>>>,
    sticky: Mutex<HashMap<Purpose, String>>,
    calls: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, purpose: Purpose, text: impl Into<String>) -> &Self {
        self.enqueue(purpose, Ok(text.into()))
    }

    pub fn push_error(&self, purpose: Purpose, message: impl Into<String>) -> &Self {
        self.enqueue(purpose, Err(message.into()))
    }

    /// Reply returned whenever the queue for `purpose` is empty.
    pub fn always(&self, purpose: Purpose, text: impl Into<String>) -> &Self {
        self.sticky
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(purpose, text.into());
        self
    }

    fn enqueue(&self, purpose: Purpose, reply: Result<String, String>) -> &Self {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(purpose)
            .or_default()
            .push_back(reply);
        self
    }

    /// Requests received for `purpose`, in order.
    pub fn calls(&self, purpose: Purpose) -> Vec<LlmRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.purpose == purpose)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, purpose: Purpose) -> usize {
        self.calls(purpose).len()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<String, LlmError> {
        let purpose = request.purpose;
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let queued = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&purpose)
            .and_then(VecDeque::pop_front);

        match queued {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Scripted(message)),
            None => self
                .sticky
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&purpose)
                .cloned()
                .ok_or_else(|| LlmError::Scripted(format!("no reply scripted for {purpose}"))),
        }
    }
}
