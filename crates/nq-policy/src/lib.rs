//! nq-policy: Retry and quality policy with retry budgets, confidence gate, workflow limits.

pub mod config;
pub mod confidence;
pub mod retry;

pub use config::WorkflowConfig;
pub use confidence::ConfidenceGate;
pub use retry::{can_retry, increment, RetryKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
