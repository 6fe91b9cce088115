//! nq-core: Shared types for the NL2SQL workflow
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used across all other nq-* crates.

pub mod event;
pub mod message;
pub mod output;
pub mod schema;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::event::WorkflowEvent;
    pub use crate::message::{ResultRow, RetryContext, Status, WorkflowMessage};
    pub use crate::output::{ExecutionResult, Nl2SqlOutput, ReasoningEvaluation};
    pub use crate::schema::{Catalog, DatabaseMeta, FieldMeta, SchemaContext, TableMeta};
}
