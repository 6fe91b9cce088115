//! Retry budget checks for the syntax and semantic feedback loops.

use nq_core::message::RetryContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    Syntax,
    Semantic,
}

/// True iff the counter for `kind` is strictly below its maximum.
pub fn can_retry(kind: RetryKind, ctx: &RetryContext) -> bool {
    match kind {
        RetryKind::Syntax => ctx.syntax_retry_count < ctx.max_syntax_retries,
        RetryKind::Semantic => ctx.semantic_retry_count < ctx.max_semantic_retries,
    }
}

/// Return a copy of `ctx` with the `kind` counter bumped by one.
pub fn increment(kind: RetryKind, ctx: &RetryContext) -> RetryContext {
    let mut next = *ctx;
    match kind {
        RetryKind::Syntax => next.syntax_retry_count = next.syntax_retry_count.saturating_add(1),
        RetryKind::Semantic => {
            next.semantic_retry_count = next.semantic_retry_count.saturating_add(1)
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_limit() {
        let ctx = RetryContext::default(); // max 2 / 2
        assert!(can_retry(RetryKind::Syntax, &ctx));

        let ctx = increment(RetryKind::Syntax, &ctx);
        assert!(can_retry(RetryKind::Syntax, &ctx));

        let ctx = increment(RetryKind::Syntax, &ctx);
        assert_eq!(ctx.syntax_retry_count, 2);
        assert!(!can_retry(RetryKind::Syntax, &ctx));
    }

    #[test]
    fn budgets_are_independent() {
        let mut ctx = RetryContext::default();
        for _ in 0..2 {
            ctx = increment(RetryKind::Semantic, &ctx);
        }
        assert!(!can_retry(RetryKind::Semantic, &ctx));
        assert!(can_retry(RetryKind::Syntax, &ctx));
        assert_eq!(ctx.syntax_retry_count, 0);

        for _ in 0..2 {
            ctx = increment(RetryKind::Syntax, &ctx);
        }
        assert!(!can_retry(RetryKind::Syntax, &ctx));
        assert_eq!(ctx.semantic_retry_count, 2);
    }

    #[test]
    fn increment_does_not_touch_input() {
        let ctx = RetryContext::new(1, 1);
        let next = increment(RetryKind::Semantic, &ctx);
        assert_eq!(ctx.semantic_retry_count, 0);
        assert_eq!(next.semantic_retry_count, 1);
    }

    #[test]
    fn zero_budget_never_retries() {
        let ctx = RetryContext::new(0, 0);
        assert!(!can_retry(RetryKind::Syntax, &ctx));
        assert!(!can_retry(RetryKind::Semantic, &ctx));
    }
}
