//! Timeout wrapper for query futures.

use crate::ExecutorError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Wrap a query future with a timeout.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, ExecutorError>
where
    F: Future<Output = Result<T, ExecutorError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExecutorError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_fast_results() {
        let out = with_timeout(Duration::from_secs(1), async { Ok::<_, ExecutorError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn slow_future_times_out() {
        let out = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ExecutorError>(())
        })
        .await;
        assert!(matches!(out, Err(ExecutorError::Timeout(10))));
    }
}
