use std::future::Future;

use log::warn;

use crate::utils::error::ForumError;

/// Runs an idempotent store operation, retrying exactly once when the store
/// reports a transient failure. Validation errors are returned untouched.
pub async fn retry_once<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T, ForumError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ForumError>>,
{
    match attempt().await {
        Err(err) if err.is_retryable() => {
            warn!("{} failed ({}), retrying once", operation, err);
            attempt().await
        }
        other => other,
    }
}
