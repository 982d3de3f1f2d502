use std::{future::Future, time::Duration};

use tokio::time::error::Elapsed;

/// Runs an outbound provider call with an upper bound on its duration.
///
/// Elapsing the limit drops the in-flight call and surfaces as the caller's own error type
/// through `From<Elapsed>`.
pub async fn call<T, E, F>(label: &'static str, limit: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(elapsed) => {
            tracing::warn!(call = label, limit_ms = limit.as_millis() as u64, "Outbound call timed out");
            Err(elapsed.into())
        }
    }
}
