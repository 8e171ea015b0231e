//! Retry with exponential backoff for retryable provider errors (§4.3): initial
//! delay 1s, factor 2, capped at 4s, bounded to 2 retries.

use std::time::Duration;

use tracing::warn;

use super::ProviderError;

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const BACKOFF_FACTOR: u32 = 2;
const MAX_DELAY: Duration = Duration::from_secs(4);
const MAX_RETRIES: u32 = 2;

/// Runs `attempt` up to `MAX_RETRIES` additional times when it fails with a
/// retryable [`ProviderError`], sleeping with exponential backoff in between.
pub async fn with_retry<F, Fut, T>(mut attempt: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut delay = INITIAL_DELAY;
    let mut tries = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable && tries < MAX_RETRIES => {
                tries += 1;
                warn!(attempt = tries, delay_ms = delay.as_millis() as u64, error = %err, "retrying provider request");
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * BACKOFF_FACTOR, MAX_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry_when_first_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_errors_up_to_the_cap() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProviderError::new(super::super::ErrorKind::ServerError, "down"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_non_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProviderError::new(super::super::ErrorKind::InvalidApiKey, "bad key"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
