//! Bounded exponential backoff for external service calls.
//!
//! Only transient transport failures are retried; business-rule rejections
//! (4xx responses) are returned immediately.

use std::future::Future;
use std::time::Duration;

use onramp_core::workflow::executor::DeliveryError;

/// True for failures worth retrying: timeouts, connection errors, 5xx.
pub(crate) fn is_transient(error: &DeliveryError) -> bool {
    match error {
        DeliveryError::Timeout => true,
        DeliveryError::Transport(_) => true,
        DeliveryError::Status { status } => *status >= 500,
    }
}

/// Run `op` up to `max_attempts` times, doubling the delay between
/// transient failures.
pub(crate) async fn with_backoff<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, DeliveryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "transient delivery failure, backing off");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, Duration::from_millis(1), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DeliveryError::Transport("refused".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(3, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeliveryError::Timeout) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(3, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeliveryError::Status { status: 404 }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&DeliveryError::Timeout));
        assert!(is_transient(&DeliveryError::Transport("x".to_string())));
        assert!(is_transient(&DeliveryError::Status { status: 503 }));
        assert!(!is_transient(&DeliveryError::Status { status: 400 }));
    }
}
