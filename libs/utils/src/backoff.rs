//! Retry-with-backoff helper shared by every adapter that calls out to a
//! remote dependency (EKSS, the object store, Kafka reconnects).

use std::fmt::Display;
use std::future::Future;

use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_BACKOFF_SECONDS: f64 = 0.1;
pub const DEFAULT_MAX_BACKOFF_SECONDS: f64 = 10.0;

/// Exponential backoff with a fixed ceiling, matching the curve used
/// throughout the pageserver's retry loops.
pub fn exponential_backoff_duration_seconds(n: u32, base_increment: f64, max_seconds: f64) -> f64 {
    if n == 0 {
        0.0
    } else {
        (1.0 + base_increment).powf(f64::from(n)).min(max_seconds)
    }
}

pub async fn exponential_backoff(n: u32, base_increment: f64, max_seconds: f64, cancel: &CancellationToken) {
    let backoff_duration_seconds =
        exponential_backoff_duration_seconds(n, base_increment, max_seconds);
    if backoff_duration_seconds > 0.0 {
        drop(
            tokio::time::timeout(
                std::time::Duration::from_secs_f64(backoff_duration_seconds),
                cancel.cancelled(),
            )
            .await,
        );
    }
}

/// Retries `op` until it returns `Ok`, `is_permanent` classifies the error
/// as one `op` stands no chance of succeeding if retried, or `cancel` fires.
///
/// Returns `None` if cancelled mid-retry, otherwise the last result `op`
/// produced (an `Err` only if `is_permanent` matched or `max_attempts` was
/// exhausted).
pub async fn retry<V, E, F, Fut>(
    mut op: F,
    is_permanent: impl Fn(&E) -> bool,
    warn_attempts: u32,
    max_attempts: u32,
    description: &str,
    cancel: &CancellationToken,
) -> Option<Result<V, E>>
where
    E: Display + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let mut attempts = 0;
    loop {
        if cancel.is_cancelled() {
            return None;
        }

        let result = op().await;
        match result {
            Ok(v) => {
                if attempts > 0 {
                    tracing::info!("{description} succeeded after {attempts} retries");
                }
                return Some(Ok(v));
            }
            Err(e) if is_permanent(&e) => {
                return Some(Err(e));
            }
            Err(e) => {
                attempts += 1;
                if attempts >= max_attempts {
                    tracing::warn!(
                        "{description} failed after {attempts} attempts, giving up: {e}"
                    );
                    return Some(Err(e));
                }
                if attempts >= warn_attempts {
                    tracing::warn!("{description} failed (attempt {attempts}): {e}");
                } else {
                    tracing::info!("{description} failed (attempt {attempts}): {e}");
                }
                exponential_backoff(
                    attempts,
                    DEFAULT_BASE_BACKOFF_SECONDS,
                    DEFAULT_MAX_BACKOFF_SECONDS,
                    cancel,
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_duration_is_bounded_and_monotonic() {
        assert_eq!(exponential_backoff_duration_seconds(0, 1.0, 10.0), 0.0);
        let d1 = exponential_backoff_duration_seconds(1, 1.0, 10.0);
        let d2 = exponential_backoff_duration_seconds(2, 1.0, 10.0);
        assert!(d2 > d1);
        assert!(exponential_backoff_duration_seconds(20, 1.0, 10.0) <= 10.0);
    }

    #[tokio::test]
    async fn retry_returns_ok_without_retrying_on_first_success() {
        let cancel = CancellationToken::new();
        let result: Option<Result<i32, anyhow::Error>> = retry(
            || async { Ok(42) },
            |_: &anyhow::Error| false,
            3,
            5,
            "test op",
            &cancel,
        )
        .await;
        assert_eq!(result.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_stops_immediately_on_permanent_error() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result: Option<Result<i32, anyhow::Error>> = retry(
            || {
                calls += 1;
                async { Err(anyhow::anyhow!("permanent")) }
            },
            |_: &anyhow::Error| true,
            3,
            5,
            "test op",
            &cancel,
        )
        .await;
        assert!(result.unwrap().is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retry_returns_none_when_cancelled_upfront() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Option<Result<i32, anyhow::Error>> = retry(
            || async { Err(anyhow::anyhow!("never runs to success")) },
            |_: &anyhow::Error| false,
            3,
            5,
            "test op",
            &cancel,
        )
        .await;
        assert!(result.is_none());
    }
}
