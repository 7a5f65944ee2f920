pub mod http;

use std::future::Future;

use async_trait::async_trait;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{CallOutcome, OracleError};

pub use http::ChatCompletionsClient;

/// Text-completion oracle used for structured extraction and judging. One
/// call per document; every call sits behind a per-call timeout enforced by
/// the implementation.
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Send a system + user prompt, get the raw completion text back.
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError>;
}

/// Run an oracle call with bounded retries on transient failures. The result
/// is tagged; callers degrade to sentinels instead of propagating raw errors
/// across stage boundaries.
pub async fn call_with_retry<T, F, Fut>(what: &str, policy: RetryPolicy, mut op: F) -> CallOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return CallOutcome::Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= policy.max_retries {
                    warn!(what, attempts = attempt + 1, error = %err, "retries exhausted");
                    return CallOutcome::Transient(err);
                }
                attempt += 1;
                warn!(what, attempt, error = %err, "transient oracle failure; retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => {
                warn!(what, error = %err, "permanent oracle failure; not retrying");
                return CallOutcome::Permanent(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_retry("test", fast_policy(2), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(OracleError::Timeout { seconds: 1 })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(outcome.ok(), Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let outcome: CallOutcome<&str> = call_with_retry("test", fast_policy(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(OracleError::Timeout { seconds: 1 }) }
        })
        .await;

        assert!(matches!(outcome, CallOutcome::Transient(_)));
        // initial attempt + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome: CallOutcome<&str> = call_with_retry("test", fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(OracleError::MalformedResponse("junk".into())) }
        })
        .await;

        assert!(matches!(outcome, CallOutcome::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
