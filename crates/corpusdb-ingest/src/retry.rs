use std::future::Future;
use std::time::Duration;

use corpusdb_core::config::{EmbeddingSettings, IngestSettings};
use corpusdb_core::error::Error;

use crate::report::RetryEvent;

/// Bounded retry with exponential backoff; every attempt runs under `timeout`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_backoff: Duration::from_millis(500), timeout: Duration::from_secs(30) }
    }
}

/// The last error once retries are used up, or the first non-transient one.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub error: Error,
}

impl RetryPolicy {
    pub fn from_settings(ingest: &IngestSettings, embedding: &EmbeddingSettings) -> Self {
        Self {
            max_attempts: ingest.max_attempts.max(1),
            base_backoff: Duration::from_millis(ingest.backoff_ms),
            timeout: Duration::from_secs(embedding.timeout_secs.max(1)),
        }
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << attempt.min(16))
    }

    /// Run `f` until it succeeds, fails with a non-transient error, or
    /// `max_attempts` is reached. Each failed attempt that is retried is
    /// appended to `events`.
    pub async fn run<T, F, Fut>(&self, operation: &str, events: &mut Vec<RetryEvent>, mut f: F) -> Result<T, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0u32;
        loop {
            let error = match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout(self.timeout),
            };
            attempt += 1;
            if !error.is_transient() || attempt >= self.max_attempts {
                return Err(Exhausted { attempts: attempt, error });
            }
            let delay = self.delay(attempt - 1);
            tracing::warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "{error}; retrying"
            );
            events.push(RetryEvent { operation: operation.to_string(), attempt, error: error.to_string() });
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, base_backoff: Duration::from_millis(1), timeout: Duration::from_millis(200) }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let mut events = Vec::new();
        let out = fast(3)
            .run("embed", &mut events, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Embedding("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].attempt, 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mut events = Vec::new();
        let err = fast(2)
            .run("upsert", &mut events, || async { Err::<(), _>(Error::VectorStore("down".into())) })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let mut events = Vec::new();
        let err = fast(5)
            .run("embed", &mut events, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::InvalidConfig("bad key".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let mut events = Vec::new();
        let err = fast(1)
            .run("embed", &mut events, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Error>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, Error::Timeout(_)));
    }

    proptest! {
        #[test]
        fn backoff_doubles(attempt in 0u32..16) {
            let p = RetryPolicy { max_attempts: 3, base_backoff: Duration::from_millis(10), timeout: Duration::from_secs(1) };
            prop_assert_eq!(p.delay(attempt + 1), p.delay(attempt) * 2);
        }
    }
}
