//! Timeout and retry bounds for calls into the stores.

use std::future::Future;
use std::time::Duration;

use crate::domain::foundation::DomainError;

/// Bounds applied by handlers that run an atomic unit against a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Extra attempts after a `StorageConflict` before giving up.
    pub max_conflict_retries: u32,

    /// Longest a single store call may take.
    pub store_timeout: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl StorePolicy {
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Runs `call` under the store timeout.
    ///
    /// A call that times out is dropped before it completes, so its unit
    /// never commits; it is reported as `StorageUnavailable`.
    pub async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(DomainError::unavailable(format!(
                    "{} timed out after {}ms",
                    operation,
                    self.store_timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[tokio::test]
    async fn fast_call_passes_through() {
        let policy = StorePolicy::default();
        let value = policy.call("noop", async { Ok::<_, DomainError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn slow_call_becomes_unavailable() {
        let policy = StorePolicy::default().with_store_timeout(Duration::from_millis(10));
        let err = policy
            .call("slow", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, DomainError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageUnavailable);
        assert!(err.message.contains("slow"));
    }

    #[test]
    fn builders_override_defaults() {
        let policy = StorePolicy::default()
            .with_max_conflict_retries(9)
            .with_store_timeout(Duration::from_millis(50));
        assert_eq!(policy.max_conflict_retries, 9);
        assert_eq!(policy.store_timeout, Duration::from_millis(50));
    }
}
