//! Timeout and retry wrapper for remote calls.
//!
//! Every attempt is bounded by `timeout_ms`. Transient failures
//! ([`SyncError::is_transient`]) are retried with exponential backoff
//! (`base_delay_ms * 2^attempt`); anything else is returned immediately.
//!
//! `create` is not idempotent: a timed-out create may already be committed
//! remotely, so it is never re-sent after [`SyncError::Timeout`].

use super::{RemoteCrm, RemoteInput};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use crmsync_model::{Attributes, RemoteRecord};
use crmsync_types::{EntityType, RemoteId, ValidationLevel};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry budget for remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time.
    pub base_delay_ms: u64,
    /// Upper bound for a single attempt.
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            timeout_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// No retries, only the per-attempt timeout.
    pub fn no_retries(timeout_ms: u64) -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            timeout_ms,
        }
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }
}

/// [`RemoteCrm`] decorator applying a [`RetryPolicy`].
pub struct RetryingRemote {
    inner: Arc<dyn RemoteCrm>,
    policy: RetryPolicy,
}

impl RetryingRemote {
    pub fn new(inner: Arc<dyn RemoteCrm>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retry<F, Fut, T>(&self, operation: &str, idempotent: bool, f: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let timeout = Duration::from_millis(self.policy.timeout_ms);

        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout),
            };

            match result {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(SyncError::Timeout) if !idempotent => {
                    warn!(operation, attempt, "Timed out with unknown outcome, not retrying");
                    return Err(SyncError::Timeout);
                }
                Err(err) if err.is_transient() => {
                    if attempt == self.policy.max_retries {
                        return Err(SyncError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: err.to_string(),
                        });
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl RemoteCrm for RetryingRemote {
    async fn find(&self, entity_type: EntityType, id: &RemoteId) -> SyncResult<Option<RemoteRecord>> {
        let inner = &self.inner;
        self.with_retry("find", true, move || inner.find(entity_type, id)).await
    }

    async fn search(&self, entity_type: EntityType, criteria: &Attributes) -> SyncResult<Vec<RemoteRecord>> {
        let inner = &self.inner;
        self.with_retry("search", true, move || inner.search(entity_type, criteria))
            .await
    }

    async fn create(
        &self,
        entity_type: EntityType,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord> {
        let inner = &self.inner;
        self.with_retry("create", false, move || inner.create(entity_type, input, validation))
            .await
    }

    async fn update(
        &self,
        entity_type: EntityType,
        id: &RemoteId,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord> {
        let inner = &self.inner;
        self.with_retry("update", true, move || inner.update(entity_type, id, input, validation))
            .await
    }
}
