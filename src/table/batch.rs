//! Chunking, throttling and retries on top of any [`TableApi`].
//!
//! Knows nothing about Airtable: it only follows page cursors, splits lists
//! into batches, keeps a minimum gap between calls and retries transient
//! failures.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::{TableApi, MAX_BATCH_SIZE};
use crate::error::{Result, SyncError};
use crate::reconcile::{RecordCreate, RecordUpdate};
use crate::remote::RemoteRecord;

/// How writes are split and paced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Items per call, 1..=10
    pub batch_size: usize,
    /// Minimum gap between two calls
    pub rate_limit_delay: Duration,
    /// Extra attempts for a batch that failed with a transient error
    pub max_retries: u32,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            rate_limit_delay: Duration::from_millis(200),
            max_retries: 0,
        }
    }
}

/// Table client that accepts unbounded write lists
pub struct BatchedTable<T> {
    inner: T,
    policy: BatchPolicy,
    last_call: Mutex<Option<Instant>>,
}

impl<T: TableApi> BatchedTable<T> {
    pub fn new(inner: T, policy: BatchPolicy) -> Self {
        let batch_size = policy.batch_size.clamp(1, MAX_BATCH_SIZE);
        Self {
            inner,
            policy: BatchPolicy {
                batch_size,
                ..policy
            },
            last_call: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Every record in the table, one throttled request per page
    pub async fn list_all(&self) -> Result<Vec<RemoteRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = self
                .call_with_retry("list", || self.inner.list_page(offset.as_deref()))
                .await?;
            pages += 1;
            records.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        log::info!("Listed {} records in {} page(s)", records.len(), pages);
        Ok(records)
    }

    /// Returns the number of batches written
    pub async fn update_many(&self, records: &[RecordUpdate]) -> Result<usize> {
        self.run_batches("update", records, |batch| self.inner.update_records(batch))
            .await
    }

    /// Returns the number of batches written
    pub async fn create_many(&self, records: &[RecordCreate]) -> Result<usize> {
        self.run_batches("create", records, |batch| self.inner.create_records(batch))
            .await
    }

    /// Returns the number of batches written
    pub async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        self.run_batches("delete", ids, |batch| self.inner.delete_records(batch))
            .await
    }

    async fn run_batches<'a, I, F, Fut>(
        &'a self,
        operation: &'static str,
        items: &'a [I],
        call: F,
    ) -> Result<usize>
    where
        F: Fn(&'a [I]) -> Fut,
        Fut: Future<Output = Result<()>> + 'a,
    {
        let total = items.len().div_ceil(self.policy.batch_size);
        let mut written = 0;

        for batch in items.chunks(self.policy.batch_size) {
            if let Err(e) = self.call_with_retry(operation, || call(batch)).await {
                log::error!(
                    "{} batch {}/{} failed, {} batch(es) not applied: {}",
                    operation,
                    written + 1,
                    total,
                    total - written,
                    e
                );
                return Err(SyncError::BatchFailed {
                    operation,
                    written,
                    lost: total - written,
                    source: Box::new(e),
                });
            }
            written += 1;
        }

        if total > 0 {
            log::info!("{}: {} item(s) in {} batch(es)", operation, items.len(), total);
        }
        Ok(written)
    }

    async fn call_with_retry<R, F, Fut>(&self, operation: &str, call: F) -> Result<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut attempt = 0;
        loop {
            self.throttle().await;
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let backoff = self.policy.rate_limit_delay * attempt;
                    log::warn!(
                        "{} call failed ({}), retry {}/{} in {:?}",
                        operation,
                        e,
                        attempt,
                        self.policy.max_retries,
                        backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait until at least `rate_limit_delay` has passed since the last call
    async fn throttle(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.rate_limit_delay {
                sleep(self.policy.rate_limit_delay - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
