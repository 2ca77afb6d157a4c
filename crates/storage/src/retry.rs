use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};
use tracker_core::model::{CellValue, ColumnIndex, RowIndex, Snapshot};

use crate::repository::{SheetStore, StorageError};

pub const DEFAULT_EXTRA_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    extra_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            extra_attempts: DEFAULT_EXTRA_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(extra_attempts: u32, delay: Duration) -> Self {
        Self {
            extra_attempts,
            delay,
        }
    }

    /// Attempts after the first one.
    #[must_use]
    pub fn extra_attempts(&self) -> u32 {
        self.extra_attempts
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Store decorator that retries transient failures.
///
/// Non-transient errors are returned immediately. Once the attempts are used
/// up the last error is returned; the wrapped store has rejected every
/// attempt, so nothing was applied.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: SheetStore> RetryingStore<S> {
    #[must_use]
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StorageError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StorageError>> + Send,
    {
        let mut attempt = 0_u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.extra_attempts => {
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        max = self.policy.extra_attempts,
                        error = %err,
                        "transient store failure, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        error!(operation, attempts = attempt + 1, error = %err, "store retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl<S: SheetStore> SheetStore for RetryingStore<S> {
    async fn read_snapshot(&self) -> Result<Snapshot, StorageError> {
        let inner = &self.inner;
        self.run("read_snapshot", move || inner.read_snapshot()).await
    }

    async fn find_column(&self, name: &str) -> Result<Option<ColumnIndex>, StorageError> {
        let inner = &self.inner;
        self.run("find_column", move || inner.find_column(name)).await
    }

    async fn write_cell(
        &self,
        row: RowIndex,
        column: ColumnIndex,
        value: CellValue,
    ) -> Result<(), StorageError> {
        let inner = &self.inner;
        self.run("write_cell", move || {
            inner.write_cell(row, column, value.clone())
        })
        .await
    }

    async fn append_header(&self, name: &str) -> Result<ColumnIndex, StorageError> {
        let inner = &self.inner;
        self.run("append_header", move || inner.append_header(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemorySheet;

    fn quick() -> RetryPolicy {
        RetryPolicy::new(2, Duration::ZERO)
    }

    fn sheet() -> InMemorySheet {
        InMemorySheet::with_snapshot(Snapshot::new(
            vec!["Alice".into()],
            vec![vec![CellValue::Empty]],
        ))
    }

    #[tokio::test]
    async fn recovers_within_bound() {
        let inner = sheet();
        inner.fail_next_writes(2);
        let store = RetryingStore::new(inner.clone(), quick());
        store
            .write_cell(RowIndex::new(0), ColumnIndex::new(0), CellValue::Bool(true))
            .await
            .unwrap();
        assert_eq!(inner.cell_writes(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_bound_without_applying() {
        let inner = sheet();
        inner.fail_next_writes(3);
        let store = RetryingStore::new(inner.clone(), quick());
        let err = store
            .write_cell(RowIndex::new(0), ColumnIndex::new(0), CellValue::Bool(true))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(inner.cell_writes(), 0);
        assert!(!inner.peek().unwrap().flag(RowIndex::new(0), ColumnIndex::new(0)));
    }

    #[tokio::test]
    async fn reads_are_retried_too() {
        let inner = sheet();
        inner.fail_next_reads(1);
        let store = RetryingStore::new(inner, quick());
        assert_eq!(store.read_snapshot().await.unwrap().row_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        let inner = sheet();
        inner.fail_next_reads(2);
        let store = RetryingStore::new(inner, RetryPolicy::new(2, Duration::from_millis(500)));
        let started = tokio::time::Instant::now();
        store.read_snapshot().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
