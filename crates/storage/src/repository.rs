use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracker_core::model::{CellValue, ColumnIndex, RowIndex, Snapshot};

use crate::retry::{RetryPolicy, RetryingStore};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Connectivity and auth failures may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Contract for the shared table every learner reads and writes.
///
/// Stores provide no locking: a read-modify-write by one caller can be
/// interleaved with another caller's.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Fetch the whole table, header row and data rows in order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the table cannot be read.
    async fn read_snapshot(&self) -> Result<Snapshot, StorageError>;

    /// Look up a header by exact, case-sensitive name.
    ///
    /// `Ok(None)` means the column has not been created yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the header row cannot be read.
    async fn find_column(&self, name: &str) -> Result<Option<ColumnIndex>, StorageError> {
        Ok(self.read_snapshot().await?.find_column(name))
    }

    /// Overwrite one data cell.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write is rejected; the cell is then unchanged.
    async fn write_cell(
        &self,
        row: RowIndex,
        column: ColumnIndex,
        value: CellValue,
    ) -> Result<(), StorageError>;

    /// Append a header cell, returning the existing index if it is already there.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the header row cannot be extended.
    async fn append_header(&self, name: &str) -> Result<ColumnIndex, StorageError>;
}

#[async_trait]
impl<T: SheetStore + ?Sized> SheetStore for Arc<T> {
    async fn read_snapshot(&self) -> Result<Snapshot, StorageError> {
        (**self).read_snapshot().await
    }

    async fn find_column(&self, name: &str) -> Result<Option<ColumnIndex>, StorageError> {
        (**self).find_column(name).await
    }

    async fn write_cell(
        &self,
        row: RowIndex,
        column: ColumnIndex,
        value: CellValue,
    ) -> Result<(), StorageError> {
        (**self).write_cell(row, column, value).await
    }

    async fn append_header(&self, name: &str) -> Result<ColumnIndex, StorageError> {
        (**self).append_header(name).await
    }
}

#[derive(Debug, Default)]
struct Faults {
    reads: u32,
    writes: u32,
}

/// In-process table for tests and prototyping.
///
/// Clones share the same table. Failures can be injected to exercise retry
/// and error paths.
#[derive(Clone, Default)]
pub struct InMemorySheet {
    table: Arc<Mutex<Snapshot>>,
    faults: Arc<Mutex<Faults>>,
    cell_writes: Arc<AtomicUsize>,
}

impl InMemorySheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            table: Arc::new(Mutex::new(snapshot)),
            ..Self::default()
        }
    }

    /// Make the next `count` reads fail with a connection error.
    pub fn fail_next_reads(&self, count: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.reads = count;
        }
    }

    /// Make the next `count` cell writes or header appends fail with a connection error.
    pub fn fail_next_writes(&self, count: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.writes = count;
        }
    }

    /// Number of cell writes that reached the table.
    #[must_use]
    pub fn cell_writes(&self) -> usize {
        self.cell_writes.load(Ordering::SeqCst)
    }

    /// Current table contents, without fault injection.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the table lock is poisoned.
    pub fn peek(&self) -> Result<Snapshot, StorageError> {
        self.table
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn take_fault(&self, reads: bool) -> Result<(), StorageError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let remaining = if reads {
            &mut faults.reads
        } else {
            &mut faults.writes
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Err(StorageError::Connection("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SheetStore for InMemorySheet {
    async fn read_snapshot(&self) -> Result<Snapshot, StorageError> {
        self.take_fault(true)?;
        self.peek()
    }

    async fn write_cell(
        &self,
        row: RowIndex,
        column: ColumnIndex,
        value: CellValue,
    ) -> Result<(), StorageError> {
        self.take_fault(false)?;
        let mut guard = self
            .table
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.set_cell(row, column, value);
        self.cell_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_header(&self, name: &str) -> Result<ColumnIndex, StorageError> {
        self.take_fault(false)?;
        let mut guard = self
            .table
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.push_header(name))
    }
}

/// Handle to the configured table backend, behind a trait object for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub sheet: Arc<dyn SheetStore>,
}

impl Storage {
    #[must_use]
    pub fn new(sheet: Arc<dyn SheetStore>) -> Self {
        Self { sheet }
    }

    /// Wrap the backend so transient failures are retried under `policy`.
    #[must_use]
    pub fn with_retry(self, policy: RetryPolicy) -> Self {
        let sheet: Arc<dyn SheetStore> = Arc::new(RetryingStore::new(self.sheet, policy));
        Self { sheet }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Snapshot {
        Snapshot::new(
            vec!["Subject".into(), "Alice".into()],
            vec![vec!["Cardiology".into(), CellValue::Bool(false)]],
        )
    }

    #[tokio::test]
    async fn writes_are_visible_to_every_clone() {
        let sheet = InMemorySheet::with_snapshot(table());
        let other = sheet.clone();
        sheet
            .write_cell(RowIndex::new(0), ColumnIndex::new(1), CellValue::Bool(true))
            .await
            .unwrap();

        let snapshot = other.read_snapshot().await.unwrap();
        assert!(snapshot.flag(RowIndex::new(0), ColumnIndex::new(1)));
        assert_eq!(other.cell_writes(), 1);
    }

    #[tokio::test]
    async fn injected_failures_leave_table_untouched() {
        let sheet = InMemorySheet::with_snapshot(table());
        sheet.fail_next_writes(1);
        let err = sheet
            .write_cell(RowIndex::new(0), ColumnIndex::new(1), CellValue::Bool(true))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(sheet.peek().unwrap(), table());
        assert_eq!(sheet.cell_writes(), 0);

        sheet.fail_next_reads(1);
        assert!(sheet.read_snapshot().await.is_err());
        assert!(sheet.read_snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn append_header_is_idempotent_and_find_column_sees_it() {
        let sheet = InMemorySheet::with_snapshot(table());
        assert_eq!(sheet.find_column("Bob").await.unwrap(), None);
        let first = sheet.append_header("Bob").await.unwrap();
        let again = sheet.append_header("Bob").await.unwrap();
        assert_eq!(first, ColumnIndex::new(2));
        assert_eq!(first, again);
        assert_eq!(sheet.find_column("Bob").await.unwrap(), Some(first));
    }

    #[test]
    fn only_connection_errors_are_transient() {
        assert!(StorageError::Connection("timeout".into()).is_transient());
        assert!(!StorageError::NotFound.is_transient());
        assert!(!StorageError::Serialization("bad".into()).is_transient());
    }
}
