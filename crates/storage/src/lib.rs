#![forbid(unsafe_code)]

pub mod repository;
pub mod retry;
pub mod sheets_api;
pub mod sqlite;

pub use repository::{InMemorySheet, SheetStore, Storage, StorageError};
pub use retry::{RetryPolicy, RetryingStore};
