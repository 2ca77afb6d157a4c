//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use tracker_core::activity::TagError;
use tracker_core::model::{LearnerError, RowIndex};

use crate::sync::SyncPhase;

/// Errors emitted by `SyncCoordinator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("row {0} does not exist")]
    UnknownRow(RowIndex),
    #[error("learner column `{0}` is missing")]
    MissingColumn(String),
    #[error(transparent)]
    Learner(#[from] LearnerError),
    #[error("{phase} failed: {source}")]
    Failed {
        phase: SyncPhase,
        #[source]
        source: StorageError,
    },
}

impl SyncError {
    /// Phase that failed, for store errors.
    #[must_use]
    pub fn phase(&self) -> Option<SyncPhase> {
        match self {
            Self::Failed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Learner(#[from] LearnerError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: `{value}`")]
    Invalid { key: &'static str, value: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
