use std::sync::Arc;

use storage::repository::{SheetStore, Storage};
use storage::sheets_api::SheetsApiStore;
use tracing::info;

use crate::Clock;
use crate::config::TrackerConfig;
use crate::error::AppServicesError;
use crate::progress::ProgressService;
use crate::sync::SyncCoordinator;

/// Assembles the sync and progress services over one configured store.
#[derive(Clone)]
pub struct AppServices {
    config: TrackerConfig,
    storage: Storage,
    sync: Arc<SyncCoordinator>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Open the backend selected by `config` and build services on it.
    ///
    /// The hosted spreadsheet is used when its credentials are configured,
    /// `SQLite` otherwise. Either way transient failures are retried.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn from_config(config: TrackerConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = match &config.sheets_api {
            Some(api) => {
                info!(spreadsheet = %api.spreadsheet_id, worksheet = %api.worksheet, "using hosted spreadsheet");
                let sheet: Arc<dyn SheetStore> = Arc::new(SheetsApiStore::new(api.clone()));
                Storage::new(sheet)
            }
            None => {
                info!(db = %config.db_url, worksheet = %config.worksheet, "using sqlite store");
                Storage::sqlite(&config.db_url, &config.worksheet).await?
            }
        };
        let storage = storage.with_retry(config.retry);
        Ok(Self::with_storage(config, storage, clock))
    }

    /// Build services over an already opened store.
    #[must_use]
    pub fn with_storage(config: TrackerConfig, storage: Storage, clock: Clock) -> Self {
        let sync = Arc::new(
            SyncCoordinator::new(Arc::clone(&storage.sheet), config.layout.clone())
                .with_clock(clock)
                .with_log_policy(config.log_policy)
                .with_utc_offset(config.utc_offset),
        );
        let progress = Arc::new(
            ProgressService::new(Arc::clone(&storage.sheet), config.layout.clone())
                .with_clock(clock)
                .with_utc_offset(config.utc_offset),
        );
        Self {
            config,
            storage,
            sync,
            progress,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn sync(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
