#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod progress;
pub mod seed;
pub mod sync;

pub use tracker_core::Clock;

pub use app_services::AppServices;
pub use config::TrackerConfig;
pub use error::{AppServicesError, ConfigError, ProgressError, SyncError};
pub use progress::{Grouping, LearnerOverview, ProgressService};
pub use sync::{SyncCoordinator, SyncPhase, ToggleOutcome};
