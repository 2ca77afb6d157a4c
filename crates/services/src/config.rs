use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use storage::retry::{DEFAULT_EXTRA_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryPolicy};
use storage::sheets_api::{DEFAULT_SHEETS_API_URL, SheetsApiConfig};
use tracker_core::activity::{DEFAULT_LOG_CAP, LogPolicy, LogRetention};
use tracker_core::model::SheetLayout;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://tracker.sqlite3";
pub const DEFAULT_WORKSHEET: &str = "Progress";

/// Runtime settings for the tracker, read from `TRACKER_*` environment variables.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub db_url: String,
    pub worksheet: String,
    pub layout: SheetLayout,
    pub log_policy: LogPolicy,
    pub retry: RetryPolicy,
    pub utc_offset: FixedOffset,
    pub sheets_api: Option<SheetsApiConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.into(),
            worksheet: DEFAULT_WORKSHEET.into(),
            layout: SheetLayout::default(),
            log_policy: LogPolicy::default(),
            retry: RetryPolicy::default(),
            utc_offset: utc(),
            sheets_api: None,
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl TrackerConfig {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let db_url = get("TRACKER_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into());
        let worksheet = get("TRACKER_WORKSHEET").unwrap_or_else(|| DEFAULT_WORKSHEET.into());
        let mut layout = SheetLayout::default();
        if let Some(raw) = get("TRACKER_COLUMNS") {
            let names = split_list(&raw);
            let [subject, week, lesson] = names.as_slice() else {
                return Err(ConfigError::Invalid {
                    key: "TRACKER_COLUMNS",
                    value: raw,
                });
            };
            layout = layout.with_system_columns(subject.as_str(), week.as_str(), lesson.as_str());
        }
        if let Some(raw) = get("TRACKER_SUBJECT_ORDER") {
            layout = layout.with_subject_order(split_list(&raw));
        }

        let cap = parse_or("TRACKER_LOG_CAP", get("TRACKER_LOG_CAP"), DEFAULT_LOG_CAP)?;
        let retention = match get("TRACKER_LOG_RETENTION") {
            None => LogRetention::default(),
            Some(value) => parse_retention(&value)?,
        };

        let attempts = parse_or(
            "TRACKER_RETRY_ATTEMPTS",
            get("TRACKER_RETRY_ATTEMPTS"),
            DEFAULT_EXTRA_ATTEMPTS,
        )?;
        let delay_ms = parse_or(
            "TRACKER_RETRY_DELAY_MS",
            get("TRACKER_RETRY_DELAY_MS"),
            u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(500),
        )?;

        let offset_minutes: i32 = parse_or(
            "TRACKER_UTC_OFFSET_MINUTES",
            get("TRACKER_UTC_OFFSET_MINUTES"),
            0,
        )?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                key: "TRACKER_UTC_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
            })?;

        let sheets_api = match (get("TRACKER_SHEETS_ID"), get("TRACKER_SHEETS_TOKEN")) {
            (Some(spreadsheet_id), Some(token)) => Some(SheetsApiConfig {
                base_url: get("TRACKER_SHEETS_API_URL")
                    .unwrap_or_else(|| DEFAULT_SHEETS_API_URL.into()),
                spreadsheet_id,
                worksheet: worksheet.clone(),
                token,
                header_rows: layout.header_rows(),
            }),
            _ => None,
        };

        Ok(Self {
            db_url,
            worksheet,
            layout,
            log_policy: LogPolicy::new(cap, retention),
            retry: RetryPolicy::new(attempts, Duration::from_millis(delay_ms)),
            utc_offset,
            sheets_api,
        })
    }

    /// Point the config at another database, as the CLI `--db` flag does.
    #[must_use]
    pub fn with_db_url(mut self, db_url: impl Into<String>) -> Self {
        self.db_url = db_url.into();
        self
    }

    /// Select another worksheet for every backend.
    #[must_use]
    pub fn with_worksheet(mut self, worksheet: impl Into<String>) -> Self {
        self.worksheet = worksheet.into();
        if let Some(api) = self.sheets_api.as_mut() {
            api.worksheet.clone_from(&self.worksheet);
        }
        self
    }
}

fn parse_or<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

// Comma-separated names, blanks dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

fn parse_retention(value: &str) -> Result<LogRetention, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "supersede" => Ok(LogRetention::Supersede),
        "daily" | "daily-history" => Ok(LogRetention::DailyHistory),
        _ => Err(ConfigError::Invalid {
            key: "TRACKER_LOG_RETENTION",
            value: value.to_string(),
        }),
    }
}
