use std::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, info, warn};

use storage::repository::{SheetStore, StorageError};
use tracker_core::activity::{merge, ActivityLogEntry, LogPolicy, Reference, UserTag};
use tracker_core::model::{
    CellValue, ColumnIndex, LearnerError, RowIndex, SheetLayout, Snapshot,
};
use tracker_core::time::Clock;

use crate::error::SyncError;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

/// Where a toggle is in its read-modify-write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Reading,
    Mutating,
    Writing,
    WritingLog,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Reading => "reading",
            Self::Mutating => "mutating",
            Self::Writing => "writing",
            Self::WritingLog => "writing log",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

fn failed(phase: SyncPhase) -> impl FnOnce(StorageError) -> SyncError {
    move |source| {
        warn!(%phase, error = %source, "sync failed");
        SyncError::Failed { phase, source }
    }
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Result of a toggle that reached the store (or did not need to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub row: RowIndex,
    pub learner: String,
    pub completed: bool,
    pub changed: bool,
    pub logged: Option<ActivityLogEntry>,
}

struct LogWrite {
    column: ColumnIndex,
    cell: String,
    entry: ActivityLogEntry,
}

//
// ─── COORDINATOR ───────────────────────────────────────────────────────────────
//

/// Applies one learner's completion change to the shared table.
///
/// Every call re-reads the full table. Nothing is locked: two callers that read
/// the same snapshot and both rewrite the log cell race, and the later write
/// replaces the earlier entry.
#[derive(Clone)]
pub struct SyncCoordinator {
    clock: Clock,
    store: Arc<dyn SheetStore>,
    layout: SheetLayout,
    policy: LogPolicy,
    utc_offset: FixedOffset,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn SheetStore>, layout: SheetLayout) -> Self {
        Self {
            clock: Clock::default(),
            store,
            layout,
            policy: LogPolicy::default(),
            utc_offset: Utc.fix(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_log_policy(mut self, policy: LogPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Offset used for the wall-clock time written into log entries.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// Fetch a fresh snapshot of the whole table.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Failed` in the `Reading` phase if the store read fails.
    pub async fn read_snapshot(&self) -> Result<Snapshot, SyncError> {
        debug!(phase = %SyncPhase::Reading);
        self.store
            .read_snapshot()
            .await
            .map_err(failed(SyncPhase::Reading))
    }

    /// Make sure `user` has a column, appending the header the first time.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Learner` for blank or reserved names and for names
    /// whose log tag matches another learner's, and `SyncError::Failed` if the
    /// read or header append fails.
    pub async fn ensure_learner(&self, user: &str) -> Result<ColumnIndex, SyncError> {
        let learner = self.layout.validate_learner(user)?;
        let snapshot = self.read_snapshot().await?;
        self.check_tag_clash(&snapshot, learner)?;
        if let Some(column) = snapshot.find_column(learner) {
            return Ok(column);
        }
        info!(learner, "creating learner column");
        self.store
            .append_header(learner)
            .await
            .map_err(failed(SyncPhase::Writing))
    }

    /// Set `user`'s completion flag on `row` to `desired`.
    ///
    /// Reads the table, creates the learner column if needed (re-reading once
    /// afterwards), then hands over to [`Self::apply_toggle`].
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Failed` naming the phase whose store call failed,
    /// `SyncError::UnknownRow` for rows outside the table, and
    /// `SyncError::Learner` for names that fail validation.
    pub async fn toggle_completion(
        &self,
        row: RowIndex,
        user: &str,
        desired: bool,
    ) -> Result<ToggleOutcome, SyncError> {
        let learner = self.layout.validate_learner(user)?;
        let mut snapshot = self.read_snapshot().await?;
        self.check_tag_clash(&snapshot, learner)?;

        if snapshot.find_column(learner).is_none() {
            info!(learner, "creating learner column");
            self.store
                .append_header(learner)
                .await
                .map_err(failed(SyncPhase::Writing))?;
            snapshot = self.read_snapshot().await?;
        }

        self.apply_toggle(&snapshot, row, learner, desired).await
    }

    /// Write half of a toggle against an already-read `snapshot`.
    ///
    /// The flag cell is written first; when `desired` is true and the table
    /// has a log column, the merged log cell follows. A failure in the log
    /// write leaves the flag written.
    ///
    /// # Errors
    ///
    /// Same as [`Self::toggle_completion`], plus `SyncError::MissingColumn`
    /// when the snapshot has no column for the learner.
    pub async fn apply_toggle(
        &self,
        snapshot: &Snapshot,
        row: RowIndex,
        user: &str,
        desired: bool,
    ) -> Result<ToggleOutcome, SyncError> {
        let learner = self.layout.validate_learner(user)?;
        self.check_tag_clash(snapshot, learner)?;
        debug!(phase = %SyncPhase::Mutating, %row, learner);
        if !snapshot.contains_row(row) {
            return Err(SyncError::UnknownRow(row));
        }
        let column = snapshot
            .find_column(learner)
            .ok_or_else(|| SyncError::MissingColumn(learner.to_string()))?;

        let mut outcome = ToggleOutcome {
            row,
            learner: learner.to_string(),
            completed: desired,
            changed: false,
            logged: None,
        };
        if snapshot.flag(row, column) == desired {
            debug!(%row, learner, desired, "flag already set, nothing to write");
            return Ok(outcome);
        }

        let log_write = if desired {
            self.prepare_log(snapshot, row, learner)
        } else {
            None
        };

        debug!(phase = %SyncPhase::Writing, %row, learner);
        self.store
            .write_cell(row, column, CellValue::Bool(desired))
            .await
            .map_err(failed(SyncPhase::Writing))?;
        outcome.changed = true;

        if let Some(log) = log_write {
            debug!(phase = %SyncPhase::WritingLog, learner);
            self.store
                .write_cell(RowIndex::new(0), log.column, CellValue::Text(log.cell))
                .await
                .map_err(failed(SyncPhase::WritingLog))?;
            outcome.logged = Some(log.entry);
        }

        info!(%row, learner, completed = desired, "completion updated");
        Ok(outcome)
    }

    // Two learner columns must never map to the same supersession key.
    fn check_tag_clash(&self, snapshot: &Snapshot, learner: &str) -> Result<(), LearnerError> {
        let Ok(tag) = UserTag::from_learner(learner) else {
            return Ok(());
        };
        let clash = snapshot.learners(&self.layout).into_iter().find(|other| {
            other.trim() != learner && UserTag::from_learner(other).is_ok_and(|t| t == tag)
        });
        match clash {
            Some(existing) => Err(LearnerError::TagClash {
                learner: learner.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }

    // The log entry is best effort; the flag write never depends on it.
    fn prepare_log(&self, snapshot: &Snapshot, row: RowIndex, learner: &str) -> Option<LogWrite> {
        let column = snapshot.find_column(self.layout.log_column())?;
        let tag = match UserTag::from_learner(learner) {
            Ok(tag) => tag,
            Err(error) => {
                warn!(learner, %error, "no log tag for learner, skipping log entry");
                return None;
            }
        };
        let subject = snapshot
            .value(row, self.layout.subject_column())
            .to_display_string();
        let reference = match Reference::from_label(&subject) {
            Ok(reference) => reference,
            Err(error) => {
                warn!(%row, %error, "row has no subject, logging it by row number");
                Reference::new(format!("ROW-{}", row.value() + 1)).ok()?
            }
        };
        let entry = ActivityLogEntry::new(tag, self.clock.local_now(self.utc_offset), reference);
        let existing = snapshot.log_cell(&self.layout).unwrap_or_default();
        Some(LogWrite {
            column,
            cell: merge(&existing, &entry, &self.policy),
            entry,
        })
    }
}
