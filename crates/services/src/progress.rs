use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use storage::repository::SheetStore;
use tracker_core::activity::{
    decode_all_dates_for_tag, decode_for_tag, recent_activity, ActivityLogEntry, UserTag,
};
use tracker_core::model::{SheetLayout, Snapshot, StudyUnit};
use tracker_core::progress::{
    cohort_ranking, completed_count, favorite_group, group_progress, ordered_subjects,
    unit_progress, units_in_subject, GroupProgress, RankEntry,
};
use tracker_core::streak::compute_streak;
use tracker_core::time::Clock;

use crate::error::ProgressError;

/// How to partition units for [`ProgressService::get_group_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Subject,
    Week,
}

/// Group label for units without a usable week number.
pub const UNSCHEDULED: &str = "Unscheduled";

fn week_label(unit: &StudyUnit) -> String {
    unit.week()
        .map_or_else(|| UNSCHEDULED.to_string(), |week| format!("Week {week}"))
}

/// Everything the dashboard shows for one learner, taken from a single snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerOverview {
    pub learner: String,
    pub completed: usize,
    pub total: usize,
    pub pct: f64,
    pub streak: u32,
    pub resume: Option<ActivityLogEntry>,
    pub favorite_subject: Option<(String, f64)>,
    pub subjects: Vec<GroupProgress<String>>,
}

/// Read-side queries over fresh snapshots of the shared table.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: Arc<dyn SheetStore>,
    layout: SheetLayout,
    utc_offset: FixedOffset,
}

impl ProgressService {
    #[must_use]
    pub fn new(store: Arc<dyn SheetStore>, layout: SheetLayout) -> Self {
        Self {
            clock: Clock::default(),
            store,
            layout,
            utc_offset: Utc.fix(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Offset that decides which calendar day counts as today for streaks.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.local_now(self.utc_offset).date()
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn read_snapshot(&self) -> Result<Snapshot, ProgressError> {
        Ok(self.store.read_snapshot().await?)
    }

    /// All units with normalized completion flags.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn units(&self) -> Result<Vec<StudyUnit>, ProgressError> {
        Ok(self.read_snapshot().await?.units(&self.layout))
    }

    /// Learner column names in header order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn learners(&self) -> Result<Vec<String>, ProgressError> {
        Ok(self.read_snapshot().await?.learners(&self.layout))
    }

    /// Subjects in curriculum order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn subjects(&self) -> Result<Vec<String>, ProgressError> {
        let units = self.units().await?;
        Ok(ordered_subjects(&units, self.layout.subject_order()))
    }

    /// Units of one subject in week order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn subject_units(&self, subject: &str) -> Result<Vec<StudyUnit>, ProgressError> {
        let units = self.units().await?;
        Ok(units_in_subject(&units, subject)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Per-subject or per-week progress for `user`.
    ///
    /// Subjects follow curriculum order; weeks follow table order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Learner` for invalid names and
    /// `ProgressError::Storage` if the store cannot be read.
    pub async fn get_group_progress(
        &self,
        user: &str,
        grouping: Grouping,
    ) -> Result<Vec<GroupProgress<String>>, ProgressError> {
        let learner = self.layout.validate_learner(user)?;
        let units = self.units().await?;
        Ok(match grouping {
            Grouping::Subject => self.subject_progress(&units, learner),
            Grouping::Week => group_progress(&units, learner, week_label),
        })
    }

    /// Consecutive study days ending today or yesterday.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` for invalid names or if the store cannot be read.
    pub async fn get_streak(&self, user: &str) -> Result<u32, ProgressError> {
        let tag = self.tag_for(user)?;
        let snapshot = self.read_snapshot().await?;
        Ok(self.streak_in(&snapshot, &tag))
    }

    /// Latest log entry for `user`, pointing at what they studied last.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` for invalid names or if the store cannot be read.
    pub async fn get_resume_reference(
        &self,
        user: &str,
    ) -> Result<Option<ActivityLogEntry>, ProgressError> {
        let tag = self.tag_for(user)?;
        let snapshot = self.read_snapshot().await?;
        Ok(snapshot
            .log_cell(&self.layout)
            .and_then(|cell| decode_for_tag(&cell, &tag)))
    }

    /// # Errors
    ///
    /// Returns `ProgressError` for invalid names or if the store cannot be read.
    pub async fn overview(&self, user: &str) -> Result<LearnerOverview, ProgressError> {
        let learner = self.layout.validate_learner(user)?;
        let tag = UserTag::from_learner(learner)?;
        let snapshot = self.read_snapshot().await?;
        let units = snapshot.units(&self.layout);

        Ok(LearnerOverview {
            learner: learner.to_string(),
            completed: completed_count(&units, learner),
            total: units.len(),
            pct: unit_progress(&units, learner),
            streak: self.streak_in(&snapshot, &tag),
            resume: snapshot
                .log_cell(&self.layout)
                .and_then(|cell| decode_for_tag(&cell, &tag)),
            favorite_subject: favorite_group(&units, learner, |unit| unit.subject().to_string()),
            subjects: self.subject_progress(&units, learner),
        })
    }

    /// Every learner ranked by completed units.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn cohort_ranking(&self) -> Result<Vec<RankEntry>, ProgressError> {
        let snapshot = self.read_snapshot().await?;
        let units = snapshot.units(&self.layout);
        Ok(cohort_ranking(&units, &snapshot.learners(&self.layout)))
    }

    /// Up to `limit` log entries, newest first, across all learners.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn recent_activity(
        &self,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, ProgressError> {
        let snapshot = self.read_snapshot().await?;
        let mut entries = snapshot
            .log_cell(&self.layout)
            .map(|cell| recent_activity(&cell))
            .unwrap_or_default();
        entries.truncate(limit);
        Ok(entries)
    }

    fn tag_for(&self, user: &str) -> Result<UserTag, ProgressError> {
        let learner = self.layout.validate_learner(user)?;
        Ok(UserTag::from_learner(learner)?)
    }

    fn streak_in(&self, snapshot: &Snapshot, tag: &UserTag) -> u32 {
        let dates = snapshot
            .log_cell(&self.layout)
            .map(|cell| decode_all_dates_for_tag(&cell, tag))
            .unwrap_or_default();
        compute_streak(&dates, self.today())
    }

    fn subject_progress(&self, units: &[StudyUnit], learner: &str) -> Vec<GroupProgress<String>> {
        let mut groups = group_progress(units, learner, |unit| unit.subject().to_string());
        let order = ordered_subjects(units, self.layout.subject_order());
        groups.sort_by_key(|group| {
            order
                .iter()
                .position(|subject| subject == &group.key)
                .unwrap_or(usize::MAX)
        });
        groups
    }
}
