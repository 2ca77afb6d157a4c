use std::collections::BTreeMap;

use crate::model::ids::RowIndex;

/// One lesson row with its completion flags already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyUnit {
    row: RowIndex,
    subject: String,
    order_key: Option<f64>,
    title: String,
    completions: BTreeMap<String, bool>,
}

impl StudyUnit {
    #[must_use]
    pub fn new(
        row: RowIndex,
        subject: impl Into<String>,
        order_key: Option<f64>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            row,
            subject: subject.into(),
            order_key: order_key.filter(|key| key.is_finite()),
            title: title.into(),
            completions: BTreeMap::new(),
        }
    }

    /// Record a learner's (normalized) completion flag.
    #[must_use]
    pub fn with_completion(mut self, learner: impl Into<String>, completed: bool) -> Self {
        self.completions.insert(learner.into(), completed);
        self
    }

    #[must_use]
    pub fn row(&self) -> RowIndex {
        self.row
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn order_key(&self) -> Option<f64> {
        self.order_key
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Week number derived from the order key (fractional keys round down).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn week(&self) -> Option<u32> {
        self.order_key
            .filter(|key| *key >= 0.0 && *key <= f64::from(u32::MAX))
            .map(|key| key.floor() as u32)
    }

    /// Unknown learners have not completed anything.
    #[must_use]
    pub fn is_completed_by(&self, learner: &str) -> bool {
        self.completions.get(learner).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_floors_fractional_keys() {
        let unit = StudyUnit::new(RowIndex::new(0), "Cardiology", Some(2.5), "Valves");
        assert_eq!(unit.week(), Some(2));
        let missing = StudyUnit::new(RowIndex::new(1), "Cardiology", None, "Intro");
        assert_eq!(missing.week(), None);
        let negative = StudyUnit::new(RowIndex::new(2), "Cardiology", Some(-1.0), "Odd");
        assert_eq!(negative.week(), None);
    }

    #[test]
    fn absent_learner_is_not_complete() {
        let unit = StudyUnit::new(RowIndex::new(0), "Cardiology", Some(1.0), "Intro")
            .with_completion("Alice", true);
        assert!(unit.is_completed_by("Alice"));
        assert!(!unit.is_completed_by("Bob"));
    }

    #[test]
    fn non_finite_order_key_is_dropped() {
        let unit = StudyUnit::new(RowIndex::new(0), "Surgery", Some(f64::NAN), "Sutures");
        assert_eq!(unit.order_key(), None);
    }
}
