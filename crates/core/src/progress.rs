//! Pure roll-ups of completion flags.
//!
//! Every function here works over already-normalized [`StudyUnit`]s and is
//! total: empty inputs produce zeroes, never errors.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::model::StudyUnit;

#[allow(clippy::cast_precision_loss)]
fn ratio(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    }
}

/// Completion figures for one partition of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupProgress<K> {
    pub key: K,
    pub completed: usize,
    pub total: usize,
    /// Fraction in `[0.0, 1.0]`; `0.0` for an empty group.
    pub pct: f64,
}

impl<K> GroupProgress<K> {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub learner: String,
    pub completed: usize,
}

/// Number of units the learner has completed.
#[must_use]
pub fn completed_count(units: &[StudyUnit], learner: &str) -> usize {
    units
        .iter()
        .filter(|unit| unit.is_completed_by(learner))
        .count()
}

/// Completed units over all units in the table.
#[must_use]
pub fn unit_progress(units: &[StudyUnit], learner: &str) -> f64 {
    ratio(completed_count(units, learner), units.len())
}

/// Partition units by `key_fn` and compute per-partition progress.
///
/// Groups come back in first-encountered order.
pub fn group_progress<K, F>(units: &[StudyUnit], learner: &str, key_fn: F) -> Vec<GroupProgress<K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&StudyUnit) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<GroupProgress<K>> = Vec::new();

    for unit in units {
        let key = key_fn(unit);
        let index = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(GroupProgress {
                key,
                completed: 0,
                total: 0,
                pct: 0.0,
            });
            groups.len() - 1
        });
        let group = &mut groups[index];
        group.total += 1;
        if unit.is_completed_by(learner) {
            group.completed += 1;
        }
    }

    for group in &mut groups {
        group.pct = ratio(group.completed, group.total);
    }
    groups
}

/// Learners ordered by completed count, descending; ties by name, ascending.
#[must_use]
pub fn cohort_ranking(units: &[StudyUnit], learners: &[String]) -> Vec<RankEntry> {
    let mut ranking: Vec<RankEntry> = learners
        .iter()
        .map(|learner| RankEntry {
            learner: learner.clone(),
            completed: completed_count(units, learner),
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.completed
            .cmp(&a.completed)
            .then_with(|| a.learner.cmp(&b.learner))
    });
    ranking
}

/// Group with the highest completion fraction for the learner.
///
/// Ties go to the group encountered first.
pub fn favorite_group<K, F>(units: &[StudyUnit], learner: &str, key_fn: F) -> Option<(K, f64)>
where
    K: Eq + Hash + Clone,
    F: Fn(&StudyUnit) -> K,
{
    let mut best: Option<GroupProgress<K>> = None;
    for group in group_progress(units, learner, key_fn) {
        if group.total == 0 {
            continue;
        }
        match &best {
            Some(current) if group.pct <= current.pct => {}
            _ => best = Some(group),
        }
    }
    best.map(|group| (group.key, group.pct))
}

/// Subjects in display order: the preferred order first (only those present),
/// then any others in first-seen order.
#[must_use]
pub fn ordered_subjects(units: &[StudyUnit], preferred: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for unit in units {
        if !seen.iter().any(|s| s == unit.subject()) {
            seen.push(unit.subject().to_string());
        }
    }

    let mut ordered: Vec<String> = preferred
        .iter()
        .filter(|subject| seen.contains(subject))
        .cloned()
        .collect();
    ordered.extend(seen.into_iter().filter(|subject| !preferred.contains(subject)));
    ordered
}

/// Units of one subject sorted by order key; units without a key go last.
#[must_use]
pub fn units_in_subject<'a>(units: &'a [StudyUnit], subject: &str) -> Vec<&'a StudyUnit> {
    let mut selected: Vec<&StudyUnit> = units
        .iter()
        .filter(|unit| unit.subject() == subject)
        .collect();
    selected.sort_by(|a, b| match (a.order_key(), b.order_key()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    selected
}
