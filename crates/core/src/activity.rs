//! Encoding of the shared activity-log cell.
//!
//! The cell holds `;`-separated tokens of the form
//! `<TAG>_<DD/MM/YYYY>_<HH:MM>_<REFERENCE>`, newest first. Each tag keeps at most
//! one live token under [`LogRetention::Supersede`], and the list is capped.
//! Position only orders entries of the same tag; across tags use the embedded
//! timestamp (see [`recent_activity`]).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

pub const ENTRY_SEPARATOR: char = ';';
pub const FIELD_SEPARATOR: char = '_';
pub const DEFAULT_LOG_CAP: usize = 30;

const ENTRY_JOINER: &str = ";";

const DATE_FORMAT: &str = "%d/%m/%Y";
const TIME_FORMAT: &str = "%H:%M";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagError {
    #[error("user tag cannot be empty")]
    Empty,

    #[error("user tag cannot contain `{0}`")]
    ForbiddenChar(char),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReferenceError {
    #[error("reference cannot be empty")]
    Empty,

    #[error("reference cannot contain `{0}`")]
    ForbiddenChar(char),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EntryParseError {
    #[error("log token is missing its {0} field")]
    MissingField(&'static str),

    #[error("invalid timestamp component: {0}")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

fn forbidden_char(value: &str) -> Option<char> {
    value
        .chars()
        .find(|c| *c == FIELD_SEPARATOR || *c == ENTRY_SEPARATOR)
}

//
// ─── TAGS & REFERENCES ─────────────────────────────────────────────────────────
//

/// Uppercase supersession key identifying a learner inside the log cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserTag(String);

impl UserTag {
    /// Validate an explicit tag (trimmed, uppercased).
    ///
    /// # Errors
    ///
    /// Returns `TagError` if the tag is empty or contains a separator.
    pub fn new(value: impl Into<String>) -> Result<Self, TagError> {
        let raw = value.into();
        let tag = raw.trim().to_uppercase();
        if tag.is_empty() {
            return Err(TagError::Empty);
        }
        if let Some(c) = forbidden_char(&tag) {
            return Err(TagError::ForbiddenChar(c));
        }
        Ok(Self(tag))
    }

    /// Derive a tag from a learner's column name: alphanumerics only, uppercased.
    ///
    /// `"Ana Clara"` becomes `ANACLARA`.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Empty` when the name has no alphanumeric characters.
    pub fn from_learner(name: &str) -> Result<Self, TagError> {
        let tag: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_uppercase)
            .collect();
        if tag.is_empty() {
            return Err(TagError::Empty);
        }
        Ok(Self(tag))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an entry points at (a unit or subject), stored uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference(String);

impl Reference {
    /// # Errors
    ///
    /// Returns `ReferenceError` if the value is empty or contains a separator.
    pub fn new(value: impl Into<String>) -> Result<Self, ReferenceError> {
        let raw = value.into();
        let reference = raw.trim().to_uppercase();
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if let Some(c) = forbidden_char(&reference) {
            return Err(ReferenceError::ForbiddenChar(c));
        }
        Ok(Self(reference))
    }

    /// Build a reference from a free-form label, replacing separators with `-`.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::Empty` if nothing is left after trimming.
    pub fn from_label(label: &str) -> Result<Self, ReferenceError> {
        let cleaned: String = label
            .chars()
            .map(|c| {
                if c == FIELD_SEPARATOR || c == ENTRY_SEPARATOR {
                    '-'
                } else {
                    c
                }
            })
            .collect();
        Self::new(cleaned)
    }

    // Decoding keeps whatever follows the third separator, other writers included.
    fn decoded(raw: &str) -> Result<Self, ReferenceError> {
        let reference = raw.trim();
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }
        Ok(Self(reference.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// A single "who touched what, when" record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLogEntry {
    tag: UserTag,
    at: NaiveDateTime,
    reference: Reference,
}

impl ActivityLogEntry {
    /// `at` is truncated to the minute, the precision the cell stores.
    #[must_use]
    pub fn new(tag: UserTag, at: NaiveDateTime, reference: Reference) -> Self {
        let at = at
            .with_second(0)
            .and_then(|at| at.with_nanosecond(0))
            .unwrap_or(at);
        Self { tag, at, reference }
    }

    #[must_use]
    pub fn tag(&self) -> &UserTag {
        &self.tag
    }

    /// Local wall-clock time, minute precision.
    #[must_use]
    pub fn at(&self) -> NaiveDateTime {
        self.at
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.at.date()
    }

    #[must_use]
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{tag}{sep}{date}{sep}{time}{sep}{reference}",
            tag = self.tag,
            date = self.at.format(DATE_FORMAT),
            time = self.at.format(TIME_FORMAT),
            reference = self.reference,
            sep = FIELD_SEPARATOR,
        )
    }
}

impl fmt::Display for ActivityLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ActivityLogEntry {
    type Err = EntryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.trim().splitn(4, FIELD_SEPARATOR);
        let tag = fields
            .next()
            .filter(|field| !field.is_empty())
            .ok_or(EntryParseError::MissingField("tag"))?;
        let date = fields.next().ok_or(EntryParseError::MissingField("date"))?;
        let time = fields.next().ok_or(EntryParseError::MissingField("time"))?;
        let reference = fields
            .next()
            .ok_or(EntryParseError::MissingField("reference"))?;

        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| EntryParseError::InvalidTimestamp(date.to_string()))?;
        let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|_| EntryParseError::InvalidTimestamp(time.to_string()))?;

        Ok(Self {
            tag: UserTag::new(tag)?,
            at: date.and_time(time),
            reference: Reference::decoded(reference)?,
        })
    }
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// How a new entry replaces earlier entries of the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogRetention {
    /// One live entry per tag; history is discarded.
    #[default]
    Supersede,
    /// One entry per tag per calendar day, so day streaks can be rebuilt.
    DailyHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPolicy {
    cap: usize,
    retention: LogRetention,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            cap: DEFAULT_LOG_CAP,
            retention: LogRetention::Supersede,
        }
    }
}

impl LogPolicy {
    /// A cap of zero is raised to one so the newest entry always survives.
    #[must_use]
    pub fn new(cap: usize, retention: LogRetention) -> Self {
        Self {
            cap: cap.max(1),
            retention,
        }
    }

    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    #[must_use]
    pub fn retention(&self) -> LogRetention {
        self.retention
    }
}

//
// ─── CODEC ─────────────────────────────────────────────────────────────────────
//

fn tokens(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn token_tag(token: &str) -> &str {
    token
        .split_once(FIELD_SEPARATOR)
        .map_or(token, |(tag, _)| tag)
}

fn token_date(token: &str) -> Option<&str> {
    token.split(FIELD_SEPARATOR).nth(1)
}

/// Merge `entry` into an existing log cell and return the new cell text.
///
/// The entry goes first, superseded tokens of the same tag are removed, tokens
/// of other tags are kept verbatim (malformed ones included), and the result is
/// truncated to the policy cap.
#[must_use]
pub fn merge(existing: &str, entry: &ActivityLogEntry, policy: &LogPolicy) -> String {
    let encoded = entry.encode();
    let date = entry.at.format(DATE_FORMAT).to_string();
    let superseded = |token: &str| {
        token_tag(token) == entry.tag.as_str()
            && match policy.retention {
                LogRetention::Supersede => true,
                LogRetention::DailyHistory => token_date(token) == Some(date.as_str()),
            }
    };

    std::iter::once(encoded.as_str())
        .chain(tokens(existing).filter(|token| !superseded(*token)))
        .take(policy.cap)
        .collect::<Vec<_>>()
        .join(ENTRY_JOINER)
}

/// Every well-formed entry in cell order; malformed tokens are skipped.
#[must_use]
pub fn decode_entries(cell: &str) -> Vec<ActivityLogEntry> {
    tokens(cell).filter_map(|token| token.parse().ok()).collect()
}

/// The live (first well-formed) entry for `tag`.
#[must_use]
pub fn decode_for_tag(cell: &str, tag: &UserTag) -> Option<ActivityLogEntry> {
    tokens(cell)
        .filter(|token| token_tag(token) == tag.as_str())
        .find_map(|token| token.parse().ok())
}

/// Dates of every well-formed entry for `tag`.
///
/// Under [`LogRetention::Supersede`] this holds at most one date.
#[must_use]
pub fn decode_all_dates_for_tag(cell: &str, tag: &UserTag) -> BTreeSet<NaiveDate> {
    tokens(cell)
        .filter(|token| token_tag(token) == tag.as_str())
        .filter_map(|token| token.parse::<ActivityLogEntry>().ok())
        .map(|entry| entry.date())
        .collect()
}

/// Well-formed entries ordered by their embedded timestamp, newest first.
#[must_use]
pub fn recent_activity(cell: &str) -> Vec<ActivityLogEntry> {
    let mut entries = decode_entries(cell);
    entries.sort_by(|a, b| b.at.cmp(&a.at));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn entry(tag: &str, when: NaiveDateTime, reference: &str) -> ActivityLogEntry {
        ActivityLogEntry::new(
            UserTag::new(tag).unwrap(),
            when,
            Reference::new(reference).unwrap(),
        )
    }

    #[test]
    fn encodes_expected_token() {
        let e = entry("alice", at(5, 9, 7), "Cardiology");
        assert_eq!(e.encode(), "ALICE_05/03/2024_09:07_CARDIOLOGY");
    }

    #[test]
    fn seconds_are_dropped_so_decoding_gives_back_the_entry() {
        let with_seconds = at(5, 9, 7).with_second(42).unwrap().with_nanosecond(5).unwrap();
        let e = entry("alice", with_seconds, "Cardiology");
        assert_eq!(e.at(), at(5, 9, 7));
        assert_eq!(e.encode().parse::<ActivityLogEntry>().unwrap(), e);
    }

    #[test]
    fn merge_supersedes_same_tag() {
        let policy = LogPolicy::default();
        let first = merge("", &entry("ALICE", at(1, 8, 0), "Cardiology"), &policy);
        let second = merge(&first, &entry("ALICE", at(2, 8, 0), "Surgery"), &policy);
        assert_eq!(second, "ALICE_02/03/2024_08:00_SURGERY");
    }

    #[test]
    fn merge_keeps_other_tags_newest_first() {
        let policy = LogPolicy::default();
        let cell = merge("", &entry("ALICE", at(1, 8, 0), "Cardiology"), &policy);
        let cell = merge(&cell, &entry("BOB", at(1, 9, 0), "Surgery"), &policy);
        assert_eq!(
            cell,
            "BOB_01/03/2024_09:00_SURGERY;ALICE_01/03/2024_08:00_CARDIOLOGY"
        );
    }

    #[test]
    fn merge_caps_oldest_first() {
        let policy = LogPolicy::new(3, LogRetention::Supersede);
        let mut cell = String::new();
        for (i, tag) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            let minute = u32::try_from(i).unwrap();
            cell = merge(&cell, &entry(tag, at(1, 10, minute), "X"), &policy);
        }
        let tags: Vec<_> = cell.split(';').map(token_tag).collect();
        assert_eq!(tags, vec!["E", "D", "C"]);
    }

    #[test]
    fn merge_drops_empty_tokens_and_keeps_foreign_garbage() {
        let policy = LogPolicy::default();
        let cell = merge(
            ";;garbage;ALICE_broken;",
            &entry("ALICE", at(1, 8, 0), "Cardiology"),
            &policy,
        );
        assert_eq!(cell, "ALICE_01/03/2024_08:00_CARDIOLOGY;garbage");
    }

    #[test]
    fn daily_history_keeps_one_entry_per_day() {
        let policy = LogPolicy::new(10, LogRetention::DailyHistory);
        let cell = merge("", &entry("ALICE", at(1, 8, 0), "A"), &policy);
        let cell = merge(&cell, &entry("ALICE", at(1, 20, 0), "B"), &policy);
        let cell = merge(&cell, &entry("ALICE", at(2, 8, 0), "C"), &policy);
        assert_eq!(
            cell,
            "ALICE_02/03/2024_08:00_C;ALICE_01/03/2024_20:00_B"
        );
        let tag = UserTag::new("ALICE").unwrap();
        let dates = decode_all_dates_for_tag(&cell, &tag);
        assert_eq!(dates.len(), 2);
    }

    #[test]
    fn decode_for_tag_skips_malformed_tokens() {
        let cell = "ALICE_99/99/2024_10:00_X;BOB_01/03/2024_10:00_SURGERY;ALICE_01/03/2024_08:00_CARDIOLOGY";
        let tag = UserTag::new("ALICE").unwrap();
        let found = decode_for_tag(cell, &tag).unwrap();
        assert_eq!(found.reference().as_str(), "CARDIOLOGY");
        assert_eq!(found.at(), at(1, 8, 0));
        assert!(decode_for_tag(cell, &UserTag::new("CAROL").unwrap()).is_none());
    }

    #[test]
    fn reference_is_everything_after_third_separator() {
        let parsed: ActivityLogEntry = "BOB_01/03/2024_10:00_WEEK_3".parse().unwrap();
        assert_eq!(parsed.reference().as_str(), "WEEK_3");
    }

    #[test]
    fn parse_errors_are_reported() {
        assert_eq!(
            "ALICE".parse::<ActivityLogEntry>().unwrap_err(),
            EntryParseError::MissingField("date")
        );
        assert!(matches!(
            "ALICE_01/03/2024_25:00_X".parse::<ActivityLogEntry>(),
            Err(EntryParseError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            "ALICE_01/03/2024_10:00_ ".parse::<ActivityLogEntry>(),
            Err(EntryParseError::Reference(ReferenceError::Empty))
        ));
    }

    #[test]
    fn tags_and_references_reject_separators() {
        assert_eq!(UserTag::new("A_B"), Err(TagError::ForbiddenChar('_')));
        assert_eq!(UserTag::new(" "), Err(TagError::Empty));
        assert_eq!(Reference::new("X;Y"), Err(ReferenceError::ForbiddenChar(';')));
        assert_eq!(
            Reference::from_label("Week_1;A").unwrap().as_str(),
            "WEEK-1-A"
        );
    }

    #[test]
    fn tag_from_learner_strips_non_alphanumerics() {
        assert_eq!(UserTag::from_learner("Ana Clara").unwrap().as_str(), "ANACLARA");
        assert_eq!(UserTag::from_learner("alice").unwrap().as_str(), "ALICE");
        assert_eq!(UserTag::from_learner("_;_"), Err(TagError::Empty));
    }

    #[test]
    fn recent_activity_orders_by_timestamp_not_position() {
        let cell = "BOB_01/03/2024_09:00_X;ALICE_02/03/2024_08:00_Y";
        let recent = recent_activity(cell);
        assert_eq!(recent[0].tag().as_str(), "ALICE");
        assert_eq!(recent[1].tag().as_str(), "BOB");
    }
}
