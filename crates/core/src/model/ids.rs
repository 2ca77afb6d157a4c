use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zero-based position of a data row within a snapshot (header rows excluded).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowIndex(usize);

impl RowIndex {
    /// Creates a new `RowIndex`
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index
    #[must_use]
    pub fn value(&self) -> usize {
        self.0
    }

    /// One-based row number in the remote table, accounting for header rows.
    ///
    /// With a single header row the first data row is remote row 2.
    #[must_use]
    pub fn remote_row(&self, header_rows: usize) -> usize {
        self.0 + header_rows + 1
    }
}

/// Zero-based position of a column in the header row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnIndex(usize);

impl ColumnIndex {
    /// Creates a new `ColumnIndex`
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index
    #[must_use]
    pub fn value(&self) -> usize {
        self.0
    }

    /// One-based column number in the remote table.
    #[must_use]
    pub fn remote_column(&self) -> usize {
        self.0 + 1
    }
}

impl fmt::Debug for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowIndex({})", self.0)
    }
}

impl fmt::Debug for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnIndex({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an index from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIndexError {
    kind: String,
}

impl fmt::Display for ParseIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIndexError {}

impl FromStr for RowIndex {
    type Err = ParseIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<usize>()
            .map(RowIndex::new)
            .map_err(|_| ParseIndexError {
                kind: "RowIndex".to_string(),
            })
    }
}

impl FromStr for ColumnIndex {
    type Err = ParseIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<usize>()
            .map(ColumnIndex::new)
            .map_err(|_| ParseIndexError {
                kind: "ColumnIndex".to_string(),
            })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
