use serde::{Deserialize, Serialize};

/// Raw value of a single cell as the remote table reports it.
///
/// Hosted tables hand back booleans, numbers, strings or nothing at all for the
/// same logical column. Everything past the snapshot boundary works with
/// normalized values instead; see [`CellValue::normalize`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    /// Strict boolean reading of a completion flag.
    ///
    /// - native booleans are returned as-is
    /// - text is `true` only when it reads `TRUE` once trimmed, ignoring case
    /// - numbers and empty cells are `false`
    ///
    /// Never fails. Writing the result back as [`CellValue::Bool`] (or its text
    /// form) and normalizing again yields the same value.
    #[must_use]
    pub fn normalize(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(text) => text.trim().eq_ignore_ascii_case("TRUE"),
            Self::Number(_) | Self::Empty => false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Numeric reading; text cells are parsed leniently (decimal comma allowed).
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) if value.is_finite() => Some(*value),
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed
                    .replace(',', ".")
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
            }
            _ => None,
        }
    }

    /// Canonical text form used by stores that only hold strings.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Empty => String::new(),
        }
    }
}

/// Free-function form of [`CellValue::normalize`].
#[must_use]
pub fn normalize(raw: &CellValue) -> bool {
    raw.normalize()
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
