use thiserror::Error;

/// Curriculum order used when a layout does not override it.
pub const DEFAULT_SUBJECT_ORDER: [&str; 20] = [
    "Cardiology",
    "Pulmonology",
    "Endocrinology",
    "Nephrology",
    "Gastroenterology",
    "Hepatology",
    "Infectious Diseases",
    "Hematology",
    "Rheumatology",
    "Neurology",
    "Psychiatry",
    "Surgery",
    "Gynecology",
    "Obstetrics",
    "Pediatrics",
    "Preventive Medicine",
    "Dermatology",
    "Orthopedics",
    "Otorhinolaryngology",
    "Ophthalmology",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearnerError {
    #[error("learner name cannot be empty")]
    EmptyName,

    #[error("`{0}` is a reserved column name")]
    Reserved(String),

    #[error("`{learner}` would share a log tag with learner `{existing}`")]
    TagClash { learner: String, existing: String },
}

/// Column naming and header conventions of the shared table.
///
/// Every header that is not one of the system columns is a learner column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    subject_column: String,
    order_column: String,
    title_column: String,
    log_column: String,
    header_rows: usize,
    subject_order: Vec<String>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            subject_column: "Subject".to_string(),
            order_column: "Week".to_string(),
            title_column: "Lesson".to_string(),
            log_column: "LastSeen".to_string(),
            header_rows: 1,
            subject_order: DEFAULT_SUBJECT_ORDER.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl SheetLayout {
    #[must_use]
    pub fn with_system_columns(
        mut self,
        subject: impl Into<String>,
        order: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.subject_column = subject.into();
        self.order_column = order.into();
        self.title_column = title.into();
        self
    }

    #[must_use]
    pub fn with_log_column(mut self, name: impl Into<String>) -> Self {
        self.log_column = name.into();
        self
    }

    /// Number of header rows above the first data row (at least one).
    #[must_use]
    pub fn with_header_rows(mut self, rows: usize) -> Self {
        self.header_rows = rows.max(1);
        self
    }

    #[must_use]
    pub fn with_subject_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_order = order.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn subject_column(&self) -> &str {
        &self.subject_column
    }

    #[must_use]
    pub fn order_column(&self) -> &str {
        &self.order_column
    }

    #[must_use]
    pub fn title_column(&self) -> &str {
        &self.title_column
    }

    #[must_use]
    pub fn log_column(&self) -> &str {
        &self.log_column
    }

    #[must_use]
    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    #[must_use]
    pub fn subject_order(&self) -> &[String] {
        &self.subject_order
    }

    /// Returns true for the system columns and the log column.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        [
            self.subject_column.as_str(),
            self.order_column.as_str(),
            self.title_column.as_str(),
            self.log_column.as_str(),
        ]
        .contains(&name)
    }

    /// Header names in the order a freshly authored table should carry them.
    #[must_use]
    pub fn system_headers(&self) -> Vec<String> {
        vec![
            self.subject_column.clone(),
            self.order_column.clone(),
            self.title_column.clone(),
            self.log_column.clone(),
        ]
    }

    /// Checks that `name` can be used as a learner column.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError::EmptyName` for blank names and
    /// `LearnerError::Reserved` when the name collides with a system column.
    pub fn validate_learner<'a>(&self, name: &'a str) -> Result<&'a str, LearnerError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(LearnerError::EmptyName);
        }
        if self.is_reserved(trimmed) {
            return Err(LearnerError::Reserved(trimmed.to_string()));
        }
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_are_exact_matches() {
        let layout = SheetLayout::default();
        assert!(layout.is_reserved("Subject"));
        assert!(layout.is_reserved("LastSeen"));
        assert!(!layout.is_reserved("subject"));
        assert!(!layout.is_reserved("Alice"));
    }

    #[test]
    fn validate_learner_rejects_blank_and_reserved() {
        let layout = SheetLayout::default().with_log_column("Log");
        assert_eq!(layout.validate_learner(" Alice "), Ok("Alice"));
        assert_eq!(layout.validate_learner("  "), Err(LearnerError::EmptyName));
        assert_eq!(
            layout.validate_learner("Log"),
            Err(LearnerError::Reserved("Log".into()))
        );
        assert!(layout.validate_learner("LastSeen").is_ok());
    }

    #[test]
    fn header_rows_never_drop_below_one() {
        let layout = SheetLayout::default().with_header_rows(0);
        assert_eq!(layout.header_rows(), 1);
    }
}
