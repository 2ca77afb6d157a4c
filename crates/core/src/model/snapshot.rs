use crate::model::cell::CellValue;
use crate::model::ids::{ColumnIndex, RowIndex};
use crate::model::layout::SheetLayout;
use crate::model::unit::StudyUnit;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Point-in-time copy of the whole table: the header row plus every data row.
///
/// Rows may be ragged; cells past the end of a row read as empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Snapshot {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn contains_row(&self, row: RowIndex) -> bool {
        row.value() < self.rows.len()
    }

    /// Case-sensitive exact match against the header row.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<ColumnIndex> {
        self.headers
            .iter()
            .position(|header| header == name)
            .map(ColumnIndex::new)
    }

    #[must_use]
    pub fn cell(&self, row: RowIndex, column: ColumnIndex) -> &CellValue {
        self.rows
            .get(row.value())
            .and_then(|cells| cells.get(column.value()))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Cell lookup by header name; unknown columns read as empty.
    #[must_use]
    pub fn value(&self, row: RowIndex, column: &str) -> &CellValue {
        match self.find_column(column) {
            Some(index) => self.cell(row, index),
            None => &EMPTY_CELL,
        }
    }

    /// Normalized completion flag at the given location.
    #[must_use]
    pub fn flag(&self, row: RowIndex, column: ColumnIndex) -> bool {
        self.cell(row, column).normalize()
    }

    /// Learner columns in header order.
    #[must_use]
    pub fn learners(&self, layout: &SheetLayout) -> Vec<String> {
        self.headers
            .iter()
            .filter(|header| !header.trim().is_empty() && !layout.is_reserved(header))
            .cloned()
            .collect()
    }

    /// Contents of the shared activity-log cell (first data row).
    ///
    /// Returns `None` when the table declares no log column. Log cells on
    /// other rows are ignored.
    #[must_use]
    pub fn log_cell(&self, layout: &SheetLayout) -> Option<String> {
        let column = self.find_column(layout.log_column())?;
        let raw = self.cell(RowIndex::new(0), column);
        Some(match raw {
            CellValue::Empty => String::new(),
            other => other.to_display_string(),
        })
    }

    /// Parse every data row into a `StudyUnit`, normalizing learner flags.
    #[must_use]
    pub fn units(&self, layout: &SheetLayout) -> Vec<StudyUnit> {
        let learners: Vec<(String, ColumnIndex)> = self
            .learners(layout)
            .into_iter()
            .filter_map(|name| self.find_column(&name).map(|index| (name, index)))
            .collect();

        (0..self.rows.len())
            .map(RowIndex::new)
            .map(|row| {
                let subject = self
                    .value(row, layout.subject_column())
                    .to_display_string()
                    .trim()
                    .to_string();
                let title = self
                    .value(row, layout.title_column())
                    .to_display_string()
                    .trim()
                    .to_string();
                let order_key = self.value(row, layout.order_column()).as_number();

                learners.iter().fold(
                    StudyUnit::new(row, subject, order_key, title),
                    |unit, (name, column)| unit.with_completion(name.clone(), self.flag(row, *column)),
                )
            })
            .collect()
    }

    /// Overwrite a single cell, growing the row as needed.
    ///
    /// Used by in-process stores; remote stores apply writes server-side.
    pub fn set_cell(&mut self, row: RowIndex, column: ColumnIndex, value: CellValue) {
        if self.rows.len() <= row.value() {
            self.rows.resize_with(row.value() + 1, Vec::new);
        }
        let cells = &mut self.rows[row.value()];
        if cells.len() <= column.value() {
            cells.resize_with(column.value() + 1, CellValue::default);
        }
        cells[column.value()] = value;
    }

    /// Append a header cell unless it already exists; returns its index.
    pub fn push_header(&mut self, name: &str) -> ColumnIndex {
        if let Some(existing) = self.find_column(name) {
            return existing;
        }
        self.headers.push(name.to_string());
        ColumnIndex::new(self.headers.len() - 1)
    }

    pub fn push_row(&mut self, cells: Vec<CellValue>) -> RowIndex {
        self.rows.push(cells);
        RowIndex::new(self.rows.len() - 1)
    }
}
