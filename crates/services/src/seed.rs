use storage::repository::{SheetStore, StorageError};
use tracker_core::model::{CellValue, RowIndex, SheetLayout};
use tracing::info;

/// One authored row of the curriculum.
#[derive(Debug, Clone, PartialEq)]
pub struct CurriculumRow {
    pub subject: String,
    pub week: f64,
    pub lesson: String,
}

impl CurriculumRow {
    #[must_use]
    pub fn new(subject: impl Into<String>, week: f64, lesson: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            week,
            lesson: lesson.into(),
        }
    }
}

/// A small curriculum spanning the first subjects of the default order.
#[must_use]
pub fn demo_curriculum() -> Vec<CurriculumRow> {
    vec![
        CurriculumRow::new("Cardiology", 1.0, "Heart failure"),
        CurriculumRow::new("Cardiology", 1.0, "Hypertension"),
        CurriculumRow::new("Cardiology", 2.0, "Arrhythmias"),
        CurriculumRow::new("Pulmonology", 2.0, "Asthma"),
        CurriculumRow::new("Pulmonology", 3.0, "COPD"),
        CurriculumRow::new("Endocrinology", 3.0, "Diabetes mellitus"),
        CurriculumRow::new("Endocrinology", 4.0, "Thyroid disorders"),
        CurriculumRow::new("Nephrology", 4.0, "Acute kidney injury"),
        CurriculumRow::new("Neurology", 5.0, "Stroke"),
        CurriculumRow::new("Neurology", 5.5, "Epilepsy"),
    ]
}

/// Append `rows` under the existing data, creating the system columns first.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns `StorageError` if a header append, read or cell write fails; rows
/// written before the failure stay in place.
pub async fn seed_curriculum(
    store: &dyn SheetStore,
    layout: &SheetLayout,
    rows: &[CurriculumRow],
) -> Result<usize, StorageError> {
    let mut columns = Vec::new();
    for header in layout.system_headers() {
        columns.push(store.append_header(&header).await?);
    }
    let [subject, week, lesson, ..] = columns[..] else {
        return Err(StorageError::Serialization("layout has too few system columns".into()));
    };

    let start = store.read_snapshot().await?.row_count();
    for (offset, row) in rows.iter().enumerate() {
        let index = RowIndex::new(start + offset);
        store
            .write_cell(index, subject, CellValue::Text(row.subject.clone()))
            .await?;
        store
            .write_cell(index, week, CellValue::Number(row.week))
            .await?;
        store
            .write_cell(index, lesson, CellValue::Text(row.lesson.clone()))
            .await?;
    }
    info!(rows = rows.len(), start, "seeded curriculum");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use storage::repository::InMemorySheet;
    use tracker_core::progress::ordered_subjects;

    use super::*;

    #[tokio::test]
    async fn seeding_twice_appends_below_existing_rows() {
        let sheet = InMemorySheet::new();
        let layout = SheetLayout::default();
        let rows = demo_curriculum();

        seed_curriculum(&sheet, &layout, &rows).await.unwrap();
        seed_curriculum(&sheet, &layout, &rows[..2]).await.unwrap();

        let snapshot = sheet.peek().unwrap();
        assert_eq!(snapshot.headers(), layout.system_headers().as_slice());
        assert_eq!(snapshot.row_count(), rows.len() + 2);
        let units = snapshot.units(&layout);
        assert_eq!(units[0].week(), Some(1));
        assert_eq!(
            ordered_subjects(&units, layout.subject_order())[..2],
            ["Cardiology".to_string(), "Pulmonology".to_string()]
        );
        assert!(snapshot.learners(&layout).is_empty());
    }
}
