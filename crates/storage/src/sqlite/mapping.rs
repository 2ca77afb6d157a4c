use tracker_core::model::{CellValue, ColumnIndex, RowIndex};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_usize(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range")))
}

fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn row_from_i64(v: i64) -> Result<RowIndex, StorageError> {
    Ok(RowIndex::new(i64_to_usize("row_index", v)?))
}

pub(crate) fn column_from_i64(v: i64) -> Result<ColumnIndex, StorageError> {
    Ok(ColumnIndex::new(i64_to_usize("col_index", v)?))
}

pub(crate) fn row_to_i64(row: RowIndex) -> Result<i64, StorageError> {
    usize_to_i64("row_index", row.value())
}

pub(crate) fn column_to_i64(column: ColumnIndex) -> Result<i64, StorageError> {
    usize_to_i64("col_index", column.value())
}

pub(crate) fn count_from_i64(v: i64) -> Result<usize, StorageError> {
    i64_to_usize("row_count", v)
}

/// Typed column pair for a cell; `None` for an empty cell (stored as absence).
pub(crate) fn cell_to_columns(value: &CellValue) -> Option<(&'static str, String)> {
    match value {
        CellValue::Empty => None,
        CellValue::Bool(flag) => Some(("bool", if *flag { "1" } else { "0" }.to_string())),
        CellValue::Number(number) => Some(("number", number.to_string())),
        CellValue::Text(text) => Some(("text", text.clone())),
    }
}

pub(crate) fn cell_from_columns(kind: &str, value: String) -> Result<CellValue, StorageError> {
    match kind {
        "bool" => Ok(CellValue::Bool(value == "1")),
        "number" => value.parse::<f64>().map(CellValue::Number).map_err(ser),
        "text" => Ok(CellValue::Text(value)),
        other => Err(StorageError::Serialization(format!("unknown cell kind: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_cells_survive_storage_columns() {
        for value in [
            CellValue::Bool(true),
            CellValue::Bool(false),
            CellValue::Number(2.5),
            CellValue::from("TRUE"),
        ] {
            let (kind, raw) = cell_to_columns(&value).unwrap();
            assert_eq!(cell_from_columns(kind, raw).unwrap(), value);
        }
        assert!(cell_to_columns(&CellValue::Empty).is_none());
    }

    #[test]
    fn rejects_unknown_kind_and_negative_index() {
        assert!(cell_from_columns("date", "x".into()).is_err());
        assert!(row_from_i64(-1).is_err());
    }
}
