use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;
use tracker_core::model::{CellValue, ColumnIndex, RowIndex, Snapshot};

use crate::repository::{SheetStore, StorageError};

use super::SqliteSheet;
use super::mapping::{
    cell_from_columns, cell_to_columns, column_from_i64, column_to_i64, count_from_i64,
    row_from_i64, row_to_i64,
};

fn conn(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

fn ser(err: sqlx::Error) -> StorageError {
    StorageError::Serialization(err.to_string())
}

impl SqliteSheet {
    /// Id of the configured worksheet, or of the first one when it is missing.
    async fn resolve_worksheet(&self) -> Result<i64, StorageError> {
        let named = sqlx::query("SELECT id FROM worksheets WHERE name = ?1")
            .bind(&self.worksheet)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if let Some(row) = named {
            return row.try_get("id").map_err(ser);
        }

        let first = sqlx::query("SELECT id, name FROM worksheets ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        let Some(row) = first else {
            return Err(StorageError::NotFound);
        };
        let fallback: String = row.try_get("name").map_err(ser)?;
        debug!(
            requested = %self.worksheet,
            fallback = %fallback,
            "worksheet missing, using first worksheet"
        );
        row.try_get("id").map_err(ser)
    }
}

#[async_trait]
impl SheetStore for SqliteSheet {
    async fn read_snapshot(&self) -> Result<Snapshot, StorageError> {
        let worksheet_id = self.resolve_worksheet().await?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let row_count: i64 = sqlx::query("SELECT row_count FROM worksheets WHERE id = ?1")
            .bind(worksheet_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(conn)?
            .try_get("row_count")
            .map_err(ser)?;

        let header_rows = sqlx::query(
            r"
            SELECT position, name
            FROM sheet_headers
            WHERE worksheet_id = ?1
            ORDER BY position
            ",
        )
        .bind(worksheet_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(conn)?;

        let cell_rows = sqlx::query(
            r"
            SELECT row_index, col_index, kind, value
            FROM sheet_cells
            WHERE worksheet_id = ?1
            ORDER BY row_index, col_index
            ",
        )
        .bind(worksheet_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        let mut headers: Vec<String> = Vec::with_capacity(header_rows.len());
        for row in header_rows {
            let position = column_from_i64(row.try_get("position").map_err(ser)?)?.value();
            let name: String = row.try_get("name").map_err(ser)?;
            if headers.len() <= position {
                headers.resize(position + 1, String::new());
            }
            headers[position] = name;
        }

        let mut snapshot = Snapshot::new(headers, vec![Vec::new(); count_from_i64(row_count)?]);
        for row in cell_rows {
            let row_index = row_from_i64(row.try_get("row_index").map_err(ser)?)?;
            let col_index = column_from_i64(row.try_get("col_index").map_err(ser)?)?;
            let kind: String = row.try_get("kind").map_err(ser)?;
            let value: String = row.try_get("value").map_err(ser)?;
            snapshot.set_cell(row_index, col_index, cell_from_columns(&kind, value)?);
        }
        Ok(snapshot)
    }

    async fn write_cell(
        &self,
        row: RowIndex,
        column: ColumnIndex,
        value: CellValue,
    ) -> Result<(), StorageError> {
        let worksheet_id = self.resolve_worksheet().await?;
        let row_index = row_to_i64(row)?;
        let col_index = column_to_i64(column)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        match cell_to_columns(&value) {
            None => {
                sqlx::query(
                    r"
                    DELETE FROM sheet_cells
                    WHERE worksheet_id = ?1 AND row_index = ?2 AND col_index = ?3
                    ",
                )
                .bind(worksheet_id)
                .bind(row_index)
                .bind(col_index)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
            Some((kind, raw)) => {
                sqlx::query(
                    r"
                    INSERT INTO sheet_cells (worksheet_id, row_index, col_index, kind, value)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(worksheet_id, row_index, col_index) DO UPDATE SET
                        kind = excluded.kind,
                        value = excluded.value
                    ",
                )
                .bind(worksheet_id)
                .bind(row_index)
                .bind(col_index)
                .bind(kind)
                .bind(raw)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        sqlx::query("UPDATE worksheets SET row_count = MAX(row_count, ?2) WHERE id = ?1")
            .bind(worksheet_id)
            .bind(row_index + 1)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn append_header(&self, name: &str) -> Result<ColumnIndex, StorageError> {
        let worksheet_id = self.resolve_worksheet().await?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing = sqlx::query(
            "SELECT position FROM sheet_headers WHERE worksheet_id = ?1 AND name = ?2",
        )
        .bind(worksheet_id)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?;
        if let Some(row) = existing {
            return column_from_i64(row.try_get("position").map_err(ser)?);
        }

        let next: i64 = sqlx::query(
            r"
            SELECT COALESCE(MAX(position) + 1, 0) AS next
            FROM sheet_headers
            WHERE worksheet_id = ?1
            ",
        )
        .bind(worksheet_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?
        .try_get("next")
        .map_err(ser)?;

        sqlx::query("INSERT INTO sheet_headers (worksheet_id, position, name) VALUES (?1, ?2, ?3)")
            .bind(worksheet_id)
            .bind(next)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        column_from_i64(next)
    }
}
