use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations for the table store.
///
/// Version 1 creates worksheets, their header cells, and data cells.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: worksheets, headers, cells.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS worksheets (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    row_count INTEGER NOT NULL DEFAULT 0 CHECK (row_count >= 0),
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sheet_headers (
                    worksheet_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    name TEXT NOT NULL,
                    PRIMARY KEY (worksheet_id, position),
                    UNIQUE (worksheet_id, name),
                    FOREIGN KEY (worksheet_id) REFERENCES worksheets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sheet_cells (
                    worksheet_id INTEGER NOT NULL,
                    row_index INTEGER NOT NULL CHECK (row_index >= 0),
                    col_index INTEGER NOT NULL CHECK (col_index >= 0),
                    kind TEXT NOT NULL CHECK (kind IN ('bool', 'number', 'text')),
                    value TEXT NOT NULL,
                    PRIMARY KEY (worksheet_id, row_index, col_index),
                    FOREIGN KEY (worksheet_id) REFERENCES worksheets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
