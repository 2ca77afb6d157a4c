use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{SheetStore, Storage, StorageError};

mod mapping;
mod migrate;
mod sheet_repo;

/// The shared table persisted in `SQLite`, addressed by worksheet name.
///
/// When the configured worksheet does not exist, reads and writes go to the
/// first worksheet that was created.
#[derive(Clone)]
pub struct SqliteSheet {
    pool: SqlitePool,
    worksheet: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteSheet {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect(
        database_url: &str,
        worksheet: impl Into<String>,
    ) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            worksheet: worksheet.into(),
        })
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Create a worksheet (tab) if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the insert fails.
    pub async fn create_worksheet(&self, name: &str) -> Result<(), StorageError> {
        insert_worksheet(&self.pool, name)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))
    }

    /// Create the requested worksheet when the database has none at all.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the count or insert fails.
    pub async fn ensure_worksheet(&self) -> Result<(), SqliteInitError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM worksheets")
            .fetch_one(&self.pool)
            .await?;
        if existing == 0 {
            insert_worksheet(&self.pool, &self.worksheet).await?;
        }
        Ok(())
    }

    /// Worksheet names in creation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    pub async fn worksheet_names(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT name FROM worksheets ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(|err| StorageError::Serialization(err.to_string()))
            })
            .collect()
    }
}

async fn insert_worksheet(pool: &SqlitePool, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO worksheets (name, row_count, created_at)
        VALUES (?1, 0, ?2)
        ON CONFLICT(name) DO NOTHING
        ",
    )
    .bind(name)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`, creating the worksheet in an
    /// empty database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str, worksheet: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteSheet::connect(database_url, worksheet).await?;
        repo.migrate().await?;
        repo.ensure_worksheet().await?;
        let sheet: Arc<dyn SheetStore> = Arc::new(repo);
        Ok(Self { sheet })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteSheet>();
    }
}
