//! Durable local store.
//!
//! A versioned, indexed document store on SQLite. Each [`Region`] is a table
//! of JSON documents keyed by id and ordered by a secondary `sort_key`
//! index. Schema versions are sqlx migrations that only ever create, so
//! opening an older database upgrades it in place without touching
//! existing regions.

mod error;
mod region;
mod transaction;

pub use error::StoreError;
pub use region::{sort_timestamp, Record, Region};
pub use transaction::StoreTransaction;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteExecutor;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::Metadata;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: PathBuf) -> Result<SqlitePool, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Handle to the on-device store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating and migrating if needed) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let pool = init_db(path.into()).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts or replaces a record by primary key.
    pub async fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        put_record(&self.pool, record).await
    }

    pub async fn get<R: Record>(&self, key: &str) -> Result<Option<R>, StoreError> {
        get_record(&self.pool, key).await
    }

    /// Deletes a record. Returns whether a row was removed; deleting a
    /// missing key is not an error.
    pub async fn delete(&self, region: Region, key: &str) -> Result<bool, StoreError> {
        delete_row(&self.pool, region, key).await
    }

    /// Ordered range scan over a region's `sort_key` index (ascending, ties
    /// broken by id).
    pub async fn scan<R: Record>(&self, limit: Option<i64>) -> Result<Vec<R>, StoreError> {
        let sql = format!(
            "SELECT data FROM {} ORDER BY sort_key ASC, id ASC LIMIT ?",
            R::REGION.table()
        );

        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .bind(limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|data| decode::<R>(data)).collect()
    }

    /// Scans records whose sort key falls in `[from, to)`.
    pub async fn scan_range<R: Record>(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<R>, StoreError> {
        let sql = format!(
            "SELECT data FROM {} WHERE sort_key >= ? AND sort_key < ? ORDER BY sort_key ASC, id ASC",
            R::REGION.table()
        );

        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|data| decode::<R>(data)).collect()
    }

    pub async fn count(&self, region: Region) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", region.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as usize)
    }

    /// Bulk upsert in a single transaction: either every row lands or none do.
    pub async fn put_many<R: Record>(&self, records: &[R]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        for record in records {
            tx.put(record).await?;
        }
        tx.commit().await
    }

    /// Shallow-merges `patch` into the stored JSON document (SQLite
    /// `json_patch`). Returns false if the key is absent.
    pub async fn merge_json(
        &self,
        region: Region,
        key: &str,
        patch: &Value,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE {} SET data = json_patch(data, ?), updated_at = ? WHERE id = ?",
            region.table()
        );
        let patch = serde_json::to_string(patch).map_err(|source| StoreError::Serialization {
            region: region.table(),
            source,
        })?;

        let result = sqlx::query(&sql)
            .bind(&patch)
            .bind(Utc::now().to_rfc3339())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self, region: Region) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {}", region.table());
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Starts a transaction spanning any number of regions.
    pub async fn begin(&self) -> Result<StoreTransaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(StoreTransaction::new(tx))
    }

    pub async fn get_metadata(&self, key: &str) -> Result<Option<Metadata>, StoreError> {
        self.get(key).await
    }

    pub async fn set_metadata(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.put(&Metadata::new(key, value)).await
    }
}

pub(crate) fn decode<R: DeserializeOwned + Record>(data: &str) -> Result<R, StoreError> {
    serde_json::from_str(data).map_err(|source| StoreError::Serialization {
        region: R::REGION.table(),
        source,
    })
}

pub(crate) async fn put_record<'e, E, R>(executor: E, record: &R) -> Result<(), StoreError>
where
    E: SqliteExecutor<'e>,
    R: Record,
{
    let region = R::REGION;
    let data = serde_json::to_string(record).map_err(|source| StoreError::Serialization {
        region: region.table(),
        source,
    })?;

    let sql = format!(
        r#"
        INSERT INTO {} (id, sort_key, data, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            sort_key = excluded.sort_key,
            data = excluded.data,
            updated_at = excluded.updated_at
        "#,
        region.table()
    );

    sqlx::query(&sql)
        .bind(record.key())
        .bind(record.sort_key())
        .bind(&data)
        .bind(Utc::now().to_rfc3339())
        .execute(executor)
        .await?;

    Ok(())
}

pub(crate) async fn get_record<'e, E, R>(executor: E, key: &str) -> Result<Option<R>, StoreError>
where
    E: SqliteExecutor<'e>,
    R: Record,
{
    let sql = format!("SELECT data FROM {} WHERE id = ?", R::REGION.table());

    let data: Option<String> = sqlx::query_scalar(&sql)
        .bind(key)
        .fetch_optional(executor)
        .await?;

    data.as_deref().map(decode::<R>).transpose()
}

pub(crate) async fn delete_row<'e, E>(
    executor: E,
    region: Region,
    key: &str,
) -> Result<bool, StoreError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("DELETE FROM {} WHERE id = ?", region.table());
    let result = sqlx::query(&sql).bind(key).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
