//! SQLite-backed relational store for normalized artifacts.

pub mod query;
pub mod schema;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::error::StorageWriteError;
use crate::model::{NormalizedRecord, RecordFailure};
use schema::{
    CREATE_STATEMENTS, DELETE_COLORS, DELETE_MEDIA, INSERT_COLOR, INSERT_MEDIA, ORPHAN_COLORS,
    ORPHAN_MEDIA, TABLES, UPSERT_METADATA,
};

pub use query::QueryResult;

/// Outcome of `Store::insert_batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub succeeded: usize,
    pub failed: Vec<RecordFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub metadata_rows: i64,
    pub media_rows: i64,
    pub color_rows: i64,
}

/// Handle to one database. Clones share the writer pool, the reader pool and
/// the run guard.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    // Connections here are opened with `query_only = ON` and never switched back.
    reader: SqlitePool,
    run_guard: Arc<Mutex<()>>,
}

impl Store {
    /// Open (creating if needed) a file-backed store in WAL mode so report
    /// queries can read while an ingestion run writes.
    #[instrument(skip_all)]
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors while a run is writing.
            .busy_timeout(Duration::from_secs(5));

        let max_connections = max_connections.max(1);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts.clone())
            .await
            .with_context(|| format!("opening sqlite store at {}", path.display()))?;
        create_schema(&pool).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(max_connections.max(2))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(read_only(opts))
            .await
            .with_context(|| format!("opening read pool for {}", path.display()))?;

        info!(path = %path.display(), "store ready");
        Ok(Self::from_pools(pool, reader))
    }

    /// Private in-memory database. sqlx names each `:memory:` database
    /// uniquely in shared-cache mode, so the reader pool sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // The database lives as long as this pinned writer connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts.clone())
            .await?;
        create_schema(&pool).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(read_only(opts))
            .await?;
        Ok(Self::from_pools(pool, reader))
    }

    fn from_pools(pool: SqlitePool, reader: SqlitePool) -> Self {
        Self {
            pool,
            reader,
            run_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Writer pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn reader(&self) -> &SqlitePool {
        &self.reader
    }

    /// Exclusive access for a whole ingestion run. Shared by every clone of
    /// this store, so pipelines built over the same handle never interleave.
    /// `insert_batch` does not take it; callers that need run-level exclusion do.
    pub async fn run_guard(&self) -> MutexGuard<'_, ()> {
        match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("another run holds the store; waiting");
                self.run_guard.lock().await
            }
        }
    }

    /// Persist each record as one unit: its colors and media row are cleared,
    /// its metadata row upserted, then media and colors re-inserted, all in a
    /// single transaction. A failing record is rolled back and reported; the
    /// rest of the batch continues.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn insert_batch(&self, records: &[NormalizedRecord]) -> InsertReport {
        let mut report = InsertReport::default();
        for rec in records {
            match self.replace_record(rec).await {
                Ok(()) => report.succeeded += 1,
                Err(source) => {
                    let err = StorageWriteError {
                        id: rec.id(),
                        source,
                    };
                    warn!(object_id = rec.id(), error = %err, "record write rolled back");
                    report
                        .failed
                        .push(RecordFailure::new(Some(rec.id()), err.to_string()));
                }
            }
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "batch stored"
        );
        report
    }

    async fn replace_record(&self, rec: &NormalizedRecord) -> Result<(), sqlx::Error> {
        let id = rec.id();
        let m = &rec.metadata;
        let media = &rec.media;
        let mut tx = self.pool.begin().await?;

        sqlx::query(DELETE_COLORS).bind(id).execute(&mut *tx).await?;
        sqlx::query(DELETE_MEDIA).bind(id).execute(&mut *tx).await?;

        sqlx::query(UPSERT_METADATA)
            .bind(id)
            .bind(&m.title)
            .bind(&m.culture)
            .bind(&m.period)
            .bind(&m.century)
            .bind(&m.medium)
            .bind(&m.dimensions)
            .bind(&m.description)
            .bind(&m.department)
            .bind(&m.classification)
            .bind(m.accession_year)
            .bind(&m.accession_method)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_MEDIA)
            .bind(id)
            .bind(media.image_count)
            .bind(media.media_count)
            .bind(media.color_count)
            .bind(media.rank)
            .bind(media.date_begin)
            .bind(media.date_end)
            .execute(&mut *tx)
            .await?;

        // Colors are keyed by the record's id so a re-fetch always clears what it wrote.
        for c in &rec.colors {
            sqlx::query(INSERT_COLOR)
                .bind(id)
                .bind(&c.color)
                .bind(&c.spectrum)
                .bind(&c.hue)
                .bind(c.percent)
                .bind(&c.css3)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(object_id = id, colors = rec.colors.len(), "record replaced");
        Ok(())
    }

    pub async fn counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            metadata_rows: self.count_rows(TABLES[0]).await?,
            media_rows: self.count_rows(TABLES[1]).await?,
            color_rows: self.count_rows(TABLES[2]).await?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        // Table names come from `TABLES`, never from input.
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let n: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(n)
    }

    /// Media and color rows whose `objectid` has no metadata row.
    pub async fn orphan_counts(&self) -> Result<(i64, i64)> {
        let media: i64 = sqlx::query_scalar(ORPHAN_MEDIA).fetch_one(&self.pool).await?;
        let colors: i64 = sqlx::query_scalar(ORPHAN_COLORS).fetch_one(&self.pool).await?;
        Ok((media, colors))
    }

    /// Remove every artifact row. Children go first so foreign keys hold throughout.
    pub async fn reset(&self) -> Result<TableCounts> {
        let before = self.counts().await?;
        let mut tx = self.pool.begin().await?;
        for table in TABLES.iter().rev() {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        warn!(
            metadata_rows = before.metadata_rows,
            media_rows = before.media_rows,
            color_rows = before.color_rows,
            "store reset"
        );
        Ok(before)
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for ddl in CREATE_STATEMENTS {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .context("creating artifact schema")?;
    }
    Ok(())
}

/// Same database, but every connection refuses writes from the moment it opens.
fn read_only(opts: SqliteConnectOptions) -> SqliteConnectOptions {
    opts.pragma("query_only", "ON")
}
