//! SQLite catalog (`metadata.db`).
//!
//! The catalog API is blocking while `sqlx` is async, so each
//! [`SqliteCatalog`] owns a small tokio runtime and drives every query with
//! `block_on`. Do not call it from inside another tokio runtime.

use crate::catalog::{check_batch, MetadataCatalog};
use crate::error::{CatalogError, CatalogResult};
use crate::schema::{archives, column_list, empty_directories, files, placeholders, CREATE_STATEMENTS};
use crate::types::{ArchiveRecord, CommitBatch, FileRecord, TimeRange, TimestampPattern};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// Catalog backed by a SQLite database file.
pub struct SqliteCatalog {
    runtime: Runtime,
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl SqliteCatalog {
    /// Opens or creates the database at `path` and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start or the database cannot
    /// be opened.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));
        let catalog = Self::connect(options, 4, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), "opened sqlite catalog");
        Ok(catalog)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start.
    pub fn open_in_memory() -> CatalogResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Every connection to :memory: is a separate database, so keep exactly one.
        Self::connect(options, 1, None)
    }

    fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
        path: Option<PathBuf>,
    ) -> CatalogResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let pool = runtime.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?;
            for statement in CREATE_STATEMENTS {
                sqlx::query(statement).execute(&pool).await?;
            }
            Ok::<_, CatalogError>(pool)
        })?;
        Ok(Self {
            runtime,
            pool,
            path,
        })
    }

    /// Path of the database file, `None` for in-memory catalogs.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes every pooled connection, flushing the database file.
    pub fn close(self) {
        let Self { runtime, pool, .. } = self;
        runtime.block_on(pool.close());
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn fetch_files(
        &self,
        where_clause: &str,
        order_by: &str,
        binds: FileQueryBinds<'_>,
    ) -> CatalogResult<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            column_list(&files::COLUMNS),
            files::TABLE,
            where_clause,
            order_by
        );
        let query = sqlx::query(&sql);
        let query = match binds {
            FileQueryBinds::Range(range) => query.bind(range.end).bind(range.begin),
            FileQueryBinds::Archive(id) => query.bind(id),
        };
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(file_from_row).collect()
    }

    async fn fetch_archives(
        &self,
        where_clause: &str,
        order_by: &str,
        bind: Option<&str>,
    ) -> CatalogResult<Vec<ArchiveRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            column_list(&archives::COLUMNS),
            archives::TABLE,
            where_clause,
            order_by
        );
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(archive_from_row).collect()
    }
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

enum FileQueryBinds<'a> {
    Range(TimeRange),
    Archive(&'a str),
}

impl MetadataCatalog for SqliteCatalog {
    fn commit(&self, batch: &CommitBatch) -> CatalogResult<()> {
        check_batch(batch)?;
        self.block_on(async {
            let mut tx = self.pool.begin().await?;

            if let Some(archive) = &batch.archive {
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    archives::TABLE,
                    column_list(&archives::COLUMNS),
                    placeholders(archives::COLUMNS.len())
                );
                sqlx::query(&sql)
                    .bind(&archive.id)
                    .bind(archive.begin_timestamp)
                    .bind(archive.end_timestamp)
                    .bind(to_sql(archives::TABLE, archive.uncompressed_size)?)
                    .bind(to_sql(archives::TABLE, archive.size)?)
                    .bind(&archive.creator_id)
                    .bind(to_sql(archives::TABLE, archive.creation_ix)?)
                    .execute(&mut *tx)
                    .await?;
            }

            let file_sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                files::TABLE,
                column_list(&files::COLUMNS),
                placeholders(files::COLUMNS.len())
            );
            for file in &batch.files {
                sqlx::query(&file_sql)
                    .bind(&file.id)
                    .bind(file.orig_file_id.as_deref())
                    .bind(&file.path)
                    .bind(file.begin_timestamp)
                    .bind(file.end_timestamp)
                    .bind(TimestampPattern::encode_list(&file.timestamp_patterns))
                    .bind(to_sql(files::TABLE, file.num_uncompressed_bytes)?)
                    .bind(to_sql(files::TABLE, file.begin_message_ix)?)
                    .bind(to_sql(files::TABLE, file.num_messages)?)
                    .bind(to_sql(files::TABLE, file.num_variables)?)
                    .bind(file.is_split)
                    .bind(to_sql(files::TABLE, file.split_ix)?)
                    .bind(to_sql(files::TABLE, file.segment_id)?)
                    .bind(to_sql(files::TABLE, file.segment_timestamps_position)?)
                    .bind(to_sql(files::TABLE, file.segment_logtypes_position)?)
                    .bind(to_sql(files::TABLE, file.segment_variables_position)?)
                    .bind(&file.archive_id)
                    .execute(&mut *tx)
                    .await?;
            }

            let dir_sql = format!(
                "INSERT OR IGNORE INTO {} ({}) VALUES (?)",
                empty_directories::TABLE,
                empty_directories::PATH
            );
            for path in &batch.empty_directories {
                sqlx::query(&dir_sql).bind(path).execute(&mut *tx).await?;
            }

            tx.commit().await?;
            Ok::<_, CatalogError>(())
        })
    }

    fn files_overlapping(&self, range: TimeRange) -> CatalogResult<Vec<FileRecord>> {
        let where_clause = format!(
            "{} <= ? AND {} >= ?",
            files::BEGIN_TIMESTAMP,
            files::END_TIMESTAMP
        );
        let order_by = format!(
            "{}, {}, {}",
            files::BEGIN_TIMESTAMP,
            files::PATH,
            files::SPLIT_IX
        );
        self.block_on(self.fetch_files(&where_clause, &order_by, FileQueryBinds::Range(range)))
    }

    fn files_in_archive(&self, archive_id: &str) -> CatalogResult<Vec<FileRecord>> {
        let where_clause = format!("{} = ?", files::ARCHIVE_ID);
        let order_by = format!(
            "{}, {}",
            files::SEGMENT_ID,
            files::SEGMENT_TIMESTAMPS_POSITION
        );
        self.block_on(self.fetch_files(
            &where_clause,
            &order_by,
            FileQueryBinds::Archive(archive_id),
        ))
    }

    fn archives_by_creator(&self, creator_id: &str) -> CatalogResult<Vec<ArchiveRecord>> {
        let where_clause = format!("{} = ?", archives::CREATOR_ID);
        self.block_on(self.fetch_archives(&where_clause, archives::CREATION_IX, Some(creator_id)))
    }

    fn archive(&self, id: &str) -> CatalogResult<Option<ArchiveRecord>> {
        let where_clause = format!("{} = ?", archives::ID);
        let mut rows = self.block_on(self.fetch_archives(&where_clause, archives::ID, Some(id)))?;
        Ok(rows.pop())
    }

    fn list_archives(&self) -> CatalogResult<Vec<ArchiveRecord>> {
        let order_by = format!("{}, {}", archives::BEGIN_TIMESTAMP, archives::ID);
        self.block_on(self.fetch_archives("1 = 1", &order_by, None))
    }

    fn empty_directories(&self) -> CatalogResult<Vec<String>> {
        let sql = format!(
            "SELECT {0} FROM {1} ORDER BY {0}",
            empty_directories::PATH,
            empty_directories::TABLE
        );
        self.block_on(async {
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            rows.iter()
                .map(|row| Ok(row.try_get::<String, _>(empty_directories::PATH)?))
                .collect::<CatalogResult<Vec<_>>>()
        })
    }

    fn delete_archive(&self, id: &str) -> CatalogResult<usize> {
        self.block_on(async {
            let mut tx = self.pool.begin().await.map_err(CatalogError::from)?;
            let removed_files = sqlx::query(&format!(
                "DELETE FROM {} WHERE {} = ?",
                files::TABLE,
                files::ARCHIVE_ID
            ))
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            let removed_archives = sqlx::query(&format!(
                "DELETE FROM {} WHERE {} = ?",
                archives::TABLE,
                archives::ID
            ))
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if removed_archives == 0 {
                tx.rollback().await?;
                return Err(CatalogError::ArchiveNotFound(id.to_string()));
            }
            tx.commit().await?;
            usize::try_from(removed_files)
                .map_err(|_| CatalogError::invalid_row(files::TABLE, "row count overflow"))
        })
    }
}

fn to_sql(table: &'static str, value: u64) -> CatalogResult<i64> {
    i64::try_from(value)
        .map_err(|_| CatalogError::constraint(table, format!("value {value} exceeds i64 range")))
}

fn from_sql(table: &'static str, column: &str, value: i64) -> CatalogResult<u64> {
    u64::try_from(value)
        .map_err(|_| CatalogError::invalid_row(table, format!("negative {column}: {value}")))
}

fn archive_from_row(row: &SqliteRow) -> CatalogResult<ArchiveRecord> {
    let t = archives::TABLE;
    Ok(ArchiveRecord {
        id: row.try_get(archives::ID)?,
        begin_timestamp: row.try_get(archives::BEGIN_TIMESTAMP)?,
        end_timestamp: row.try_get(archives::END_TIMESTAMP)?,
        uncompressed_size: from_sql(
            t,
            archives::UNCOMPRESSED_SIZE,
            row.try_get(archives::UNCOMPRESSED_SIZE)?,
        )?,
        size: from_sql(t, archives::SIZE, row.try_get(archives::SIZE)?)?,
        creator_id: row.try_get(archives::CREATOR_ID)?,
        creation_ix: from_sql(t, archives::CREATION_IX, row.try_get(archives::CREATION_IX)?)?,
    })
}

fn file_from_row(row: &SqliteRow) -> CatalogResult<FileRecord> {
    let t = files::TABLE;
    let u = |column: &str| -> CatalogResult<u64> { from_sql(t, column, row.try_get(column)?) };
    let patterns: String = row.try_get(files::TIMESTAMP_PATTERNS)?;
    let timestamp_patterns = TimestampPattern::decode_list(&patterns)
        .ok_or_else(|| CatalogError::invalid_row(t, format!("bad timestamp_patterns {patterns:?}")))?;
    Ok(FileRecord {
        id: row.try_get(files::ID)?,
        orig_file_id: row.try_get(files::ORIG_FILE_ID)?,
        path: row.try_get(files::PATH)?,
        begin_timestamp: row.try_get(files::BEGIN_TIMESTAMP)?,
        end_timestamp: row.try_get(files::END_TIMESTAMP)?,
        timestamp_patterns,
        num_uncompressed_bytes: u(files::NUM_UNCOMPRESSED_BYTES)?,
        begin_message_ix: u(files::BEGIN_MESSAGE_IX)?,
        num_messages: u(files::NUM_MESSAGES)?,
        num_variables: u(files::NUM_VARIABLES)?,
        is_split: row.try_get(files::IS_SPLIT)?,
        split_ix: u(files::SPLIT_IX)?,
        segment_id: u(files::SEGMENT_ID)?,
        segment_timestamps_position: u(files::SEGMENT_TIMESTAMPS_POSITION)?,
        segment_logtypes_position: u(files::SEGMENT_LOGTYPES_POSITION)?,
        segment_variables_position: u(files::SEGMENT_VARIABLES_POSITION)?,
        archive_id: row.try_get(files::ARCHIVE_ID)?,
    })
}
