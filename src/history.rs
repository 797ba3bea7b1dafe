//! SQLite-backed download history.
//!
//! One row per download item, updated in place as the item progresses.
//! Rows store the externally visible shape of an item ([`DownloadState`],
//! never the internal `Completing` phase); on load they convert to
//! [`HistoryRecord`]s, which [`DownloadItem::from_history`] turns back
//! into items with the restart corrections applied.
//!
//! Parsing of persisted enum strings is deliberately lenient: a row
//! written by a newer version with an unknown state or reason string
//! degrades to a safe value instead of failing the whole history load.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::FromRow;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::danger::DangerType;
use crate::interrupt::InterruptReason;
use crate::item::{DownloadItem, HistoryRecord};
use crate::state::DownloadState;

/// Connection cap for the history pool. Writes are single-row upserts
/// coming from one collection task, so a handful of connections is
/// plenty under SQLite's file-level locking.
const MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before giving up,
/// in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// History persistence errors.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to bring the downloads schema up to date.
    #[error("failed to migrate downloads schema: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// No row with the given download id.
    #[error("download not found in history: {0}")]
    NotFound(i64),
}

/// One persisted download, column-for-column.
///
/// Enum-ish columns are stored as text and parsed through the typed
/// accessors; timestamps are unix milliseconds.
#[derive(Debug, Clone, FromRow)]
pub struct DownloadRow {
    /// Unique download id.
    pub id: i64,
    /// On-disk location at persist time (may be an intermediate name).
    pub current_path: String,
    /// Intended final path.
    pub target_path: String,
    /// Redirect chain as a JSON array of URL strings.
    pub url_chain: String,
    /// Referrer of the originating navigation.
    pub referrer_url: Option<String>,
    /// Transfer start, unix milliseconds.
    pub start_time_ms: i64,
    /// Transfer end, unix milliseconds, for terminal states.
    pub end_time_ms: Option<i64>,
    /// Bytes written at persist time.
    pub received_bytes: i64,
    /// Expected size; 0 when unknown.
    pub total_bytes: i64,
    /// Externally visible state (stored as text, parsed via `state()`).
    #[sqlx(rename = "state")]
    pub state_str: String,
    /// Danger classification (stored as text, parsed via `danger_type()`).
    #[sqlx(rename = "danger_type")]
    pub danger_type_str: String,
    /// Most recent interrupt reason, when interrupted.
    pub interrupt_reason: Option<String>,
    /// Whether the user ever opened the download.
    pub opened: bool,
}

impl DownloadRow {
    /// Snapshot of a live item, ready to upsert.
    #[must_use]
    pub fn from_item(item: &DownloadItem) -> Self {
        let url_chain =
            serde_json::to_string(item.url_chain()).unwrap_or_else(|_| "[]".to_string());
        Self {
            id: item.id(),
            current_path: item.current_path().to_string_lossy().into_owned(),
            target_path: item.target_path().to_string_lossy().into_owned(),
            url_chain,
            referrer_url: item.referrer_url().map(Url::to_string),
            start_time_ms: unix_ms(item.start_time()),
            end_time_ms: item.end_time().map(unix_ms),
            received_bytes: item.received_bytes(),
            total_bytes: item.total_bytes(),
            state_str: item.state().as_str().to_string(),
            danger_type_str: item.danger_type().as_str().to_string(),
            interrupt_reason: item.last_reason().map(|r| r.as_str().to_string()),
            opened: item.opened(),
        }
    }

    /// Parsed state; unknown strings degrade to `Cancelled`.
    #[must_use]
    pub fn state(&self) -> DownloadState {
        self.state_str.parse().unwrap_or(DownloadState::Cancelled)
    }

    /// Parsed danger type; unknown strings degrade to `NotDangerous`.
    #[must_use]
    pub fn danger_type(&self) -> DangerType {
        self.danger_type_str.parse().unwrap_or(DangerType::NotDangerous)
    }

    /// Parsed interrupt reason; unknown strings degrade to `None`.
    #[must_use]
    pub fn reason(&self) -> Option<InterruptReason> {
        self.interrupt_reason.as_deref().and_then(|s| s.parse().ok())
    }

    /// Parsed redirect chain; malformed JSON or invalid URLs are dropped.
    #[must_use]
    pub fn urls(&self) -> Vec<Url> {
        serde_json::from_str::<Vec<String>>(&self.url_chain)
            .unwrap_or_default()
            .iter()
            .filter_map(|s| Url::parse(s).ok())
            .collect()
    }

    /// Converts to the record shape the item constructor takes.
    #[must_use]
    pub fn into_record(self) -> HistoryRecord {
        HistoryRecord {
            id: self.id,
            current_path: PathBuf::from(&self.current_path),
            target_path: PathBuf::from(&self.target_path),
            url_chain: self.urls(),
            referrer_url: self
                .referrer_url
                .as_deref()
                .and_then(|s| Url::parse(s).ok()),
            start_time: from_unix_ms(self.start_time_ms),
            end_time: self.end_time_ms.map(from_unix_ms),
            received_bytes: self.received_bytes,
            total_bytes: self.total_bytes,
            state: self.state(),
            danger_type: self.danger_type(),
            interrupt_reason: self.reason(),
            opened: self.opened,
        }
    }
}

fn unix_ms(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn from_unix_ms(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

/// History store for download items.
///
/// Owns the SQLite pool behind the `downloads` table and provides the
/// upsert/load/remove surface the download collection needs. Opening a
/// store creates the database file if needed, switches it to WAL so the
/// UI can read history while items are being written, and runs any
/// pending schema migrations.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Opens (or creates) the downloads history at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] if the connection fails, or
    /// [`HistoryError::Migration`] if the schema cannot be brought up
    /// to date.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        // WAL keeps history readers (download shelf, history pages)
        // from blocking on in-progress row updates.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Opens an in-memory history that lives as long as the store.
    ///
    /// Profiles that never persist downloads (incognito) use this; the
    /// rows vanish with the pool. WAL is skipped since there is no file.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] if the connection fails, or
    /// [`HistoryError::Migration`] if the schema cannot be created.
    #[instrument]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Inserts or updates one download row.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] if the write fails.
    #[instrument(skip(self, row), fields(id = row.id, state = %row.state_str))]
    pub async fn upsert(&self, row: &DownloadRow) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO downloads (
                id, current_path, target_path, url_chain, referrer_url,
                start_time_ms, end_time_ms, received_bytes, total_bytes,
                state, danger_type, interrupt_reason, opened
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                current_path = excluded.current_path,
                target_path = excluded.target_path,
                url_chain = excluded.url_chain,
                referrer_url = excluded.referrer_url,
                start_time_ms = excluded.start_time_ms,
                end_time_ms = excluded.end_time_ms,
                received_bytes = excluded.received_bytes,
                total_bytes = excluded.total_bytes,
                state = excluded.state,
                danger_type = excluded.danger_type,
                interrupt_reason = excluded.interrupt_reason,
                opened = excluded.opened
            ",
        )
        .bind(row.id)
        .bind(&row.current_path)
        .bind(&row.target_path)
        .bind(&row.url_chain)
        .bind(&row.referrer_url)
        .bind(row.start_time_ms)
        .bind(row.end_time_ms)
        .bind(row.received_bytes)
        .bind(row.total_bytes)
        .bind(&row.state_str)
        .bind(&row.danger_type_str)
        .bind(&row.interrupt_reason)
        .bind(row.opened)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetches one download by id.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<DownloadRow>> {
        let row = sqlx::query_as::<_, DownloadRow>("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Loads the entire history, oldest id first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<DownloadRow>> {
        let rows = sqlx::query_as::<_, DownloadRow>("SELECT * FROM downloads ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Removes one download by id.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotFound`] if no row matched, or
    /// [`HistoryError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HistoryError::NotFound(id));
        }
        Ok(())
    }
}
