use filestats_models::{StatsDelta, StatsRecord, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::locks::UserLocks;
use crate::{Result, StatsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout: Duration::from_secs(10),
        }
    }
}

/// SQLite-backed statistics store.
///
/// Every mutation runs in its own transaction while the user's lock is held, with
/// `synchronous = FULL` so a returned commit survives a crash.
#[derive(Debug, Clone)]
pub struct SqliteStatsStore {
    pool: SqlitePool,
    locks: UserLocks,
}

const SELECT_RECORD: &str = "SELECT total_size, total_download_size, file_count, streamable_count, extension_counts
     FROM user_stats
     WHERE user_id = ?";

impl SqliteStatsStore {
    const SCHEMA_VERSION: i32 = 1;
    const IN_MEMORY: &'static str = ":memory:";

    /// Opens (or creates) the database at `path`. `":memory:"` gives a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database connection cannot be established
    /// - The database schema initialization fails
    pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        let in_memory = path == Path::new(Self::IN_MEMORY);
        info!("Opening statistics store at: {}", path.display());

        let connect = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new().filename(path).create_if_missing(true)
        };
        let connect = connect
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(options.busy_timeout);

        let pool_options = if in_memory {
            // The database lives as long as a connection to it does; keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections.max(1))
        };

        let pool = pool_options.connect_with(connect).await?;

        let store = Self {
            pool,
            locks: UserLocks::new(),
        };
        store.init_schema().await?;

        info!("Statistics store ready at: {}", path.display());
        Ok(store)
    }

    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub async fn in_memory() -> Result<Self> {
        Self::open(Self::IN_MEMORY, StoreOptions::default()).await
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version: Option<i32> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        // Statistics are not a cache: never drop the table on a version change.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_stats (
                user_id INTEGER PRIMARY KEY,
                total_size INTEGER NOT NULL DEFAULT 0,
                total_download_size INTEGER NOT NULL DEFAULT 0,
                file_count INTEGER NOT NULL DEFAULT 0,
                streamable_count INTEGER NOT NULL DEFAULT 0,
                extension_counts TEXT NOT NULL DEFAULT '{}',
                ignored_extensions TEXT NOT NULL DEFAULT '[]',
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        if current_version != Some(Self::SCHEMA_VERSION) {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM schema_version").execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(Self::SCHEMA_VERSION)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!("Statistics schema initialized to version {}", Self::SCHEMA_VERSION);
        }

        Ok(())
    }

    fn ensure_user(user: UserId) -> Result<()> {
        if user.is_well_formed() {
            Ok(())
        } else {
            Err(StatsError::InvalidUserId(user))
        }
    }

    /// Current record of `user`; users without a row get the all-zero record and no row is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the user id is invalid, the query fails or the stored row is corrupt.
    pub async fn get(&self, user: UserId) -> Result<StatsRecord> {
        Self::ensure_user(user)?;

        let row = sqlx::query(SELECT_RECORD)
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map_or_else(|| Ok(StatsRecord::default()), |row| record_from_row(user, &row))
    }

    /// Applies `delta` atomically and returns the committed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the user id is invalid or the commit fails; the stored record is then
    /// exactly what it was before the call.
    pub async fn apply_event(&self, user: UserId, delta: &StatsDelta) -> Result<StatsRecord> {
        Self::ensure_user(user)?;
        let _guard = self.locks.acquire(user).await;

        let result = self.apply_locked(user, delta).await;
        match &result {
            Ok(record) => debug!(
                "Applied {} file(s) for user {}: {} files, {} bytes total",
                delta.files(),
                user,
                record.file_count,
                record.total_size
            ),
            Err(e) => error!("Failed to apply statistics for user {}: {}", user, e),
        }
        result
    }

    async fn apply_locked(&self, user: UserId, delta: &StatsDelta) -> Result<StatsRecord> {
        let mut tx = self.pool.begin().await?;
        claim_row(&mut tx, user).await?;

        let current = fetch_record(&mut tx, user).await?.unwrap_or_default();
        let updated = current.apply(delta);
        write_record(&mut tx, user, &updated).await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Replaces the user's statistics with zeros and empties the ignore list.
    ///
    /// # Errors
    ///
    /// Returns an error if the user id is invalid or the commit fails.
    pub async fn reset(&self, user: UserId) -> Result<StatsRecord> {
        self.take(user).await.map(|_| StatsRecord::reset())
    }

    /// Resets like [`reset`](Self::reset) and returns the record that was replaced.
    ///
    /// The previous record is read in the same transaction, so no event can land between
    /// reading it and clearing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the user id is invalid or the commit fails.
    pub async fn take(&self, user: UserId) -> Result<StatsRecord> {
        Self::ensure_user(user)?;
        let _guard = self.locks.acquire(user).await;

        let result = self.reset_locked(user).await;
        match &result {
            Ok(previous) => info!(
                "Statistics reset for user {} ({} file(s) cleared)",
                user, previous.file_count
            ),
            Err(e) => error!("Failed to reset statistics for user {}: {}", user, e),
        }
        result
    }

    async fn reset_locked(&self, user: UserId) -> Result<StatsRecord> {
        let mut tx = self.pool.begin().await?;
        claim_row(&mut tx, user).await?;

        let previous = fetch_record(&mut tx, user).await?.unwrap_or_default();
        write_record(&mut tx, user, &StatsRecord::reset()).await?;
        sqlx::query("UPDATE user_stats SET ignored_extensions = '[]' WHERE user_id = ?")
            .bind(user.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// # Errors
    ///
    /// Returns an error if the user id is invalid, the query fails or the stored list is corrupt.
    pub async fn ignored_extensions(&self, user: UserId) -> Result<Vec<String>> {
        Self::ensure_user(user)?;

        let json: Option<String> = sqlx::query_scalar("SELECT ignored_extensions FROM user_stats WHERE user_id = ?")
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await?;

        match json {
            Some(json) => Ok(decode_ignored(user, &json)?.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the user id is invalid or the commit fails.
    pub async fn add_ignored_extensions(&self, user: UserId, extensions: &[String]) -> Result<Vec<String>> {
        self.update_ignored(user, |ignored| {
            extensions
                .iter()
                .filter(|ext| ignored.insert((*ext).clone()))
                .cloned()
                .collect()
        })
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the user id is invalid or the commit fails.
    pub async fn remove_ignored_extensions(&self, user: UserId, extensions: &[String]) -> Result<Vec<String>> {
        self.update_ignored(user, |ignored| {
            extensions.iter().filter(|ext| ignored.remove(*ext)).cloned().collect()
        })
        .await
    }

    async fn update_ignored<F>(&self, user: UserId, change: F) -> Result<Vec<String>>
    where
        F: FnOnce(&mut BTreeSet<String>) -> Vec<String> + Send,
    {
        Self::ensure_user(user)?;
        let _guard = self.locks.acquire(user).await;

        let mut tx = self.pool.begin().await?;
        claim_row(&mut tx, user).await?;

        let json: String = sqlx::query_scalar("SELECT ignored_extensions FROM user_stats WHERE user_id = ?")
            .bind(user.get())
            .fetch_one(&mut *tx)
            .await?;
        let mut ignored = decode_ignored(user, &json)?;

        let changed = change(&mut ignored);
        if !changed.is_empty() {
            let json = serde_json::to_string(&ignored).map_err(|source| StatsError::Encoding { user, source })?;
            sqlx::query("UPDATE user_stats SET ignored_extensions = ? WHERE user_id = ?")
                .bind(json)
                .bind(user.get())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Ignore list of user {} changed by {:?}", user, changed);
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn contains(&self, user: UserId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM user_stats WHERE user_id = ?")
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Deletes the user's row. Returns whether there was one.
    ///
    /// # Errors
    ///
    /// Returns an error if the user id is invalid or the delete fails.
    pub async fn remove(&self, user: UserId) -> Result<bool> {
        Self::ensure_user(user)?;
        let _guard = self.locks.acquire(user).await;

        let result = sqlx::query("DELETE FROM user_stats WHERE user_id = ?")
            .bind(user.get())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Removed all statistics of user {}", user);
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn user_ids(&self) -> Result<Vec<UserId>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT user_id FROM user_stats ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    /// Number of users with a stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_stats")
            .fetch_one(&self.pool)
            .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Waits for in-flight work and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Takes the write lock up front; a deferred read-then-write transaction can fail with
/// `SQLITE_BUSY` instead of waiting when another user's commit lands in between.
async fn claim_row(conn: &mut SqliteConnection, user: UserId) -> Result<()> {
    sqlx::query("INSERT INTO user_stats (user_id) VALUES (?) ON CONFLICT(user_id) DO NOTHING")
        .bind(user.get())
        .execute(conn)
        .await?;
    Ok(())
}

async fn fetch_record(conn: &mut SqliteConnection, user: UserId) -> Result<Option<StatsRecord>> {
    let row = sqlx::query(SELECT_RECORD)
        .bind(user.get())
        .fetch_optional(conn)
        .await?;

    row.map(|row| record_from_row(user, &row)).transpose()
}

async fn write_record(conn: &mut SqliteConnection, user: UserId, record: &StatsRecord) -> Result<()> {
    let counts =
        serde_json::to_string(&record.extension_counts).map_err(|source| StatsError::Encoding { user, source })?;

    sqlx::query(
        "INSERT INTO user_stats
         (user_id, total_size, total_download_size, file_count, streamable_count, extension_counts, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, strftime('%s', 'now'))
         ON CONFLICT(user_id) DO UPDATE SET
             total_size = excluded.total_size,
             total_download_size = excluded.total_download_size,
             file_count = excluded.file_count,
             streamable_count = excluded.streamable_count,
             extension_counts = excluded.extension_counts,
             updated_at = excluded.updated_at",
    )
    .bind(user.get())
    .bind(to_sql(record.total_size))
    .bind(to_sql(record.total_download_size))
    .bind(to_sql(record.file_count))
    .bind(to_sql(record.streamable_count))
    .bind(counts)
    .execute(conn)
    .await?;

    Ok(())
}

fn record_from_row(user: UserId, row: &SqliteRow) -> Result<StatsRecord> {
    let counts: String = row.try_get("extension_counts")?;

    Ok(StatsRecord {
        total_size: from_sql(row.try_get("total_size")?),
        total_download_size: from_sql(row.try_get("total_download_size")?),
        file_count: from_sql(row.try_get("file_count")?),
        streamable_count: from_sql(row.try_get("streamable_count")?),
        extension_counts: serde_json::from_str(&counts).map_err(|source| StatsError::Encoding { user, source })?,
    })
}

fn decode_ignored(user: UserId, json: &str) -> Result<BTreeSet<String>> {
    serde_json::from_str(json).map_err(|source| StatsError::Encoding { user, source })
}

// SQLite integers are signed; counters saturate instead of wrapping.
fn to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<SqliteStatsStore> {
        SqliteStatsStore::in_memory().await
    }

    fn video(size: u64) -> StatsDelta {
        StatsDelta::for_file("video", size, 0, true)
    }

    #[tokio::test]
    async fn test_new_in_memory() -> Result<()> {
        let store = create_test_store().await?;
        assert_eq!(store.len().await?, 0);
        assert!(store.is_empty().await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_does_not_create_state() -> Result<()> {
        let store = create_test_store().await?;

        let record = store.get(UserId(1)).await?;
        assert!(record.is_empty());
        assert!(!store.contains(UserId(1)).await?);
        assert_eq!(store.len().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_event_creates_and_accumulates() -> Result<()> {
        let store = create_test_store().await?;
        let user = UserId(10);

        let first = store.apply_event(user, &video(1_048_576)).await?;
        assert_eq!(first.file_count, 1);
        assert_eq!(first.total_size, 1_048_576);
        assert_eq!(first.streamable_count, 1);
        assert_eq!(first.extension_counts.get("video"), Some(&1));
        assert!(store.contains(user).await?);

        let second = store
            .apply_event(user, &StatsDelta::for_file("unknown", 500, 0, false))
            .await?;
        assert_eq!(second.file_count, 2);
        assert_eq!(second.total_size, 1_049_076);
        assert_eq!(second.extension_counts.get("unknown"), Some(&1));
        assert!(second.is_consistent());

        assert_eq!(store.get(user).await?, second);
        Ok(())
    }

    #[tokio::test]
    async fn test_reads_are_idempotent() -> Result<()> {
        let store = create_test_store().await?;
        store.apply_event(UserId(2), &video(7)).await?;

        let a = store.get(UserId(2)).await?;
        let b = store.get(UserId(2)).await?;
        assert_eq!(a, b);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_only_touches_one_user() -> Result<()> {
        let store = create_test_store().await?;
        store.apply_event(UserId(1), &video(100)).await?;
        let other = store.apply_event(UserId(2), &video(200)).await?;

        let zero = store.reset(UserId(1)).await?;
        assert!(zero.is_empty());
        assert!(store.get(UserId(1)).await?.is_empty());
        assert_eq!(store.get(UserId(2)).await?, other);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_clears_ignore_list() -> Result<()> {
        let store = create_test_store().await?;
        let user = UserId(5);
        let other = UserId(6);
        store.add_ignored_extensions(user, &["exe".to_string()]).await?;
        store.add_ignored_extensions(other, &["exe".to_string()]).await?;
        store.apply_event(user, &video(1)).await?;

        store.reset(user).await?;
        assert!(store.ignored_extensions(user).await?.is_empty());
        assert_eq!(store.ignored_extensions(other).await?, vec!["exe".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_take_returns_replaced_record() -> Result<()> {
        let store = create_test_store().await?;
        let user = UserId(12);

        assert!(store.take(user).await?.is_empty());

        let written = store.apply_event(user, &video(300)).await?;
        let previous = store.take(user).await?;
        assert_eq!(previous, written);
        assert!(store.get(user).await?.is_empty());
        assert!(store.take(user).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_returned_record_matches_stored_at_the_limit() -> Result<()> {
        let store = create_test_store().await?;
        let user = UserId(11);
        let huge = StatsDelta::for_file("video", i64::MAX.unsigned_abs(), i64::MAX.unsigned_abs(), true);

        store.apply_event(user, &huge).await?;
        let returned = store.apply_event(user, &huge).await?;
        let stored = store.get(user).await?;

        assert_eq!(returned, stored);
        assert_eq!(stored.total_size, i64::MAX.unsigned_abs());
        assert_eq!(stored.file_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_user_is_rejected() -> Result<()> {
        let store = create_test_store().await?;
        let err = store.apply_event(UserId(0), &video(1)).await.unwrap_err();
        assert!(matches!(err, StatsError::InvalidUserId(UserId(0))));
        assert!(matches!(store.get(UserId(-3)).await, Err(StatsError::InvalidUserId(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_previous_record() -> Result<()> {
        let store = create_test_store().await?;
        let user = UserId(42);
        let before = store.apply_event(user, &video(1000)).await?;

        sqlx::query(
            "CREATE TRIGGER reject_updates BEFORE UPDATE ON user_stats
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&store.pool)
        .await?;

        let err = store.apply_event(user, &video(5)).await.unwrap_err();
        assert!(err.is_persistence_failure());
        assert_eq!(store.get(user).await?, before);

        let err = store.reset(user).await.unwrap_err();
        assert!(err.is_persistence_failure());
        assert_eq!(store.get(user).await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_first_event_leaves_no_row() -> Result<()> {
        let store = create_test_store().await?;

        sqlx::query(
            "CREATE TRIGGER reject_inserts BEFORE INSERT ON user_stats
             BEGIN SELECT RAISE(ABORT, 'read-only'); END",
        )
        .execute(&store.pool)
        .await?;

        assert!(store.apply_event(UserId(9), &video(1)).await.is_err());
        assert!(!store.contains(UserId(9)).await?);
        assert!(store.get(UserId(9)).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() -> Result<()> {
        let store = create_test_store().await?;
        store.apply_event(UserId(3), &video(1)).await?;

        sqlx::query("UPDATE user_stats SET extension_counts = 'not json' WHERE user_id = 3")
            .execute(&store.pool)
            .await?;

        assert!(matches!(
            store.get(UserId(3)).await,
            Err(StatsError::Encoding { user: UserId(3), .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_ignore_list_add_and_remove() -> Result<()> {
        let store = create_test_store().await?;
        let user = UserId(8);
        let exts = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();

        let added = store.add_ignored_extensions(user, &exts(&["exe", "mp3"])).await?;
        assert_eq!(added, exts(&["exe", "mp3"]));

        let added_again = store.add_ignored_extensions(user, &exts(&["exe"])).await?;
        assert!(added_again.is_empty());

        let removed = store.remove_ignored_extensions(user, &exts(&["exe", "zip"])).await?;
        assert_eq!(removed, exts(&["exe"]));
        assert_eq!(store.ignored_extensions(user).await?, exts(&["mp3"]));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_user_and_listing() -> Result<()> {
        let store = create_test_store().await?;
        for id in [3, 1, 2] {
            store.apply_event(UserId(id), &video(1)).await?;
        }
        assert_eq!(store.user_ids().await?, vec![UserId(1), UserId(2), UserId(3)]);
        assert_eq!(store.len().await?, 3);

        assert!(store.remove(UserId(2)).await?);
        assert!(!store.remove(UserId(2)).await?);
        assert_eq!(store.user_ids().await?, vec![UserId(1), UserId(3)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_schema_version_upgrade_keeps_data() -> Result<()> {
        let store = create_test_store().await?;
        let record = store.apply_event(UserId(1), &video(64)).await?;

        sqlx::query("UPDATE schema_version SET version = 0")
            .execute(&store.pool)
            .await?;
        store.init_schema().await?;

        let version: i32 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(&store.pool)
            .await?;
        assert_eq!(version, SqliteStatsStore::SCHEMA_VERSION);
        assert_eq!(store.get(UserId(1)).await?, record);
        Ok(())
    }

    #[tokio::test]
    async fn test_records_survive_reopen() -> Result<()> {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stats.db");

        let written = {
            let store = SqliteStatsStore::open(&path, StoreOptions::default()).await?;
            let record = store.apply_event(UserId(77), &video(2048)).await?;
            store.close().await;
            record
        };

        let store = SqliteStatsStore::open(&path, StoreOptions::default()).await?;
        assert_eq!(store.get(UserId(77)).await?, written);
        Ok(())
    }

    #[test]
    fn test_sql_conversions_saturate() {
        assert_eq!(to_sql(u64::MAX), i64::MAX);
        assert_eq!(to_sql(5), 5);
        assert_eq!(from_sql(-1), 0);
        assert_eq!(from_sql(12), 12);
    }
}
