use async_trait::async_trait;
use filestats_models::{StatsDelta, StatsRecord, UserId};

use crate::Result;

/// Owner of the persisted per-user statistics.
///
/// Mutations are serialized per user and durable once they return; reads never create state.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Current record, or the all-zero record for a user without activity.
    async fn get(&self, user: UserId) -> Result<StatsRecord>;

    /// Applies `delta` to the user's record and returns the committed result.
    async fn apply_event(&self, user: UserId, delta: &StatsDelta) -> Result<StatsRecord>;

    /// Replaces the user's statistics with the all-zero record and empties the ignore list.
    async fn reset(&self, user: UserId) -> Result<StatsRecord>;

    /// Resets like [`StatsStore::reset`] and returns the record it replaced, read under the same lock.
    async fn take(&self, user: UserId) -> Result<StatsRecord>;

    /// Normalized suffixes the user asked not to count, sorted.
    async fn ignored_extensions(&self, user: UserId) -> Result<Vec<String>>;

    /// Adds suffixes to the ignore list and returns the ones that were not there yet.
    async fn add_ignored_extensions(&self, user: UserId, extensions: &[String]) -> Result<Vec<String>>;

    /// Removes suffixes from the ignore list and returns the ones that were present.
    async fn remove_ignored_extensions(&self, user: UserId, extensions: &[String]) -> Result<Vec<String>>;

    async fn contains(&self, user: UserId) -> Result<bool>;

    /// Deletes everything stored for the user, ignore list included.
    async fn remove(&self, user: UserId) -> Result<bool>;

    async fn user_ids(&self) -> Result<Vec<UserId>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl StatsStore for crate::SqliteStatsStore {
    async fn get(&self, user: UserId) -> Result<StatsRecord> {
        self.get(user).await
    }

    async fn apply_event(&self, user: UserId, delta: &StatsDelta) -> Result<StatsRecord> {
        self.apply_event(user, delta).await
    }

    async fn reset(&self, user: UserId) -> Result<StatsRecord> {
        self.reset(user).await
    }

    async fn take(&self, user: UserId) -> Result<StatsRecord> {
        self.take(user).await
    }

    async fn ignored_extensions(&self, user: UserId) -> Result<Vec<String>> {
        self.ignored_extensions(user).await
    }

    async fn add_ignored_extensions(&self, user: UserId, extensions: &[String]) -> Result<Vec<String>> {
        self.add_ignored_extensions(user, extensions).await
    }

    async fn remove_ignored_extensions(&self, user: UserId, extensions: &[String]) -> Result<Vec<String>> {
        self.remove_ignored_extensions(user, extensions).await
    }

    async fn contains(&self, user: UserId) -> Result<bool> {
        self.contains(user).await
    }

    async fn remove(&self, user: UserId) -> Result<bool> {
        self.remove(user).await
    }

    async fn user_ids(&self) -> Result<Vec<UserId>> {
        self.user_ids().await
    }

    async fn len(&self) -> Result<usize> {
        self.len().await
    }

    async fn is_empty(&self) -> Result<bool> {
        self.is_empty().await
    }
}
