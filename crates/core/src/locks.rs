use dashmap::DashMap;
use filestats_models::UserId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-user mutexes.
///
/// Entries are created on demand under the map's shard lock and dropped again once the last
/// holder releases them, so the map only ever contains users with operations in flight.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    inner: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other operation holds `user`'s lock.
    pub async fn acquire(&self, user: UserId) -> UserGuard {
        let mutex = Arc::clone(self.inner.entry(user).or_default().value());
        let guard = mutex.lock_owned().await;

        UserGuard {
            guard: Some(guard),
            user,
            locks: Arc::clone(&self.inner),
        }
    }

    /// Number of users that currently have a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[derive(Debug)]
pub struct UserGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user: UserId,
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        // Release the mutex before checking whether anyone else still references it.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.user, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = UserLocks::new();
        {
            let _guard = locks.acquire(UserId(1)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = UserLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(UserId(7)).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _first = locks.acquire(UserId(1)).await;

        let second = tokio::time::timeout(Duration::from_secs(1), locks.acquire(UserId(2))).await;
        assert!(second.is_ok(), "lock for another user must not wait");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = UserLocks::new();
        let first = locks.acquire(UserId(3)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(UserId(3)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(first);
        // The waiter still references the mutex, so the entry survives the first release.
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
