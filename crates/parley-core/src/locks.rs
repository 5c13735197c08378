//! Per-session run locks.
//!
//! One exclusive lock per session id, created on first use and kept for the
//! process lifetime. Holding a [`SessionGuard`] excludes every other pipeline
//! run for the same id; runs for different ids never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::trace;

#[derive(Default)]
pub struct SessionLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

/// Exclusive hold on a session. Released on drop.
pub struct SessionGuard {
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Release the lock explicitly.
    pub fn release(self) {
        trace!(session_id = %self.session_id, "Released session lock");
    }
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(id) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Wait (without spinning) until the session is free, then hold it.
    pub async fn acquire(&self, id: &str) -> SessionGuard {
        let lock = self.lock_for(id).await;
        let guard = lock.lock_owned().await;
        trace!(session_id = id, "Acquired session lock");
        SessionGuard {
            session_id: id.to_string(),
            _guard: guard,
        }
    }

    /// Number of locks created so far.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_is_exclusive() {
        let locks = SessionLocks::new();
        let guard = locks.acquire("s1").await;
        assert_eq!(guard.session_id(), "s1");
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s1")).await;
        assert!(blocked.is_err());
        guard.release();
        let free = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s1")).await;
        assert!(free.is_ok());
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_waiter_resumes_after_release() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.acquire("s").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("s").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish once the lock is released")
            .unwrap();
    }
}
