//! Capacity-bounded, weakly-referenced in-process connection pool
//! (§4.9), mirroring the `WeakValueDictionary` + lock shape of this
//! gateway's connection pool in the system it was grown from: the pool
//! itself never keeps a session alive, so an abandoned session is
//! collected as soon as its owning task drops its `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::GatewayError;

/// Anything the pool can close on `clear()`.
#[async_trait]
pub trait Closeable: Send + Sync {
    async fn close(&self);
}

pub struct ConnectionPool<T: Closeable> {
    sessions: Mutex<HashMap<String, Weak<T>>>,
    capacity: usize,
}

impl<T: Closeable> ConnectionPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Register a new session. Fails with `Capacity` if the live count
    /// is already at capacity, or `ClientViolation` if `uid` is already
    /// registered (duplicate connection).
    pub async fn add(&self, uid: &str, session: Arc<T>) -> Result<(), GatewayError> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, weak| weak.strong_count() > 0);

        if sessions.contains_key(uid) {
            return Err(GatewayError::ClientViolation(format!(
                "duplicate connection for uid {uid}"
            )));
        }
        if sessions.len() >= self.capacity {
            return Err(GatewayError::Capacity(format!(
                "connection pool at capacity ({})",
                self.capacity
            )));
        }
        sessions.insert(uid.to_string(), Arc::downgrade(&session));
        Ok(())
    }

    pub async fn remove(&self, uid: &str) {
        self.sessions.lock().await.remove(uid);
    }

    pub async fn get(&self, uid: &str) -> Option<Arc<T>> {
        self.sessions.lock().await.get(uid).and_then(Weak::upgrade)
    }

    /// Live sessions only; dead weak references are filtered out rather
    /// than cleaned up here (cleanup happens on `add`/`clear`).
    pub async fn iter(&self) -> Vec<Arc<T>> {
        self.sessions
            .lock()
            .await
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Close every still-live session and drop all entries.
    pub async fn clear(&self) {
        let live: Vec<Arc<T>> = self.iter().await;
        for session in live {
            session.close().await;
        }
        self.sessions.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl Closeable for Dummy {
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn add_then_get_roundtrips() {
        let pool = ConnectionPool::new(2);
        let session = Arc::new(Dummy);
        pool.add("uid-1", session.clone()).await.unwrap();
        assert!(pool.get("uid-1").await.is_some());
    }

    #[tokio::test]
    async fn duplicate_uid_fails() {
        let pool = ConnectionPool::new(2);
        pool.add("uid-1", Arc::new(Dummy)).await.unwrap();
        let err = pool.add("uid-1", Arc::new(Dummy)).await.unwrap_err();
        assert!(matches!(err, GatewayError::ClientViolation(_)));
    }

    #[tokio::test]
    async fn capacity_exceeded_fails() {
        let pool = ConnectionPool::new(1);
        let _keep_alive = Arc::new(Dummy);
        pool.add("uid-1", _keep_alive.clone()).await.unwrap();
        let err = pool.add("uid-2", Arc::new(Dummy)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Capacity(_)));
    }

    #[tokio::test]
    async fn dropped_arc_is_collected() {
        let pool = ConnectionPool::new(2);
        {
            let session = Arc::new(Dummy);
            pool.add("uid-1", session).await.unwrap();
        }
        assert!(pool.get("uid-1").await.is_none());
    }
}
