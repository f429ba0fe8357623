//! Per-key async locks for resources identified by an arbitrary number of
//! distinct string keys (one lock per in-flight chunked upload).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// Hands out one `Mutex` per key, creating it on first use.
///
/// Chunk receipts for the same upload serialise through their key's lock so
/// the received-set update and the all-chunks-received transition form a
/// critical section that fires exactly once.
#[derive(Default)]
pub struct LockMap(RwLock<HashMap<String, Arc<Mutex<()>>>>);

impl LockMap {
    /// Retrieve the lock for the given key, creating it if absent.
    pub async fn get(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.0.read().await.get(key) {
            return lock.clone();
        }

        let mut write = self.0.write().await;

        if let Some(lock) = write.get(key) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        write.insert(key.to_string(), lock.clone());
        lock
    }

    /// Drop the lock for a key whose upload reached a terminal state.
    pub async fn remove(&self, key: &str) {
        self.0.write().await.remove(key);
    }
}
