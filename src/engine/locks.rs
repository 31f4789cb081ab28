//! Per-key mutual exclusion across command tasks.

use crate::id::RawId;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Sweep dead registry entries once the map grows past this size.
const SWEEP_AT: usize = 1024;

/// Grants exclusive access to one storage key at a time.
///
/// An update holds its object's lock from admission until the terminal ack;
/// membership edits hold the lock of the table they rewrite. Guards are
/// owned, so they can ride inside a task record that outlives the acquiring
/// function.
#[derive(Clone, Default)]
pub(super) struct Locks {
    registry: Arc<Mutex<HashMap<RawId, Weak<AsyncMutex<()>>>>>,
}

impl Locks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock guarding `key`.
    pub async fn acquire(&self, key: &RawId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.registry.lock().unwrap();
            if registry.len() >= SWEEP_AT {
                registry.retain(|_, weak| weak.strong_count() > 0);
            }
            match registry.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    registry.insert(*key, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ID_SIZE;

    fn key(tag: u8) -> RawId {
        let mut bytes = [0u8; ID_SIZE];
        bytes[0] = tag;
        RawId::new(bytes)
    }

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Locks::new();
        let guard = locks.acquire(&key(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key(1)).await;
            })
        };
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let locks = Locks::new();
        let _one = locks.acquire(&key(1)).await;
        let _two = locks.acquire(&key(2)).await;
    }

    #[tokio::test]
    async fn test_released_key_is_reacquirable() {
        let locks = Locks::new();
        drop(locks.acquire(&key(1)).await);
        drop(locks.acquire(&key(1)).await);
    }
}
