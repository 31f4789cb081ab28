use crate::{id::RawId, Error, Store};
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// An in-memory [Store] that counts writes and can be scripted to fail.
#[derive(Clone, Default)]
pub struct Storage {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<RawId, Bytes>,
    writes: HashMap<RawId, u64>,
    read_errors: HashMap<RawId, i32>,
    write_errors: HashMap<RawId, i32>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RawId) -> Option<Bytes> {
        self.inner.lock().unwrap().blobs.get(key).cloned()
    }

    pub fn put(&self, key: RawId, blob: Bytes) {
        self.inner.lock().unwrap().blobs.insert(key, blob);
    }

    /// Number of writes observed for `key`.
    pub fn writes(&self, key: &RawId) -> u64 {
        *self
            .inner
            .lock()
            .unwrap()
            .writes
            .get(key)
            .unwrap_or(&0)
    }

    /// Number of writes observed across all keys.
    pub fn total_writes(&self) -> u64 {
        self.inner.lock().unwrap().writes.values().sum()
    }

    /// Makes every read of `key` fail with `errno`.
    pub fn fail_reads(&self, key: RawId, errno: i32) {
        self.inner.lock().unwrap().read_errors.insert(key, errno);
    }

    /// Makes every write of `key` fail with `errno`.
    pub fn fail_writes(&self, key: RawId, errno: i32) {
        self.inner.lock().unwrap().write_errors.insert(key, errno);
    }
}

impl Store for Storage {
    async fn read(&self, key: &RawId) -> Result<Option<Bytes>, Error> {
        let inner = self.inner.lock().unwrap();
        if let Some(errno) = inner.read_errors.get(key) {
            return Err(Error::Storage(*errno));
        }
        Ok(inner.blobs.get(key).cloned())
    }

    async fn write(&self, key: &RawId, blob: Bytes) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(errno) = inner.write_errors.get(key) {
            return Err(Error::Storage(*errno));
        }
        *inner.writes.entry(*key).or_default() += 1;
        inner.blobs.insert(*key, blob);
        Ok(())
    }
}
