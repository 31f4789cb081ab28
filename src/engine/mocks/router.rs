use crate::{id::RawId, Destination};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A [crate::Router] that owns every key locally unless told otherwise.
///
/// Peers are plain numeric node handles.
#[derive(Clone, Default)]
pub struct Router {
    remote: Arc<Mutex<HashMap<RawId, u64>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `key` to a remote peer.
    pub fn assign(&self, key: RawId, peer: u64) {
        self.remote.lock().unwrap().insert(key, peer);
    }
}

impl crate::Router for Router {
    type Peer = u64;

    fn route(&self, key: &RawId) -> Destination<u64> {
        match self.remote.lock().unwrap().get(key) {
            Some(peer) => Destination::Remote(*peer),
            None => Destination::Local,
        }
    }
}
