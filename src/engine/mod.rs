//! Serves index commands against the local store and the cluster.
//!
//! The engine is an actor fed through a [Mailbox]. Each submitted command
//! runs as its own task under the engine's per-key locks: updates hold their
//! object's lock from admission to terminal ack, membership edits hold the
//! lock of the table they rewrite. Replies flow back to each command's
//! originator as [crate::wire::Frame]s.

mod actor;
mod find;
mod ingress;
mod internal;
mod locks;
mod metrics;
#[cfg(test)]
pub mod mocks;
mod update;

pub use actor::Engine;
pub use ingress::{Mailbox, Message, Origin};

use crate::{Dispatcher, Router, Store};

/// Configuration for the [Engine].
pub struct Config<S: Store, R: Router, D: Dispatcher<Peer = R::Peer>> {
    /// Local blob storage.
    pub store: S,
    /// Resolves which node owns a routing id.
    pub router: R,
    /// Delivers membership edits to remote owners.
    pub dispatcher: D,
    /// Cluster-wide shard denominator used for object placement.
    pub shard_count: u32,
    /// Capacity of the command mailbox.
    pub mailbox_size: usize,
}
