//! Maintain secondary indexes over a sharded content-addressed store.
//!
//! # Overview
//!
//! The store itself maps fixed-width ids to opaque blobs and spreads them
//! across nodes by consistent hashing. This crate layers secondary indexes on
//! top of that primitive: user-chosen index ids map to the set of objects
//! tagged with them, each pairing carrying a small payload. The mapping is
//! materialized twice so both directions stay cheap to read:
//!
//! - an **object-index table** at the object's own key, listing the indexes
//!   the object belongs to, and
//! - an **index-membership table** per (index, shard), listing the objects
//!   that belong to the index on that shard.
//!
//! Three commands keep the two sides consistent. `UPDATE` rewrites an
//! object's index set and fans the resulting membership edits out to the
//! nodes owning each affected table, forwarding their replies to the
//! originator and acknowledging once every edit has terminated. `INTERNAL`
//! applies a single membership edit. `FIND` intersects or unites a set of
//! membership tables.
//!
//! The [engine::Engine] actor implements the commands against three consumed
//! interfaces: a [Store] for local blobs, a [Router] deciding which node owns
//! a key, and a [Dispatcher] delivering remote edits.

use bytes::Bytes;
use std::{fmt::Debug, future::Future};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod codec;
pub mod engine;
pub mod id;
pub mod shard;
pub mod table;
pub mod wire;

use id::RawId;
use wire::{status, Request};

/// Errors that can occur when serving index commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("malformed table: {0}")]
    Codec(#[from] codec::Error),
    #[error("storage error: {0}")]
    Storage(i32),
    #[error("dispatch failed: {0}")]
    Dispatch(&'static str),
}

impl Error {
    /// The wire status surfaced for this error: a negative POSIX-style error
    /// number.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidRequest(_) => status::EINVAL,
            Self::Unsupported(_) => status::ENOTSUP,
            Self::Codec(_) => status::EINVAL,
            Self::Storage(errno) => *errno,
            Self::Dispatch(_) => status::EIO,
        }
    }
}

/// The blob storage primitive consumed by the engine.
///
/// Both operations are serialized per key by the engine's own locking; a
/// missing key reads as `Ok(None)`, never as an error.
pub trait Store: Clone + Send + Sync + 'static {
    /// Reads the blob stored at `key`.
    fn read(&self, key: &RawId) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send;

    /// Writes the blob stored at `key`, creating it if absent.
    fn write(&self, key: &RawId, blob: Bytes) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Where a routing id lives.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination<P> {
    /// The local node owns the key.
    Local,
    /// Another node owns the key.
    Remote(P),
}

/// The cluster routing table consumed by the engine.
pub trait Router: Clone + Send + Sync + 'static {
    /// Handle for a remote node.
    type Peer: Clone + Debug + Send + Sync + 'static;

    /// Resolves the node owning `key`.
    fn route(&self, key: &RawId) -> Destination<Self::Peer>;
}

/// One event observed on a dispatched request's reply stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Delivery {
    /// An intermediate reply body to forward to the originator.
    Frame(Bytes),
    /// The exactly-once terminal event carrying the request's status.
    Done(i32),
}

/// The transport primitive consumed by the engine for remote membership
/// edits.
pub trait Dispatcher: Clone + Send + Sync + 'static {
    /// Handle for a remote node, matching the router's.
    type Peer: Clone + Debug + Send + Sync + 'static;

    /// Sends a single-entry `INDEXES_INTERNAL` request to `peer`.
    ///
    /// The returned channel yields zero or more [Delivery::Frame]s followed
    /// by one [Delivery::Done]. A channel dropped without a terminal event is
    /// treated by the caller as a timed-out request.
    fn dispatch(
        &mut self,
        peer: Self::Peer,
        request: Request,
    ) -> impl Future<Output = Result<mpsc::Receiver<Delivery>, Error>> + Send;
}
