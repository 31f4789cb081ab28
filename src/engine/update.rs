//! Object-side update driver.
//!
//! An update rewrites the object's own index table first, then fans the
//! membership edits implied by the change out to the tables' owners: remote
//! owners over the transport, the local node in-process. Reply bodies from
//! remote edits are forwarded to the originator as they arrive; the terminal
//! ack is emitted once every edit has terminated, and only then is the
//! object's lock released.

use super::{ingress::Origin, internal, locks::Locks, metrics::Metrics};
use crate::{
    codec::Codec,
    id::RawId,
    shard,
    table::{Action, Entry, Table},
    wire::{entry_flags, request_flags, status, Frame, Reply, ReplyEntry, Request, RequestEntry},
    Delivery, Destination, Dispatcher, Error, Router, Store,
};
use bytes::Bytes;
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Tracks a running update until every sub-operation has terminated.
///
/// The outstanding counter starts at one for the driver itself, gains one
/// per dispatched remote edit and loses one per terminal event. Only the
/// transition to zero emits the terminal ack; the object lock rides in the
/// record and is released when the last holder lets go.
pub(super) struct Completion {
    origin: Origin,
    metrics: Arc<Metrics>,
    state: Mutex<State>,
    _lock: OwnedMutexGuard<()>,
}

struct State {
    outstanding: usize,
    status: i32,
}

impl Completion {
    fn new(origin: Origin, metrics: Arc<Metrics>, lock: OwnedMutexGuard<()>) -> Arc<Self> {
        metrics.inflight_updates.inc();
        Arc::new(Self {
            origin,
            metrics,
            state: Mutex::new(State {
                outstanding: 1,
                status: status::OK,
            }),
            _lock: lock,
        })
    }

    /// Accounts for a remote edit about to be dispatched.
    fn register(&self) {
        self.state.lock().unwrap().outstanding += 1;
    }

    /// Rolls back [Self::register] for a dispatch that never started.
    fn unregister(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.outstanding > 1);
        state.outstanding -= 1;
    }

    /// Forwards a remote reply body to the originator.
    fn forward(&self, body: Bytes) {
        self.metrics.forwarded_frames.inc();
        self.origin.send(Frame::partial(body));
    }

    /// Sends the locally produced results as an intermediate frame.
    fn partial(&self, reply: &Reply) {
        self.origin.send(Frame::partial(reply.encode()));
    }

    /// Records one terminal event; the transition to zero emits the ack.
    ///
    /// The last non-zero status observed wins.
    fn finish(&self, status: i32) {
        let final_status = {
            let mut state = self.state.lock().unwrap();
            if status != status::OK {
                state.status = status;
            }
            state.outstanding -= 1;
            if state.outstanding > 0 {
                return;
            }
            state.status
        };
        if final_status != status::OK {
            self.metrics.failures.inc();
        }
        self.metrics.inflight_updates.dec();
        self.origin.send(Frame::ack(final_status, Bytes::new()));
    }
}

/// Fan-out tallies for the completion log line.
#[derive(Default)]
struct Tally {
    local_inserts: usize,
    local_removes: usize,
    remote_inserts: usize,
    remote_removes: usize,
}

/// Serves one `INDEXES_UPDATE` command.
pub(super) struct Driver<S: Store, R: Router, D: Dispatcher<Peer = R::Peer>> {
    pub store: S,
    pub router: R,
    pub dispatcher: D,
    pub locks: Locks,
    pub metrics: Arc<Metrics>,
    pub shard_count: u32,
}

impl<S: Store, R: Router, D: Dispatcher<Peer = R::Peer>> Driver<S, R, D> {
    pub async fn run(mut self, request: Request, origin: Origin) {
        self.metrics.updates.inc();
        let started = Instant::now();
        let object = request.id;
        let lock = self.locks.acquire(&object).await;
        let completion = Completion::new(origin, self.metrics.clone(), lock);

        let status = match self.process(&request, &completion).await {
            Ok(tally) => {
                info!(
                    %object,
                    local_inserts = tally.local_inserts,
                    local_removes = tally.local_removes,
                    remote_inserts = tally.remote_inserts,
                    remote_removes = tally.remote_removes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "indexes updated"
                );
                status::OK
            }
            Err(err) => {
                warn!(%object, ?err, "update failed");
                err.errno()
            }
        };
        completion.finish(status);
    }

    async fn process(
        &mut self,
        request: &Request,
        completion: &Arc<Completion>,
    ) -> Result<Tally, Error> {
        let object = request.id;
        let update_only = request.has_flag(request_flags::UPDATE_ONLY);
        let shard_id = shard::shard_of(&object, self.shard_count);

        // The wire order of entries is arbitrary; on duplicate index ids the
        // last one in the request wins.
        let incoming = Table::from_unsorted(
            shard_id,
            self.shard_count,
            request
                .entries
                .iter()
                .map(|entry| Entry::new(entry.id, entry.payload.clone()))
                .collect(),
        );

        let existing_blob = match self.store.read(&object).await {
            Ok(blob) => blob,
            Err(err) => {
                debug!(%object, ?err, "object table unreadable, starting empty");
                None
            }
        };
        let existing = match &existing_blob {
            Some(blob) => {
                Table::parse(blob)?.unwrap_or_else(|| Table::new(shard_id, self.shard_count))
            }
            None => Table::new(shard_id, self.shard_count),
        };

        let outgoing = if update_only {
            incoming.merged(&existing)
        } else {
            incoming
        };
        let blob = outgoing.to_blob();
        if existing_blob.as_deref() == Some(&blob[..]) {
            debug!(%object, "object table unchanged");
            self.metrics.unchanged_tables.inc();
            return Ok(Tally::default());
        }
        self.store.write(&object, blob).await?;

        // Update-only mode never edits membership tables.
        if update_only {
            return Ok(Tally::default());
        }

        let (inserted, removed) = Table::diff(&existing, &outgoing);
        if inserted.is_empty() && removed.is_empty() {
            return Ok(Tally::default());
        }

        // Remote edits are dispatched before any local edit runs; inserts
        // before removes.
        let mut tally = Tally::default();
        let mut local = Vec::new();
        let edits = inserted
            .into_iter()
            .map(|entry| (entry, Action::Insert))
            .chain(removed.into_iter().map(|entry| (entry, Action::Remove)));
        for (entry, action) in edits {
            let route = shard::transform(&entry.id, shard_id, self.shard_count);
            match self.router.route(&route) {
                Destination::Remote(peer) => {
                    match action {
                        Action::Insert => tally.remote_inserts += 1,
                        Action::Remove => tally.remote_removes += 1,
                    }
                    self.send_remote(request, completion, peer, shard_id, route, entry, action)
                        .await?;
                }
                Destination::Local => local.push((route, entry, action)),
            }
        }

        let mut results = Vec::with_capacity(local.len());
        let mut failed = None;
        for (route, entry, action) in local {
            match action {
                Action::Insert => tally.local_inserts += 1,
                Action::Remove => tally.local_removes += 1,
            }
            let status = match internal::apply(
                &self.store,
                &self.locks,
                &self.metrics,
                &route,
                &object,
                &entry.payload,
                action,
                shard_id,
                self.shard_count,
            )
            .await
            {
                Ok(_) => status::OK,
                Err(err) => {
                    let status = err.errno();
                    failed = Some(err);
                    status
                }
            };
            self.metrics.local_edits.inc();
            results.push(ReplyEntry { id: route, status });
            if failed.is_some() {
                break;
            }
        }
        // The local-results frame is sent once per fan-out, even when every
        // edit routed remotely and the result vector is empty.
        completion.partial(&Reply { entries: results });
        match failed {
            Some(err) => Err(err),
            None => Ok(tally),
        }
    }

    /// Dispatches a one-entry membership edit to the owning node and spawns
    /// the task that forwards its replies.
    ///
    /// A dispatch failure aborts further fan-out; edits already in flight
    /// keep draining through their forwarders.
    async fn send_remote(
        &mut self,
        request: &Request,
        completion: &Arc<Completion>,
        peer: R::Peer,
        shard_id: u32,
        route: RawId,
        entry: Entry,
        action: Action,
    ) -> Result<(), Error> {
        let edit = Request {
            id: request.id,
            group: request.group,
            shard_id,
            shard_count: self.shard_count,
            flags: 0,
            entries: vec![RequestEntry {
                id: route,
                flags: match action {
                    Action::Insert => entry_flags::INSERT,
                    Action::Remove => entry_flags::REMOVE,
                },
                payload: entry.payload,
            }],
        };

        completion.register();
        let mut deliveries = match self.dispatcher.dispatch(peer.clone(), edit).await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                completion.unregister();
                warn!(%route, ?peer, ?err, "dispatch failed");
                return Err(err);
            }
        };
        self.metrics.remote_edits.inc();

        let completion = completion.clone();
        tokio::spawn(async move {
            while let Some(delivery) = deliveries.recv().await {
                match delivery {
                    Delivery::Frame(body) => completion.forward(body),
                    Delivery::Done(status) => {
                        completion.finish(status);
                        return;
                    }
                }
            }
            // The transport dropped the stream without a terminal event.
            completion.finish(status::ETIMEDOUT);
        });
        Ok(())
    }
}
