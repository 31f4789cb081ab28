//! Index-side membership edits.

use super::{ingress::Origin, locks::Locks, metrics::Metrics};
use crate::{
    codec::Codec,
    id::RawId,
    table::{Action, Table},
    wire::{entry_flags, status, Frame, Reply, ReplyEntry, Request},
    Error, Store,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies one membership edit to the table stored at `key`.
///
/// Shared by the `INDEXES_INTERNAL` command and the update driver's local
/// path. Takes the key's lock for the duration of the read-modify-write and
/// skips the write when the packed table would not change.
///
/// Returns whether the stored blob was rewritten.
pub(super) async fn apply<S: Store>(
    store: &S,
    locks: &Locks,
    metrics: &Metrics,
    key: &RawId,
    object: &RawId,
    payload: &Bytes,
    action: Action,
    shard_id: u32,
    shard_count: u32,
) -> Result<bool, Error> {
    let _guard = locks.acquire(key).await;

    let mut table = match store.read(key).await? {
        Some(blob) => Table::parse(&blob)?.unwrap_or_else(|| Table::new(shard_id, shard_count)),
        None => Table::new(shard_id, shard_count),
    };

    if !table.apply(object, payload, action) {
        debug!(%key, %object, ?action, "membership table unchanged");
        metrics.unchanged_tables.inc();
        return Ok(false);
    }

    table.shard_id = shard_id;
    table.shard_count = shard_count;
    store.write(key, table.to_blob()).await?;
    debug!(
        %key,
        %object,
        ?action,
        entries = table.entries.len(),
        "membership table rewritten"
    );
    Ok(true)
}

/// Serves one `INDEXES_INTERNAL` command to its terminal reply frame.
pub(super) async fn run<S: Store>(
    store: S,
    locks: Locks,
    metrics: Arc<Metrics>,
    request: Request,
    origin: Origin,
) {
    metrics.internals.inc();
    match execute(&store, &locks, &metrics, &request).await {
        Ok(entry) => {
            if entry.status != status::OK {
                metrics.failures.inc();
            }
            let reply = Reply {
                entries: vec![entry],
            };
            origin.send(Frame::ack(entry.status, reply.encode()));
        }
        Err(err) => {
            warn!(object = %request.id, ?err, "membership edit rejected");
            metrics.failures.inc();
            origin.send(Frame::ack(err.errno(), Bytes::new()));
        }
    }
}

/// Validates and applies the command's single entry.
///
/// Validation failures bubble up as errors; a storage failure during the
/// edit is reported inside the reply entry so the caller knows which index
/// failed.
async fn execute<S: Store>(
    store: &S,
    locks: &Locks,
    metrics: &Metrics,
    request: &Request,
) -> Result<ReplyEntry, Error> {
    if request.entries.len() != 1 {
        return Err(Error::InvalidRequest(
            "membership edits carry exactly one entry",
        ));
    }
    let entry = &request.entries[0];
    let action = if entry.has_flag(entry_flags::INSERT) {
        Action::Insert
    } else if entry.has_flag(entry_flags::REMOVE) {
        Action::Remove
    } else {
        return Err(Error::InvalidRequest("entry carries no action bit"));
    };
    debug!(index = %entry.id, object = %request.id, ?action, "membership edit");

    let status = match apply(
        store,
        locks,
        metrics,
        &entry.id,
        &request.id,
        &entry.payload,
        action,
        request.shard_id,
        request.shard_count,
    )
    .await
    {
        Ok(_) => status::OK,
        Err(err) => {
            warn!(index = %entry.id, object = %request.id, ?err, "membership edit failed");
            err.errno()
        }
    };

    Ok(ReplyEntry {
        id: entry.id,
        status,
    })
}
