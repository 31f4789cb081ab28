//! Membership queries over a set of indexes.

use super::{ingress::Origin, metrics::Metrics};
use crate::{
    codec::Codec,
    id::RawId,
    table::{Entry, Table},
    wire::{request_flags, status, FindEntry, Frame, Request},
    Error, Store,
};
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

/// Serves one `INDEXES_FIND` command to its terminal reply frame.
pub(super) async fn run<S: Store>(
    store: S,
    metrics: Arc<Metrics>,
    request: Request,
    origin: Origin,
) {
    metrics.finds.inc();
    match execute(&store, &request).await {
        Ok((entries, first_error)) => {
            debug!(
                indexes = request.entries.len(),
                objects = entries.len(),
                status = first_error,
                "find complete"
            );
            if first_error != status::OK {
                metrics.failures.inc();
            }
            origin.send(Frame::ack(first_error, entries.encode()));
        }
        Err(err) => {
            warn!(?err, "find failed");
            metrics.failures.inc();
            origin.send(Frame::ack(err.errno(), Bytes::new()));
        }
    }
}

/// Runs the query, returning the annotated objects and the first tolerated
/// read error (union only).
async fn execute<S: Store>(
    store: &S,
    request: &Request,
) -> Result<(Vec<FindEntry>, i32), Error> {
    let intersect = request.has_flag(request_flags::INTERSECT);
    let unite = request.has_flag(request_flags::UNITE);
    if intersect == unite {
        return Err(Error::Unsupported(
            "find requires exactly one of INTERSECT and UNITE",
        ));
    }

    let mut first_error = status::OK;
    let mut result: Vec<FindEntry> = Vec::new();
    // Union only: object id -> position in `result`.
    let mut positions: HashMap<RawId, usize> = HashMap::new();

    for (nth, input) in request.entries.iter().enumerate() {
        let table = match read_table(store, &input.id).await {
            Ok(table) => table,
            Err(err) if intersect => return Err(err),
            Err(err) => {
                debug!(index = %input.id, ?err, "tolerated read failure");
                if first_error == status::OK {
                    first_error = err.errno();
                }
                continue;
            }
        };

        if unite {
            for entry in table.entries {
                let at = match positions.get(&entry.id) {
                    Some(at) => *at,
                    None => {
                        positions.insert(entry.id, result.len());
                        result.push(FindEntry {
                            id: entry.id,
                            indexes: Vec::new(),
                        });
                        result.len() - 1
                    }
                };
                result[at].indexes.push(Entry::new(input.id, entry.payload));
            }
        } else if nth == 0 {
            // Seed with the first index; its order is the output order.
            result = table
                .entries
                .into_iter()
                .map(|entry| FindEntry {
                    id: entry.id,
                    indexes: vec![Entry::new(input.id, entry.payload)],
                })
                .collect();
        } else {
            result = intersect_with(result, &table, &input.id);
        }
    }

    Ok((result, first_error))
}

/// Reads and unpacks one membership table; absence is an empty table.
async fn read_table<S: Store>(store: &S, key: &RawId) -> Result<Table, Error> {
    match store.read(key).await? {
        Some(blob) => Ok(Table::parse(&blob)?.unwrap_or_else(|| Table::new(0, 0))),
        None => Ok(Table::new(0, 0)),
    }
}

/// Drops every result not present in `table` and annotates the survivors.
///
/// Both inputs are sorted by object id, so one linear pass suffices and the
/// seeded order is preserved.
fn intersect_with(result: Vec<FindEntry>, table: &Table, input: &RawId) -> Vec<FindEntry> {
    let mut kept = Vec::with_capacity(result.len().min(table.entries.len()));
    let mut candidates = table.entries.iter().peekable();
    for mut found in result {
        while candidates
            .peek()
            .is_some_and(|candidate| candidate.id < found.id)
        {
            candidates.next();
        }
        if let Some(candidate) = candidates.peek() {
            if candidate.id == found.id {
                found
                    .indexes
                    .push(Entry::new(*input, candidate.payload.clone()));
                kept.push(found);
                candidates.next();
            }
        }
    }
    kept
}
