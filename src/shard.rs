//! Shard assignment and routing-id derivation.
//!
//! An index's membership is spread across `shard_count` storage keys so that
//! no single key accumulates the whole index. Every request belonging to one
//! object uses that object's own shard when deriving the keys of the indexes
//! it touches, which co-locates membership edits with the objects responsible
//! for them on any given shard.

use crate::id::{RawId, ID_SIZE};
use sha2::{Digest, Sha512};

/// Returns the shard an object falls in.
///
/// Folds the leading bytes of the id (big-endian) modulo `shard_count`.
/// A cluster configured with zero shards collapses to shard 0.
pub fn shard_of(id: &RawId, shard_count: u32) -> u32 {
    if shard_count == 0 {
        return 0;
    }
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&id.as_bytes()[..8]);
    (u64::from_be_bytes(prefix) % shard_count as u64) as u32
}

/// Derives the routing id of an index's membership table on one shard.
///
/// `Sha512(index_id || be32(shard_id) || be32(shard_count))`, whose output
/// width is exactly [ID_SIZE]. The same (index, shard, count) triple always
/// maps to the same key, and distinct shards map to unrelated keys.
pub fn transform(index_id: &RawId, shard_id: u32, shard_count: u32) -> RawId {
    let mut hasher = Sha512::new();
    hasher.update(index_id.as_bytes());
    hasher.update(shard_id.to_be_bytes());
    hasher.update(shard_count.to_be_bytes());
    let mut routing = [0u8; ID_SIZE];
    routing.copy_from_slice(&hasher.finalize());
    RawId::new(routing)
}
