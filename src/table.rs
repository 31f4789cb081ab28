//! Packed index tables.
//!
//! Both sides of the data model share one on-storage shape. The table stored
//! at an object's own key lists the indexes that object belongs to; the table
//! stored at a routing id lists the objects that are members of one index on
//! one shard. Either way the blob is:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 |  ...  | 7 | 8 | 9 |10 |11 |12 |13 |14 |15 |16 |17 |18 |19 |  ...  |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |   Magic (u64)     | V | Shard (u32)   |  Count (u32)  |  Entry1 | ... |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//!
//! V     = format version (u8), followed by shard_id (u32) and shard_count (u32)
//! Entry = id (64 bytes) || len (u32) || payload
//! ```
//!
//! Entries are sorted by id with no duplicate keys. A blob without the
//! leading magic (or an empty one) is "no table". Re-encoding a decoded table
//! reproduces the stored bytes, so writers can compare blobs to skip
//! identical writes.

use crate::{
    codec::{self, Codec},
    id::RawId,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;

/// Leading magic of every stored table blob, written big-endian.
pub const MAGIC: u64 = u64::from_be_bytes(*b"IDXTABLE");

/// Current format version of the packed body.
const VERSION: u8 = 1;

/// A membership edit applied to a single table entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Insert,
    Remove,
}

/// One `(id, payload)` pair.
///
/// In an object-index table the id names an index; in an index-membership
/// table it names an object. Two entries are the same key iff their id bytes
/// match; payloads do not participate in ordering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub id: RawId,
    pub payload: Bytes,
}

impl Entry {
    pub fn new(id: RawId, payload: Bytes) -> Self {
        Self { id, payload }
    }
}

impl Codec for Entry {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.payload.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.id.len_encoded() + self.payload.len_encoded()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        let id = RawId::read(buf)?;
        let payload = Bytes::read(buf)?;
        Ok(Self { id, payload })
    }
}

/// A sorted, duplicate-free table of entries plus its shard parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Table {
    pub shard_id: u32,
    pub shard_count: u32,
    pub entries: Vec<Entry>,
}

impl Table {
    /// An empty table.
    pub fn new(shard_id: u32, shard_count: u32) -> Self {
        Self {
            shard_id,
            shard_count,
            entries: Vec::new(),
        }
    }

    /// Builds a table from entries in arbitrary order.
    ///
    /// Entries are stably sorted by id; when several entries carry the same
    /// id, the last one in input order wins.
    pub fn from_unsorted(shard_id: u32, shard_count: u32, mut entries: Vec<Entry>) -> Self {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let mut deduped: Vec<Entry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last_mut() {
                Some(last) if last.id == entry.id => *last = entry,
                _ => deduped.push(entry),
            }
        }
        Self {
            shard_id,
            shard_count,
            entries: deduped,
        }
    }

    /// Parses a stored blob.
    ///
    /// Returns `Ok(None)` when the blob is empty or does not start with
    /// [MAGIC]; a blob that carries the magic but a malformed body is an
    /// error.
    pub fn parse(blob: &[u8]) -> Result<Option<Self>, codec::Error> {
        let mut buf = blob;
        if buf.remaining() < size_of::<u64>() || u64::read(&mut buf)? != MAGIC {
            return Ok(None);
        }
        let version = u8::read(&mut buf)?;
        if version != VERSION {
            return Err(codec::Error::Invalid("Table", "unknown version"));
        }
        let shard_id = u32::read(&mut buf)?;
        let shard_count = u32::read(&mut buf)?;
        let entries = Vec::<Entry>::read(&mut buf)?;
        if buf.has_remaining() {
            return Err(codec::Error::ExtraData(buf.remaining()));
        }
        Ok(Some(Self {
            shard_id,
            shard_count,
            entries,
        }))
    }

    /// Packs the table into a stored blob (magic + versioned body).
    pub fn to_blob(&self) -> Bytes {
        let len = size_of::<u64>()
            + size_of::<u8>()
            + 2 * size_of::<u32>()
            + self.entries.len_encoded();
        let mut buf = BytesMut::with_capacity(len);
        MAGIC.write(&mut buf);
        VERSION.write(&mut buf);
        self.shard_id.write(&mut buf);
        self.shard_count.write(&mut buf);
        self.entries.write(&mut buf);
        buf.freeze()
    }

    /// Binary-searches for an entry by id.
    pub fn find(&self, id: &RawId) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.id.cmp(id))
    }

    /// Returns the union of `self` and `existing`, keeping `self`'s payload
    /// when both tables carry the same key. Shard parameters come from
    /// `self`.
    pub fn merged(&self, existing: &Self) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + existing.entries.len());
        let (mut ours, mut theirs) = (self.entries.iter(), existing.entries.iter());
        let (mut a, mut b) = (ours.next(), theirs.next());
        loop {
            match (a, b) {
                (Some(x), Some(y)) => match x.id.cmp(&y.id) {
                    std::cmp::Ordering::Less => {
                        entries.push(x.clone());
                        a = ours.next();
                    }
                    std::cmp::Ordering::Greater => {
                        entries.push(y.clone());
                        b = theirs.next();
                    }
                    std::cmp::Ordering::Equal => {
                        entries.push(x.clone());
                        a = ours.next();
                        b = theirs.next();
                    }
                },
                (Some(x), None) => {
                    entries.push(x.clone());
                    a = ours.next();
                }
                (None, Some(y)) => {
                    entries.push(y.clone());
                    b = theirs.next();
                }
                (None, None) => break,
            }
        }
        Self {
            shard_id: self.shard_id,
            shard_count: self.shard_count,
            entries,
        }
    }

    /// Computes the membership edits that turn `old`'s memberships into
    /// `new`'s.
    ///
    /// The insert set holds every entry of `new` without an identical
    /// `(id, payload)` counterpart in `old`, so a payload change re-inserts
    /// the key with its new payload. The remove set holds every entry of
    /// `old` whose id is absent from `new`.
    pub fn diff(old: &Self, new: &Self) -> (Vec<Entry>, Vec<Entry>) {
        let mut inserted = Vec::new();
        let mut removed = Vec::new();
        let (mut olds, mut news) = (old.entries.iter(), new.entries.iter());
        let (mut a, mut b) = (olds.next(), news.next());
        loop {
            match (a, b) {
                (Some(x), Some(y)) => match x.id.cmp(&y.id) {
                    std::cmp::Ordering::Less => {
                        removed.push(x.clone());
                        a = olds.next();
                    }
                    std::cmp::Ordering::Greater => {
                        inserted.push(y.clone());
                        b = news.next();
                    }
                    std::cmp::Ordering::Equal => {
                        if x.payload != y.payload {
                            inserted.push(y.clone());
                        }
                        a = olds.next();
                        b = news.next();
                    }
                },
                (Some(x), None) => {
                    removed.push(x.clone());
                    a = olds.next();
                }
                (None, Some(y)) => {
                    inserted.push(y.clone());
                    b = news.next();
                }
                (None, None) => break,
            }
        }
        (inserted, removed)
    }

    /// Applies one membership edit, preserving sort order and uniqueness.
    ///
    /// Returns whether the table changed:
    /// - present + insert with an equal payload: untouched
    /// - present + insert with a different payload: payload replaced in place
    /// - present + remove: entry erased
    /// - absent + insert: entry inserted at its sorted position
    /// - absent + remove: untouched
    pub fn apply(&mut self, id: &RawId, payload: &Bytes, action: Action) -> bool {
        match (self.find(id), action) {
            (Ok(at), Action::Insert) => {
                if &self.entries[at].payload == payload {
                    return false;
                }
                self.entries[at].payload = payload.clone();
                true
            }
            (Ok(at), Action::Remove) => {
                self.entries.remove(at);
                true
            }
            (Err(at), Action::Insert) => {
                self.entries.insert(at, Entry::new(*id, payload.clone()));
                true
            }
            (Err(_), Action::Remove) => false,
        }
    }
}
