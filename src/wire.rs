//! Wire records exchanged with the command dispatcher and between nodes.
//!
//! Inbound commands (`INDEXES_UPDATE`, `INDEXES_INTERNAL`, `INDEXES_FIND`)
//! all share the [Request] framing: a header followed by `entries_count`
//! variable-size entries. Replies are packed [Reply] bodies ([FindEntry]
//! bodies for queries) delivered inside host [Frame]s.

use crate::{
    codec::{self, Codec},
    id::RawId,
    table::Entry,
};
use bytes::{Buf, BufMut, Bytes};

/// Statuses surfaced on the wire: negative POSIX-style error numbers, zero on
/// success.
pub mod status {
    pub const OK: i32 = 0;
    pub const ENOENT: i32 = -2;
    pub const EIO: i32 = -5;
    pub const EINVAL: i32 = -22;
    pub const ENOTSUP: i32 = -95;
    pub const ETIMEDOUT: i32 = -110;
}

/// Bits recognized in [Request::flags].
pub mod request_flags {
    /// UPDATE merges the request's entries into the object's existing index
    /// set instead of replacing it, and performs no membership edits.
    pub const UPDATE_ONLY: u64 = 1 << 0;
    /// FIND returns objects present in every listed index.
    pub const INTERSECT: u64 = 1 << 1;
    /// FIND returns objects present in any listed index.
    pub const UNITE: u64 = 1 << 2;
}

/// Bits recognized in [RequestEntry::flags] (INTERNAL only).
pub mod entry_flags {
    pub const INSERT: u64 = 1 << 0;
    pub const REMOVE: u64 = 1 << 1;
}

/// Header + entries of an inbound command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    /// Primary key of the command: the object id for UPDATE and INTERNAL,
    /// the shard-selecting id for FIND.
    pub id: RawId,
    /// Replication-group selector, carried opaquely.
    pub group: u32,
    pub shard_id: u32,
    pub shard_count: u32,
    pub flags: u64,
    pub entries: Vec<RequestEntry>,
}

impl Request {
    pub fn has_flag(&self, bit: u64) -> bool {
        self.flags & bit != 0
    }
}

impl Codec for Request {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.group.write(buf);
        self.shard_id.write(buf);
        self.shard_count.write(buf);
        self.flags.write(buf);
        self.entries.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.id.len_encoded()
            + self.group.len_encoded()
            + self.shard_id.len_encoded()
            + self.shard_count.len_encoded()
            + self.flags.len_encoded()
            + self.entries.len_encoded()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        let id = RawId::read(buf)?;
        let group = u32::read(buf)?;
        let shard_id = u32::read(buf)?;
        let shard_count = u32::read(buf)?;
        let flags = u64::read(buf)?;
        let entries = Vec::<RequestEntry>::read(buf)?;
        Ok(Self {
            id,
            group,
            shard_id,
            shard_count,
            flags,
            entries,
        })
    }
}

/// One `(index_id, flags, payload)` element of a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestEntry {
    pub id: RawId,
    pub flags: u64,
    pub payload: Bytes,
}

impl RequestEntry {
    pub fn has_flag(&self, bit: u64) -> bool {
        self.flags & bit != 0
    }
}

impl Codec for RequestEntry {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.flags.write(buf);
        self.payload.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.id.len_encoded() + self.flags.len_encoded() + self.payload.len_encoded()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        let id = RawId::read(buf)?;
        let flags = u64::read(buf)?;
        let payload = Bytes::read(buf)?;
        Ok(Self { id, flags, payload })
    }
}

/// Body of an update or membership-edit reply.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reply {
    pub entries: Vec<ReplyEntry>,
}

impl Codec for Reply {
    fn write(&self, buf: &mut impl BufMut) {
        self.entries.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.entries.len_encoded()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        let entries = Vec::<ReplyEntry>::read(buf)?;
        Ok(Self { entries })
    }
}

/// Per-index outcome of a membership edit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReplyEntry {
    /// Routing id of the membership table the edit targeted.
    pub id: RawId,
    pub status: i32,
}

impl Codec for ReplyEntry {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.status.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.id.len_encoded() + self.status.len_encoded()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        let id = RawId::read(buf)?;
        let status = i32::read(buf)?;
        Ok(Self { id, status })
    }
}

/// One object in a FIND result, annotated with the `(index_id, payload)`
/// pair stored for it in every contributing input index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FindEntry {
    pub id: RawId,
    pub indexes: Vec<Entry>,
}

impl Codec for FindEntry {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.indexes.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.id.len_encoded() + self.indexes.len_encoded()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        let id = RawId::read(buf)?;
        let indexes = Vec::<Entry>::read(buf)?;
        Ok(Self { id, indexes })
    }
}

/// A reply unit delivered to a command's originator.
///
/// A request answers with zero or more frames carrying `more`, then exactly
/// one terminal frame without it. The terminal frame's status is the
/// command's outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub status: i32,
    pub more: bool,
    pub body: Bytes,
}

impl Frame {
    /// An intermediate frame: more frames follow.
    pub fn partial(body: Bytes) -> Self {
        Self {
            status: status::OK,
            more: true,
            body,
        }
    }

    /// The terminal acknowledgement of a request.
    pub fn ack(status: i32, body: Bytes) -> Self {
        Self {
            status,
            more: false,
            body,
        }
    }
}
