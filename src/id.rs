//! Fixed-width identifiers.

use crate::codec::{self, Codec};
use bytes::{Buf, BufMut};
use std::{
    fmt::{Debug, Display, Formatter},
    ops::Deref,
};
use thiserror::Error;

/// Width of every identifier in the keyspace, in bytes.
pub const ID_SIZE: usize = 64;

/// Errors returned when parsing a [RawId].
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid length: {0}")]
    InvalidLength(usize),
}

/// A fixed-width identifier.
///
/// Object ids, index ids and routing ids all share this flat namespace.
/// Ordering is lexicographic byte comparison.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct RawId([u8; ID_SIZE]);

impl RawId {
    pub const fn new(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
}

impl Codec for RawId {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }

    fn len_encoded(&self) -> usize {
        ID_SIZE
    }

    fn read(buf: &mut impl Buf) -> Result<Self, codec::Error> {
        codec::at_least(buf, ID_SIZE)?;
        let mut bytes = [0u8; ID_SIZE];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl From<[u8; ID_SIZE]> for RawId {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RawId {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; ID_SIZE] = bytes
            .try_into()
            .map_err(|_| Error::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for RawId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for RawId {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for RawId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for RawId {
    // Truncated to the leading bytes: full ids are 128 hex characters and
    // the prefix is what placement is decided on.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..")
    }
}
