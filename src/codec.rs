//! Binary encoding for wire records and stored tables.
//!
//! All integers are encoded as fixed-width big-endian values and variable
//! payloads carry a `u32` length prefix, so the byte sequence for a given
//! logical value is canonical. Both update drivers compare a freshly packed
//! table against the stored blob to decide whether a write is needed, which
//! only works if re-encoding the same logical table always yields the same
//! bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;
use thiserror::Error;

/// Errors that can occur when encoding or decoding.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("end of buffer")]
    EndOfBuffer,
    #[error("extra data: {0} bytes")]
    ExtraData(usize),
    #[error("invalid {0}: {1}")]
    Invalid(&'static str, &'static str),
}

/// Types that can be encoded to and decoded from bytes.
pub trait Codec: Sized {
    /// Writes this value to a buffer.
    fn write(&self, buf: &mut impl BufMut);

    /// Returns the encoded length of this value.
    fn len_encoded(&self) -> usize;

    /// Reads a value from a buffer, leaving any trailing data in place.
    fn read(buf: &mut impl Buf) -> Result<Self, Error>;

    /// Encodes this value to a freshly allocated buffer.
    fn encode(&self) -> Bytes {
        let len = self.len_encoded();
        let mut buf = BytesMut::with_capacity(len);
        self.write(&mut buf);
        debug_assert_eq!(buf.len(), len);
        buf.freeze()
    }

    /// Decodes a value from a buffer, rejecting trailing data.
    fn decode(mut buf: impl Buf) -> Result<Self, Error> {
        let result = Self::read(&mut buf)?;
        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }
        Ok(result)
    }
}

/// Returns an error if the buffer holds fewer than `len` remaining bytes.
#[inline]
pub fn at_least(buf: &mut impl Buf, len: usize) -> Result<(), Error> {
    if buf.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    Ok(())
}

macro_rules! impl_int {
    ($type:ty, $put:ident, $get:ident) => {
        impl Codec for $type {
            fn write(&self, buf: &mut impl BufMut) {
                buf.$put(*self);
            }

            fn len_encoded(&self) -> usize {
                size_of::<$type>()
            }

            fn read(buf: &mut impl Buf) -> Result<Self, Error> {
                at_least(buf, size_of::<$type>())?;
                Ok(buf.$get())
            }
        }
    };
}

impl_int!(u8, put_u8, get_u8);
impl_int!(u32, put_u32, get_u32);
impl_int!(u64, put_u64, get_u64);
impl_int!(i32, put_i32, get_i32);

// Length-prefixed opaque payloads. The length is validated against the bytes
// actually remaining before any allocation, so a corrupt prefix cannot cause
// an oversized allocation.
impl Codec for Bytes {
    fn write(&self, buf: &mut impl BufMut) {
        (self.len() as u32).write(buf);
        buf.put_slice(self);
    }

    fn len_encoded(&self) -> usize {
        size_of::<u32>() + self.len()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = u32::read(buf)? as usize;
        at_least(buf, len)?;
        Ok(buf.copy_to_bytes(len))
    }
}

// Count-prefixed sequences.
impl<T: Codec> Codec for Vec<T> {
    fn write(&self, buf: &mut impl BufMut) {
        (self.len() as u32).write(buf);
        for item in self {
            item.write(buf);
        }
    }

    fn len_encoded(&self) -> usize {
        size_of::<u32>() + self.iter().map(Codec::len_encoded).sum::<usize>()
    }

    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let count = u32::read(buf)? as usize;
        let mut items = Vec::with_capacity(count.min(buf.remaining()));
        for _ in 0..count {
            items.push(T::read(buf)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        let encoded = 0xdead_beefu32.encode();
        assert_eq!(encoded.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(u32::decode(encoded).unwrap(), 0xdead_beef);

        let encoded = (-22i32).encode();
        assert_eq!(i32::decode(encoded).unwrap(), -22);
    }

    #[test]
    fn test_end_of_buffer() {
        let mut short = Bytes::from_static(&[0x01, 0x02]);
        assert!(matches!(u32::read(&mut short), Err(Error::EndOfBuffer)));
    }

    #[test]
    fn test_extra_data() {
        let encoded = Bytes::from_static(&[0x01, 0x02]);
        assert!(matches!(u8::decode(encoded), Err(Error::ExtraData(1))));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let payload = Bytes::from_static(b"payload");
        let decoded = Bytes::decode(payload.encode()).unwrap();
        assert_eq!(decoded, payload);

        let empty = Bytes::new();
        assert_eq!(Bytes::decode(empty.encode()).unwrap(), empty);
    }

    #[test]
    fn test_bytes_length_overrun() {
        // Claims 16 bytes but carries 2.
        let mut buf = BytesMut::new();
        buf.put_u32(16);
        buf.put_slice(b"ab");
        assert!(matches!(
            Bytes::decode(buf.freeze()),
            Err(Error::EndOfBuffer)
        ));
    }

    #[test]
    fn test_vec_roundtrip() {
        let items: Vec<u32> = vec![1, 2, 3];
        assert_eq!(Vec::<u32>::decode(items.encode()).unwrap(), items);
        assert_eq!(items.len_encoded(), 4 + 3 * 4);
    }
}
