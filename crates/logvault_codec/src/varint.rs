//! LEB128 varints and zigzag encoding for column bodies.
//!
//! Dictionary ids and counts are unsigned varints. Timestamps are stored as
//! zigzag-encoded deltas, so runs of close timestamps cost one or two bytes.

use crate::error::{CodecError, CodecResult};
use bytes::{Buf, BufMut};

/// Maps a signed integer onto an unsigned one (0, -1, 1, -2 ... -> 0, 1, 2, 3 ...).
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[must_use]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Writes an unsigned varint.
pub fn put_uvarint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Reads an unsigned varint.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] on truncated input and
/// [`CodecError::VarintOverflow`] if the value does not fit in 64 bits.
pub fn get_uvarint(buf: &mut impl Buf) -> CodecResult<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;

    loop {
        if !buf.has_remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = buf.get_u8();
        if shift == 63 && byte > 1 {
            return Err(CodecError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(CodecError::VarintOverflow);
        }
    }
}

/// Writes a signed varint (zigzag).
pub fn put_ivarint(buf: &mut impl BufMut, value: i64) {
    put_uvarint(buf, zigzag_encode(value));
}

/// Reads a signed varint (zigzag).
///
/// # Errors
///
/// Same as [`get_uvarint`].
pub fn get_ivarint(buf: &mut impl Buf) -> CodecResult<i64> {
    get_uvarint(buf).map(zigzag_decode)
}

/// Writes `bytes` preceded by its varint length.
pub fn put_len_prefixed(buf: &mut impl BufMut, bytes: &[u8]) {
    put_uvarint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

/// Reads a varint length followed by that many bytes.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if fewer bytes remain than declared.
pub fn get_len_prefixed(buf: &mut impl Buf) -> CodecResult<Vec<u8>> {
    let len = get_len(buf)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Reads a varint count and checks that at least that many bytes remain.
///
/// Used before allocating, so a corrupt length cannot trigger a huge
/// allocation.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if the count exceeds the remaining input.
pub fn get_len(buf: &mut impl Buf) -> CodecResult<usize> {
    let len = get_uvarint(buf)?;
    let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
    if len > buf.remaining() {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zigzag_small_values() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_decode(3), -2);
    }

    #[test]
    fn small_values_take_one_byte() {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, 127);
        assert_eq!(buf.len(), 1);
        put_uvarint(&mut buf, 128);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn extremes() {
        for value in [i64::MIN, i64::MAX, 0, -1] {
            let mut buf = Vec::new();
            put_ivarint(&mut buf, value);
            assert_eq!(get_ivarint(&mut buf.as_slice()).unwrap(), value);
        }
        let mut buf = Vec::new();
        put_uvarint(&mut buf, u64::MAX);
        assert_eq!(buf.len(), 10);
        assert_eq!(get_uvarint(&mut buf.as_slice()).unwrap(), u64::MAX);
    }

    #[test]
    fn truncated_varint() {
        let mut input: &[u8] = &[0x80, 0x80];
        assert_eq!(get_uvarint(&mut input), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn overlong_varint() {
        let mut input: &[u8] = &[0xFF; 11];
        assert_eq!(get_uvarint(&mut input), Err(CodecError::VarintOverflow));
    }

    #[test]
    fn len_prefix_larger_than_input() {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, 1_000_000);
        buf.extend_from_slice(b"abc");
        assert_eq!(
            get_len_prefixed(&mut buf.as_slice()),
            Err(CodecError::UnexpectedEof)
        );
    }

    proptest! {
        #[test]
        fn sequence_decodes_in_order(values in prop::collection::vec(any::<i64>(), 0..64)) {
            let mut buf = Vec::new();
            for &v in &values {
                put_ivarint(&mut buf, v);
            }
            let mut cursor = buf.as_slice();
            for &v in &values {
                prop_assert_eq!(get_ivarint(&mut cursor).unwrap(), v);
            }
            prop_assert!(cursor.is_empty());
        }
    }
}
