//! Framed, checksummed container for every archive stream.
//!
//! ```text
//! | magic (4) | frame_version (2) | codec (1) | raw_len (8) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers every byte before it. The
//! payload is the body compressed with the codec named in the header.

use crate::codec::{CodecKind, StreamCodec};
use crate::crc::compute_crc32;
use crate::error::{CodecError, CodecResult};
use bytes::{Buf, BufMut};

/// Current frame layout version.
pub const FRAME_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + codec (1) + raw_len (8).
pub const FRAME_HEADER_SIZE: usize = 15;

const CRC_SIZE: usize = 4;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Stream magic.
    pub magic: [u8; 4],
    /// Frame layout version.
    pub version: u16,
    /// Codec used for the payload.
    pub codec: CodecKind,
    /// Length of the body before compression.
    pub raw_len: u64,
}

/// Compresses `body` with `codec` and wraps it in a frame.
///
/// # Errors
///
/// Propagates compressor failures.
pub fn encode_frame(magic: [u8; 4], codec: &dyn StreamCodec, body: &[u8]) -> CodecResult<Vec<u8>> {
    let payload = codec.compress(body)?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + CRC_SIZE);
    buf.put_slice(&magic);
    buf.put_u16_le(FRAME_VERSION);
    buf.put_u8(codec.kind().id());
    buf.put_u64_le(body.len() as u64);
    buf.put_slice(&payload);
    let crc = compute_crc32(&buf);
    buf.put_u32_le(crc);
    Ok(buf)
}

/// Parses only the header, without verifying the checksum.
///
/// # Errors
///
/// Returns an error on short input, wrong magic, unknown codec or a newer
/// frame version.
pub fn read_frame_header(magic: [u8; 4], data: &[u8]) -> CodecResult<FrameHeader> {
    if data.len() < FRAME_HEADER_SIZE + CRC_SIZE {
        return Err(CodecError::UnexpectedEof);
    }
    let mut cursor = data;
    let mut found = [0u8; 4];
    cursor.copy_to_slice(&mut found);
    if found != magic {
        return Err(CodecError::BadMagic {
            expected: magic,
            found,
        });
    }
    let version = cursor.get_u16_le();
    if version > FRAME_VERSION {
        return Err(CodecError::UnsupportedFrameVersion(version));
    }
    let codec = CodecKind::try_from(cursor.get_u8())?;
    let raw_len = cursor.get_u64_le();
    Ok(FrameHeader {
        magic,
        version,
        codec,
        raw_len,
    })
}

/// Verifies and unwraps a frame, returning the decompressed body.
///
/// # Errors
///
/// Returns [`CodecError::ChecksumMismatch`] if the frame was altered, plus
/// any header or decompression error.
pub fn decode_frame(magic: [u8; 4], data: &[u8]) -> CodecResult<Vec<u8>> {
    let header = read_frame_header(magic, data)?;

    let body_end = data.len() - CRC_SIZE;
    let mut crc_bytes = &data[body_end..];
    let expected = crc_bytes.get_u32_le();
    let actual = compute_crc32(&data[..body_end]);
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }

    let raw_len = usize::try_from(header.raw_len).map_err(|_| CodecError::LengthMismatch {
        expected: header.raw_len,
        actual: 0,
    })?;
    let payload = &data[FRAME_HEADER_SIZE..body_end];
    let body = header.codec.build(0).decompress(payload, raw_len)?;
    if body.len() != raw_len {
        return Err(CodecError::LengthMismatch {
            expected: header.raw_len,
            actual: body.len() as u64,
        });
    }
    Ok(body)
}
