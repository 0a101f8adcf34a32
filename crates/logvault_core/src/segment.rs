//! Segments: three aligned columns for a contiguous run of messages.
//!
//! Message `i` of a segment has `timestamps[i]` and `logtype_ids[i]`. The
//! variable column is a flat concatenation; how many ids belong to each
//! message follows from its logtype's placeholder count.
//!
//! Stream body:
//!
//! ```text
//! | msg_count | var_count | ts deltas (zigzag) ... | logtype ids ... | variable ids ... |
//! ```
//!
//! All fields are varints; the body is wrapped in an `LVSG` frame.

use crate::error::{CoreError, CoreResult};
use bytes::Buf;
use logvault_codec::{decode_frame, encode_frame, varint, StreamCodec};

/// Frame magic of segment streams.
pub const SEGMENT_MAGIC: [u8; 4] = *b"LVSG";

/// Logical bytes per column entry, used for rollover accounting.
pub const ENTRY_SIZE: u64 = 8;

/// Column offsets at which a file's data begins inside a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnPositions {
    /// Offset into the timestamp column.
    pub timestamps: u64,
    /// Offset into the logtype column.
    pub logtypes: u64,
    /// Offset into the variable column.
    pub variables: u64,
}

/// An in-memory segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    id: u64,
    timestamps: Vec<i64>,
    logtype_ids: Vec<u64>,
    variable_ids: Vec<u64>,
}

impl Segment {
    /// Creates an empty segment.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Segment id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Appends one encoded message.
    pub fn push_message(&mut self, timestamp: i64, logtype_id: u64, variable_ids: &[u64]) {
        self.timestamps.push(timestamp);
        self.logtype_ids.push(logtype_id);
        self.variable_ids.extend_from_slice(variable_ids);
    }

    /// Where the next appended message will land.
    #[must_use]
    pub fn positions(&self) -> ColumnPositions {
        ColumnPositions {
            timestamps: self.timestamps.len() as u64,
            logtypes: self.logtype_ids.len() as u64,
            variables: self.variable_ids.len() as u64,
        }
    }

    /// Number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns whether the segment holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Uncompressed size of the three columns.
    #[must_use]
    pub fn uncompressed_size(&self) -> u64 {
        let entries = self.timestamps.len() + self.logtype_ids.len() + self.variable_ids.len();
        entries as u64 * ENTRY_SIZE
    }

    /// Timestamp column.
    #[must_use]
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Logtype id column.
    #[must_use]
    pub fn logtype_ids(&self) -> &[u64] {
        &self.logtype_ids
    }

    /// Variable id column.
    #[must_use]
    pub fn variable_ids(&self) -> &[u64] {
        &self.variable_ids
    }

    /// Serializes the columns.
    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.uncompressed_size() as usize / 4);
        varint::put_uvarint(&mut buf, self.timestamps.len() as u64);
        varint::put_uvarint(&mut buf, self.variable_ids.len() as u64);
        let mut previous = 0i64;
        for &ts in &self.timestamps {
            varint::put_ivarint(&mut buf, ts.wrapping_sub(previous));
            previous = ts;
        }
        for &id in &self.logtype_ids {
            varint::put_uvarint(&mut buf, id);
        }
        for &id in &self.variable_ids {
            varint::put_uvarint(&mut buf, id);
        }
        buf
    }

    /// Parses a body produced by [`Segment::encode_body`].
    ///
    /// # Errors
    ///
    /// Returns a codec error on truncated input and
    /// [`CoreError::Corruption`] on trailing bytes.
    pub fn decode_body(id: u64, body: &[u8]) -> CoreResult<Self> {
        let mut cursor = body;
        let msg_count = varint::get_len(&mut cursor)?;
        let var_count = varint::get_len(&mut cursor)?;

        let mut timestamps = Vec::with_capacity(msg_count);
        let mut previous = 0i64;
        for _ in 0..msg_count {
            previous = previous.wrapping_add(varint::get_ivarint(&mut cursor)?);
            timestamps.push(previous);
        }
        let logtype_ids = (0..msg_count)
            .map(|_| varint::get_uvarint(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;
        let variable_ids = (0..var_count)
            .map(|_| varint::get_uvarint(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;

        if cursor.has_remaining() {
            return Err(CoreError::corruption(format!(
                "segment {id} has {} trailing bytes",
                cursor.remaining()
            )));
        }
        Ok(Self {
            id,
            timestamps,
            logtype_ids,
            variable_ids,
        })
    }

    /// Encodes the segment as a framed stream.
    ///
    /// # Errors
    ///
    /// Propagates compressor failures.
    pub fn to_frame(&self, codec: &dyn StreamCodec) -> CoreResult<Vec<u8>> {
        Ok(encode_frame(SEGMENT_MAGIC, codec, &self.encode_body())?)
    }

    /// Decodes a framed stream written by [`Segment::to_frame`].
    ///
    /// # Errors
    ///
    /// Returns checksum, codec or corruption errors.
    pub fn from_frame(id: u64, data: &[u8]) -> CoreResult<Self> {
        let body = decode_frame(SEGMENT_MAGIC, data)?;
        Self::decode_body(id, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_codec::ZstdCodec;

    fn sample() -> Segment {
        let mut segment = Segment::new(3);
        segment.push_message(1_700_000_000_000, 0, &[0, 1]);
        segment.push_message(1_699_999_999_000, 1, &[]);
        segment.push_message(i64::MIN, 0, &[2, 1]);
        segment
    }

    #[test]
    fn positions_advance() {
        let mut segment = Segment::new(0);
        assert_eq!(segment.positions(), ColumnPositions::default());
        segment.push_message(10, 4, &[1, 2, 3]);
        assert_eq!(
            segment.positions(),
            ColumnPositions {
                timestamps: 1,
                logtypes: 1,
                variables: 3
            }
        );
        assert_eq!(segment.uncompressed_size(), 5 * ENTRY_SIZE);
    }

    #[test]
    fn frame_roundtrip() {
        let segment = sample();
        let frame = segment.to_frame(&ZstdCodec::default()).unwrap();
        let decoded = Segment::from_frame(3, &frame).unwrap();
        assert_eq!(decoded, segment);
    }

    #[test]
    fn corrupted_frame_detected() {
        let mut frame = sample().to_frame(&ZstdCodec::default()).unwrap();
        let mid = frame.len() / 2;
        frame[mid] ^= 0xFF;
        let err = Segment::from_frame(3, &frame).unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn truncated_body_rejected() {
        let body = sample().encode_body();
        assert!(Segment::decode_body(3, &body[..body.len() - 1]).is_err());
    }
}
