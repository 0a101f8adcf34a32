//! Per-segment sets of dictionary ids, used to prune segments during search.
//!
//! ```text
//! BTreeMap<segment_id, HashSet<dictionary_id>>
//!   0 -> {0, 1, 4}
//!   1 -> {1, 2}
//!
//! may_contain(1, 4) -> false   (segment 1 never decompressed)
//! ```
//!
//! Stream body: `[segment_count: varint]` then per segment in ascending id
//! order `[segment_id: varint][n: varint][ids ascending: varint...]`,
//! wrapped in an `LVSI` frame.

use crate::dictionary::DictionaryKind;
use crate::error::{CoreError, CoreResult};
use bytes::Buf;
use logvault_codec::{decode_frame, encode_frame, varint, StreamCodec};
use std::collections::{BTreeMap, HashSet};

/// Frame magic of segment index streams.
pub const SEGMENT_INDEX_MAGIC: [u8; 4] = *b"LVSI";

/// Which dictionary ids each segment references.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    kind: DictionaryKind,
    segments: BTreeMap<u64, HashSet<u64>>,
}

impl SegmentIndex {
    /// Creates an empty index over `kind` ids.
    #[must_use]
    pub fn new(kind: DictionaryKind) -> Self {
        Self {
            kind,
            segments: BTreeMap::new(),
        }
    }

    /// The dictionary whose ids are indexed.
    #[must_use]
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    /// Marks that `segment_id` uses `dictionary_id`. Idempotent.
    pub fn record_reference(&mut self, segment_id: u64, dictionary_id: u64) {
        self.segments
            .entry(segment_id)
            .or_default()
            .insert(dictionary_id);
    }

    /// Ensures `segment_id` has an entry, even if it references nothing.
    pub fn register_segment(&mut self, segment_id: u64) {
        self.segments.entry(segment_id).or_default();
    }

    /// Ids used by `segment_id`, ascending. Empty for unknown segments.
    #[must_use]
    pub fn ids_used_by(&self, segment_id: u64) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .segments
            .get(&segment_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Whether `segment_id` possibly contains `dictionary_id`.
    #[must_use]
    pub fn may_contain(&self, segment_id: u64, dictionary_id: u64) -> bool {
        self.segments
            .get(&segment_id)
            .is_some_and(|set| set.contains(&dictionary_id))
    }

    /// Segments that reference `dictionary_id`, ascending.
    #[must_use]
    pub fn segments_containing(&self, dictionary_id: u64) -> Vec<u64> {
        self.segments
            .iter()
            .filter(|(_, ids)| ids.contains(&dictionary_id))
            .map(|(&segment_id, _)| segment_id)
            .collect()
    }

    /// Indexed segment ids, ascending.
    pub fn segment_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.segments.keys().copied()
    }

    /// Number of indexed segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Serializes the index.
    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        varint::put_uvarint(&mut buf, self.segments.len() as u64);
        for (&segment_id, ids) in &self.segments {
            let mut ids: Vec<u64> = ids.iter().copied().collect();
            ids.sort_unstable();
            varint::put_uvarint(&mut buf, segment_id);
            varint::put_uvarint(&mut buf, ids.len() as u64);
            for id in ids {
                varint::put_uvarint(&mut buf, id);
            }
        }
        buf
    }

    /// Parses a body produced by [`SegmentIndex::encode_body`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corruption`] if segment ids or dictionary ids
    /// are not strictly ascending, or bytes remain.
    pub fn decode_body(kind: DictionaryKind, body: &[u8]) -> CoreResult<Self> {
        let mut cursor = body;
        let segment_count = varint::get_len(&mut cursor)?;
        let mut index = Self::new(kind);
        let mut last_segment: Option<u64> = None;

        for _ in 0..segment_count {
            let segment_id = varint::get_uvarint(&mut cursor)?;
            if last_segment.is_some_and(|last| segment_id <= last) {
                return Err(CoreError::corruption(format!(
                    "{} segment index: segment {segment_id} out of order",
                    kind.name()
                )));
            }
            last_segment = Some(segment_id);

            let n = varint::get_len(&mut cursor)?;
            let mut ids = HashSet::with_capacity(n);
            let mut last_id: Option<u64> = None;
            for _ in 0..n {
                let id = varint::get_uvarint(&mut cursor)?;
                if last_id.is_some_and(|last| id <= last) {
                    return Err(CoreError::corruption(format!(
                        "{} segment index: ids of segment {segment_id} not ascending",
                        kind.name()
                    )));
                }
                last_id = Some(id);
                ids.insert(id);
            }
            index.segments.insert(segment_id, ids);
        }

        if cursor.has_remaining() {
            return Err(CoreError::corruption(format!(
                "{} segment index has trailing bytes",
                kind.name()
            )));
        }
        Ok(index)
    }

    /// Encodes the index as a framed stream.
    ///
    /// # Errors
    ///
    /// Propagates compressor failures.
    pub fn to_frame(&self, codec: &dyn StreamCodec) -> CoreResult<Vec<u8>> {
        Ok(encode_frame(SEGMENT_INDEX_MAGIC, codec, &self.encode_body())?)
    }

    /// Decodes a framed stream written by [`SegmentIndex::to_frame`].
    ///
    /// # Errors
    ///
    /// Returns checksum, codec or corruption errors.
    pub fn from_frame(kind: DictionaryKind, data: &[u8]) -> CoreResult<Self> {
        let body = decode_frame(SEGMENT_INDEX_MAGIC, data)?;
        Self::decode_body(kind, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_codec::PassthroughCodec;

    #[test]
    fn record_is_idempotent() {
        let mut index = SegmentIndex::new(DictionaryKind::Variable);
        index.record_reference(0, 5);
        index.record_reference(0, 5);
        index.record_reference(0, 2);
        assert_eq!(index.ids_used_by(0), vec![2, 5]);
        assert!(index.may_contain(0, 5));
        assert!(!index.may_contain(0, 3));
        assert!(!index.may_contain(1, 5));
        assert!(index.ids_used_by(9).is_empty());
    }

    #[test]
    fn pruning_lists_only_matching_segments() {
        let mut index = SegmentIndex::new(DictionaryKind::Logtype);
        index.record_reference(0, 1);
        index.record_reference(1, 2);
        index.record_reference(2, 1);
        assert_eq!(index.segments_containing(1), vec![0, 2]);
        assert_eq!(index.segments_containing(7), Vec::<u64>::new());
    }

    #[test]
    fn frame_roundtrip() {
        let mut index = SegmentIndex::new(DictionaryKind::Variable);
        index.record_reference(3, 10);
        index.record_reference(3, 1);
        index.record_reference(1, 4);
        index.register_segment(4);

        let frame = index.to_frame(&PassthroughCodec).unwrap();
        let decoded = SegmentIndex::from_frame(DictionaryKind::Variable, &frame).unwrap();
        assert_eq!(decoded.segment_ids().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(decoded.ids_used_by(3), vec![1, 10]);
        assert!(decoded.ids_used_by(4).is_empty());
    }

    #[test]
    fn unordered_ids_rejected() {
        let mut body = Vec::new();
        for value in [1, 0, 2, 7, 3] {
            varint::put_uvarint(&mut body, value);
        }
        let err = SegmentIndex::decode_body(DictionaryKind::Logtype, &body).unwrap_err();
        assert!(matches!(err, CoreError::Corruption { .. }));
    }
}
