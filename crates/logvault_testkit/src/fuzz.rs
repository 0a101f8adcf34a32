//! Fuzz targets for the on-disk decoders.
//!
//! Each target accepts arbitrary bytes and must either decode them or
//! return an error. None may panic. The `*_body` targets wrap the input in
//! a valid frame first so the fuzzer reaches the body decoders instead of
//! stopping at the checksum.

use logvault_codec::{decode_frame, encode_frame, varint, PassthroughCodec};
use logvault_core::{
    parse_segment_list, ArchiveManifest, Dictionary, DictionaryKind, Segment, SegmentIndex,
    DICTIONARY_MAGIC, SEGMENT_INDEX_MAGIC, SEGMENT_MAGIC,
};
use logvault_catalog::TimestampPattern;

/// Fuzz target for the frame decoder.
pub fn fuzz_frame_decode(data: &[u8]) {
    let _ = decode_frame(SEGMENT_MAGIC, data);
}

/// Fuzz target for manifest decoding.
///
/// A manifest that decodes must re-encode to a decodable prefix of the input.
pub fn fuzz_manifest_decode(data: &[u8]) {
    if let Ok(manifest) = ArchiveManifest::decode(data) {
        let encoded = manifest.encode();
        let again = ArchiveManifest::decode(&encoded).expect("re-encoded manifest must decode");
        assert_eq!(manifest, again, "Manifest roundtrip mismatch");
    }
}

/// Fuzz target for segment bodies.
pub fn fuzz_segment_body(data: &[u8]) {
    let frame = wrap(SEGMENT_MAGIC, data);
    if let Ok(segment) = Segment::from_frame(0, &frame) {
        assert_eq!(segment.timestamps().len(), segment.logtype_ids().len());
        let again = Segment::decode_body(0, &segment.encode_body()).expect("re-encoded segment must decode");
        assert_eq!(again.timestamps(), segment.timestamps(), "Timestamp column mismatch");
        assert_eq!(again.variable_ids(), segment.variable_ids(), "Variable column mismatch");
    }
}

/// Fuzz target for dictionary bodies.
pub fn fuzz_dictionary_body(data: &[u8]) {
    for kind in [DictionaryKind::Logtype, DictionaryKind::Variable] {
        let frame = wrap(DICTIONARY_MAGIC, data);
        if let Ok(dictionary) = Dictionary::from_frame(kind, &frame) {
            for (id, value) in dictionary.iter() {
                assert_eq!(dictionary.get(value), Some(id), "Dictionary is not a bijection");
            }
        }
    }
}

/// Fuzz target for segment index bodies.
pub fn fuzz_segment_index_body(data: &[u8]) {
    let frame = wrap(SEGMENT_INDEX_MAGIC, data);
    if let Ok(index) = SegmentIndex::from_frame(DictionaryKind::Variable, &frame) {
        let again = SegmentIndex::decode_body(DictionaryKind::Variable, &index.encode_body())
            .expect("re-encoded index must decode");
        assert_eq!(again.segment_count(), index.segment_count(), "Segment count mismatch");
    }
}

/// Fuzz target for the segment list.
pub fn fuzz_segment_list(data: &[u8]) {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(ids) = parse_segment_list(text) {
            for (i, id) in ids.iter().enumerate() {
                assert_eq!(*id, i as u64);
            }
        }
    }
}

/// Fuzz target for the encoded timestamp pattern column.
pub fn fuzz_timestamp_patterns(data: &[u8]) {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = TimestampPattern::decode_list(text);
    }
}

/// Fuzz target for varint decoding.
pub fn fuzz_varint(data: &[u8]) {
    let mut cursor = data;
    while !cursor.is_empty() {
        if varint::get_uvarint(&mut cursor).is_err() {
            break;
        }
    }
}

fn wrap(magic: [u8; 4], body: &[u8]) -> Vec<u8> {
    encode_frame(magic, &PassthroughCodec, body).expect("passthrough never fails")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn frame_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            fuzz_frame_decode(&data);
        }

        #[test]
        fn manifest_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
            let mut framed = b"LVMF".to_vec();
            framed.extend_from_slice(&data);
            fuzz_manifest_decode(&framed);
        }

        #[test]
        fn bodies_never_panic(data in prop::collection::vec(any::<u8>(), 0..128)) {
            fuzz_segment_body(&data);
            fuzz_dictionary_body(&data);
            fuzz_segment_index_body(&data);
            fuzz_varint(&data);
        }

        #[test]
        fn text_decoders_never_panic(text in ".{0,64}") {
            fuzz_segment_list(text.as_bytes());
            fuzz_timestamp_patterns(text.as_bytes());
        }
    }

    #[test]
    fn empty_inputs() {
        fuzz_frame_decode(&[]);
        fuzz_manifest_decode(&[]);
        fuzz_segment_body(&[]);
        fuzz_dictionary_body(&[]);
        fuzz_segment_index_body(&[]);
        fuzz_segment_list(&[]);
        fuzz_varint(&[]);
    }
}
