//! Append-only dictionaries mapping logtypes and variable values to dense ids.
//!
//! Ids are assigned in first-seen order starting at 0 and are never reused
//! or renumbered, so ids baked into flushed segments stay valid for the
//! archive's lifetime.
//!
//! Stream body: `[count: varint][len: varint, utf8_bytes...]*` in id order,
//! wrapped in an `LVDC` frame.

use crate::error::{CoreError, CoreResult};
use crate::record::VARIABLE_PLACEHOLDER;
use bytes::Buf;
use logvault_codec::{decode_frame, encode_frame, varint, StreamCodec};
use std::collections::HashMap;
use std::sync::Arc;

/// Frame magic of dictionary streams.
pub const DICTIONARY_MAGIC: [u8; 4] = *b"LVDC";

/// Which of the two per-archive dictionaries this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryKind {
    /// Templates with placeholders where variables were excised.
    Logtype,
    /// Verbatim variable values.
    Variable,
}

impl DictionaryKind {
    /// Short name used in errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logtype => "logtype",
            Self::Variable => "variable",
        }
    }

    fn check_value(self, value: &str) -> CoreResult<()> {
        match self {
            Self::Logtype => Ok(()),
            Self::Variable if value.is_empty() => {
                Err(CoreError::encoding_failure("empty variable value"))
            }
            Self::Variable if value.contains(VARIABLE_PLACEHOLDER) => Err(
                CoreError::encoding_failure("variable value contains the placeholder byte"),
            ),
            Self::Variable => Ok(()),
        }
    }
}

/// A bijection between values and dense ids.
///
/// Values live once in an arena indexed by id; the reverse map shares the
/// same allocation.
#[derive(Debug, Clone)]
pub struct Dictionary {
    kind: DictionaryKind,
    entries: Vec<Arc<str>>,
    ids: HashMap<Arc<str>, u64>,
}

impl Dictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new(kind: DictionaryKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            ids: HashMap::new(),
        }
    }

    /// Which dictionary this is.
    #[must_use]
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    /// Returns the id of `value`, assigning the next id if it is new.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EncodingFailure`] if `value` is not a valid
    /// canonical value for this dictionary.
    pub fn lookup_or_insert(&mut self, value: &str) -> CoreResult<u64> {
        if let Some(&id) = self.ids.get(value) {
            return Ok(id);
        }
        self.kind.check_value(value)?;
        let id = self.entries.len() as u64;
        let value: Arc<str> = Arc::from(value);
        self.entries.push(Arc::clone(&value));
        self.ids.insert(value, id);
        Ok(id)
    }

    /// Returns the id of `value` without inserting it.
    #[must_use]
    pub fn get(&self, value: &str) -> Option<u64> {
        self.ids.get(value).copied()
    }

    /// Returns the value with id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownId`] if `id` was never assigned.
    pub fn resolve(&self, id: u64) -> CoreResult<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|ix| self.entries.get(ix))
            .map(AsRef::as_ref)
            .ok_or_else(|| CoreError::unknown_id(self.kind.name(), id))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(id, value)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(ix, value)| (ix as u64, value.as_ref()))
    }

    /// Serializes every entry in id order.
    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        varint::put_uvarint(&mut buf, self.entries.len() as u64);
        for value in &self.entries {
            varint::put_len_prefixed(&mut buf, value.as_bytes());
        }
        buf
    }

    /// Parses a body produced by [`Dictionary::encode_body`].
    ///
    /// # Errors
    ///
    /// Returns a codec error on truncated input, and
    /// [`CoreError::Corruption`] on invalid UTF-8, a duplicate value or
    /// trailing bytes.
    pub fn decode_body(kind: DictionaryKind, body: &[u8]) -> CoreResult<Self> {
        let mut cursor = body;
        let count = varint::get_len(&mut cursor)?;
        let mut dictionary = Self::new(kind);
        dictionary.entries.reserve(count);
        for ix in 0..count {
            let bytes = varint::get_len_prefixed(&mut cursor)?;
            let value = String::from_utf8(bytes).map_err(|_| {
                CoreError::corruption(format!("{} entry {ix} is not UTF-8", kind.name()))
            })?;
            let value: Arc<str> = Arc::from(value);
            if dictionary.ids.insert(Arc::clone(&value), ix as u64).is_some() {
                return Err(CoreError::corruption(format!(
                    "{} entry {ix} duplicates an earlier entry",
                    kind.name()
                )));
            }
            dictionary.entries.push(value);
        }
        if cursor.has_remaining() {
            return Err(CoreError::corruption(format!(
                "{} dictionary has {} trailing bytes",
                kind.name(),
                cursor.remaining()
            )));
        }
        Ok(dictionary)
    }

    /// Encodes the dictionary as a framed stream.
    ///
    /// # Errors
    ///
    /// Propagates compressor failures.
    pub fn to_frame(&self, codec: &dyn StreamCodec) -> CoreResult<Vec<u8>> {
        Ok(encode_frame(DICTIONARY_MAGIC, codec, &self.encode_body())?)
    }

    /// Decodes a framed stream written by [`Dictionary::to_frame`].
    ///
    /// # Errors
    ///
    /// Returns checksum, codec or corruption errors.
    pub fn from_frame(kind: DictionaryKind, data: &[u8]) -> CoreResult<Self> {
        let body = decode_frame(DICTIONARY_MAGIC, data)?;
        Self::decode_body(kind, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use logvault_codec::ZstdCodec;
    use proptest::prelude::*;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut dict = Dictionary::new(DictionaryKind::Variable);
        assert_eq!(dict.lookup_or_insert("alpha").unwrap(), 0);
        assert_eq!(dict.lookup_or_insert("beta").unwrap(), 1);
        assert_eq!(dict.lookup_or_insert("alpha").unwrap(), 0);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("beta"), Some(1));
        assert_eq!(dict.get("gamma"), None);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn resolve_unknown_id() {
        let dict = Dictionary::new(DictionaryKind::Logtype);
        let err = dict.resolve(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownId);
        assert_eq!(err.to_string(), "unknown logtype id 0");
    }

    #[test]
    fn variable_canonicalization() {
        let mut dict = Dictionary::new(DictionaryKind::Variable);
        assert!(dict.lookup_or_insert("").unwrap_err().is_recoverable());
        assert!(dict.lookup_or_insert("a\u{11}").is_err());
        assert!(dict.is_empty());

        let mut logtypes = Dictionary::new(DictionaryKind::Logtype);
        assert_eq!(logtypes.lookup_or_insert("took \u{11} ms").unwrap(), 0);
    }

    #[test]
    fn frame_roundtrip_preserves_ids() {
        let mut dict = Dictionary::new(DictionaryKind::Logtype);
        for value in ["connected to \u{11}", "closed", "retry \u{11} of \u{11}"] {
            dict.lookup_or_insert(value).unwrap();
        }
        let frame = dict.to_frame(&ZstdCodec::default()).unwrap();
        let decoded = Dictionary::from_frame(DictionaryKind::Logtype, &frame).unwrap();
        assert_eq!(
            decoded.iter().collect::<Vec<_>>(),
            dict.iter().collect::<Vec<_>>()
        );
        assert_eq!(decoded.get("closed"), Some(1));
    }

    #[test]
    fn duplicate_entries_rejected_on_decode() {
        let mut body = Vec::new();
        varint::put_uvarint(&mut body, 2);
        varint::put_len_prefixed(&mut body, b"x");
        varint::put_len_prefixed(&mut body, b"x");
        let err = Dictionary::decode_body(DictionaryKind::Variable, &body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut body = Dictionary::new(DictionaryKind::Variable).encode_body();
        body.push(0);
        assert!(Dictionary::decode_body(DictionaryKind::Variable, &body).is_err());
    }

    proptest! {
        #[test]
        fn resolve_inverts_lookup(values in prop::collection::vec("[a-z0-9.]{1,12}", 0..64)) {
            let mut dict = Dictionary::new(DictionaryKind::Variable);
            for value in &values {
                let id = dict.lookup_or_insert(value).unwrap();
                prop_assert_eq!(dict.resolve(id).unwrap(), value.as_str());
                prop_assert_eq!(dict.lookup_or_insert(value).unwrap(), id);
            }
            let distinct: std::collections::HashSet<_> = values.iter().collect();
            prop_assert_eq!(dict.len(), distinct.len());
        }
    }
}
