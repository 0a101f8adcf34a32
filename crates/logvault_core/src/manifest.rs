//! Single-archive manifest (`metadata`).
//!
//! ```text
//! | magic "LVMF" (4) | packed version (u32) | id | begin (i64) | end (i64) |
//! | uncompressed_size (u64) | size (u64) | creator_id | creation_ix (u64) |
//! | segment_count (u64) | logtype_count (u64) | variable_count (u64) |   <- minor >= 1
//! ```
//!
//! Integers are little-endian; strings are a `u16` length then UTF-8 bytes.
//! The version is read and checked before any other field.

use crate::error::{CoreError, CoreResult};
use crate::version::FormatVersion;
use bytes::{Buf, BufMut};
use logvault_catalog::ArchiveRecord;

/// Magic bytes of the manifest.
pub const MANIFEST_MAGIC: [u8; 4] = *b"LVMF";

/// Minor version that introduced the count fields.
const COUNTS_MINOR: u8 = 1;

/// Counts added in format 0.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveCounts {
    /// Segments written.
    pub segments: u64,
    /// Logtype dictionary entries.
    pub logtypes: u64,
    /// Variable dictionary entries.
    pub variables: u64,
}

/// The archive manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    /// Format the archive was written with.
    pub version: FormatVersion,
    /// Archive id.
    pub id: String,
    /// Earliest message timestamp, 0 for an empty archive.
    pub begin_timestamp: i64,
    /// Latest message timestamp, 0 for an empty archive.
    pub end_timestamp: i64,
    /// Bytes of the original messages.
    pub uncompressed_size: u64,
    /// Bytes of every stream on disk, the manifest included.
    pub size: u64,
    /// Writer id.
    pub creator_id: String,
    /// Position among the creator's archives.
    pub creation_ix: u64,
    /// Absent in archives older than format 0.1.
    pub counts: Option<ArchiveCounts>,
}

impl ArchiveManifest {
    /// Encodes the manifest. Count fields are written only if `version`
    /// carries them.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.put_slice(&MANIFEST_MAGIC);
        buf.put_u32_le(self.version.pack());
        put_str(&mut buf, &self.id);
        buf.put_i64_le(self.begin_timestamp);
        buf.put_i64_le(self.end_timestamp);
        buf.put_u64_le(self.uncompressed_size);
        buf.put_u64_le(self.size);
        put_str(&mut buf, &self.creator_id);
        buf.put_u64_le(self.creation_ix);
        if self.version.minor >= COUNTS_MINOR {
            let counts = self.counts.unwrap_or_default();
            buf.put_u64_le(counts.segments);
            buf.put_u64_le(counts.logtypes);
            buf.put_u64_le(counts.variables);
        }
        buf
    }

    /// Size of [`ArchiveManifest::encode`]'s output; independent of numeric
    /// field values.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let counts = if self.version.minor >= COUNTS_MINOR {
            24
        } else {
            0
        };
        4 + 4 + (2 + str_len(&self.id)) + 8 * 4 + (2 + str_len(&self.creator_id)) + 8 + counts
    }

    /// Reads only the magic and version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corruption`] on a bad magic or short input.
    pub fn peek_version(data: &[u8]) -> CoreResult<FormatVersion> {
        let mut cursor = data;
        need(&cursor, 8)?;
        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if magic != MANIFEST_MAGIC {
            return Err(CoreError::corruption(format!(
                "bad manifest magic {magic:?}"
            )));
        }
        Ok(FormatVersion::unpack(cursor.get_u32_le()))
    }

    /// Decodes a manifest, gating on its version first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IncompatibleFormat`] on a major mismatch and
    /// [`CoreError::Corruption`] on malformed input.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let version = Self::peek_version(data)?;
        version.check_readable()?;

        let mut cursor = &data[8..];
        let id = get_str(&mut cursor)?;
        need(&cursor, 32)?;
        let begin_timestamp = cursor.get_i64_le();
        let end_timestamp = cursor.get_i64_le();
        let uncompressed_size = cursor.get_u64_le();
        let size = cursor.get_u64_le();
        let creator_id = get_str(&mut cursor)?;
        need(&cursor, 8)?;
        let creation_ix = cursor.get_u64_le();

        let counts = if version.minor >= COUNTS_MINOR {
            need(&cursor, 24)?;
            Some(ArchiveCounts {
                segments: cursor.get_u64_le(),
                logtypes: cursor.get_u64_le(),
                variables: cursor.get_u64_le(),
            })
        } else {
            None
        };
        // Newer minors may append fields; they are ignored.

        if begin_timestamp > end_timestamp {
            return Err(CoreError::corruption(format!(
                "manifest begin {begin_timestamp} is after end {end_timestamp}"
            )));
        }

        Ok(Self {
            version,
            id,
            begin_timestamp,
            end_timestamp,
            uncompressed_size,
            size,
            creator_id,
            creation_ix,
            counts,
        })
    }

    /// The catalog row describing this archive.
    #[must_use]
    pub fn to_record(&self) -> ArchiveRecord {
        ArchiveRecord {
            id: self.id.clone(),
            begin_timestamp: self.begin_timestamp,
            end_timestamp: self.end_timestamp,
            uncompressed_size: self.uncompressed_size,
            size: self.size,
            creator_id: self.creator_id.clone(),
            creation_ix: self.creation_ix,
        }
    }
}

fn str_len(value: &str) -> usize {
    value.len().min(usize::from(u16::MAX))
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    let len = str_len(value);
    buf.put_u16_le(len as u16);
    buf.put_slice(&value.as_bytes()[..len]);
}

fn get_str(cursor: &mut &[u8]) -> CoreResult<String> {
    need(cursor, 2)?;
    let len = usize::from(cursor.get_u16_le());
    need(cursor, len)?;
    let value = std::str::from_utf8(&cursor[..len])
        .map_err(|_| CoreError::corruption("manifest string is not UTF-8"))?
        .to_string();
    cursor.advance(len);
    Ok(value)
}

fn need(cursor: &[u8], len: usize) -> CoreResult<()> {
    if cursor.len() < len {
        return Err(CoreError::corruption("manifest too short"));
    }
    Ok(())
}
