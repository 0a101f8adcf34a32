//! The opaque stream compressor seam.

use crate::error::{CodecError, CodecResult};

/// Identifies the compressor used for a framed stream.
///
/// The discriminant is written into every frame header, so values are part
/// of the on-disk format and must never be renumbered.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecKind {
    /// Bytes are stored as-is.
    Passthrough = 0,
    /// Zstandard.
    #[default]
    Zstd = 1,
}

impl CodecKind {
    /// Returns the on-disk identifier.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Builds a codec instance; `level` is ignored by codecs without levels.
    #[must_use]
    pub fn build(self, level: i32) -> Box<dyn StreamCodec> {
        match self {
            Self::Passthrough => Box::new(PassthroughCodec),
            Self::Zstd => Box::new(ZstdCodec::new(level)),
        }
    }

    /// Short human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Passthrough => "none",
            Self::Zstd => "zstd",
        }
    }
}

impl TryFrom<u8> for CodecKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Passthrough),
            1 => Ok(Self::Zstd),
            other => Err(CodecError::UnknownCodec(other)),
        }
    }
}

/// A byte-stream compressor with an exact inverse.
pub trait StreamCodec: Send + Sync {
    /// Which codec this is.
    fn kind(&self) -> CodecKind;

    /// Compresses `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CompressionFailed`] if the compressor fails.
    fn compress(&self, raw: &[u8]) -> CodecResult<Vec<u8>>;

    /// Decompresses `compressed`; `raw_len` is the expected output size.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::DecompressionFailed`] on malformed input.
    fn decompress(&self, compressed: &[u8], raw_len: usize) -> CodecResult<Vec<u8>>;
}

/// Stores bytes without compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl StreamCodec for PassthroughCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Passthrough
    }

    fn compress(&self, raw: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8], _raw_len: usize) -> CodecResult<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

/// Zstandard at a fixed compression level.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Default compression level.
    pub const DEFAULT_LEVEL: i32 = 3;

    /// Creates a codec at `level`.
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }

    /// Returns the configured level.
    #[must_use]
    pub const fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl StreamCodec for ZstdCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Zstd
    }

    fn compress(&self, raw: &[u8]) -> CodecResult<Vec<u8>> {
        zstd::encode_all(raw, self.level).map_err(|e| CodecError::compression_failed(e.to_string()))
    }

    fn decompress(&self, compressed: &[u8], raw_len: usize) -> CodecResult<Vec<u8>> {
        let out = zstd::decode_all(compressed)
            .map_err(|e| CodecError::decompression_failed(e.to_string()))?;
        if out.len() != raw_len {
            return Err(CodecError::LengthMismatch {
                expected: raw_len as u64,
                actual: out.len() as u64,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_ids_are_stable() {
        assert_eq!(CodecKind::Passthrough.id(), 0);
        assert_eq!(CodecKind::Zstd.id(), 1);
        assert_eq!(CodecKind::try_from(1).unwrap(), CodecKind::Zstd);
        assert_eq!(CodecKind::try_from(9), Err(CodecError::UnknownCodec(9)));
    }

    #[test]
    fn zstd_shrinks_repetitive_input() {
        let codec = ZstdCodec::default();
        let raw = b"connected to 10.0.0.1 on port 8080\n".repeat(200);
        let compressed = codec.compress(&raw).unwrap();
        assert!(compressed.len() < raw.len());
        assert_eq!(codec.decompress(&compressed, raw.len()).unwrap(), raw);
    }

    #[test]
    fn zstd_rejects_garbage() {
        let codec = ZstdCodec::default();
        assert!(matches!(
            codec.decompress(b"not zstd at all", 10),
            Err(CodecError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn build_honours_kind() {
        assert_eq!(CodecKind::Zstd.build(5).kind(), CodecKind::Zstd);
        assert_eq!(CodecKind::Passthrough.build(5).kind(), CodecKind::Passthrough);
    }
}
