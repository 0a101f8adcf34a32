//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while compressing, framing or decoding streams.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The compressor rejected its input.
    #[error("compression failed: {message}")]
    CompressionFailed {
        /// Description of the compressor error.
        message: String,
    },

    /// The decompressor rejected its input.
    #[error("decompression failed: {message}")]
    DecompressionFailed {
        /// Description of the decompressor error.
        message: String,
    },

    /// A frame did not start with the expected magic bytes.
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Magic the caller asked for.
        expected: [u8; 4],
        /// Magic found in the stream.
        found: [u8; 4],
    },

    /// Frame layout version is newer than this build understands.
    #[error("unsupported frame version {0}")]
    UnsupportedFrameVersion(u16),

    /// Unknown codec identifier in a frame header.
    #[error("unknown codec id {0}")]
    UnknownCodec(u8),

    /// Frame checksum mismatch.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },

    /// Decompressed payload length disagrees with the header.
    #[error("length mismatch: header says {expected} bytes, payload has {actual}")]
    LengthMismatch {
        /// Length recorded in the header.
        expected: u64,
        /// Length actually produced.
        actual: u64,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A varint ran past 64 bits.
    #[error("varint overflows 64 bits")]
    VarintOverflow,
}

impl CodecError {
    /// Create a compression failed error.
    pub fn compression_failed(message: impl Into<String>) -> Self {
        Self::CompressionFailed {
            message: message.into(),
        }
    }

    /// Create a decompression failed error.
    pub fn decompression_failed(message: impl Into<String>) -> Self {
        Self::DecompressionFailed {
            message: message.into(),
        }
    }
}
