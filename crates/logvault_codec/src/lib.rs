//! # logvault codec
//!
//! Byte-level building blocks shared by every logvault stream:
//!
//! - [`StreamCodec`]: the opaque compressor seam ([`ZstdCodec`], [`PassthroughCodec`])
//! - [`encode_frame`] / [`decode_frame`]: the checksummed container that wraps
//!   each segment, dictionary and segment-index stream
//! - [`varint`]: LEB128 and zigzag encodings for column bodies
//!
//! ```
//! use logvault_codec::{decode_frame, encode_frame, ZstdCodec};
//!
//! let frame = encode_frame(*b"LVDC", &ZstdCodec::default(), b"body").unwrap();
//! assert_eq!(decode_frame(*b"LVDC", &frame).unwrap(), b"body");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod crc;
mod error;
mod frame;
pub mod varint;

pub use codec::{CodecKind, PassthroughCodec, StreamCodec, ZstdCodec};
pub use crc::compute_crc32;
pub use error::{CodecError, CodecResult};
pub use frame::{
    decode_frame, encode_frame, read_frame_header, FrameHeader, FRAME_HEADER_SIZE, FRAME_VERSION,
};
