//! Packed archive format version and the compatibility gate.
//!
//! A version packs into a `u32` as `major << 24 | minor << 16 | patch`:
//! patch takes the low 16 bits, minor the next 8 and major the top 8. The
//! packed value is the first field after the manifest magic.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use tracing::warn;

/// An archive format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
    /// Incompatible layout changes.
    pub major: u8,
    /// Backward-compatible additions.
    pub minor: u8,
    /// Fixes with no layout impact.
    pub patch: u16,
}

impl FormatVersion {
    /// The version this build writes.
    pub const CURRENT: Self = Self::new(0, 1, 0);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u8, minor: u8, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Packs into the on-disk `u32`.
    #[must_use]
    pub const fn pack(self) -> u32 {
        (self.major as u32) << 24 | (self.minor as u32) << 16 | self.patch as u32
    }

    /// Unpacks an on-disk `u32`.
    #[must_use]
    pub const fn unpack(packed: u32) -> Self {
        Self {
            major: (packed >> 24) as u8,
            minor: (packed >> 16) as u8,
            patch: packed as u16,
        }
    }

    /// Checks whether an archive written at `self` can be read by this build.
    ///
    /// A different major is refused. A newer minor or patch is read on a
    /// best-effort basis: fields this build does not know are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IncompatibleFormat`] on a major mismatch.
    pub fn check_readable(self) -> CoreResult<()> {
        let supported = Self::CURRENT;
        if self.major != supported.major {
            return Err(CoreError::IncompatibleFormat {
                found: self,
                supported,
            });
        }
        if self > supported {
            warn!(found = %self, %supported, "archive written by a newer format version");
        }
        Ok(())
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
