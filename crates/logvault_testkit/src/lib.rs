//! # logvault testkit
//!
//! Test utilities for logvault.
//!
//! This crate provides:
//! - Archive fixtures backed by temporary directories
//! - Property-based generators for parsed records
//! - A harness that tracks ingested input and checks decoded output
//! - Fuzz targets for every on-disk decoder
//! - Concurrent writer stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logvault_testkit::prelude::*;
//!
//! #[test]
//! fn decodes_what_was_written() {
//!     let archive = sample_archive();
//!     let reader = archive.reader();
//!     assert_eq!(reader.files().len(), 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
