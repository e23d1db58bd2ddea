#![no_std]

//! spotlens core - chunked feature format definitions
//!
//! Header layout, selector resolution and sparse densification for chunked
//! feature sources. Everything here is pure; fetching, decompression and
//! caching live in the `spotlens` crate.

extern crate alloc;

pub mod error;
pub mod format;
pub mod names;
pub mod selector;
pub mod sparse;
pub mod validation;

pub use error::*;
pub use format::constants;
pub use format::{ChunkHeader, DataType, SparseMode};
pub use names::NameIndex;
pub use selector::{Selector, SENTINEL_INDEX};
pub use sparse::{densify, densify_array, densify_record, Densified, SparseEntry, SparseRows};
pub use validation::{format_range_header, parse_range};
