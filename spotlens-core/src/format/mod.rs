//! Wire format definitions for chunked feature sources
//!
//! Pure data structure definitions for the header JSON and the payload
//! conventions. No I/O lives here.

pub mod constants;
pub mod header;

pub use header::{ChunkHeader, DataType, SparseMode};
