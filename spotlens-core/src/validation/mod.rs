//! Validation utilities for chunk headers and byte ranges
//!
//! Pure functions over header data with no I/O dependencies.

pub mod bounds;
pub mod format;
pub mod parsing;

pub use bounds::{validate_chunk_bounds, validate_pointer_table};
pub use format::validate_names;
pub use parsing::{format_range_header, parse_range};
