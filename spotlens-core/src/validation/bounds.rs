//! Pointer table and chunk bounds validation
//!
//! Headers are checked once at hydration; retrievals trust the table.

use crate::{FormatError, Result};

/// Validate a pointer table for `length` features
///
/// The table must hold `length + 1` offsets and never decrease.
pub fn validate_pointer_table(ptr: &[u64], length: usize) -> Result<()> {
    let expected = length
        .checked_add(1)
        .ok_or(FormatError::PointerTableLength {
            expected: usize::MAX,
            found: ptr.len(),
        })?;

    if ptr.len() != expected {
        return Err(FormatError::PointerTableLength {
            expected,
            found: ptr.len(),
        });
    }

    if let Some(index) = ptr.windows(2).position(|pair| pair[1] < pair[0]) {
        return Err(FormatError::PointerNotMonotonic { index: index + 1 });
    }

    Ok(())
}

/// Validate that a chunk interval lies within a blob of `total_size` bytes
pub const fn validate_chunk_bounds(start: u64, end: u64, total_size: u64) -> Result<()> {
    if start > end || end > total_size {
        return Err(FormatError::InvalidRange);
    }
    Ok(())
}
