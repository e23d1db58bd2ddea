//! Byte range string handling
//!
//! Half-open ranges are used everywhere in this crate; HTTP `Range` headers
//! use inclusive ends, so conversion happens only here.

use alloc::format;
use alloc::string::String;
use core::ops::Range;

use crate::{FormatError, Result};

/// Render `start..end` as an HTTP range header value, `bytes=start-(end-1)`
pub fn format_range_header(range: &Range<u64>) -> Result<String> {
    if range.is_empty() {
        return Err(FormatError::InvalidRange);
    }
    Ok(format!("bytes={}-{}", range.start, range.end - 1))
}

/// Parse a range string in the format "start:end" or "start-end"
///
/// Returns a half-open range; `start` may equal `end`.
pub fn parse_range(range_str: &str) -> Result<Range<u64>> {
    let (start_str, end_str) = range_str
        .split_once(':')
        .or_else(|| range_str.split_once('-'))
        .ok_or(FormatError::InvalidRange)?;

    let start = parse_offset(start_str)?;
    let end = parse_offset(end_str)?;

    if start > end {
        return Err(FormatError::InvalidRange);
    }

    Ok(start..end)
}

fn parse_offset(s: &str) -> Result<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::InvalidRange);
    }
    s.parse().map_err(|_| FormatError::InvalidRange)
}
