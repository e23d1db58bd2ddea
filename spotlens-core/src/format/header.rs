//! Chunk header format definitions
//!
//! A chunked source is a single blob of concatenated gzip members, one per
//! feature, plus this header. `ptr[i]..ptr[i + 1]` is the byte interval of
//! feature `i`; an empty interval means the feature is all zero.

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use core::str::FromStr;

use crate::validation::{validate_names, validate_pointer_table};
use crate::{FormatError, Result};

/// How a chunk's sparse rows are densified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SparseMode {
    /// Map keyed by name, holding only the entries present in the chunk
    Record,
    /// Zero-filled vector of `length` values
    Array,
}

impl core::fmt::Display for SparseMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SparseMode::Record => write!(f, "record"),
            SparseMode::Array => write!(f, "array"),
        }
    }
}

/// Semantic type of a feature's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataType {
    /// Labels; the numeric domain is a placeholder
    Categorical,
    /// Magnitudes
    #[default]
    Quantitative,
    /// Presence only; every row weighs the same
    Singular,
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DataType::Categorical => write!(f, "categorical"),
            DataType::Quantitative => write!(f, "quantitative"),
            DataType::Singular => write!(f, "singular"),
        }
    }
}

impl FromStr for DataType {
    type Err = ();

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "categorical" => Ok(DataType::Categorical),
            "quantitative" => Ok(DataType::Quantitative),
            "singular" => Ok(DataType::Singular),
            _ => Err(()),
        }
    }
}

/// Header of a chunked feature source
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ChunkHeader {
    /// Number of features in the blob
    pub length: usize,
    /// Feature names, injective when present
    #[cfg_attr(feature = "serde", serde(default))]
    pub names: Option<Vec<String>>,
    /// Byte offsets, `length + 1` entries, non-decreasing
    pub ptr: Vec<u64>,
    /// Densification policy; `None` keeps the parsed rows
    #[cfg_attr(feature = "serde", serde(default))]
    pub sparse_mode: Option<SparseMode>,
    /// Coordinate set the features are drawn on
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub coord_name: Option<String>,
    /// Meters per pixel of the coordinates
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub m_per_px: Option<f64>,
    /// Spot size in meters
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub size: Option<f64>,
    /// Feature shown when the source is first selected
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub active_default: Option<String>,
}

impl ChunkHeader {
    /// Create a header with only the pointer table
    pub fn new(length: usize, ptr: Vec<u64>) -> Self {
        Self {
            length,
            names: None,
            ptr,
            sparse_mode: None,
            coord_name: None,
            m_per_px: None,
            size: None,
            active_default: None,
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_sparse_mode(mut self, mode: SparseMode) -> Self {
        self.sparse_mode = Some(mode);
        self
    }

    pub fn with_coord_name(mut self, coord_name: impl Into<String>) -> Self {
        self.coord_name = Some(coord_name.into());
        self
    }

    /// Check pointer table and names against `length`
    pub fn validate(&self) -> Result<()> {
        validate_pointer_table(&self.ptr, self.length)?;
        if let Some(names) = &self.names {
            validate_names(names, self.length)?;
        }
        Ok(())
    }

    /// Byte interval of feature `index`, `None` past the end
    pub fn chunk_range(&self, index: usize) -> Option<Range<u64>> {
        if index >= self.length {
            return None;
        }
        let start = *self.ptr.get(index)?;
        let end = *self.ptr.get(index + 1)?;
        Some(start..end)
    }

    /// True when feature `index` has no stored entries
    pub fn is_empty_chunk(&self, index: usize) -> Result<bool> {
        self.chunk_range(index)
            .map(|range| range.is_empty())
            .ok_or(FormatError::IndexOutOfBounds {
                index,
                length: self.length,
            })
    }

    /// Size in bytes of the whole blob
    pub fn blob_size(&self) -> u64 {
        self.ptr.last().copied().unwrap_or(0)
    }
}
