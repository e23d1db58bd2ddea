//! Sparse chunk rows and densification
//!
//! A chunk stores only the non-zero entries of one feature. Depending on the
//! header's [`SparseMode`] those entries become a zero-filled vector or a map
//! holding just the present names.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::{FormatError, NameIndex, Result, SparseMode};

/// One stored entry of a sparse chunk
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SparseEntry {
    pub index: usize,
    pub value: f64,
}

/// Stored entries of a chunk, in either generation of the layout
#[derive(Debug, Clone, PartialEq)]
pub enum SparseRows {
    /// `{index, value}` pairs
    Pairs(Vec<SparseEntry>),
    /// Parallel `index` and `value` columns
    Columns { index: Vec<usize>, value: Vec<f64> },
}

impl SparseRows {
    /// Build the column layout, checking both columns have the same length
    pub fn columns(index: Vec<usize>, value: Vec<f64>) -> Result<Self> {
        if index.len() != value.len() {
            return Err(FormatError::ColumnLengthMismatch {
                index: index.len(),
                value: value.len(),
            });
        }
        Ok(SparseRows::Columns { index, value })
    }

    pub fn len(&self) -> usize {
        match self {
            SparseRows::Pairs(pairs) => pairs.len(),
            SparseRows::Columns { index, .. } => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate entries in storage order
    pub fn iter(&self) -> impl Iterator<Item = SparseEntry> + '_ {
        let (pairs, columns) = match self {
            SparseRows::Pairs(pairs) => (Some(pairs.iter().copied()), None),
            SparseRows::Columns { index, value } => (
                None,
                Some(
                    index
                        .iter()
                        .zip(value)
                        .map(|(&index, &value)| SparseEntry { index, value }),
                ),
            ),
        };
        pairs.into_iter().flatten().chain(columns.into_iter().flatten())
    }
}

/// Densified chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Densified {
    /// One value per feature position, zero where nothing was stored
    Array(Vec<f64>),
    /// Only the stored entries, keyed by name
    Record(BTreeMap<String, f64>),
}

impl Densified {
    /// Result for a chunk with no stored entries
    pub fn empty(mode: SparseMode, length: usize) -> Self {
        match mode {
            SparseMode::Array => Densified::Array(vec![0.0; length]),
            SparseMode::Record => Densified::Record(BTreeMap::new()),
        }
    }
}

/// Densify `rows` into a zero-filled vector of `length` values
pub fn densify_array(rows: &SparseRows, length: usize) -> Result<Vec<f64>> {
    let mut dense = vec![0.0; length];
    for entry in rows.iter() {
        let slot = dense
            .get_mut(entry.index)
            .ok_or(FormatError::IndexOutOfBounds {
                index: entry.index,
                length,
            })?;
        *slot = entry.value;
    }
    Ok(dense)
}

/// Densify `rows` into a map keyed by `names`, omitting absent entries
pub fn densify_record(rows: &SparseRows, names: &NameIndex) -> Result<BTreeMap<String, f64>> {
    let mut record = BTreeMap::new();
    for entry in rows.iter() {
        let name = names.name(entry.index).ok_or(FormatError::IndexOutOfBounds {
            index: entry.index,
            length: names.len(),
        })?;
        record.insert(String::from(name), entry.value);
    }
    Ok(record)
}

/// Densify according to `mode`
pub fn densify(rows: &SparseRows, mode: SparseMode, names: &NameIndex) -> Result<Densified> {
    match mode {
        SparseMode::Array => densify_array(rows, names.len()).map(Densified::Array),
        SparseMode::Record => densify_record(rows, names).map(Densified::Record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn pairs() -> SparseRows {
        SparseRows::Pairs(vec![
            SparseEntry { index: 0, value: 10.0 },
            SparseEntry { index: 1, value: 20.0 },
        ])
    }

    fn abc() -> NameIndex {
        NameIndex::explicit(vec!["a".to_string(), "b".to_string(), "c".to_string()]).unwrap()
    }

    #[test]
    fn test_densify_array() {
        assert_eq!(densify_array(&pairs(), 3), Ok(vec![10.0, 20.0, 0.0]));
        assert_eq!(
            densify_array(&pairs(), 1),
            Err(FormatError::IndexOutOfBounds { index: 1, length: 1 })
        );
    }

    #[test]
    fn test_densify_record_omits_absent_names() {
        let record = densify_record(&pairs(), &abc()).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("a"), Some(&10.0));
        assert_eq!(record.get("b"), Some(&20.0));
        assert_eq!(record.get("c"), None);
    }

    #[test]
    fn test_column_layout_matches_pairs() {
        let columns = SparseRows::columns(vec![0, 1], vec![10.0, 20.0]).unwrap();
        assert_eq!(
            densify(&columns, SparseMode::Array, &abc()),
            densify(&pairs(), SparseMode::Array, &abc())
        );
        assert_eq!(
            SparseRows::columns(vec![0], vec![]),
            Err(FormatError::ColumnLengthMismatch { index: 1, value: 0 })
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            Densified::empty(SparseMode::Array, 3),
            Densified::Array(vec![0.0, 0.0, 0.0])
        );
        assert_eq!(
            Densified::empty(SparseMode::Record, 3),
            Densified::Record(BTreeMap::new())
        );
    }
}
