//! Feature name index
//!
//! O(1) lookups in both directions between feature names and positions.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::validation::validate_names;
use crate::{ChunkHeader, FormatError, Result, Selector};

/// Bidirectional map between feature names and indices
#[derive(Debug, Clone)]
pub struct NameIndex {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
    explicit: bool,
}

impl NameIndex {
    /// Index over caller-supplied names; duplicates are rejected
    pub fn explicit(names: Vec<String>) -> Result<Self> {
        validate_names(&names, names.len())?;
        let lookup = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        Ok(Self {
            names,
            lookup,
            explicit: true,
        })
    }

    /// Index over the stringified positions `"0".."length-1"`
    pub fn derived(length: usize) -> Self {
        let names: Vec<String> = (0..length).map(|index| index.to_string()).collect();
        let lookup = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        Self {
            names,
            lookup,
            explicit: false,
        }
    }

    /// Build the index a header implies
    pub fn from_header(header: &ChunkHeader) -> Result<Self> {
        match &header.names {
            Some(names) => {
                validate_names(names, header.length)?;
                Self::explicit(names.clone())
            }
            None => Ok(Self::derived(header.length)),
        }
    }

    /// Whether the names came from the source rather than from positions
    pub fn has_explicit_names(&self) -> bool {
        self.explicit
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Resolve a selector to a position
    ///
    /// `Ok(None)` means the feature is not in this source. The sentinel index
    /// and name selectors on unnamed sources are errors.
    pub fn resolve(&self, selector: &Selector) -> Result<Option<usize>> {
        match selector {
            Selector::Index(_) if selector.is_sentinel() => Err(FormatError::SentinelSelector),
            Selector::Index(index) => Ok(usize::try_from(*index)
                .ok()
                .filter(|index| *index < self.names.len())),
            Selector::Name(_) if !self.explicit => Err(FormatError::NamesUnavailable),
            Selector::Name(name) => Ok(self.index_of(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn index() -> NameIndex {
        NameIndex::explicit(vec!["f0".to_string(), "f1".to_string()]).unwrap()
    }

    #[test]
    fn test_resolve_by_name_and_index() {
        let names = index();
        assert_eq!(names.resolve(&"f1".into()), Ok(Some(1)));
        assert_eq!(names.resolve(&1usize.into()), Ok(Some(1)));
        assert_eq!(names.resolve(&"missing".into()), Ok(None));
        assert_eq!(names.resolve(&5usize.into()), Ok(None));
        assert_eq!(names.resolve(&(-3).into()), Ok(None));
        assert_eq!(names.resolve(&(-1).into()), Err(FormatError::SentinelSelector));
        assert_eq!(names.name(0), Some("f0"));
    }

    #[test]
    fn test_derived_names() {
        let header = ChunkHeader::new(3, vec![0, 0, 0, 0]);
        let names = NameIndex::from_header(&header).unwrap();
        assert!(!names.has_explicit_names());
        assert_eq!(names.names(), ["0", "1", "2"]);
        assert_eq!(names.resolve(&2usize.into()), Ok(Some(2)));
        assert_eq!(names.resolve(&"2".into()), Err(FormatError::NamesUnavailable));
    }

    #[test]
    fn test_duplicates_rejected() {
        let result = NameIndex::explicit(vec!["a".to_string(), "a".to_string()]);
        assert_eq!(result.err(), Some(FormatError::DuplicateName { index: 1 }));
    }
}
