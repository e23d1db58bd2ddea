//! Feature selectors
//!
//! A feature is requested either by name or by its position in the header.

use alloc::string::String;

/// Index value some callers pass when nothing is selected
pub const SENTINEL_INDEX: i64 = -1;

/// Name or numeric index of a feature within one source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Selector {
    Index(i64),
    Name(String),
}

impl Selector {
    /// True for the `-1` index
    pub const fn is_sentinel(&self) -> bool {
        matches!(self, Selector::Index(SENTINEL_INDEX))
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Selector::Name(value.into())
    }
}

impl From<String> for Selector {
    fn from(value: String) -> Self {
        Selector::Name(value)
    }
}

impl From<&String> for Selector {
    fn from(value: &String) -> Self {
        Selector::Name(value.clone())
    }
}

impl From<i64> for Selector {
    fn from(value: i64) -> Self {
        Selector::Index(value)
    }
}

impl From<i32> for Selector {
    fn from(value: i32) -> Self {
        Selector::Index(value.into())
    }
}

impl From<usize> for Selector {
    fn from(value: usize) -> Self {
        Selector::Index(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl core::fmt::Display for Selector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "#{index}"),
            Selector::Name(name) => write!(f, "{name}"),
        }
    }
}
