//! Error types for chunk header and sparse payload handling

/// Errors raised while validating headers, resolving selectors or densifying chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// Pointer table does not hold `length + 1` offsets
    PointerTableLength { expected: usize, found: usize },
    /// Pointer table decreases at `index`
    PointerNotMonotonic { index: usize },
    /// Header names do not match the declared length
    NameCountMismatch { expected: usize, found: usize },
    /// The name at `index` repeats an earlier name
    DuplicateName { index: usize },
    /// A sparse entry or feature index lies outside the header length
    IndexOutOfBounds { index: usize, length: usize },
    /// The `-1` selector reached a source
    SentinelSelector,
    /// A name selector was used against a header without names
    NamesUnavailable,
    /// Parallel index/value columns differ in length
    ColumnLengthMismatch { index: usize, value: usize },
    /// Byte range is empty or reversed
    InvalidRange,
}

impl core::fmt::Display for FormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FormatError::PointerTableLength { expected, found } => {
                write!(f, "pointer table has {found} offsets, expected {expected}")
            }
            FormatError::PointerNotMonotonic { index } => {
                write!(f, "pointer table decreases at offset {index}")
            }
            FormatError::NameCountMismatch { expected, found } => {
                write!(f, "header lists {found} names for {expected} features")
            }
            FormatError::DuplicateName { index } => write!(f, "duplicate feature name at {index}"),
            FormatError::IndexOutOfBounds { index, length } => {
                write!(f, "index {index} out of bounds for length {length}")
            }
            FormatError::SentinelSelector => write!(f, "selector -1 is not a feature"),
            FormatError::NamesUnavailable => {
                write!(f, "name selector used on a source without feature names")
            }
            FormatError::ColumnLengthMismatch { index, value } => {
                write!(f, "sparse columns differ in length ({index} indices, {value} values)")
            }
            FormatError::InvalidRange => write!(f, "invalid byte range"),
        }
    }
}

impl core::error::Error for FormatError {}

/// Result type for format operations
pub type Result<T> = core::result::Result<T, FormatError>;
