//! Header naming constraints

use alloc::string::String;
use hashbrown::HashSet;

use crate::{FormatError, Result};

/// Validate that `names` has one entry per feature and no duplicates
pub fn validate_names(names: &[String], length: usize) -> Result<()> {
    if names.len() != length {
        return Err(FormatError::NameCountMismatch {
            expected: length,
            found: names.len(),
        });
    }

    let mut seen = HashSet::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        if !seen.insert(name.as_str()) {
            return Err(FormatError::DuplicateName { index });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    #[test]
    fn test_validate_names() {
        let names: Vec<String> = ["Actb", "Gapdh", "Cd3e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(validate_names(&names, 3), Ok(()));
        assert_eq!(
            validate_names(&names, 4),
            Err(FormatError::NameCountMismatch { expected: 4, found: 3 })
        );

        let repeated: Vec<String> = ["a", "b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            validate_names(&repeated, 3),
            Err(FormatError::DuplicateName { index: 2 })
        );
    }
}
