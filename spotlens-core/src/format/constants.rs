//! Reserved names and fixed values shared by producers and consumers

/// Group addressing plain sources by feature name alone
pub const MISC_GROUP: &str = "Misc";

/// Column holding the sparse index in chunk payloads
pub const INDEX_COLUMN: &str = "index";

/// Column holding the value in chunk payloads and projected rows
pub const VALUE_COLUMN: &str = "value";

/// Column holding the caller-supplied key of a position
pub const ID_COLUMN: &str = "id";

/// Columns that carry position rather than feature values
pub const COORDINATE_COLUMNS: [&str; 3] = ["x", "y", ID_COLUMN];

/// Weight given to every row of a singular feature
pub const SINGULAR_WEIGHT: f64 = 1.0;

/// Domain reported for data without a numeric range
pub const PLACEHOLDER_DOMAIN: (f64, f64) = (0.0, 1.0);

/// Returns true for `x`, `y` and `id`
pub fn is_coordinate_column(name: &str) -> bool {
    COORDINATE_COLUMNS.contains(&name)
}
