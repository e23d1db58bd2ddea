//! Retrieved feature payloads

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use spotlens_core::constants::{is_coordinate_column, VALUE_COLUMN};
use spotlens_core::{DataType, Densified};

/// One cell of a parsed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numbers as-is; text only when it parses as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(text) => Some(text),
        }
    }

    /// Parse a CSV field, preferring numbers
    pub fn from_field(field: &str) -> Self {
        match field.trim().parse::<f64>() {
            Ok(number) if !field.trim().is_empty() => Value::Number(number),
            _ => Value::Text(field.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(number) => write!(f, "{number}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

/// Parsed table row, column name to cell
pub type Row = BTreeMap<String, Value>;

/// Fields of `row` that are neither coordinates nor the row id
pub fn value_fields(row: &Row) -> impl Iterator<Item = (&String, &Value)> {
    row.iter().filter(|(name, _)| !is_coordinate_column(name))
}

/// The value a row carries: its `value` column, else its only non-coordinate column
pub fn row_value(row: &Row) -> Option<&Value> {
    if let Some(value) = row.get(VALUE_COLUMN) {
        return Some(value);
    }
    let mut fields = value_fields(row);
    match (fields.next(), fields.next()) {
        (Some((_, value)), None) => Some(value),
        _ => None,
    }
}

/// Payload of a retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureData {
    /// One value per position
    Dense(Vec<f64>),
    /// Present entries keyed by name
    Record(BTreeMap<String, f64>),
    /// Rows carrying their own columns, typically `x`, `y` and a value
    Rows(Vec<Row>),
}

impl FeatureData {
    pub fn len(&self) -> usize {
        match self {
            FeatureData::Dense(values) => values.len(),
            FeatureData::Record(record) => record.len(),
            FeatureData::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the rows carry `x` and `y`
    pub fn has_positions(&self) -> bool {
        match self {
            FeatureData::Rows(rows) => rows
                .first()
                .is_some_and(|row| row.contains_key("x") && row.contains_key("y")),
            FeatureData::Dense(_) | FeatureData::Record(_) => false,
        }
    }
}

impl From<Densified> for FeatureData {
    fn from(densified: Densified) -> Self {
        match densified {
            Densified::Array(values) => FeatureData::Dense(values),
            Densified::Record(record) => FeatureData::Record(record),
        }
    }
}

/// A feature as returned by a source
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedData {
    pub data_type: DataType,
    pub data: FeatureData,
    /// Coordinate set the data is drawn on
    pub coord_name: Option<String>,
    pub m_per_px: Option<f64>,
    pub size: Option<f64>,
    pub unit: Option<String>,
}

impl RetrievedData {
    pub fn new(data_type: DataType, data: FeatureData) -> Self {
        Self {
            data_type,
            data,
            coord_name: None,
            m_per_px: None,
            size: None,
            unit: None,
        }
    }

    pub fn with_coord_name(mut self, coord_name: Option<String>) -> Self {
        self.coord_name = coord_name;
        self
    }

    pub fn with_scale(mut self, m_per_px: Option<f64>, size: Option<f64>) -> Self {
        self.m_per_px = m_per_px;
        self.size = size;
        self
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }
}
