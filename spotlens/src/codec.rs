//! Text codecs for chunk payloads and plain tables

use ::csv::ReaderBuilder;
use spotlens_core::constants::{ID_COLUMN, INDEX_COLUMN, VALUE_COLUMN};
use spotlens_core::{SparseEntry, SparseRows};

use crate::data::{Row, Value};
use crate::{Error, Result};

/// Parse a CSV table with a header line into rows
///
/// Numeric-looking fields become numbers, except in the `id` column: CSV
/// carries no types, so ids such as `007` keep their text.
pub fn parse_rows(text: &str, source: &str) -> Result<Vec<Row>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(::csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::parse(source, e))?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::parse(source, e))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(column, field)| {
                let cell = if column == ID_COLUMN {
                    Value::Text(field.to_string())
                } else {
                    Value::from_field(field)
                };
                (column.to_string(), cell)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Parse an `index,value` chunk into sparse pairs
pub fn parse_sparse(text: &str, source: &str) -> Result<SparseRows> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(::csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| Error::parse(source, e))?;
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::parse(source, format!("missing `{name}` column")))
    };
    let index_at = column(INDEX_COLUMN)?;
    let value_at = column(VALUE_COLUMN)?;

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::parse(source, e))?;
        let field = |at: usize| record.get(at).unwrap_or_default();
        let index = field(index_at)
            .parse::<usize>()
            .map_err(|e| Error::parse(source, format!("index `{}`: {e}", field(index_at))))?;
        let value = field(value_at)
            .parse::<f64>()
            .map_err(|e| Error::parse(source, format!("value `{}`: {e}", field(value_at))))?;
        entries.push(SparseEntry { index, value });
    }

    log::trace!("{source}: {} sparse entries", entries.len());
    Ok(SparseRows::Pairs(entries))
}

/// Parse a JSON array of flat objects into rows
///
/// Booleans become `0`/`1`, nulls are dropped and nested values are kept as
/// their JSON text.
pub fn parse_json_rows(text: &str, source: &str) -> Result<Vec<Row>> {
    let objects: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(text).map_err(|e| Error::parse(source, e))?;

    Ok(objects
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .filter_map(|(column, value)| {
                    let cell = match value {
                        serde_json::Value::Null => return None,
                        serde_json::Value::Bool(flag) => Value::Number(f64::from(u8::from(flag))),
                        serde_json::Value::Number(number) => Value::Number(number.as_f64()?),
                        serde_json::Value::String(text) => Value::Text(text),
                        nested => Value::Text(nested.to_string()),
                    };
                    Some((column, cell))
                })
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sparse() {
        let rows = parse_sparse("index,value\n0,7\n2, 1.5\n", "chunk").unwrap();
        let entries: Vec<_> = rows.iter().collect();
        assert_eq!(
            entries,
            vec![
                SparseEntry { index: 0, value: 7.0 },
                SparseEntry { index: 2, value: 1.5 }
            ]
        );

        assert!(parse_sparse("index,value\n", "chunk").unwrap().is_empty());
        assert!(parse_sparse("i,v\n0,1\n", "chunk").is_err());
        assert!(parse_sparse("index,value\n-1,1\n", "chunk").is_err());
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows("x,y,cluster\n1,2,tumor\n3,4,stroma\n", "table.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["x"], Value::Number(1.0));
        assert_eq!(rows[1]["cluster"], Value::Text("stroma".into()));

        let rows = parse_rows("x,y,id\n1,2,007\n", "spots.csv").unwrap();
        assert_eq!(rows[0]["id"], Value::Text("007".into()));
        assert_eq!(rows[0]["x"], Value::Number(1.0));
    }

    #[test]
    fn test_parse_json_rows() {
        let text = r#"[{"x": 1, "y": 2, "value": "a", "flag": true, "gone": null}]"#;
        let rows = parse_json_rows(text, "table.json").unwrap();
        assert_eq!(rows[0]["value"], Value::Text("a".into()));
        assert_eq!(rows[0]["flag"], Value::Number(1.0));
        assert!(!rows[0].contains_key("gone"));

        let err = parse_json_rows("{", "table.json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Absent);
    }
}
