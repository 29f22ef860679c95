//! Lookup tables loaded once from column data and read-only afterwards.
//!
//! Column data arrives the way the tabular data source returns it: the first
//! row carries column names and every following row carries positional values.

pub mod climate_bins;
pub mod yield_model;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TableError;

pub use climate_bins::{ClimateBin, ClimateBinTable};
pub use yield_model::YieldModelTable;

/// Raw rows from a named table, header first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnData {
    rows: Vec<Vec<Value>>,
}

impl ColumnData {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> Option<&[Value]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Position of `name` in the header row.
    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.header()
            .and_then(|header| header.iter().position(|cell| cell.as_str() == Some(name)))
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    /// Data rows, header excluded.
    pub fn data_rows(&self) -> &[Vec<Value>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Row at a raw offset, where offset 0 is the header.
    pub fn row(&self, offset: usize) -> Option<&[Value]> {
        self.rows.get(offset).map(Vec::as_slice)
    }
}

/// Read a numeric cell. Strings holding numbers are accepted; anything else
/// reads as missing.
pub(crate) fn number(cell: Option<&Value>) -> Option<f64> {
    match cell? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_lookup_by_header_name() {
        let data: ColumnData =
            serde_json::from_value(json!([["a", "b"], [1, "2.5"], [null, "x"]])).unwrap();
        assert_eq!(data.column_index("b"), Ok(1));
        assert_eq!(
            data.column_index("c"),
            Err(TableError::ColumnNotFound("c".to_string()))
        );
        assert_eq!(data.data_rows().len(), 2);
        assert_eq!(number(data.row(1).and_then(|row| row.get(1))), Some(2.5));
        assert_eq!(number(data.row(2).and_then(|row| row.first())), None);
        assert_eq!(number(data.row(2).and_then(|row| row.get(1))), None);
    }

    #[test]
    fn empty_table_has_no_columns() {
        let data = ColumnData::default();
        assert!(data.column_index("a").is_err());
        assert!(data.data_rows().is_empty());
    }
}
