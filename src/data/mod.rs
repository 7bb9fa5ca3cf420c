//! # Data Table
//!
//! Tabular data that drives a batch: ordered, unique column names plus rows
//! of string values.
//!
//! Every import mode ([`csv`], [`spreadsheet`], manual grid, [`generate`])
//! funnels through the same normalization:
//!
//! - column names are trimmed, empty names dropped, duplicates collapsed to
//!   their first occurrence (order-preserving)
//! - rows whose values are all empty or whitespace are dropped
//! - an import with no columns or no remaining rows is an error, and the
//!   caller's existing table is left untouched (tables are replaced whole)

pub mod csv;
pub mod generate;
pub mod spreadsheet;

pub use generate::TableRequest;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, StencilError};

/// One record: column name → string value.
///
/// Rows may be sparse; a key missing from a row is distinct from an empty
/// value (see [`crate::mapping::FieldMapping::apply`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    values: HashMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if every listed column is absent or whitespace-only.
    pub fn is_blank(&self, columns: &[String]) -> bool {
        columns
            .iter()
            .all(|c| self.get(c).is_none_or(|v| v.trim().is_empty()))
    }

    /// `(column, value)` pairs in the given column order, skipping absent keys.
    pub fn ordered<'a>(&'a self, columns: &'a [String]) -> impl Iterator<Item = (&'a str, &'a str)> {
        columns
            .iter()
            .filter_map(move |c| self.get(c).map(|v| (c.as_str(), v)))
    }
}

/// Imported tabular data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl DataTable {
    /// Build from a header list and positional records.
    ///
    /// Short records are padded with empty strings; values under dropped
    /// (empty or duplicate) headers are ignored.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            let name = header.trim();
            if name.is_empty() || columns.iter().any(|c| c == name) {
                continue;
            }
            columns.push(name.to_string());
            indices.push(i);
        }
        if columns.is_empty() {
            return Err(StencilError::Import("no columns found".into()));
        }

        let rows = records
            .into_iter()
            .map(|record| {
                let mut row = Row::new();
                for (column, &idx) in columns.iter().zip(&indices) {
                    row.insert(column.clone(), record.get(idx).cloned().unwrap_or_default());
                }
                row
            })
            .filter(|row| !row.is_blank(&columns))
            .collect::<Vec<_>>();

        if rows.is_empty() {
            return Err(StencilError::Import("no data rows found".into()));
        }
        Ok(Self { columns, rows })
    }

    /// Build from named columns and keyed (possibly sparse) rows.
    ///
    /// Keys outside `columns` are discarded.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let mut cols: Vec<String> = Vec::new();
        for c in columns {
            let name = c.trim().to_string();
            if !name.is_empty() && !cols.contains(&name) {
                cols.push(name);
            }
        }
        if cols.is_empty() {
            return Err(StencilError::Import("no columns found".into()));
        }
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut kept = Row::new();
                for c in &cols {
                    if let Some(v) = row.get(c) {
                        kept.insert(c.clone(), v);
                    }
                }
                kept
            })
            .filter(|row| !row.is_blank(&cols))
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return Err(StencilError::Import("no data rows found".into()));
        }
        Ok(Self {
            columns: cols,
            rows,
        })
    }

    /// Manual grid entry: same normalization as file imports.
    pub fn from_manual(columns: Vec<String>, grid: Vec<Vec<String>>) -> Result<Self> {
        Self::from_records(columns, grid)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize as CSV with a header row.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(|e| StencilError::Import(format!("CSV write failed: {}", e)))?;
        for row in &self.rows {
            writer
                .write_record(self.columns.iter().map(|c| row.get(c).unwrap_or("")))
                .map_err(|e| StencilError::Import(format!("CSV write failed: {}", e)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StencilError::Import(format!("CSV write failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| StencilError::Import(format!("CSV write failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn columns_are_deduplicated_in_first_seen_order() {
        let table = DataTable::from_records(
            s(&["b", "a", "b", " ", "c"]),
            vec![s(&["1", "2", "ignored", "x", "3"])],
        )
        .unwrap();
        assert_eq!(table.columns(), &s(&["b", "a", "c"]));
        assert_eq!(table.rows()[0].get("b"), Some("1"));
        assert_eq!(table.rows()[0].get("c"), Some("3"));
    }

    #[test]
    fn blank_rows_are_dropped_and_short_rows_padded() {
        let table = DataTable::from_records(
            s(&["name", "city"]),
            vec![s(&["Ann", "Oslo"]), s(&["", "  "]), s(&["Bo"]), vec![]],
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].get("city"), Some(""));
    }

    #[test]
    fn empty_results_are_import_errors() {
        assert!(matches!(
            DataTable::from_records(s(&["", " "]), vec![s(&["1", "2"])]),
            Err(StencilError::Import(_))
        ));
        assert!(matches!(
            DataTable::from_records(s(&["a"]), vec![s(&[" "])]),
            Err(StencilError::Import(_))
        ));
    }

    #[test]
    fn from_rows_keeps_sparse_rows_sparse() {
        let table = DataTable::from_rows(
            s(&["headline", "body"]),
            vec![
                Row::from_pairs([("headline", "Hi"), ("extra", "dropped")]),
                Row::from_pairs([("body", "text")]),
            ],
        )
        .unwrap();
        assert_eq!(table.rows()[0].get("body"), None);
        assert_eq!(table.rows()[0].get("extra"), None);
        assert_eq!(table.rows()[1].get("headline"), None);
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let table = DataTable::from_records(
            s(&["a", "b"]),
            vec![s(&["1", "x, y"]), s(&["2", ""])],
        )
        .unwrap();
        assert_eq!(table.to_csv().unwrap(), "a,b\n1,\"x, y\"\n2,\n");
    }

    #[test]
    fn ordered_pairs_follow_column_order() {
        let cols = s(&["z", "a"]);
        let row = Row::from_pairs([("a", "1"), ("z", "2")]);
        let pairs: Vec<_> = row.ordered(&cols).collect();
        assert_eq!(pairs, vec![("z", "2"), ("a", "1")]);
    }
}
