//! CSV / TSV import.
//!
//! The first record is the header row. The delimiter is sniffed from the
//! first few lines (comma, semicolon or tab, whichever is most frequent).

use super::DataTable;
use crate::error::{Result, StencilError};

/// Parse CSV text into a data table.
pub fn parse_csv(content: &str) -> Result<DataTable> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(StencilError::Import("CSV input is empty".into()));
    }
    let delimiter = detect_delimiter(content);

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StencilError::Import(format!("CSV header error: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| StencilError::Import(format!("CSV parse error on record {}: {}", i + 1, e)))?;
        records.push(record.iter().map(str::to_string).collect());
    }

    DataTable::from_records(headers, records)
}

/// Parse CSV bytes, rejecting non-UTF-8 input.
pub fn parse_csv_bytes(bytes: &[u8]) -> Result<DataTable> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StencilError::Import(format!("CSV is not valid UTF-8: {}", e)))?;
    parse_csv(text)
}

/// Pick the delimiter that appears most often in the first lines.
fn detect_delimiter(content: &str) -> u8 {
    let head: String = content.lines().take(5).collect::<Vec<_>>().join("\n");

    let comma = head.matches(',').count();
    let tab = head.matches('\t').count();
    let semicolon = head.matches(';').count();

    if tab > comma && tab > semicolon {
        b'\t'
    } else if semicolon > comma {
        b';'
    } else {
        b','
    }
}
