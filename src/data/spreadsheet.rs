//! Spreadsheet import (XLSX, XLS, ODS) via calamine.
//!
//! Only the first sheet is read. Row 1 holds the headers. The column set is
//! the key set of the first parsed record: headers whose cell in the first
//! non-blank data row is filled. Columns empty in that row are not imported.

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

use super::DataTable;
use crate::error::{Result, StencilError};

/// Parse spreadsheet bytes into a data table.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<DataTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| StencilError::Import(format!("unreadable spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| StencilError::Import("spreadsheet has no sheets".into()))?
        .map_err(|e| StencilError::Import(format!("failed to read first sheet: {}", e)))?;

    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    table_from_grid(grid)
}

/// Apply the header / first-record column rule to a raw cell grid.
pub(crate) fn table_from_grid(mut grid: Vec<Vec<String>>) -> Result<DataTable> {
    if grid.is_empty() {
        return Err(StencilError::Import("sheet is empty".into()));
    }
    let headers = grid.remove(0);

    let first = grid
        .iter()
        .find(|r| r.iter().any(|v| !v.trim().is_empty()))
        .ok_or_else(|| StencilError::Import("sheet has no data rows".into()))?;

    // Headers not present in the first record are blanked so normalization drops them.
    let keyed: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| match first.get(i) {
            Some(v) if !v.trim().is_empty() => h.clone(),
            _ => String::new(),
        })
        .collect();

    DataTable::from_records(keyed, grid)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// Minimal XLSX with one worksheet per entry, strings stored inline.
    fn xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
        let mut types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        let mut entries = String::new();
        let mut rels = String::new();
        let mut parts = Vec::new();
        for (i, (name, rows)) in sheets.iter().enumerate() {
            let n = i + 1;
            types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                n
            ));
            entries.push_str(&format!(r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#, name, n, n));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="{}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                n, REL_NS, n
            ));

            let mut data = String::new();
            for (r, row) in rows.iter().enumerate() {
                if row.iter().all(|c| c.is_empty()) {
                    continue;
                }
                data.push_str(&format!(r#"<row r="{}">"#, r + 1));
                for (c, value) in row.iter().enumerate() {
                    let cell = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                    if value.is_empty() {
                        continue;
                    }
                    if value.parse::<f64>().is_ok() {
                        data.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, cell, value));
                    } else {
                        data.push_str(&format!(
                            r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                            cell, value
                        ));
                    }
                }
                data.push_str("</row>");
            }
            parts.push((
                format!("xl/worksheets/sheet{}.xml", n),
                format!(r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#, MAIN_NS, data),
            ));
        }
        types.push_str("</Types>");

        parts.push(("[Content_Types].xml".into(), types));
        parts.push((
            "_rels/.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
                REL_NS
            ),
        ));
        parts.push((
            "xl/workbook.xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{}" xmlns:r="{}"><sheets>{}</sheets></workbook>"#,
                MAIN_NS, REL_NS, entries
            ),
        ));
        parts.push((
            "xl/_rels/workbook.xml.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                rels
            ),
        ));

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_first_sheet_of_a_workbook() {
        let bytes = xlsx(&[
            (
                "Posts",
                &[
                    &["title", "notes", "price"],
                    &["", "", ""],
                    &["Shoes", "", "49"],
                    &["Hat", "wool", "15.5"],
                ],
            ),
            ("Archive", &[&["other"], &["ignored"]]),
        ]);
        let table = parse_spreadsheet(&bytes).unwrap();
        assert_eq!(table.columns(), &["title".to_string(), "price".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].get("title"), Some("Shoes"));
        assert_eq!(table.rows()[0].get("price"), Some("49"));
        assert_eq!(table.rows()[1].get("price"), Some("15.5"));
        assert_eq!(table.rows()[1].get("notes"), None);
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn columns_come_from_first_record() {
        let table = table_from_grid(grid(&[
            &["title", "notes", "price"],
            &["", "", ""],
            &["Shoes", "", "49"],
            &["Hat", "wool", "15"],
        ]))
        .unwrap();
        assert_eq!(table.columns(), &["title".to_string(), "price".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].get("notes"), None);
    }

    #[test]
    fn header_only_sheet_is_import_error() {
        assert!(matches!(
            table_from_grid(grid(&[&["a", "b"]])),
            Err(StencilError::Import(_))
        ));
        assert!(matches!(table_from_grid(vec![]), Err(StencilError::Import(_))));
    }

    #[test]
    fn garbage_bytes_are_import_error() {
        assert!(matches!(
            parse_spreadsheet(b"definitely not a workbook"),
            Err(StencilError::Import(_))
        ));
    }

    #[test]
    fn numeric_cells_format_without_trailing_zero() {
        assert_eq!(cell_to_string(&Data::Float(5.0)), "5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
