//! Spreadsheet tables (`.xlsx`, `.xls`, `.ods`): first sheet, first row as
//! header, every cell as text.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;

use crate::error::{PipelineError, Result};

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        other => {
            let text = other.to_string();
            if text.trim().is_empty() {
                None
            } else {
                Some(text)
            }
        }
    }
}

/// Read the first worksheet of a workbook held in memory
pub fn read_spreadsheet_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| PipelineError::Parse(format!("invalid spreadsheet: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::Parse("spreadsheet has no worksheet".to_string()))?
        .map_err(|e| PipelineError::Parse(format!("unreadable worksheet: {e}")))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };

    let mut seen = HashSet::new();
    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = cell_text(cell).unwrap_or_else(|| format!("column_{}", i + 1));
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect();

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get(i).and_then(cell_text));
        }
    }

    let columns = names
        .iter()
        .zip(values)
        .map(|(name, column)| Column::new(name.as_str().into(), column))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Minimal single-sheet `.xlsx` with inline strings; numeric-looking cells
/// are written as numbers
#[cfg(test)]
pub(crate) fn build_xlsx(rows: &[&[&str]]) -> Vec<u8> {
    use ::zip::write::SimpleFileOptions;
    use ::zip::ZipWriter;
    use std::io::Write;

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                sheet.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, cell_ref, value));
            } else {
                sheet.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    cell_ref, value
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let parts: [(&str, String); 5] = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Plan1" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/worksheets/sheet1.xml", sheet),
    ];

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::table::{column_names, text_values};

    #[test]
    fn test_read_first_sheet_as_text() {
        let bytes = build_xlsx(&[
            &["ISSN", "Titulo", "Estrato"],
            &["0001-0001", "Revista A", "A1"],
            &["01001965", "", "B2"],
        ]);
        let df = read_spreadsheet_bytes(&bytes).unwrap();
        assert_eq!(column_names(&df), vec!["ISSN", "Titulo", "Estrato"]);
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("ISSN").unwrap().dtype(), &DataType::String);

        let titles = text_values(&df, "Titulo").unwrap();
        assert_eq!(titles, vec![Some("Revista A".to_string()), None]);
        // Numeric cells come back as their plain number text
        assert_eq!(text_values(&df, "ISSN").unwrap()[1].as_deref(), Some("1001965"));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            read_spreadsheet_bytes(b"not a workbook"),
            Err(PipelineError::Parse(_))
        ));
    }
}
