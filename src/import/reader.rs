use crate::error::IngestError;
use crate::models::{CellValue, InputTable};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use log::{debug, info, warn};
use std::io::Cursor;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Materialize a user-supplied spreadsheet buffer into an [`InputTable`].
///
/// The container format is sniffed from the leading bytes: ZIP-based
/// workbooks (xlsx/xlsm/ods) and legacy CFB workbooks (xls) go through
/// calamine; anything else is treated as CSV. Workbook parsing happens over
/// an in-memory cursor scoped to this call.
///
/// Sheet selection falls back progressively: the hinted sheet, then the
/// first sheet, then the first sheet with data among all sheets. If nothing
/// yields a table the buffer is `InputUnreadable`.
pub fn read_workbook(buffer: &[u8], sheet_hint: Option<&str>) -> Result<InputTable, IngestError> {
    if buffer.is_empty() {
        return Err(IngestError::InputUnreadable {
            reason: "empty buffer".to_string(),
        });
    }
    if buffer.starts_with(ZIP_MAGIC) || buffer.starts_with(CFB_MAGIC) {
        read_excel(buffer, sheet_hint)
    } else {
        read_csv(buffer)
    }
}

fn read_excel(buffer: &[u8], sheet_hint: Option<&str>) -> Result<InputTable, IngestError> {
    // Scratch copy behind a seekable cursor; dropped on every exit path.
    let cursor = Cursor::new(buffer.to_vec());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| IngestError::InputUnreadable {
            reason: format!("workbook open failed: {}", e),
        })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(IngestError::InputUnreadable {
            reason: "workbook has no sheets".to_string(),
        });
    }

    // Hinted sheet first, then the default (first) sheet.
    let mut candidates: Vec<&str> = Vec::new();
    if let Some(hint) = sheet_hint {
        candidates.push(hint);
    }
    candidates.push(sheet_names[0].as_str());

    for name in candidates {
        match workbook.worksheet_range(name) {
            Ok(range) => {
                if let Some(table) = range_to_table(&range) {
                    info!(
                        "using sheet '{}' ({} columns, {} rows)",
                        name,
                        table.columns.len(),
                        table.rows.len()
                    );
                    return Ok(table);
                }
                debug!("sheet '{}' has no header row, falling back", name);
            }
            Err(e) => warn!("could not read sheet '{}': {}", name, e),
        }
    }

    // Last resort: scan every sheet, preferring one with actual data rows.
    let mut header_only: Option<InputTable> = None;
    for name in &sheet_names {
        if let Ok(range) = workbook.worksheet_range(name) {
            if let Some(table) = range_to_table(&range) {
                if !table.rows.is_empty() {
                    info!("falling back to non-empty sheet '{}'", name);
                    return Ok(table);
                }
                if header_only.is_none() {
                    header_only = Some(table);
                }
            }
        }
    }
    if let Some(table) = header_only {
        return Ok(table);
    }

    Err(IngestError::InputUnreadable {
        reason: "no sheet yields a non-empty table".to_string(),
    })
}

/// Convert a cell range into a table: first row becomes the header, the rest
/// become data rows. Returns `None` when there is no usable header.
fn range_to_table(range: &Range<Data>) -> Option<InputTable> {
    let mut rows_iter = range.rows();
    let header = rows_iter.next()?;
    if header.iter().all(is_empty_cell) {
        return None;
    }

    let columns = normalize_headers(header.iter().map(header_text));

    let rows: Vec<Vec<CellValue>> = rows_iter
        .map(|row| {
            let mut cells: Vec<CellValue> = row.iter().map(convert_cell).collect();
            cells.resize(columns.len(), CellValue::Empty);
            cells
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();

    Some(InputTable { columns, rows })
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty | Data::Error(_) => String::new(),
        other => format!("{}", other),
    }
}

fn is_empty_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) if f.is_finite() => CellValue::Number(*f),
        Data::Float(_) => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::Date(naive),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match s.parse::<chrono::NaiveDateTime>() {
            Ok(naive) => CellValue::Date(naive),
            Err(_) => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn read_csv(buffer: &[u8]) -> Result<InputTable, IngestError> {
    if buffer.contains(&0u8) {
        return Err(IngestError::InputUnreadable {
            reason: "binary data is neither a workbook nor CSV".to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(buffer);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::InputUnreadable {
            reason: format!("CSV header parse failed: {}", e),
        })?
        .clone();

    let columns = normalize_headers(
        headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string()),
    );
    if columns.is_empty() {
        return Err(IngestError::InputUnreadable {
            reason: "CSV has no header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("skipping malformed CSV record: {}", e);
                continue;
            }
        };
        let mut cells: Vec<CellValue> = record.iter().map(convert_csv_field).collect();
        cells.resize(columns.len(), CellValue::Empty);
        cells.truncate(columns.len());
        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells);
        }
    }

    info!("read CSV table ({} columns, {} rows)", columns.len(), rows.len());
    Ok(InputTable { columns, rows })
}

fn convert_csv_field(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return CellValue::Empty;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return CellValue::Number(n);
        }
    }
    CellValue::Text(trimmed.to_string())
}

/// Coerce raw header cells to stripped, unique, non-empty names.
fn normalize_headers<I: IntoIterator<Item = String>>(raw: I) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for (idx, header) in raw.into_iter().enumerate() {
        let trimmed = header.trim().to_string();
        let mut name = if trimmed.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            trimmed
        };
        while seen.contains(&name) {
            name.push('_');
        }
        seen.push(name);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_roundtrip_basic() {
        let csv = b"Category,Amount,Unit\nElectricity,10500,kWh\nDiesel Fuel,450,litres\n";
        let table = read_workbook(csv, None).unwrap();
        assert_eq!(table.columns, vec!["Category", "Amount", "Unit"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], CellValue::Number(10500.0));
        assert_eq!(table.rows[1][0], CellValue::Text("Diesel Fuel".into()));
    }

    #[test]
    fn test_csv_normalizes_blank_and_nan_cells() {
        let csv = b"A,B,C\n1, ,NaN\n";
        let table = read_workbook(csv, None).unwrap();
        assert_eq!(table.rows[0][1], CellValue::Empty);
        assert_eq!(table.rows[0][2], CellValue::Empty);
    }

    #[test]
    fn test_csv_header_only_yields_empty_table() {
        let csv = b"Date,Category,Amount\n";
        let table = read_workbook(csv, None).unwrap();
        assert_eq!(table.columns.len(), 3);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_headers_are_stripped_and_deduplicated() {
        let csv = b" Amount , Amount ,\n1,2,3\n";
        let table = read_workbook(csv, None).unwrap();
        assert_eq!(table.columns[0], "Amount");
        assert_eq!(table.columns[1], "Amount_");
        assert_eq!(table.columns[2], "column_3");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = b"A,B,C\n1\n";
        let table = read_workbook(csv, None).unwrap();
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], CellValue::Empty);
    }

    #[test]
    fn test_fully_blank_rows_are_skipped() {
        let csv = b"A,B\n,\n1,2\n";
        let table = read_workbook(csv, None).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_empty_buffer_is_unreadable() {
        assert!(matches!(
            read_workbook(b"", None),
            Err(IngestError::InputUnreadable { .. })
        ));
    }

    #[test]
    fn test_binary_garbage_is_unreadable() {
        let garbage = [0u8, 1, 2, 3, 0, 255];
        assert!(matches!(
            read_workbook(&garbage, None),
            Err(IngestError::InputUnreadable { .. })
        ));
    }

    #[test]
    fn test_truncated_zip_is_unreadable() {
        let mut bytes = Vec::from(&b"PK\x03\x04"[..]);
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            read_workbook(&bytes, None),
            Err(IngestError::InputUnreadable { .. })
        ));
    }
}
