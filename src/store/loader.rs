//! Upload parsing: CSV and spreadsheet files into arrow-backed columns
//!
//! Column types are sniffed per column: all non-empty cells parse as i64 →
//! Int64, all parse as f64 → Float64, otherwise Utf8. Empty cells become
//! nulls regardless of the sniffed type.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{EngineError, EngineResult};
use crate::store::dataset::Column;

/// Parse uploaded bytes into columns based on the file extension.
/// Rejects non-tabular extensions and empty files with an input error.
pub fn load_table(bytes: &[u8], filename: &str) -> EngineResult<Vec<Column>> {
    if bytes.is_empty() {
        return Err(EngineError::input("uploaded file is empty"));
    }
    let extension = filename
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => load_csv(bytes),
        "xlsx" | "xls" | "xlsb" | "ods" => load_spreadsheet(bytes),
        other => Err(EngineError::input(format!(
            "unsupported file type '.{}' (expected .csv or a spreadsheet)",
            other
        ))),
    }
}

fn load_csv(bytes: &[u8]) -> EngineResult<Vec<Column>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::input(format!("could not read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(EngineError::input("CSV file has no header row"));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record =
            record.map_err(|e| EngineError::input(format!("malformed CSV record: {}", e)))?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").trim().to_string());
        }
    }
    if cells[0].is_empty() {
        return Err(EngineError::input("CSV file contains no data rows"));
    }

    Ok(headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| build_column(name, values))
        .collect())
}

fn load_spreadsheet(bytes: &[u8]) -> EngineResult<Vec<Column>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| EngineError::input(format!("could not open spreadsheet: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EngineError::input("spreadsheet has no sheets"))?
        .map_err(|e| EngineError::input(format!("could not read sheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| EngineError::input("spreadsheet sheet is empty"))?
        .iter()
        .map(cell_to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(EngineError::input("spreadsheet has no header row"));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, column) in cells.iter_mut().enumerate() {
            let value = row.get(i).map(cell_to_string).unwrap_or_default();
            column.push(value);
        }
    }
    if cells.first().map(|c| c.is_empty()).unwrap_or(true) {
        return Err(EngineError::input("spreadsheet contains no data rows"));
    }

    Ok(headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| build_column(name, values))
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Excel stores integers as floats
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}

/// Sniff a column type from its string cells and build the arrow array
fn build_column(name: String, values: Vec<String>) -> Column {
    let non_empty: Vec<&String> = values.iter().filter(|v| !v.is_empty()).collect();

    if !non_empty.is_empty() && non_empty.iter().all(|v| v.parse::<i64>().is_ok()) {
        let ints: Vec<Option<i64>> = values
            .iter()
            .map(|v| if v.is_empty() { None } else { v.parse().ok() })
            .collect();
        return Column::new(name, Arc::new(Int64Array::from(ints)) as ArrayRef);
    }

    if !non_empty.is_empty() && non_empty.iter().all(|v| v.parse::<f64>().is_ok()) {
        let floats: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_empty() { None } else { v.parse().ok() })
            .collect();
        return Column::new(name, Arc::new(Float64Array::from(floats)) as ArrayRef);
    }

    let strings: Vec<Option<String>> = values
        .into_iter()
        .map(|v| if v.is_empty() { None } else { Some(v) })
        .collect();
    Column::new(name, Arc::new(StringArray::from(strings)) as ArrayRef)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::dataset::StorageType;

    #[test]
    fn csv_sniffs_int_float_and_text() {
        let csv = b"id,price,region\n1,10.5,West\n2,20.0,East\n3,,South\n";
        let columns = load_table(csv, "sales.csv").unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].storage_type(), StorageType::Int);
        assert_eq!(columns[1].storage_type(), StorageType::Float);
        assert_eq!(columns[2].storage_type(), StorageType::Text);
        assert_eq!(columns[1].null_count(), 1);
    }

    #[test]
    fn empty_file_is_an_input_error() {
        let err = load_table(b"", "empty.csv").unwrap_err();
        assert!(matches!(err, EngineError::Input { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_table(b"hello", "notes.pdf").unwrap_err();
        assert!(matches!(err, EngineError::Input { .. }));
    }

    #[test]
    fn headerless_csv_is_rejected() {
        let err = load_table(b",,\n", "x.csv").unwrap_err();
        assert!(matches!(err, EngineError::Input { .. }));
    }
}
