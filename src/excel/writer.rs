//! Spreadsheet writer - replacement rows → stored file
//!
//! The sheet is rewritten in place: the header row stays, every data cell of
//! the table's columns is blanked (value removed, style kept) and the
//! submitted rows are written from the first data row down. Styles, column widths and validation rules are left
//! as they are.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::reader::{format_number, SheetReader};
use super::SheetLayout;
use crate::error::{SheetError, SheetResult};
use crate::types::{FileKind, Row, SheetTable};

/// Writes an edited table back into a stored upload
pub struct SheetWriter {
    path: PathBuf,
    kind: FileKind,
}

impl SheetWriter {
    pub fn new<P: AsRef<Path>>(path: P, kind: FileKind) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            kind,
        }
    }

    /// Replace the data rows of `sheet` with `rows`.
    ///
    /// Keys outside the existing header are dropped and wholly empty rows are
    /// discarded. A sheet without a header row takes its header from the
    /// submitted keys. Returns the table as written.
    pub fn write_rows(&self, sheet: &str, rows: &[Row]) -> SheetResult<SheetTable> {
        if self.kind == FileKind::Xls {
            return Err(xls_not_writable());
        }

        let (_, layout) = SheetReader::new(&self.path, self.kind).read_table(sheet)?;
        let (columns, write_header) = if layout.is_empty() {
            (payload_columns(rows), true)
        } else {
            (layout.columns.clone(), false)
        };

        let values = SheetTable::normalize_rows(&columns, rows);
        debug!(
            sheet = %sheet,
            submitted = rows.len(),
            kept = values.len(),
            "normalized edit payload"
        );

        match self.kind {
            FileKind::Xlsx => self.write_xlsx(sheet, &layout, &columns, write_header, &values)?,
            FileKind::Csv => self.write_csv(&columns, write_header, &values)?,
            FileKind::Xls => return Err(xls_not_writable()),
        }

        info!(
            path = %self.path.display(),
            sheet = %sheet,
            rows = values.len(),
            "sheet rewritten"
        );

        let mut table = SheetTable::new(columns);
        for row in values {
            table.push_values(row);
        }
        Ok(table)
    }

    fn write_xlsx(
        &self,
        sheet: &str,
        layout: &SheetLayout,
        columns: &[String],
        write_header: bool,
        values: &[Vec<String>],
    ) -> SheetResult<()> {
        if columns.is_empty() {
            return Ok(());
        }

        let mut book = umya_spreadsheet::reader::xlsx::read(&self.path)
            .map_err(|e| SheetError::Parse(format!("{:?}", e)))?;
        let worksheet = book
            .get_sheet_by_name_mut(sheet)
            .ok_or_else(|| SheetError::not_found(format!("Sheet '{}' not found", sheet)))?;

        // umya coordinates are 1-based (col, row)
        let header_row = layout.header_row + 1;
        let first_col = layout.first_col + 1;
        let last_col = first_col + columns.len() as u32 - 1;

        if write_header {
            for (offset, name) in columns.iter().enumerate() {
                worksheet
                    .get_cell_mut((first_col + offset as u32, header_row))
                    .set_value_string(name.clone());
            }
        }

        let highest_row = worksheet.get_highest_row();
        for row in (header_row + 1)..=highest_row {
            for col in first_col..=last_col {
                if worksheet.get_cell((col, row)).is_some() {
                    worksheet.get_cell_mut((col, row)).set_cell_value(umya_spreadsheet::CellValue::default());
                }
            }
        }

        for (i, row_values) in values.iter().enumerate() {
            let row = header_row + 1 + i as u32;
            for (offset, value) in row_values.iter().enumerate() {
                let cell = worksheet.get_cell_mut((first_col + offset as u32, row));
                if value.is_empty() {
                    cell.set_cell_value(umya_spreadsheet::CellValue::default());
                    continue;
                }
                match as_number(value) {
                    Some(n) => {
                        cell.set_value_number(n);
                    }
                    None => {
                        cell.set_value_string(value.clone());
                    }
                }
            }
        }

        umya_spreadsheet::writer::xlsx::write(&book, &self.path)
            .map_err(|e| SheetError::Internal(format!("failed to write workbook: {:?}", e)))?;
        Ok(())
    }

    fn write_csv(
        &self,
        columns: &[String],
        write_header: bool,
        values: &[Vec<String>],
    ) -> SheetResult<()> {
        let header = if write_header {
            columns.to_vec()
        } else {
            self.raw_csv_header()?.unwrap_or_else(|| columns.to_vec())
        };

        let mut writer = csv::Writer::from_path(&self.path)?;
        if !header.is_empty() {
            writer.write_record(&header)?;
        }
        for row in values {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Header line exactly as stored (before blank/duplicate renaming)
    fn raw_csv_header(&self) -> SheetResult<Option<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        match reader.records().next() {
            Some(record) => Ok(Some(record?.iter().map(str::to_string).collect())),
            None => Ok(None),
        }
    }
}

fn xls_not_writable() -> SheetError {
    SheetError::Unsupported(
        "Saving legacy .xls workbooks is not supported; upload the file as .xlsx".to_string(),
    )
}

/// Keys of the submitted rows in first-seen order
fn payload_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in rows.iter().flat_map(|row| row.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

/// Store as a number only when it reads back as the same text
fn as_number(value: &str) -> Option<f64> {
    let n: f64 = value.trim().parse().ok()?;
    (n.is_finite() && format_number(n) == value).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number_keeps_text_that_would_change() {
        assert_eq!(as_number("1"), Some(1.0));
        assert_eq!(as_number("-2.5"), Some(-2.5));
        assert_eq!(as_number("007"), None);
        assert_eq!(as_number("1e3"), None);
        assert_eq!(as_number("1.50"), None);
        assert_eq!(as_number("abc"), None);
        assert_eq!(as_number(""), None);
        assert_eq!(as_number("NaN"), None);
    }

    #[test]
    fn test_xls_is_rejected_and_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("legacy.xls");
        std::fs::write(&path, b"not really a workbook").unwrap();

        let err = SheetWriter::new(&path, FileKind::Xls)
            .write_rows("Sheet1", &[])
            .unwrap_err();
        assert!(matches!(err, SheetError::Unsupported(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"not really a workbook");
    }

    #[test]
    fn test_payload_columns_first_seen_order() {
        let rows: Vec<Row> = vec![
            [("B", "1"), ("A", "2")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            [("C", "3"), ("A", "4")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ];
        assert_eq!(payload_columns(&rows), vec!["B", "A", "C"]);
    }
}
