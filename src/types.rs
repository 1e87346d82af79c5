use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{SheetError, SheetResult};
use crate::excel::SheetLayout;

//==============================================================================
// File Kinds
//==============================================================================

/// Spreadsheet container formats accepted on upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
}

impl FileKind {
    /// Detect the kind from a filename extension (case-insensitive)
    pub fn from_filename(filename: &str) -> SheetResult<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(FileKind::Csv),
            Some("xlsx") => Ok(FileKind::Xlsx),
            Some("xls") => Ok(FileKind::Xls),
            _ => Err(SheetError::validation(
                "Invalid file type. Only .csv, .xlsx and .xls files are accepted",
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Xlsx => "xlsx",
            FileKind::Xls => "xls",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileKind::Csv => "text/csv",
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileKind::Xls => "application/vnd.ms-excel",
        }
    }

    /// Only workbook containers carry data-validation rules
    pub fn has_validations(&self) -> bool {
        matches!(self, FileKind::Xlsx)
    }
}

//==============================================================================
// Upload Registry Entries
//==============================================================================

/// One registered upload, keyed by the client's original filename
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub kind: FileKind,
    pub sheets: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    pub fn new(filename: String, path: PathBuf, kind: FileKind, sheets: Vec<String>) -> Self {
        Self {
            filename,
            path,
            kind,
            sheets,
            uploaded_at: Utc::now(),
            modified_at: None,
        }
    }

    /// Resolve an optional sheet request against the cached sheet list.
    /// `None` (or an empty name) picks the first sheet.
    pub fn resolve_sheet(&self, requested: Option<&str>) -> SheetResult<String> {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => self
                .sheets
                .iter()
                .find(|s| s.as_str() == name)
                .cloned()
                .ok_or_else(|| SheetError::not_found(format!("Sheet '{}' not found", name))),
            None => self
                .sheets
                .first()
                .cloned()
                .ok_or_else(|| SheetError::not_found("Workbook has no sheets")),
        }
    }

    pub fn is_edited(&self) -> bool {
        self.modified_at.is_some()
    }
}

//==============================================================================
// Sheet Tables
//==============================================================================

/// One data row: header -> cell text, in header order
pub type Row = IndexMap<String, String>;

/// Allowed values keyed by column header or A1 cell coordinate
pub type DropdownMap = BTreeMap<String, Vec<String>>;

/// A sheet materialized as a header row plus string rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl SheetTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Push a row given as positional values; missing trailing values become ""
    pub fn push_values(&mut self, values: Vec<String>) {
        let mut values = values.into_iter();
        let row: Row = self
            .columns
            .iter()
            .map(|col| (col.clone(), values.next().unwrap_or_default()))
            .collect();
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Project submitted rows onto `columns`: unknown keys are dropped, missing
    /// keys become "", and rows with no non-empty known value are discarded.
    pub fn normalize_rows(columns: &[String], submitted: &[Row]) -> Vec<Vec<String>> {
        submitted
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).cloned().unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .filter(|values| values.iter().any(|v| !v.trim().is_empty()))
            .collect()
    }
}

/// Edit payload: table plus dropdown metadata.
///
/// Cell-keyed dropdowns use absolute sheet coordinates, so the view also
/// carries where the table sits: the letter of each column, the 1-based
/// header row and the 1-based sheet row of each entry in `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetView {
    pub columns: Vec<String>,
    pub data: Vec<Row>,
    pub dropdowns: DropdownMap,
    pub column_letters: Vec<String>,
    pub header_row: u32,
    pub row_numbers: Vec<u32>,
}

impl SheetView {
    pub fn new(table: SheetTable, dropdowns: DropdownMap) -> Self {
        Self {
            columns: table.columns,
            data: table.rows,
            dropdowns,
            ..Default::default()
        }
    }

    pub fn with_positions(mut self, layout: &SheetLayout) -> Self {
        self.column_letters = layout.column_letters();
        self.header_row = layout.header_row + 1;
        self.row_numbers = layout.data_rows.iter().map(|r| r + 1).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_file_kind_from_filename() {
        assert_eq!(FileKind::from_filename("a.csv").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_filename("A.XLSX").unwrap(), FileKind::Xlsx);
        assert_eq!(FileKind::from_filename("old.xls").unwrap(), FileKind::Xls);
        assert!(FileKind::from_filename("notes.txt").is_err());
        assert!(FileKind::from_filename("noextension").is_err());
        assert!(FileKind::from_filename("").is_err());
    }

    #[test]
    fn test_resolve_sheet_defaults_to_first() {
        let record = UploadRecord::new(
            "book.xlsx".to_string(),
            PathBuf::from("/tmp/book.xlsx"),
            FileKind::Xlsx,
            vec!["Sheet1".to_string(), "Sheet2".to_string()],
        );
        assert_eq!(record.resolve_sheet(None).unwrap(), "Sheet1");
        assert_eq!(record.resolve_sheet(Some("")).unwrap(), "Sheet1");
        assert_eq!(record.resolve_sheet(Some("Sheet2")).unwrap(), "Sheet2");
        assert!(matches!(
            record.resolve_sheet(Some("Missing")),
            Err(SheetError::NotFound(_))
        ));
    }

    #[test]
    fn test_push_values_pads_missing() {
        let mut table = SheetTable::new(vec!["A".to_string(), "B".to_string()]);
        table.push_values(vec!["1".to_string()]);
        assert_eq!(table.rows[0], row(&[("A", "1"), ("B", "")]));
    }

    #[test]
    fn test_normalize_rows_drops_unknown_columns_and_empty_rows() {
        let columns = vec!["A".to_string(), "B".to_string()];
        let submitted = vec![
            row(&[("A", "1"), ("B", "2"), ("Extra", "x")]),
            row(&[("A", ""), ("B", "  ")]),
            row(&[("Extra", "only unknown")]),
            row(&[("B", "3")]),
        ];
        let out = SheetTable::normalize_rows(&columns, &submitted);
        assert_eq!(
            out,
            vec![
                vec!["1".to_string(), "2".to_string()],
                vec!["".to_string(), "3".to_string()],
            ]
        );
    }
}
