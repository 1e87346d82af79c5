//! Spreadsheet reading and writing
//!
//! - Read: CSV / XLSX / XLS → header + string rows (calamine, csv)
//! - Dropdowns: XLSX list validations → allowed values per header or cell
//! - Write: replacement rows back into the stored file (umya-spreadsheet, csv)

mod package;
mod reader;
pub mod reference;
pub mod validation;
mod writer;

pub use package::XlsxPackage;
pub use reader::{cell_text, format_number, SheetReader};
pub use reference::{CellRange, CellRef, SheetReference};
pub use validation::{ListRule, ValidationSource};
pub use writer::SheetWriter;

/// Where a sheet's table sits inside the grid (all zero-based, absolute)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetLayout {
    /// Row holding the column headers
    pub header_row: u32,
    /// Column of the first header
    pub first_col: u32,
    /// Header texts, left to right
    pub columns: Vec<String>,
    /// Last used row in the sheet
    pub last_row: u32,
    /// Sheet row of each table row, in table order (blank rows are skipped)
    pub data_rows: Vec<u32>,
}

impl SheetLayout {
    pub fn first_data_row(&self) -> u32 {
        self.header_row + 1
    }

    /// Header text for an absolute column index, if the column is part of the table
    pub fn header_for(&self, col: u32) -> Option<&str> {
        let offset = col.checked_sub(self.first_col)?;
        self.columns.get(offset as usize).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column letters of the table's columns, left to right
    pub fn column_letters(&self) -> Vec<String> {
        (0..self.columns.len() as u32)
            .map(|offset| reference::column_index_to_letter(self.first_col + offset))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_header_for_offsets_first_col() {
        let layout = SheetLayout {
            header_row: 2,
            first_col: 1,
            columns: vec!["A".into(), "B".into()],
            last_row: 9,
            data_rows: vec![3, 5],
        };
        assert_eq!(layout.first_data_row(), 3);
        assert_eq!(layout.header_for(0), None);
        assert_eq!(layout.header_for(1), Some("A"));
        assert_eq!(layout.header_for(2), Some("B"));
        assert_eq!(layout.header_for(3), None);
        assert_eq!(layout.column_letters(), vec!["B", "C"]);
    }
}
