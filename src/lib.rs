//! SheetDesk - browser editing for CSV and Excel files
//!
//! Uploads are stored on disk and registered by filename. A sheet is read as
//! a header row plus string rows, together with dropdown options derived from
//! the workbook's list validations, and saved back in place.
//!
//! # Features
//!
//! - CSV, XLSX and XLS reading (calamine)
//! - Dropdowns from list validations: literals, local and cross-sheet ranges,
//!   defined names
//! - In-place XLSX rewrite that keeps styles and validations (umya-spreadsheet)
//! - Optional SQL log of saved rows (sqlx, MySQL or SQLite)
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetdesk::excel::SheetReader;
//! use royalbit_sheetdesk::types::FileKind;
//!
//! let reader = SheetReader::new("budget.xlsx", FileKind::Xlsx);
//! let sheets = reader.sheet_names()?;
//! let view = reader.read_view(&sheets[0])?;
//!
//! println!("Columns: {:?}", view.columns);
//! println!("Dropdowns: {:?}", view.dropdowns);
//! # Ok::<(), royalbit_sheetdesk::error::SheetError>(())
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod excel;
pub mod registry;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{SheetError, SheetResult};
pub use registry::{MemoryRegistry, UploadStore};
pub use types::{FileKind, Row, SheetTable, SheetView, UploadRecord};
