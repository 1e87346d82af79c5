//! Optional SQL mirror of saved rows
//!
//! After a sheet is saved the written rows can be appended to a log table.
//! The file on disk is the source of truth; a mirror failure is reported to
//! the caller but never undoes the file write.

mod mirror;

pub use mirror::{DbConfig, LogMirror, SqlMirror};

use serde::{Deserialize, Serialize};

/// What gets mirrored on save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MirrorMode {
    /// No database writes
    #[default]
    Off,
    /// Every saved row as JSON into `file_logs`
    Rows,
    /// Two columns per row as attribute/value into `excel_data`
    Pairs,
    /// Every saved row into a table named after the sheet, one column per header
    Sheet,
}

impl MirrorMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, MirrorMode::Off)
    }
}
