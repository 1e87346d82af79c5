//! CLI command handlers

pub mod commands;

pub use commands::{check_db, dropdowns, serve, sheets, show};
