//! SheetDesk HTTP API
//!
//! Run with `sheetdesk serve` or `sheetdesk-server`.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server, AppState};
