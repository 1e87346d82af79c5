//! Upload registry
//!
//! Maps an uploaded file's original name to where it is stored. Handlers get
//! the registry injected through the server state, so tests can build their
//! own instance instead of sharing process-wide state.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::UploadRecord;

/// Storage for upload records
pub trait UploadStore: Send + Sync {
    /// Insert or overwrite; returns the entry that was replaced
    fn put(&self, record: UploadRecord) -> Option<UploadRecord>;

    fn get(&self, filename: &str) -> Option<UploadRecord>;

    /// Mark the entry as edited now; `false` if it is not registered
    fn touch(&self, filename: &str) -> bool;

    fn evict(&self, filename: &str) -> Option<UploadRecord>;

    /// All entries ordered by filename
    fn list(&self) -> Vec<UploadRecord>;
}

/// In-process registry
#[derive(Default)]
pub struct MemoryRegistry {
    records: RwLock<HashMap<String, UploadRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UploadStore for MemoryRegistry {
    fn put(&self, record: UploadRecord) -> Option<UploadRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.filename.clone(), record)
    }

    fn get(&self, filename: &str) -> Option<UploadRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(filename).cloned()
    }

    fn touch(&self, filename: &str) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(filename) {
            Some(record) => {
                record.modified_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    fn evict(&self, filename: &str) -> Option<UploadRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(filename)
    }

    fn list(&self) -> Vec<UploadRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<UploadRecord> = records.values().cloned().collect();
        out.sort_by(|a, b| a.filename.cmp(&b.filename));
        out
    }
}
