//! History sink — where completed recognitions are handed off for storage.
//!
//! The recognizer only needs `record`; persistence is the collaborator's
//! business. `MemoryHistory` is the in-process implementation used by the
//! CLI and tests.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::llm::types::{Category, ImageInput, RecognitionResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub result: RecognitionResult,
    pub source_name: Option<String>,
    pub size_bytes: usize,
    /// Hex SHA-256 of the image bytes.
    pub image_sha256: String,
    pub mime_type: String,
    pub requested_category: Category,
    /// Unix seconds.
    pub recorded_at: u64,
}

impl HistoryEntry {
    pub fn new(image: &ImageInput, category: Category, result: RecognitionResult) -> Self {
        Self {
            result,
            source_name: image.source_name.clone(),
            size_bytes: image.len(),
            image_sha256: sha256_hex(&image.bytes),
            mime_type: image.mime_type.clone(),
            requested_category: category,
            recorded_at: unix_now(),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub trait HistorySink: Send + Sync {
    fn record(&self, entry: HistoryEntry);
}

/// Keeps entries in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, entry: HistoryEntry) {
        log::debug!(
            "[HISTORY] {} ({} bytes)",
            entry.source_name.as_deref().unwrap_or("<unnamed>"),
            entry.size_bytes
        );
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
