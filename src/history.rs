//! In-session history of completed transformations.
//!
//! Newest first, append-only, unbounded, and gone when the session ends.

use crate::error::ColoriFxError;
use crate::pipeline::encode::EncodedImage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// One completed transformation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationRecord {
    id: String,
    original: EncodedImage,
    result: EncodedImage,
    created_at: DateTime<Utc>,
    instruction: String,
}

impl TransformationRecord {
    pub fn new(
        id: impl Into<String>,
        original: EncodedImage,
        result: EncodedImage,
        created_at: DateTime<Utc>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            original,
            result,
            created_at,
            instruction: instruction.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original(&self) -> &EncodedImage {
        &self.original
    }

    pub fn result(&self) -> &EncodedImage {
        &self.result
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

/// The history log.
#[derive(Debug, Default)]
pub struct HistoryStore {
    records: VecDeque<TransformationRecord>,
    last_id: i64,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id from the creation time in milliseconds. Two records
    /// created in the same millisecond get consecutive ids.
    pub fn next_id(&mut self, now: DateTime<Utc>) -> String {
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        id.to_string()
    }

    /// Prepend a record.
    pub fn append(&mut self, record: TransformationRecord) {
        self.records.push_front(record);
    }

    /// Snapshot of all records, newest first.
    pub fn list_all(&self) -> Vec<TransformationRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Result<&TransformationRecord, ColoriFxError> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ColoriFxError::RecordNotFound { id: id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
