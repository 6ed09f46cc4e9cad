//! Storage layer: attendance records and the student directory.
//!
//! Everything lives in process memory; a restart starts from an empty list.

use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub mod directory;
pub mod models;

use models::AttendanceRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duplicate attendance id: {0}")]
    DuplicateId(String),
}

/// Append-only attendance list shared by the scan and admin screens.
#[async_trait::async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn append(&self, record: AttendanceRecord) -> Result<(), StorageError>;

    /// Records in insertion order.
    async fn all(&self) -> Vec<AttendanceRecord>;

    /// Records most-recent first.
    async fn all_descending(&self) -> Vec<AttendanceRecord> {
        let mut records = self.all().await;
        records.reverse();
        records
    }

    async fn len(&self) -> usize {
        self.all().await.len()
    }
}

#[derive(Default)]
struct Inner {
    records: Vec<AttendanceRecord>,
    ids: HashSet<String>,
}

/// In-memory store. Appends are serialized by the lock.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    inner: RwLock<Inner>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn append(&self, record: AttendanceRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.ids.insert(record.id.clone()) {
            return Err(StorageError::DuplicateId(record.id));
        }
        debug!(id = %record.id, student = %record.student_id, "attendance appended");
        inner.records.push(record);
        Ok(())
    }

    async fn all(&self) -> Vec<AttendanceRecord> {
        self.inner.read().await.records.clone()
    }

    async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}
