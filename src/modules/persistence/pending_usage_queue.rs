use super::json_file::{read_json_or_default, write_json_atomic};
use crate::constants::PENDING_USAGE_FILE;
use crate::error::AppResult;
use crate::models::PendingUsageRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    #[serde(default)]
    records: Vec<PendingUsageRecord>,
}

/// Durable FIFO of usage reports awaiting delivery.
pub struct PendingUsageQueue {
    path: PathBuf,
    records: Mutex<Vec<PendingUsageRecord>>,
}

impl PendingUsageQueue {
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(PENDING_USAGE_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory queue with the file contents. On an I/O error the queue is untouched.
    pub fn load(&self) -> AppResult<()> {
        let file: QueueFile = read_json_or_default(&self.path)?;
        *self.records.lock() = file.records;
        Ok(())
    }

    pub fn save(&self) -> AppResult<()> {
        let records = self.records.lock();
        Self::persist(&self.path, &records)
    }

    pub fn enqueue(&self, record: PendingUsageRecord) -> AppResult<()> {
        let mut records = self.records.lock();
        records.push(record);
        Self::persist(&self.path, &records)
    }

    /// Removes the first record matching the exact pair. Absent pairs cause no write.
    pub fn dequeue(&self, listing_id: i64, used_at: &str) -> AppResult<()> {
        let mut records = self.records.lock();
        let Some(index) = records.iter().position(|r| r.matches(listing_id, used_at)) else {
            return Ok(());
        };
        records.remove(index);
        Self::persist(&self.path, &records)
    }

    pub fn get_all(&self) -> Vec<PendingUsageRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn persist(path: &Path, records: &[PendingUsageRecord]) -> AppResult<()> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            records: &'a [PendingUsageRecord],
        }
        write_json_atomic(path, &Borrowed { records })
    }
}
