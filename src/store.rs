//! Persistence of validated records.

use crate::models::PipelineRecord;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument};

pub const RECORDS_FILE: &str = "records.jsonl";

/// Where accepted records go. Called once per record that passed validation.
pub trait RecordStore {
    async fn insert(&self, record: &PipelineRecord, batch_id: &str) -> Result<(), Box<dyn Error>>;
}

/// Appends one JSON object per line to `<dir>/records.jsonl`.
///
/// The line's `batchid` is always the batch the record was inserted under.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(RECORDS_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonlStore {
    #[instrument(level = "info", skip_all, fields(url = %record.url, %batch_id))]
    async fn insert(&self, record: &PipelineRecord, batch_id: &str) -> Result<(), Box<dyn Error>> {
        let mut line = if record.batchid == batch_id {
            serde_json::to_string(record)?
        } else {
            let mut tagged = record.clone();
            tagged.batchid = batch_id.to_string();
            serde_json::to_string(&tagged)?
        };
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        info!(path = %self.path.display(), "Stored record");
        Ok(())
    }
}
