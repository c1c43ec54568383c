//! Local JSON-lines audit file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::audit_event::AuditEvent;
use crate::domain::repositories::AuditSink;
use crate::error::AuditError;

/// Appends every event as one JSON line.
pub struct FileAuditSink {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl FileAuditSink {
    /// Opens (or creates) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || {
            // Poisoning only means another writer panicked mid-line; keep appending.
            let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            file.write_all(&line)?;
            file.flush()
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }
}
