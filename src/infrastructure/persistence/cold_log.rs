//! Append-only JSON-lines log backing [`super::VolatileStore`].
//!
//! Each line is one record:
//!
//! ```json
//! {"key":"abcDEFgh","value":"https://example.com","user_id":"…"}
//! {"key":"abcDEFgh","value":"https://example.com","user_id":"…","is_deleted":true}
//! ```
//!
//! `user_id` and `is_deleted` are optional so logs written with only
//! `key`/`value` still replay. A later record for the same key overrides the
//! earlier one; soft deletes are written as tombstone records.
//!
//! A crash during an append can leave a partial last line without its
//! newline. Replay drops such a tail and truncates it away; a malformed line
//! anywhere else is an error.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::UrlItem;
use crate::error::{StoreError, StoreResult};

/// One line of the cold log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColdLogEntry {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ColdLogEntry {
    pub fn from_item(item: &UrlItem) -> Self {
        Self {
            key: item.key.clone(),
            value: item.original_url.clone(),
            user_id: Some(item.owner_id),
            is_deleted: item.is_deleted,
        }
    }

    /// Records without an owner are attributed to the nil UUID.
    pub fn into_item(self) -> UrlItem {
        UrlItem {
            key: self.key,
            original_url: self.value,
            owner_id: self.user_id.unwrap_or_else(Uuid::nil),
            is_deleted: self.is_deleted,
        }
    }
}

/// Open handle on the log file, positioned for appends.
#[derive(Debug)]
pub struct ColdLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl ColdLog {
    /// Replays `path` and opens it for appending, creating it when missing.
    ///
    /// # Errors
    ///
    /// [`StoreError::ColdLog`] when the file cannot be read or opened, or a
    /// line is not a valid record (the message names the line number).
    pub fn open(path: impl AsRef<Path>) -> StoreResult<(Self, Vec<ColdLogEntry>)> {
        let path = path.as_ref().to_path_buf();
        let replayed = replay(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::ColdLog(format!("open {}: {}", path.display(), e)))?;

        match replayed.tail {
            Tail::Clean => {}
            Tail::Torn { valid_len } => {
                file.set_len(valid_len).map_err(|e| {
                    StoreError::ColdLog(format!("truncate {}: {}", path.display(), e))
                })?;
            }
            Tail::MissingNewline => {
                file.write_all(b"\n").map_err(|e| {
                    StoreError::ColdLog(format!("write {}: {}", path.display(), e))
                })?;
            }
        }

        info!(
            "Cold log {} opened, {} record(s) replayed",
            path.display(),
            replayed.entries.len()
        );

        Ok((
            Self {
                path,
                file: Arc::new(Mutex::new(file)),
            },
            replayed.entries,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` with a single write call on the blocking pool.
    pub async fn append(&mut self, entries: &[ColdLogEntry]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)
                .map_err(|e| StoreError::ColdLog(format!("encode record: {}", e)))?;
            buf.push(b'\n');
        }

        let file = Arc::clone(&self.file);
        let written = tokio::task::spawn_blocking(move || {
            let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            file.write_all(&buf).and_then(|()| file.flush())
        })
        .await
        .map_err(|e| StoreError::ColdLog(format!("write task failed: {}", e)))?;

        written
            .map_err(|e| StoreError::ColdLog(format!("write {}: {}", self.path.display(), e)))?;

        debug!("Appended {} record(s) to cold log", entries.len());
        Ok(())
    }
}

/// State of the end of the file after replay.
#[derive(Debug, PartialEq, Eq)]
enum Tail {
    Clean,
    /// Unparsable last line without a newline; keep the first `valid_len` bytes.
    Torn { valid_len: u64 },
    /// Valid last record that lacks its newline.
    MissingNewline,
}

struct Replayed {
    entries: Vec<ColdLogEntry>,
    tail: Tail,
}

fn replay(path: &Path) -> StoreResult<Replayed> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(Replayed {
                entries: Vec::new(),
                tail: Tail::Clean,
            });
        }
        Err(e) => {
            return Err(StoreError::ColdLog(format!(
                "read {}: {}",
                path.display(),
                e
            )));
        }
    };

    let mut entries = Vec::new();
    let mut tail = Tail::Clean;
    let mut offset = 0;

    for (index, raw) in content.split_inclusive(|b| *b == b'\n').enumerate() {
        let line_no = index + 1;
        let start = offset;
        offset += raw.len();
        let terminated = raw.ends_with(b"\n");

        let line = String::from_utf8_lossy(raw);
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ColdLogEntry>(line.trim_end()) {
            Ok(entry) => {
                entries.push(entry);
                if !terminated {
                    tail = Tail::MissingNewline;
                }
            }
            Err(e) if !terminated => {
                warn!(
                    "{}:{}: dropping partial last record ({} byte(s)): {}",
                    path.display(),
                    line_no,
                    raw.len(),
                    e
                );
                tail = Tail::Torn {
                    valid_len: start as u64,
                };
            }
            Err(e) => {
                return Err(StoreError::ColdLog(format!(
                    "{}:{}: malformed record: {}",
                    path.display(),
                    line_no,
                    e
                )));
            }
        }
    }

    Ok(Replayed { entries, tail })
}
