//! Newline-delimited JSON sink with a derived checkpoint
//!
//! Every record is one self-contained JSON line, flushed before `write`
//! returns: a crash after N successful writes leaves exactly N complete,
//! parseable lines. The sink is the single writer of the output handle and
//! of the checkpoint (the set of ids already written); concurrent callers
//! serialize through a mutex.
//!
//! Resumption derives the checkpoint from the output file itself, so there is
//! no side-car state to drift out of sync. A trailing partial line (process
//! killed mid-write) is truncated away before appending.

use crate::model::{FailureEvent, NormalizedRecord};
use crate::Result;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

/// Append-only NDJSON dataset writer
pub struct JsonlSink {
    inner: Mutex<SinkInner>,
}

struct SinkInner {
    writer: BufWriter<File>,
    seen: HashSet<String>,
}

impl JsonlSink {
    /// Creates a fresh sink, truncating any existing dataset
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Mutex::new(SinkInner {
                writer: BufWriter::new(file),
                seen: HashSet::new(),
            }),
        })
    }

    /// Opens a sink over an existing dataset, loading its ids as the
    /// checkpoint; a missing file starts empty.
    pub fn resume(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Self::create(path);
        }

        let content = std::fs::read(path)?;

        // Only the prefix up to the last newline is trusted; anything after
        // it is a partial line from an interrupted write.
        let complete_len = content
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        if complete_len < content.len() {
            tracing::warn!(
                "Dataset {} ends mid-line, truncating {} trailing bytes",
                path.display(),
                content.len() - complete_len
            );
        }

        let mut seen = HashSet::new();
        for line in content[..complete_len]
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
        {
            match serde_json::from_slice::<serde_json::Value>(line) {
                Ok(value) => match value.get("id").and_then(|v| v.as_str()) {
                    Some(id) => {
                        seen.insert(id.to_string());
                    }
                    None => tracing::warn!("Dataset line without an id, ignoring"),
                },
                Err(e) => tracing::warn!("Unparseable dataset line, ignoring: {}", e),
            }
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.set_len(complete_len as u64)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            inner: Mutex::new(SinkInner {
                writer: BufWriter::new(file),
                seen,
            }),
        })
    }

    /// Returns whether an item id is already recorded in the checkpoint
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().unwrap().seen.contains(id)
    }

    /// Number of ids in the checkpoint
    pub fn checkpoint_len(&self) -> usize {
        self.inner.lock().unwrap().seen.len()
    }

    /// Appends one record as a JSON line and flushes it.
    ///
    /// Returns `Ok(false)` without writing when the id is already in the
    /// checkpoint, keeping ids unique within the output. The checkpoint is
    /// updated only after the line reached the file.
    pub fn write(&self, record: &NormalizedRecord) -> Result<bool> {
        let line = serde_json::to_string(record)?;

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if inner.seen.contains(&record.id) {
            return Ok(false);
        }

        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        inner.writer.flush()?;

        inner.seen.insert(record.id.clone());
        Ok(true)
    }
}

/// Append-only NDJSON log of per-item failure events
pub struct FailureLog {
    writer: Mutex<BufWriter<File>>,
}

impl FailureLog {
    /// Opens the failure log; `fresh` truncates, otherwise events append
    pub fn open(path: &Path, fresh: bool) -> Result<Self> {
        let file = if fresh {
            File::create(path)?
        } else {
            OpenOptions::new().create(true).append(true).open(path)?
        };
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Appends one failure event and flushes it
    pub fn write(&self, event: &FailureEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
