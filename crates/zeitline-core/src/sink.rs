//! Append-only JSONL output sinks.
//!
//! A worker's partial output shard and its failure log are both JSONL
//! files that are only ever appended to — never truncated — so a
//! restarted run continues the same files.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filename for one worker's partial output shard.
pub fn shard_filename(worker_id: usize) -> String {
    format!("pages_worker_{worker_id:04}.jsonl")
}

/// Filename for one worker's failure log.
pub fn failure_filename(worker_id: usize) -> String {
    format!("failures_worker_{worker_id:04}.jsonl")
}

/// One permanently failed work unit, for re-run triage.
#[derive(Debug, Serialize, Deserialize)]
pub struct FailureRecord {
    pub unit: String,
    /// "permanent" or "extraction"
    pub kind: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Append-only writer of one JSON record per line.
pub struct JsonlSink {
    file: File,
    path: PathBuf,
    rows_written: usize,
}

impl std::fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish()
    }
}

impl JsonlSink {
    /// Open `dir/filename` for appending, creating it if absent.
    pub fn open(dir: &Path, filename: &str) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file,
            path,
            rows_written: 0,
        })
    }

    /// Append one record as a JSON line and flush it to the OS.
    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        let line = serde_json::to_string(record).map_err(io::Error::other)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Force the shard to disk. Call before checkpointing the unit so
    /// a recorded checkpoint always implies a durable output record.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        text: String,
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonlSink::open(dir.path(), &shard_filename(0)).unwrap();
        sink.append(&Row {
            id: 1,
            text: "erste".into(),
        })
        .unwrap();
        sink.append(&Row {
            id: 2,
            text: "zweite".into(),
        })
        .unwrap();
        sink.sync().unwrap();
        assert_eq!(sink.rows_written(), 2);

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let rows: Vec<Row> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
    }

    #[test]
    fn reopen_never_truncates() {
        let dir = TempDir::new().unwrap();
        {
            let mut sink = JsonlSink::open(dir.path(), &shard_filename(2)).unwrap();
            sink.append(&Row {
                id: 1,
                text: "alt".into(),
            })
            .unwrap();
        }
        {
            let mut sink = JsonlSink::open(dir.path(), &shard_filename(2)).unwrap();
            sink.append(&Row {
                id: 2,
                text: "neu".into(),
            })
            .unwrap();
        }
        let content = std::fs::read_to_string(dir.path().join(shard_filename(2))).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn failure_record_roundtrip() {
        let rec = FailureRecord {
            unit: "nfp|18990305|4".into(),
            kind: "permanent".into(),
            attempts: 4,
            last_error: "HTTP 404".into(),
        };
        let line = serde_json::to_string(&rec).unwrap();
        let back: FailureRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back.unit, rec.unit);
        assert_eq!(back.attempts, 4);
    }
}
