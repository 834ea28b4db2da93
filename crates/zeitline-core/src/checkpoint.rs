//! Durable, append-only completion checkpoints.
//!
//! One checkpoint file per worker, one completed work-unit key per
//! line. The skip set loaded at startup is the union over all workers'
//! files, so a run restarted with a different worker count still skips
//! everything already done.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

/// Filename for one worker's checkpoint shard.
pub fn checkpoint_filename(worker_id: usize) -> String {
    format!("progress_worker_{worker_id:04}.log")
}

/// Load the "already done" set from every checkpoint file in `dir`.
///
/// A final line without its trailing newline is a torn write from a
/// crash mid-append; it is ignored, which at worst redoes one unit.
pub fn load_skip_set(dir: &Path) -> io::Result<FxHashSet<String>> {
    let mut skip = FxHashSet::default();
    if !dir.exists() {
        return Ok(skip);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if !name.starts_with("progress_worker_") || !name.ends_with(".log") {
            continue;
        }
        let mut content = String::new();
        File::open(&path)?.read_to_string(&mut content)?;
        for line in content.split_inclusive('\n') {
            let Some(key) = line.strip_suffix('\n') else {
                log::warn!("{name}: ignoring torn checkpoint line: {line:?}");
                continue;
            };
            if !key.is_empty() {
                skip.insert(key.to_string());
            }
        }
    }
    Ok(skip)
}

/// Append-only checkpoint writer owned by one worker.
///
/// [`mark_done`](CheckpointStore::mark_done) appends the key, flushes,
/// and syncs before returning, so a recorded key implies the entry is
/// on disk. Callers must durably write the corresponding output record
/// first — checkpoint strictly after output.
pub struct CheckpointStore {
    file: File,
    path: PathBuf,
    entries_written: usize,
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("path", &self.path)
            .field("entries_written", &self.entries_written)
            .finish()
    }
}

impl CheckpointStore {
    /// Open (appending, never truncating) this worker's checkpoint file.
    pub fn open(dir: &Path, worker_id: usize) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(checkpoint_filename(worker_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file,
            path,
            entries_written: 0,
        })
    }

    /// Durably record `key` as completed.
    pub fn mark_done(&mut self, key: &str) -> io::Result<()> {
        self.file.write_all(key.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.entries_written += 1;
        Ok(())
    }

    pub fn entries_written(&self) -> usize {
        self.entries_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
