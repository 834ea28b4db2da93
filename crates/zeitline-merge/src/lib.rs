//! Merge per-worker output shards into one corpus file.
//!
//! Reads every `pages_worker_*.jsonl` shard under the input directory,
//! deduplicates by `(aid, date, page)`, orders the records by
//! `(date, page, aid)`, and writes a single JSONL file. The output is
//! deterministic for a given set of shard files: shards are visited in
//! path order and ties keep the first record seen, except that a record
//! with text always wins over an empty-text duplicate.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use zeitline_anno::PageRecord;
use zeitline_core::fmt_num;

/// Parameters for one merge run.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Directory holding the `pages_worker_*.jsonl` shards.
    pub input_dir: PathBuf,
    /// Final merged file. Written atomically via a sibling tmp file.
    pub output_path: PathBuf,
}

/// Counters reported after a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub shard_files: usize,
    pub records_read: usize,
    pub parse_errors: usize,
    pub duplicates_dropped: usize,
    pub empty_replaced: usize,
    pub records_written: usize,
}

impl MergeSummary {
    pub fn log(&self) {
        log::info!(
            "merged {} shard files: {} records read, {} written, {} duplicates dropped ({} empty replaced), {} malformed lines skipped",
            self.shard_files,
            fmt_num(self.records_read),
            fmt_num(self.records_written),
            fmt_num(self.duplicates_dropped),
            fmt_num(self.empty_replaced),
            fmt_num(self.parse_errors),
        );
    }
}

/// Shard files under `dir`, in path order.
fn shard_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("pages_worker_*.jsonl");
    let pattern = pattern
        .to_str()
        .context("input directory path is not valid UTF-8")?;
    let mut paths: Vec<PathBuf> = glob::glob(pattern)
        .context("invalid shard glob pattern")?
        .collect::<std::result::Result<_, _>>()
        .context("cannot list shard files")?;
    paths.sort();
    Ok(paths)
}

/// Merge all shards under `config.input_dir` into `config.output_path`.
pub fn run(config: &MergeConfig) -> Result<MergeSummary> {
    let paths = shard_paths(&config.input_dir)?;
    if paths.is_empty() {
        bail!(
            "no shard files matching pages_worker_*.jsonl in {}",
            config.input_dir.display()
        );
    }

    let mut summary = MergeSummary {
        shard_files: paths.len(),
        ..MergeSummary::default()
    };
    let mut seen: FxHashMap<(String, NaiveDate, u32), PageRecord> = FxHashMap::default();

    for path in &paths {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("cannot read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: PageRecord = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(err) => {
                    log::warn!("{}:{}: skipping malformed line: {err}", path.display(), lineno + 1);
                    summary.parse_errors += 1;
                    continue;
                }
            };
            summary.records_read += 1;
            match seen.get(&record.key()) {
                None => {
                    seen.insert(record.key(), record);
                }
                Some(kept) if kept.text.is_empty() && !record.text.is_empty() => {
                    summary.duplicates_dropped += 1;
                    summary.empty_replaced += 1;
                    seen.insert(record.key(), record);
                }
                Some(_) => summary.duplicates_dropped += 1,
            }
        }
    }

    let mut records: Vec<PageRecord> = seen.into_values().collect();
    records.sort_by(|a, b| {
        (a.date, a.page, &a.aid).cmp(&(b.date, b.page, &b.aid))
    });
    summary.records_written = records.len();

    let tmp = config.output_path.with_extension("jsonl.tmp");
    {
        let file = File::create(&tmp).with_context(|| format!("cannot create {}", tmp.display()))?;
        let mut out = BufWriter::new(file);
        for record in &records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        out.into_inner()?.sync_data()?;
    }
    std::fs::rename(&tmp, &config.output_path)
        .with_context(|| format!("cannot finalize {}", config.output_path.display()))?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn record(aid: &str, date: &str, page: u32, text: &str) -> PageRecord {
        PageRecord {
            title: format!("{aid} title"),
            aid: aid.into(),
            date: date.parse().unwrap(),
            page,
            text: text.into(),
            extracted_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn write_shard(dir: &Path, worker: usize, records: &[PageRecord]) {
        let mut body = String::new();
        for r in records {
            body.push_str(&serde_json::to_string(r).unwrap());
            body.push('\n');
        }
        std::fs::write(dir.join(format!("pages_worker_{worker:04}.jsonl")), body).unwrap();
    }

    fn merge(dir: &Path) -> (MergeSummary, Vec<PageRecord>) {
        let output_path = dir.join("corpus.jsonl");
        let summary = run(&MergeConfig {
            input_dir: dir.to_path_buf(),
            output_path: output_path.clone(),
        })
        .unwrap();
        let body = std::fs::read_to_string(output_path).unwrap();
        let records = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, records)
    }

    #[test]
    fn orders_by_date_then_page_then_aid() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(
            dir.path(),
            0,
            &[
                record("zz", "1899-03-06", 1, "later"),
                record("nfp", "1899-03-05", 2, "p2"),
                record("abc", "1899-03-06", 1, "earlier aid"),
                record("nfp", "1899-03-05", 1, "p1"),
            ],
        );
        let (summary, records) = merge(dir.path());
        assert_eq!(summary.records_written, 4);
        let keys: Vec<_> = records.iter().map(|r| r.key()).collect();
        assert_eq!(
            keys,
            vec![
                ("nfp".to_string(), "1899-03-05".parse().unwrap(), 1),
                ("nfp".to_string(), "1899-03-05".parse().unwrap(), 2),
                ("abc".to_string(), "1899-03-06".parse().unwrap(), 1),
                ("zz".to_string(), "1899-03-06".parse().unwrap(), 1),
            ]
        );
    }

    #[test]
    fn older_issue_sorts_before_newer_aid() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(
            dir.path(),
            0,
            &[
                record("A", "2020-01-01", 1, "a1"),
                record("A", "2020-01-01", 2, "a2"),
            ],
        );
        write_shard(dir.path(), 1, &[record("B", "1999-03-05", 1, "b1")]);
        let (summary, records) = merge(dir.path());
        assert_eq!(summary.records_written, 3);
        assert_eq!(records[0].aid, "B");
        assert_eq!(records[0].date, "1999-03-05".parse().unwrap());
        assert_eq!(records[1].key(), ("A".to_string(), "2020-01-01".parse().unwrap(), 1));
        assert_eq!(records[2].key(), ("A".to_string(), "2020-01-01".parse().unwrap(), 2));
    }

    #[test]
    fn non_empty_text_replaces_empty_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), 0, &[record("nfp", "1899-03-05", 1, "")]);
        write_shard(dir.path(), 1, &[record("nfp", "1899-03-05", 1, "real text")]);
        let (summary, records) = merge(dir.path());
        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.duplicates_dropped, 1);
        assert_eq!(summary.empty_replaced, 1);
        assert_eq!(records[0].text, "real text");
    }

    #[test]
    fn first_record_wins_among_equal_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), 0, &[record("nfp", "1899-03-05", 1, "first")]);
        write_shard(dir.path(), 1, &[record("nfp", "1899-03-05", 1, "second")]);
        let (summary, records) = merge(dir.path());
        assert_eq!(summary.duplicates_dropped, 1);
        assert_eq!(summary.empty_replaced, 0);
        assert_eq!(records[0].text, "first");
    }

    #[test]
    fn malformed_lines_are_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let good = serde_json::to_string(&record("nfp", "1899-03-05", 1, "ok")).unwrap();
        std::fs::write(
            dir.path().join("pages_worker_0000.jsonl"),
            format!("{good}\nnot json at all\n{{\"half\": tru"),
        )
        .unwrap();
        let (summary, records) = merge(dir.path());
        assert_eq!(summary.parse_errors, 2);
        assert_eq!(summary.records_written, 1);
        assert_eq!(records[0].text, "ok");
    }

    #[test]
    fn merge_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(
            dir.path(),
            0,
            &[
                record("b", "1999-03-05", 1, "b1"),
                record("a", "1999-03-05", 1, ""),
            ],
        );
        write_shard(
            dir.path(),
            1,
            &[
                record("a", "1999-03-05", 1, "a1"),
                record("a", "1999-03-04", 2, "a0"),
            ],
        );
        let (_, first) = merge(dir.path());
        std::fs::remove_file(dir.path().join("corpus.jsonl")).unwrap();
        let (_, second) = merge(dir.path());
        assert_eq!(first, second);
        let keys: Vec<_> = first.iter().map(|r| (r.date, r.page, r.aid.clone())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn empty_input_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&MergeConfig {
            input_dir: dir.path().to_path_buf(),
            output_path: dir.path().join("out.jsonl"),
        });
        assert!(err.is_err());
    }
}
