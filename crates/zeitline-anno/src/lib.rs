//! ANNO scraping pipeline: issue list → parallel page workers →
//! per-worker output shards with durable checkpoints.
//!
//! One work unit is one newspaper page, addressed by
//! `(aid, issue date, page index)`. Pages of an issue are walked in
//! ascending order until the archive signals the end of the issue.

pub mod config;
pub mod extract;
pub mod issues;
pub mod record;
pub mod runner;
pub mod state;
pub mod stats;
pub mod worker;

pub use config::Config;
pub use issues::{Issue, load_issues};
pub use record::PageRecord;
pub use runner::run;
pub use stats::{RunSummary, WorkerStats};
