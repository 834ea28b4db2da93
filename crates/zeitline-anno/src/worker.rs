//! The scraping worker: walks its assigned issues page by page,
//! fetching through the shared proxy pool and recording durable
//! progress after every page.
//!
//! Per page: skip-set check → rate-limit slot → fetch (retrying with a
//! fresh identity per attempt) → extract → append to the worker's
//! output shard → checkpoint. A single bad page never aborts the
//! worker; only an exhausted proxy pool or a checkpoint/output write
//! failure does.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;

use zeitline_core::checkpoint::CheckpointStore;
use zeitline_core::client::{FetchClient, FetchSuccess};
use zeitline_core::error::{FetchError, WorkerError};
use zeitline_core::is_shutdown_requested;
use zeitline_core::proxy::{ProxyIdentity, ProxyRotator};
use zeitline_core::rate::RateLimiter;
use zeitline_core::retry::RetryPolicy;
use zeitline_core::sink::{FailureRecord, JsonlSink, failure_filename, shard_filename};

use crate::extract::{Extraction, extract};
use crate::issues::Issue;
use crate::record::PageRecord;
use crate::state::{UnitEvent, UnitState, WorkUnit, transition};
use crate::stats::WorkerStats;

/// One fetch attempt through a given identity. The production
/// implementation is [`FetchClient`]; tests use stub fetchers.
pub trait PageFetcher: Sync {
    fn fetch_page(&self, url: &str, identity: &ProxyIdentity)
    -> Result<FetchSuccess, FetchError>;
}

impl PageFetcher for FetchClient {
    fn fetch_page(
        &self,
        url: &str,
        identity: &ProxyIdentity,
    ) -> Result<FetchSuccess, FetchError> {
        self.fetch(url, identity)
    }
}

/// Shared, injected per-run environment. One instance serves all
/// workers; the rotator and limiter synchronize internally.
pub struct WorkerEnv<F: PageFetcher> {
    pub fetcher: F,
    pub rotator: ProxyRotator,
    pub limiter: RateLimiter,
    pub policy: RetryPolicy,
    pub base_url: String,
    pub max_pages: u32,
}

/// Terminal outcome of fetching one unit.
#[derive(Debug)]
enum UnitOutcome {
    Fetched(String),
    Failed { attempts: u32, last_error: String },
    PoolExhausted,
}

/// Drive one unit through the fetch state machine.
///
/// Each attempt takes a fresh identity from the rotator, waits for its
/// rate-limit slot, and reports the outcome back to the pool. Backoff
/// sleeps happen between attempts, honoring any Retry-After hint.
fn fetch_unit<F: PageFetcher>(unit: &WorkUnit<'_>, env: &WorkerEnv<F>) -> UnitOutcome {
    let url = unit.url(&env.base_url);
    let key = unit.key();
    let mut state = UnitState::Pending;

    loop {
        state = transition(state, UnitEvent::Dispatch, env.policy.max_attempts);
        let UnitState::Fetching { attempt } = state else {
            unreachable!("dispatch always enters Fetching");
        };

        let identity = match env.rotator.next() {
            Ok(identity) => identity,
            Err(_) => return UnitOutcome::PoolExhausted,
        };
        env.limiter.acquire(identity.id);

        let attempt_start = Instant::now();
        match env.fetcher.fetch_page(&url, &identity) {
            Ok(success) => {
                env.rotator.report(identity.id, true);
                log::debug!(
                    "{key}: attempt {attempt} via {} ok in {:?}",
                    identity.label(),
                    success.latency
                );
                return UnitOutcome::Fetched(success.body);
            }
            Err(err) => {
                env.rotator.report(identity.id, false);
                let latency = attempt_start.elapsed();
                let event = if err.is_retryable() {
                    UnitEvent::TransientFailure
                } else {
                    UnitEvent::PermanentFailure
                };
                let retry_after = err.retry_after();
                let reason = err.to_string();
                state = transition(state, event, env.policy.max_attempts);
                match state {
                    UnitState::Retrying { attempt } => {
                        log::debug!(
                            "{key}: attempt {attempt}/{} via {} failed in {latency:?}: {reason}, retrying...",
                            env.policy.max_attempts,
                            identity.label()
                        );
                        std::thread::sleep(env.policy.delay(attempt, retry_after));
                    }
                    UnitState::Failed(_) => {
                        log::warn!(
                            "{key}: attempt {attempt} via {} failed in {latency:?}: {reason}, giving up",
                            identity.label()
                        );
                        return UnitOutcome::Failed {
                            attempts: attempt,
                            last_error: reason,
                        };
                    }
                    _ => unreachable!("failure transition leaves Retrying or Failed"),
                }
            }
        }
    }
}

/// Append the record to the shard, force it to disk, then checkpoint.
/// Strictly in that order: a recorded checkpoint implies the output
/// record is durable.
fn commit_page(
    shard: &mut JsonlSink,
    checkpoint: &mut CheckpointStore,
    record: &PageRecord,
    key: &str,
) -> Result<(), WorkerError> {
    shard.append(record).map_err(WorkerError::Output)?;
    shard.sync().map_err(WorkerError::Output)?;
    checkpoint.mark_done(key).map_err(WorkerError::Checkpoint)?;
    Ok(())
}

/// Run one worker over its assigned issue shard.
///
/// Returns stats rather than an error: a fatal stop is recorded in
/// `stats.fatal` so the distributor can let the other workers finish.
pub fn run_worker<F: PageFetcher>(
    worker_id: usize,
    issues: &[Issue],
    env: &WorkerEnv<F>,
    skip: &FxHashSet<String>,
    output_dir: &Path,
    pb: &ProgressBar,
) -> WorkerStats {
    let start = Instant::now();
    let mut stats = WorkerStats::new(worker_id, issues.len());

    let opened = (|| -> std::io::Result<_> {
        let checkpoint = CheckpointStore::open(output_dir, worker_id)?;
        let shard = JsonlSink::open(output_dir, &shard_filename(worker_id))?;
        let failures = JsonlSink::open(output_dir, &failure_filename(worker_id))?;
        Ok((checkpoint, shard, failures))
    })();
    let (mut checkpoint, mut shard, mut failures) = match opened {
        Ok(v) => v,
        Err(e) => {
            log::error!("worker {worker_id}: cannot open output files: {e}");
            stats.fatal = Some(format!("cannot open output files: {e}"));
            stats.elapsed = start.elapsed();
            return stats;
        }
    };

    'issues: for issue in issues {
        if is_shutdown_requested() {
            stats.stopped = true;
            break;
        }
        pb.set_message(format!("{} {}", issue.aid, issue.date));

        for page in 1..=env.max_pages {
            let unit = WorkUnit::new(issue, page);
            let key = unit.key();

            if skip.contains(&key) {
                stats.pages_skipped += 1;
                continue;
            }
            if is_shutdown_requested() {
                stats.stopped = true;
                break 'issues;
            }

            match fetch_unit(&unit, env) {
                UnitOutcome::Fetched(body) => match extract(&body, issue, Utc::now()) {
                    Ok(Extraction::NoSuchPage) => break,
                    Ok(Extraction::Record(record)) => {
                        if let Err(e) = commit_page(&mut shard, &mut checkpoint, &record, &key) {
                            log::error!("worker {worker_id}: {e}");
                            stats.fatal = Some(e.to_string());
                            break 'issues;
                        }
                        stats.pages_done += 1;
                    }
                    Err(err) => {
                        log::warn!("{key}: extraction failed: {err}");
                        if let Err(e) = failures.append(&FailureRecord {
                            unit: key,
                            kind: "extraction".to_string(),
                            attempts: 1,
                            last_error: err.to_string(),
                        }) {
                            log::error!("worker {worker_id}: failure log write failed: {e}");
                            stats.fatal = Some(WorkerError::Output(e).to_string());
                            break 'issues;
                        }
                        stats.pages_failed += 1;
                    }
                },
                UnitOutcome::Failed {
                    attempts,
                    last_error,
                } => {
                    if let Err(e) = failures.append(&FailureRecord {
                        unit: key,
                        kind: "permanent".to_string(),
                        attempts,
                        last_error,
                    }) {
                        log::error!("worker {worker_id}: failure log write failed: {e}");
                        stats.fatal = Some(WorkerError::Output(e).to_string());
                        break 'issues;
                    }
                    stats.pages_failed += 1;
                }
                UnitOutcome::PoolExhausted => {
                    log::error!("worker {worker_id}: {}, stopping", WorkerError::PoolExhausted);
                    stats.fatal = Some(WorkerError::PoolExhausted.to_string());
                    break 'issues;
                }
            }
        }

        stats.issues_completed += 1;
        pb.inc(1);
    }

    stats.elapsed = start.elapsed();
    stats
}
