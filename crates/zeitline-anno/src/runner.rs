//! Work distribution and run supervision.
//!
//! Partitions the issue list into disjoint round-robin shards, runs
//! one worker per shard on a rayon pool, and aggregates the per-worker
//! reports. A worker's fatal stop never halts the others; the run as a
//! whole fails only when every worker is lost.

use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};

use zeitline_core::checkpoint::load_skip_set;
use zeitline_core::client::FetchClient;
use zeitline_core::fmt_num;
use zeitline_core::progress::SharedProgress;
use zeitline_core::proxy::ProxyRotator;
use zeitline_core::rate::RateLimiter;

use crate::config::Config;
use crate::issues::{Issue, load_issues};
use crate::stats::{RunSummary, WorkerStats};
use crate::worker::{WorkerEnv, run_worker};

/// Deterministic round-robin partition: worker `w` of `n` owns input
/// positions `i` with `i % n == w`. Same input and worker count always
/// produce the same shards.
pub fn partition(total: usize, workers: usize) -> Vec<Vec<usize>> {
    let workers = workers.max(1);
    let mut shards = vec![Vec::new(); workers];
    for i in 0..total {
        shards[i % workers].push(i);
    }
    shards
}

/// Run the full scraping pipeline.
pub fn run(config: &Config, progress: &SharedProgress) -> Result<RunSummary> {
    let start = Instant::now();
    std::fs::create_dir_all(&config.output_dir).context("cannot create output directory")?;

    let mut issues = load_issues(&config.issues_path)?;
    if let Some(limit) = config.max_issues {
        issues.truncate(limit);
    }
    log::info!(
        "scraping {} issues with {} workers ({} proxy identities, {}ms interval)",
        fmt_num(issues.len()),
        config.workers,
        config.proxies.len().max(1),
        config.request_interval.as_millis()
    );

    let skip = load_skip_set(&config.output_dir).context("cannot load checkpoint files")?;
    if !skip.is_empty() {
        log::info!("resume: {} units already checkpointed", fmt_num(skip.len()));
    }

    let identity_count = config.proxies.len().max(1);
    let env = WorkerEnv {
        fetcher: FetchClient::new(
            config.connect_timeout,
            config.request_timeout,
            &config.user_agent,
        ),
        rotator: ProxyRotator::new(config.proxies.clone(), config.retire_after),
        limiter: RateLimiter::new(config.request_interval, identity_count),
        policy: config.retry,
        base_url: config.base_url.clone(),
        max_pages: config.max_pages,
    };

    let shards = partition(issues.len(), config.workers);
    let worker_stats: Mutex<Vec<WorkerStats>> = Mutex::new(Vec::new());
    let is_tty = progress.is_tty();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .context("cannot create worker thread pool")?;

    pool.scope(|s| {
        for (worker_id, shard) in shards.iter().enumerate() {
            let shard_issues: Vec<Issue> = shard.iter().map(|&i| issues[i].clone()).collect();
            let env = &env;
            let skip = &skip;
            let worker_stats = &worker_stats;
            let progress = progress.clone();
            let output_dir = config.output_dir.clone();
            s.spawn(move |_| {
                let pb = progress.worker_bar(worker_id, shard_issues.len());
                let stats = run_worker(worker_id, &shard_issues, env, skip, &output_dir, &pb);
                pb.finish_and_clear();
                if !is_tty {
                    stats.log();
                }
                worker_stats
                    .lock()
                    .expect("worker thread panicked")
                    .push(stats);
            });
        }
    });

    let stats = worker_stats.into_inner().expect("worker thread panicked");
    let summary = RunSummary::from_workers(&stats, start.elapsed());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_disjoint_and_complete() {
        let shards = partition(10, 3);
        assert_eq!(shards.len(), 3);
        let mut all: Vec<usize> = shards.iter().flatten().copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn partition_is_round_robin() {
        let shards = partition(7, 3);
        assert_eq!(shards[0], vec![0, 3, 6]);
        assert_eq!(shards[1], vec![1, 4]);
        assert_eq!(shards[2], vec![2, 5]);
    }

    #[test]
    fn partition_deterministic() {
        assert_eq!(partition(100, 12), partition(100, 12));
    }

    #[test]
    fn partition_more_workers_than_items() {
        let shards = partition(2, 5);
        assert_eq!(shards.iter().filter(|s| !s.is_empty()).count(), 2);
        assert_eq!(shards.iter().flatten().count(), 2);
    }

    #[test]
    fn partition_zero_workers_clamped() {
        let shards = partition(3, 0);
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0], vec![0, 1, 2]);
    }
}
