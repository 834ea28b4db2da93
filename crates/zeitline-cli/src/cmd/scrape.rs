//! Scrape subcommand - fetch newspaper pages into per-worker shards

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;

use zeitline_core::SharedProgress;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Issue list CSV (`aid,title,yyyymmdd`)
    pub issues: PathBuf,

    /// Output directory for shards, checkpoints, and failure logs
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Maximum pages probed per issue
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Process only the first N issues
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Milliseconds between requests per proxy identity
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Archive base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Build the run configuration from file config plus CLI overrides.
fn run_config(args: &ScrapeArgs, config: &Config) -> zeitline_anno::Config {
    // max.max(1): a misconfigured cap of 0 degrades to one worker
    // instead of panicking in clamp
    let max_workers = config.workers.max.max(1);
    let workers = args
        .workers
        .unwrap_or(config.workers.default)
        .clamp(1, max_workers);
    zeitline_anno::Config {
        issues_path: args.issues.clone(),
        output_dir: args
            .output
            .clone()
            .unwrap_or_else(|| config.output.default_dir.clone()),
        base_url: args
            .base_url
            .clone()
            .unwrap_or_else(|| config.scrape.base_url.clone()),
        workers,
        max_pages: args.max_pages.unwrap_or(config.scrape.max_pages),
        max_issues: args.limit,
        request_interval: Duration::from_millis(
            args.interval_ms.unwrap_or(config.scrape.request_interval_ms),
        ),
        connect_timeout: Duration::from_secs(config.scrape.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.scrape.request_timeout_secs),
        user_agent: config.scrape.user_agent.clone(),
        retry: config.retry.policy(),
        proxies: config.proxy.identities(),
        retire_after: config.proxy.retire_after,
    }
}

pub fn run(args: ScrapeArgs, config: &Config, progress: &SharedProgress) -> ExitCode {
    let run_config = run_config(&args, config);

    let summary = match zeitline_anno::run(&run_config, progress) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Scrape failed: {e:#}");
            return ExitCode::from(2);
        }
    };

    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }

    if summary.stopped {
        ExitCode::from(130)
    } else if summary.degraded() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
