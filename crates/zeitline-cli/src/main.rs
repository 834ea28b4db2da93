//! zeitline - Batch scraper for the ANNO historical newspaper archive
//!
//! Walks an issue list page by page, writes per-worker JSONL shards
//! with durable checkpoints, and merges the shards into one corpus.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};

use zeitline_core::shutdown_flag;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "zeitline")]
#[command(about = "Batch scraper for the ANNO historical newspaper archive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./zeitline.toml or ~/.config/zeitline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape newspaper pages into per-worker output shards
    Scrape(cmd::scrape::ScrapeArgs),
    /// Merge worker shards into one deduplicated corpus file
    Merge(cmd::merge::MergeArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(zeitline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    zeitline_core::init_logging(quiet, cli.debug, multi);

    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Command::Scrape(args) => {
            setup_signal_handler();
            cmd::scrape::run(args, &config, &progress)
        }
        Command::Merge(args) => cmd::merge::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Output directory",
                &config.output.default_dir.display().to_string(),
            ]);
            table.add_row(vec!["Base URL", &config.scrape.base_url]);
            table.add_row(vec!["Max pages", &config.scrape.max_pages.to_string()]);
            table.add_row(vec![
                "Request interval",
                &format!("{}ms", config.scrape.request_interval_ms),
            ]);
            table.add_row(vec![
                "Workers",
                &format!("{} (max: {})", config.workers.default, config.workers.max),
            ]);
            table.add_row(vec![
                "Retry",
                &format!(
                    "{} attempts, {}s base",
                    config.retry.max_attempts, config.retry.base_secs
                ),
            ]);
            table.add_row(vec!["Proxies", &config.proxy.urls.len().to_string()]);
            table.add_row(vec![
                "Proxy auth",
                if config.proxy.username.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec![
                "Retire after",
                &format!("{} consecutive failures", config.proxy.retire_after),
            ]);

            eprintln!("\n{table}");
            ExitCode::SUCCESS
        }
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit (default SIGINT behavior restored)
    // SAFETY: AtomicBool::store and process::exit are async-signal-safe
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGTERM handler");
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGINT handler");
    }
}
