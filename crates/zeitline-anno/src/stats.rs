//! Per-worker and run-level statistics reporting.
//!
//! TTY mode gets a comfy-table summary; non-TTY mode gets log lines.

use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use zeitline_core::fmt_num;

/// Counters for one worker's shard of the run.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub issues_assigned: usize,
    pub issues_completed: usize,
    pub pages_done: usize,
    /// Units found in the checkpoint skip set and never fetched
    pub pages_skipped: usize,
    /// Units that ended Failed and were written to the failure log
    pub pages_failed: usize,
    /// Set when the worker stopped fatally (pool exhausted, write
    /// failure); its unattempted units stay pending
    pub fatal: Option<String>,
    /// Worker exited early on a shutdown signal
    pub stopped: bool,
    pub elapsed: Duration,
}

impl WorkerStats {
    pub fn new(worker_id: usize, issues_assigned: usize) -> Self {
        Self {
            worker_id,
            issues_assigned,
            issues_completed: 0,
            pages_done: 0,
            pages_skipped: 0,
            pages_failed: 0,
            fatal: None,
            stopped: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Log worker completion (non-TTY mode only).
    pub fn log(&self) {
        match &self.fatal {
            Some(reason) => log::error!(
                "worker {:02}: stopped fatally ({reason}) after {}/{} issues, {} pages [{:.1}s]",
                self.worker_id,
                self.issues_completed,
                self.issues_assigned,
                fmt_num(self.pages_done),
                self.elapsed.as_secs_f64()
            ),
            None => log::info!(
                "worker {:02}: {}/{} issues, {} pages done, {} skipped, {} failed [{:.1}s]",
                self.worker_id,
                self.issues_completed,
                self.issues_assigned,
                fmt_num(self.pages_done),
                fmt_num(self.pages_skipped),
                fmt_num(self.pages_failed),
                self.elapsed.as_secs_f64()
            ),
        }
    }
}

/// Aggregate over every worker of the run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub workers: usize,
    pub fatal_workers: usize,
    pub issues_total: usize,
    pub issues_completed: usize,
    pub pages_done: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    /// At least one worker exited on a shutdown signal
    pub stopped: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_workers(workers: &[WorkerStats], elapsed: Duration) -> Self {
        Self {
            workers: workers.len(),
            fatal_workers: workers.iter().filter(|w| w.fatal.is_some()).count(),
            issues_total: workers.iter().map(|w| w.issues_assigned).sum(),
            issues_completed: workers.iter().map(|w| w.issues_completed).sum(),
            pages_done: workers.iter().map(|w| w.pages_done).sum(),
            pages_skipped: workers.iter().map(|w| w.pages_skipped).sum(),
            pages_failed: workers.iter().map(|w| w.pages_failed).sum(),
            stopped: workers.iter().any(|w| w.stopped),
            elapsed,
        }
    }

    /// Every worker reached a fatal stop.
    pub fn total_loss(&self) -> bool {
        self.workers > 0 && self.fatal_workers == self.workers
    }

    /// Some workers stopped fatally, leaving their units unattempted.
    pub fn degraded(&self) -> bool {
        self.fatal_workers > 0
    }

    pub fn log(&self) {
        log::info!("=== Scrape summary ===");
        log::info!(
            "Issues: {}/{} completed across {} workers ({} fatal)",
            fmt_num(self.issues_completed),
            fmt_num(self.issues_total),
            self.workers,
            self.fatal_workers
        );
        log::info!(
            "Pages: {} done, {} skipped (resume), {} failed-and-logged",
            fmt_num(self.pages_done),
            fmt_num(self.pages_skipped),
            fmt_num(self.pages_failed)
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.stopped {
            log::warn!("Run stopped early by signal; rerun to resume");
        }
    }

    pub fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Metric").fg(Color::Cyan),
                Cell::new("Value").fg(Color::Cyan),
            ]);
        table.add_row(vec![
            "Workers".to_string(),
            format!("{} ({} fatal)", self.workers, self.fatal_workers),
        ]);
        table.add_row(vec![
            "Issues completed".to_string(),
            format!(
                "{} / {}",
                fmt_num(self.issues_completed),
                fmt_num(self.issues_total)
            ),
        ]);
        table.add_row(vec!["Pages done".to_string(), fmt_num(self.pages_done)]);
        table.add_row(vec![
            "Pages skipped (resume)".to_string(),
            fmt_num(self.pages_skipped),
        ]);
        table.add_row(vec![
            "Pages failed (logged)".to_string(),
            fmt_num(self.pages_failed),
        ]);
        table.add_row(vec![
            "Elapsed".to_string(),
            format!("{:.1}s", self.elapsed.as_secs_f64()),
        ]);
        eprintln!("\n{table}");
    }
}
