//! Merge subcommand - combine worker shards into one corpus file

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use zeitline_core::{SharedProgress, fmt_num};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Directory holding the pages_worker_*.jsonl shards
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Merged output file
    #[arg(short, long, default_value = "corpus.jsonl")]
    pub output: PathBuf,
}

pub fn run(args: MergeArgs, config: &Config, progress: &SharedProgress) -> ExitCode {
    let merge_config = zeitline_merge::MergeConfig {
        input_dir: args
            .input
            .unwrap_or_else(|| config.output.default_dir.clone()),
        output_path: args.output,
    };

    let stage = progress.stage_line("merge");
    stage.set_message(format!("reading {}", merge_config.input_dir.display()));
    let result = zeitline_merge::run(&merge_config);
    stage.finish_and_clear();

    match result {
        Ok(summary) => {
            summary.log();
            log::info!(
                "wrote {} records to {}",
                fmt_num(summary.records_written),
                merge_config.output_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Merge failed: {e:#}");
            ExitCode::from(2)
        }
    }
}
