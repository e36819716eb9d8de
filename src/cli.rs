// src/cli.rs

use clap::Parser;
use diff_features::config::{PipelineConfig, DEFAULT_MAX_PR_FILES};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON-lines file of raw review comments (id, path, diff_hunk)
    #[arg(long)]
    pub raw_comments: Option<PathBuf>,

    /// JSON-lines file of pull requests (id, state, diff); only closed ones are used
    #[arg(long)]
    pub pull_requests: Option<PathBuf>,

    /// Maximum number of raw comments to analyze
    #[arg(long)]
    pub rcs: Option<usize>,

    /// Maximum number of closed pull requests to analyze
    #[arg(long)]
    pub prs: Option<usize>,

    /// Directory to write record dumps, splits and vocabularies to
    #[arg(short, long, default_value = "instance/csv")]
    pub output: PathBuf,

    /// Worker threads, defaults to the available parallelism
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Share of records going to the train split
    #[arg(long, default_value_t = 0.8)]
    pub train_ratio: f64,

    /// Seed for the shuffle before splitting
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep all records in memory until finalization instead of flushing per chunk
    #[arg(long)]
    pub no_chunked_flush: bool,

    /// Record batches queued per writer thread
    #[arg(long, default_value_t = 16)]
    pub queue_capacity: usize,

    /// Pull requests touching more files are skipped
    #[arg(long, default_value_t = DEFAULT_MAX_PR_FILES)]
    pub max_pr_files: usize,

    /// Show a progress bar while analyzing
    #[arg(long)]
    pub progress: bool,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            output_dir: self.output.clone(),
            threads: self.threads.unwrap_or(defaults.threads),
            chunked_flush: !self.no_chunked_flush,
            writer_queue_capacity: self.queue_capacity,
            train_ratio: self.train_ratio,
            shuffle_seed: self.seed,
            max_pr_files: self.max_pr_files,
            show_progress: self.progress,
        }
    }
}
