// src/config.rs

use crate::error::{AnalyzerError, Result};
use std::path::PathBuf;

/// Pull requests touching more files than this are not analyzed.
pub const DEFAULT_MAX_PR_FILES: usize = 20;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving raw dumps, splits and vocabularies
    pub output_dir: PathBuf,
    /// Worker threads used by `analyze_items`
    pub threads: usize,
    /// Hand every finished chunk to the writer instead of buffering until finalize
    pub chunked_flush: bool,
    /// Batches a record writer queue holds before producers block
    pub writer_queue_capacity: usize,
    /// Share of shuffled records going to the train split
    pub train_ratio: f64,
    /// Fixed seed for the shuffle; entropy when absent
    pub shuffle_seed: Option<u64>,
    pub max_pr_files: usize,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("instance").join("csv"),
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            chunked_flush: true,
            writer_queue_capacity: 16,
            train_ratio: 0.8,
            shuffle_seed: None,
            max_pr_files: DEFAULT_MAX_PR_FILES,
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(AnalyzerError::InvalidConfig("threads must be at least 1".into()));
        }
        if self.writer_queue_capacity == 0 {
            return Err(AnalyzerError::InvalidConfig("writer queue capacity must be at least 1".into()));
        }
        validate_train_ratio(self.train_ratio)
    }
}

pub fn validate_train_ratio(ratio: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(AnalyzerError::InvalidConfig(format!(
            "train ratio {} is outside [0, 1]",
            ratio
        )));
    }
    Ok(())
}
