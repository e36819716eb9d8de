// src/main.rs

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use diff_features::input;
use diff_features::AnalysisPipeline;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let start_time = Instant::now();
    let config = args.pipeline_config();
    let mut pipeline = AnalysisPipeline::new(config.clone()).context("invalid pipeline configuration")?;

    let load_start = Instant::now();
    let raw_comments = match &args.raw_comments {
        Some(path) => input::load_raw_comments(path, args.rcs)
            .with_context(|| format!("failed to load raw comments from {}", path.display()))?,
        None => Vec::new(),
    };
    let pull_requests = match &args.pull_requests {
        Some(path) => input::load_pull_requests(path, args.prs)
            .with_context(|| format!("failed to load pull requests from {}", path.display()))?,
        None => Vec::new(),
    };
    info!(
        "Load {} raw comments and {} pull requests in {:.2?}",
        raw_comments.len(),
        pull_requests.len(),
        load_start.elapsed()
    );

    let rc_records = pipeline.analyze_items(&raw_comments).context("raw comment analysis failed")?;
    let pr_records = pipeline.analyze_items(&pull_requests).context("pull request analysis failed")?;

    let summaries = pipeline.finalize(config.train_ratio).context("finalization failed")?;
    for summary in &summaries {
        println!(
            "{}: {} records ({} train -> {}, {} test -> {})",
            summary.record_type,
            summary.rows,
            summary.train_rows,
            summary.train_path.display(),
            summary.test_rows,
            summary.test_path.display()
        );
    }
    println!(
        "Analysis finished in {:.2?}: {} records from raw comments, {} from pull requests.",
        start_time.elapsed(),
        rc_records,
        pr_records
    );
    Ok(())
}
