// src/finalizer.rs

use crate::error::Result;
use crate::schema::{FeatureSchema, RecordType};
use crate::storage::CsvStorage;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub record_type: RecordType,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

/// Shuffles `lines` and cuts them at `floor(len * train_ratio)`.
pub fn shuffle_split<R: Rng + ?Sized>(
    mut lines: Vec<String>,
    train_ratio: f64,
    rng: &mut R,
) -> (Vec<String>, Vec<String>) {
    lines.shuffle(rng);
    let train_len = ((lines.len() as f64 * train_ratio).floor() as usize).min(lines.len());
    let test = lines.split_off(train_len);
    (lines, test)
}

/// Reads back the raw dump of `record_type` and writes both splits.
pub fn split_records<R: Rng + ?Sized>(
    storage: &CsvStorage,
    record_type: RecordType,
    schema: &FeatureSchema,
    train_ratio: f64,
    rng: &mut R,
) -> Result<SplitSummary> {
    // 1. Read the dump back as text, chunk completion order is meaningless
    let started = Instant::now();
    let lines = storage.read_records(record_type)?;
    let rows = lines.len();
    debug!(%record_type, rows, elapsed = ?started.elapsed(), "read raw records");

    // 2. Shuffle and cut
    let started = Instant::now();
    let (train, test) = shuffle_split(lines, train_ratio, rng);
    debug!(
        %record_type,
        train_ratio,
        train = train.len(),
        test = test.len(),
        elapsed = ?started.elapsed(),
        "shuffled and split records"
    );

    // 3. Write both splits with their header
    let started = Instant::now();
    let names = schema.names();
    let train_path = storage.train_path(record_type);
    let test_path = storage.test_path(record_type);
    storage.write_split(&train_path, &names, &train)?;
    storage.write_split(&test_path, &names, &test)?;
    debug!(%record_type, elapsed = ?started.elapsed(), "wrote splits");

    Ok(SplitSummary {
        record_type,
        rows,
        train_rows: train.len(),
        test_rows: test.len(),
        train_path,
        test_path,
    })
}
