// src/error.rs

use crate::schema::RecordType;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run. Problems with single input items are
/// [`SkipReason`]s instead.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("record writer for {record_type} failed: {source}")]
    Writer {
        record_type: RecordType,
        #[source]
        source: io::Error,
    },

    #[error("record writer for {record_type} stopped unexpectedly")]
    WriterGone { record_type: RecordType },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot {action} while pipeline is {state}")]
    InvalidState { action: &'static str, state: &'static str },

    #[error("malformed input at {path}:{line}: {source}")]
    Input {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl AnalyzerError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AnalyzerError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Why an input item was left out of the analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Hunk did not parse into exactly one file
    FileCount(usize),
    /// A producer did not emit exactly one record for a hunk
    RecordCount { record_type: RecordType, count: usize },
    /// Processing the item panicked
    Panicked(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FileCount(count) => write!(f, "diff parsed into {} files", count),
            SkipReason::RecordCount { record_type, count } => {
                write!(f, "{} producer returned {} records", record_type, count)
            }
            SkipReason::Panicked(message) => write!(f, "analysis panicked: {}", message),
        }
    }
}
