// src/lib.rs

//! Turns unified diffs of review comments and pull requests into fixed-width
//! numeric feature records, written as shuffled train/test CSV splits.
//!
//! raw diff text -> [`diff_parser`] -> [`model::File`] tree ->
//! [`producer::RecordProducer`]s -> [`accumulator::RecordAccumulator`] ->
//! raw dump -> [`finalizer`] -> `T_train.csv` / `T_test.csv` + vocabularies

pub mod accumulator;
pub mod analyzer;
pub mod config;
pub mod diff_parser;
pub mod error;
pub mod finalizer;
pub mod input;
pub mod model;
pub mod producer;
pub mod schema;
pub mod storage;
pub mod vocabulary;

pub use analyzer::{chunk_size, AnalysisItem, AnalysisPipeline, ItemKind, PipelineBuilder, PipelineState};
pub use config::PipelineConfig;
pub use error::{AnalyzerError, Result, SkipReason};
pub use finalizer::SplitSummary;
pub use model::{File, FileType, Line, LineKind, Piece, PullRequest, RawComment};
pub use schema::{FeatureDef, FeatureSchema, Record, RecordType};
pub use vocabulary::VocabularyRegistry;
