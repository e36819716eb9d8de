// src/analyzer.rs

use crate::accumulator::RecordAccumulator;
use crate::config::{validate_train_ratio, PipelineConfig};
use crate::diff_parser;
use crate::error::{AnalyzerError, Result, SkipReason};
use crate::finalizer::{self, SplitSummary};
use crate::model::{File, FileType, PullRequest, RawComment};
use crate::producer::{GitProducer, RecordProducer, XmlProducer, GIT_SCHEMA};
use crate::schema::{Record, RecordType};
use crate::storage::CsvStorage;
use crate::vocabulary::VocabularyRegistry;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Index of the GIT handler, present in every pipeline
const COMMON: usize = 0;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    RawComment,
    PullRequest,
}

impl ItemKind {
    /// Largest chunk keeping one flushed chunk around 20000 lines
    pub fn chunk_bound(self) -> usize {
        match self {
            ItemKind::RawComment => 2000,
            ItemKind::PullRequest => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::RawComment => "raw comment",
            ItemKind::PullRequest => "pull request",
        }
    }
}

/// Items per chunk: an even share per thread, capped by the kind's bound.
pub fn chunk_size(items: usize, threads: usize, kind: ItemKind) -> usize {
    let share = items / threads.max(1);
    share.min(kind.chunk_bound()).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Flushing,
    Finalized,
}

impl PipelineState {
    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Flushing => "flushing",
            PipelineState::Finalized => "finalized",
        }
    }
}

/// Input item the pipeline knows how to turn into records
pub trait AnalysisItem: Sync {
    const KIND: ItemKind;

    fn id(&self) -> i64;

    fn extract(&self, pipeline: &AnalysisPipeline) -> std::result::Result<ItemRecords, SkipReason>;
}

impl AnalysisItem for RawComment {
    const KIND: ItemKind = ItemKind::RawComment;

    fn id(&self) -> i64 {
        self.id
    }

    fn extract(&self, pipeline: &AnalysisPipeline) -> std::result::Result<ItemRecords, SkipReason> {
        pipeline.analyze_raw_comment(self)
    }
}

impl AnalysisItem for PullRequest {
    const KIND: ItemKind = ItemKind::PullRequest;

    fn id(&self) -> i64 {
        self.id
    }

    fn extract(&self, pipeline: &AnalysisPipeline) -> std::result::Result<ItemRecords, SkipReason> {
        pipeline.analyze_pull_request(self)
    }
}

/// Records of one item, one list per registered record type
#[derive(Debug)]
pub struct ItemRecords {
    /// GIT records, the count reported by `analyze_items`
    pub count: usize,
    pub by_type: Vec<Vec<Record>>,
}

impl ItemRecords {
    fn new(types: usize) -> Self {
        ItemRecords { count: 0, by_type: vec![Vec::new(); types] }
    }
}

struct TypeHandler {
    producer: Arc<dyn RecordProducer>,
    vocabulary: VocabularyRegistry,
    accumulator: RecordAccumulator,
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    producers: Vec<(FileType, Arc<dyn RecordProducer>)>,
}

impl PipelineBuilder {
    /// Routes files of `file_type` to `producer` in addition to the GIT one.
    pub fn register(mut self, file_type: FileType, producer: impl RecordProducer + 'static) -> Self {
        let producer: Arc<dyn RecordProducer> = Arc::new(producer);
        self.producers.push((file_type, producer));
        self
    }

    pub fn build(self) -> Result<AnalysisPipeline> {
        self.config.validate()?;
        let storage = CsvStorage::new(&self.config.output_dir);
        let mut pipeline = AnalysisPipeline {
            handlers: Vec::new(),
            by_file_type: HashMap::new(),
            storage,
            config: self.config,
            state: PipelineState::Idle,
        };
        pipeline.add_handler(Arc::new(GitProducer));
        for (file_type, producer) in self.producers {
            // typed records get the GIT columns overlaid on their leading slots
            if producer.schema().embedded_len() != GIT_SCHEMA.len() {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "{} producer schema must extend the GIT schema",
                    producer.record_type()
                )));
            }
            let index = pipeline.add_handler(producer);
            if index == COMMON {
                warn!(%file_type, "ignoring producer registered under the GIT record type");
                continue;
            }
            pipeline.by_file_type.insert(file_type, index);
        }
        Ok(pipeline)
    }
}

/// Owns the producers, vocabularies and accumulators of one analysis run.
///
/// `Idle -> Running -> Flushing -> Finalized`; [`clean`](Self::clean) goes
/// back to `Idle`.
pub struct AnalysisPipeline {
    config: PipelineConfig,
    storage: CsvStorage,
    handlers: Vec<TypeHandler>,
    by_file_type: HashMap<FileType, usize>,
    state: PipelineState,
}

impl AnalysisPipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder { config, producers: Vec::new() }
    }

    /// Pipeline with every built-in per-file-type producer registered
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::builder(config).register(FileType::Xml, XmlProducer).build()
    }

    fn add_handler(&mut self, producer: Arc<dyn RecordProducer>) -> usize {
        let record_type = producer.record_type();
        if let Some(index) = self.handler_index(record_type) {
            return index;
        }
        let schema = producer.schema();
        self.handlers.push(TypeHandler {
            vocabulary: VocabularyRegistry::new(schema),
            accumulator: RecordAccumulator::new(
                record_type,
                self.storage.records_path(record_type),
                self.config.writer_queue_capacity,
            ),
            producer,
        });
        self.handlers.len() - 1
    }

    fn handler_index(&self, record_type: RecordType) -> Option<usize> {
        self.handlers.iter().position(|handler| handler.producer.record_type() == record_type)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &CsvStorage {
        &self.storage
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn record_types(&self) -> Vec<RecordType> {
        self.handlers.iter().map(|handler| handler.producer.record_type()).collect()
    }

    pub fn vocabulary(&self, record_type: RecordType) -> Option<&VocabularyRegistry> {
        self.handler_index(record_type).map(|index| &self.handlers[index].vocabulary)
    }

    pub fn accumulator(&self, record_type: RecordType) -> Option<&RecordAccumulator> {
        self.handler_index(record_type).map(|index| &self.handlers[index].accumulator)
    }

    /// Analyzes `items` on `config.threads` workers and returns the number of
    /// GIT records produced. Skipped items do not count.
    pub fn analyze_items<T: AnalysisItem>(&mut self, items: &[T]) -> Result<usize> {
        match self.state {
            PipelineState::Idle | PipelineState::Running => {}
            state => return Err(AnalyzerError::InvalidState { action: "analyze", state: state.name() }),
        }
        self.storage.prepare()?;
        self.state = PipelineState::Running;
        if items.is_empty() {
            info!("no {}s to analyze", T::KIND.name());
            return Ok(0);
        }

        // 1. Cut the items into chunks bounded by the item kind
        let threads = self.config.threads;
        let chunk_size = chunk_size(items.len(), threads, T::KIND);
        let chunks: Vec<&[T]> = items.chunks(chunk_size).collect();
        info!(
            "Start {} threads to analyze {} {}s using {} pts chunks ({} chunks)",
            threads,
            items.len(),
            T::KIND.name(),
            chunk_size,
            chunks.len()
        );

        // 2. Build the worker pool and the progress bar
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("analyzer-{}", i))
            .build()?;

        let bar = if self.config.show_progress {
            let bar = ProgressBar::new(chunks.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(format!("Analyzing {}s", T::KIND.name()));

        // --- Run State ---
        let this = &*self;
        let abort = AtomicBool::new(false);
        let mut progress = Progress::new(chunks.len());
        let mut total = 0;
        let mut failure: Option<AnalyzerError> = None;
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<Result<usize>>();
        // 3. Spawn every chunk and sum the completions in arrival order
        pool.in_place_scope(|scope| {
            for chunk in &chunks {
                let done_tx = done_tx.clone();
                let abort = &abort;
                scope.spawn(move |_| {
                    if abort.load(Ordering::Relaxed) {
                        // A writer already failed, the run is lost
                        let _ = done_tx.send(Ok(0));
                        return;
                    }
                    let outcome = this.analyze_chunk(chunk);
                    if outcome.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }
                    let _ = done_tx.send(outcome);
                });
            }
            drop(done_tx);

            for outcome in done_rx.iter() {
                match outcome {
                    Ok(count) => total += count,
                    // keep the root cause over the follow-up `WriterGone`s
                    Err(e) => {
                        if matches!(failure, None | Some(AnalyzerError::WriterGone { .. })) {
                            failure = Some(e);
                        }
                    }
                }
                bar.inc(1);
                progress.chunk_done(Instant::now());
            }
        });
        bar.finish_with_message("Analysis complete");

        // 4. Fail on a fatal error, otherwise hand over what is buffered
        if let Some(e) = failure {
            return Err(e);
        }
        if self.config.chunked_flush {
            self.flush()?;
        }
        info!(
            "{} {}s analyzed into {} records in {}",
            items.len(),
            T::KIND.name(),
            total,
            format_duration(progress.started.elapsed())
        );
        Ok(total)
    }

    fn analyze_chunk<T: AnalysisItem>(&self, chunk: &[T]) -> Result<usize> {
        let mut chunk_records = vec![Vec::new(); self.handlers.len()];
        let mut count = 0;
        for item in chunk {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| item.extract(self)))
                .unwrap_or_else(|payload| Err(SkipReason::Panicked(panic_message(payload.as_ref()))));
            match outcome {
                Ok(records) => {
                    count += records.count;
                    for (target, produced) in chunk_records.iter_mut().zip(records.by_type) {
                        target.extend(produced);
                    }
                }
                Err(reason) => warn!("skipping {} {}: {}", T::KIND.name(), item.id(), reason),
            }
        }

        for (handler, records) in self.handlers.iter().zip(chunk_records) {
            if self.config.chunked_flush {
                handler.accumulator.write(records)?;
            } else {
                handler.accumulator.push(records);
            }
        }
        Ok(count)
    }

    /// Hunk of a review comment: one file, one record per producer, labeled
    /// with the comment id.
    pub fn analyze_raw_comment(&self, rc: &RawComment) -> std::result::Result<ItemRecords, SkipReason> {
        let files = diff_parser::parse(&rc.diff_hunk, Some(&rc.path));
        if files.len() != 1 {
            return Err(SkipReason::FileCount(files.len()));
        }
        let file = &files[0];

        let mut item = ItemRecords::new(self.handlers.len());
        let mut baseline = self.common_records(file, true);
        if baseline.len() != 1 {
            return Err(SkipReason::RecordCount { record_type: RecordType::GIT, count: baseline.len() });
        }
        for record in &mut baseline {
            record.set_label(rc.id);
        }
        if let Some(&index) = self.by_file_type.get(&file.file_type) {
            let layered = self.layered_records(index, file, true, &baseline);
            if layered.len() != 1 {
                let record_type = self.handlers[index].producer.record_type();
                return Err(SkipReason::RecordCount { record_type, count: layered.len() });
            }
            item.by_type[index] = layered;
        }
        item.count = baseline.len();
        item.by_type[COMMON] = baseline;
        Ok(item)
    }

    /// Whole diff of a pull request, every line of every file, unlabeled.
    pub fn analyze_pull_request(&self, pr: &PullRequest) -> std::result::Result<ItemRecords, SkipReason> {
        let mut item = ItemRecords::new(self.handlers.len());
        let files = diff_parser::parse(&pr.diff, None);
        if files.len() > self.config.max_pr_files {
            debug!("pull request {} touches {} files, not analyzed", pr.id, files.len());
            return Ok(item);
        }
        for file in &files {
            let baseline = self.common_records(file, false);
            if let Some(&index) = self.by_file_type.get(&file.file_type) {
                let layered = self.layered_records(index, file, false, &baseline);
                if layered.len() != baseline.len() {
                    let record_type = self.handlers[index].producer.record_type();
                    return Err(SkipReason::RecordCount { record_type, count: layered.len() });
                }
                item.by_type[index].extend(layered);
            }
            item.count += baseline.len();
            item.by_type[COMMON].extend(baseline);
        }
        Ok(item)
    }

    fn common_records(&self, file: &File, only_last_line: bool) -> Vec<Record> {
        let handler = &self.handlers[COMMON];
        handler.producer.produce(file, only_last_line, &handler.vocabulary)
    }

    /// Type specific records with the GIT columns copied from `baseline`
    fn layered_records(&self, index: usize, file: &File, only_last_line: bool, baseline: &[Record]) -> Vec<Record> {
        let handler = &self.handlers[index];
        let mut records = handler.producer.produce(file, only_last_line, &handler.vocabulary);
        for (record, base) in records.iter_mut().zip(baseline) {
            record.overlay(base);
        }
        records
    }

    /// Moves every buffered record to its writer.
    pub fn flush(&self) -> Result<usize> {
        let mut flushed = 0;
        for handler in &self.handlers {
            flushed += handler.accumulator.flush()?;
        }
        Ok(flushed)
    }

    /// Flushes what is left, dumps vocabularies and writes the shuffled
    /// train/test splits of every record type.
    pub fn finalize(&mut self, train_ratio: f64) -> Result<Vec<SplitSummary>> {
        validate_train_ratio(train_ratio)?;
        if self.state == PipelineState::Finalized {
            return Err(AnalyzerError::InvalidState { action: "finalize", state: self.state.name() });
        }
        self.storage.prepare()?;
        self.state = PipelineState::Flushing;

        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut summaries = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let record_type = handler.producer.record_type();
            // Stop the writer first so the dump is complete
            let written = handler.accumulator.close()?;
            debug!(%record_type, written, "closed raw records");

            for (feature, values) in handler.vocabulary.dump_all() {
                info!("  dump {} feature vocabulary with {} items", feature, values.len());
                self.storage.write_vocabulary(feature, &values)?;
            }

            let summary =
                finalizer::split_records(&self.storage, record_type, handler.producer.schema(), train_ratio, &mut rng)?;
            info!(
                "{}: {} records split into {} train and {} test",
                record_type, summary.rows, summary.train_rows, summary.test_rows
            );
            summaries.push(summary);
        }
        self.state = PipelineState::Finalized;
        Ok(summaries)
    }

    /// Drops buffered records and vocabularies and returns to `Idle`.
    pub fn clean(&mut self) {
        for handler in &self.handlers {
            handler.accumulator.clear();
            handler.vocabulary.clear();
        }
        self.state = PipelineState::Idle;
    }
}

/// Throttled progress logging, at most once per interval
struct Progress {
    started: Instant,
    last_log: Instant,
    completed: usize,
    total: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        let now = Instant::now();
        Progress { started: now, last_log: now, completed: 0, total }
    }

    /// Counts a finished chunk and returns whether progress was logged.
    fn chunk_done(&mut self, now: Instant) -> bool {
        self.completed += 1;
        if now.saturating_duration_since(self.last_log) < PROGRESS_LOG_INTERVAL {
            return false;
        }
        self.last_log = now;
        let elapsed = now.saturating_duration_since(self.started);
        let remaining = self.total.saturating_sub(self.completed) as u32;
        let eta = elapsed / self.completed as u32 * remaining;
        info!(
            "{}/{} chunks analyzed in {}, about {} left",
            self.completed,
            self.total,
            format_duration(elapsed),
            format_duration(eta)
        );
        true
    }
}

fn format_duration(duration: Duration) -> String {
    let duration = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        duration.num_hours(),
        duration.num_minutes() % 60,
        duration.num_seconds() % 60,
        duration.num_milliseconds() % 1000
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
