// src/accumulator.rs

//! Per record type buffering and the single writer thread behind it.
//!
//! Analyzer threads never touch the raw dump file. Records either wait in
//! the accumulator's buffer or travel as batches through a bounded channel to
//! one writer thread per record type, which owns the file handle.

use crate::error::{AnalyzerError, Result};
use crate::schema::{Record, RecordType};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Dedicated thread appending record batches to one raw dump file
#[derive(Debug)]
pub struct RecordWriter {
    record_type: RecordType,
    sender: Sender<Vec<Record>>,
    handle: JoinHandle<io::Result<usize>>,
}

impl RecordWriter {
    /// Truncates `path` and starts the writer thread.
    pub fn spawn(record_type: RecordType, path: PathBuf, capacity: usize) -> Result<Self> {
        let file = fs::File::create(&path).map_err(|e| AnalyzerError::io(&path, e))?;
        let (sender, receiver) = bounded(capacity);
        let handle = thread::Builder::new()
            .name(format!("writer-{}", record_type))
            .spawn(move || write_batches(record_type, file, receiver))
            .map_err(|e| AnalyzerError::io(&path, e))?;
        Ok(RecordWriter { record_type, sender, handle })
    }

    pub fn sender(&self) -> Sender<Vec<Record>> {
        self.sender.clone()
    }

    /// Closes the queue, waits for the thread and returns the rows it wrote.
    pub fn finish(self) -> Result<usize> {
        let RecordWriter { record_type, sender, handle } = self;
        drop(sender);
        match handle.join() {
            Ok(Ok(written)) => Ok(written),
            Ok(Err(source)) => Err(AnalyzerError::Writer { record_type, source }),
            Err(_) => Err(AnalyzerError::WriterGone { record_type }),
        }
    }
}

fn write_batches(record_type: RecordType, file: fs::File, receiver: Receiver<Vec<Record>>) -> io::Result<usize> {
    let mut out = BufWriter::new(file);
    let mut written = 0;
    for batch in receiver {
        for record in &batch {
            writeln!(out, "{}", record.to_csv_line())?;
        }
        out.flush()?;
        written += batch.len();
        debug!(%record_type, rows = batch.len(), total = written, "flushed records");
    }
    out.flush()?;
    Ok(written)
}

#[derive(Debug)]
pub struct RecordAccumulator {
    record_type: RecordType,
    path: PathBuf,
    queue_capacity: usize,
    buffer: Mutex<Vec<Record>>,
    writer: Mutex<Option<RecordWriter>>,
    flushed: AtomicUsize,
    /// Set once the writer could not start or stopped; cleared by `clear`
    failed: AtomicBool,
}

impl RecordAccumulator {
    pub fn new(record_type: RecordType, path: PathBuf, queue_capacity: usize) -> Self {
        RecordAccumulator {
            record_type,
            path,
            queue_capacity,
            buffer: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
            flushed: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Appends a finished chunk's records to the buffer.
    pub fn push(&self, records: Vec<Record>) {
        if !records.is_empty() {
            self.buffer.lock().extend(records);
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Rows handed over to the writer so far
    pub fn flushed(&self) -> usize {
        self.flushed.load(Ordering::Relaxed)
    }

    /// Hands `batch` to the writer thread, starting it on first use. Blocks
    /// while the writer queue is full. Once the writer failed every call
    /// errors and the raw dump is left as it is.
    pub fn write(&self, batch: Vec<Record>) -> Result<usize> {
        if self.failed.load(Ordering::Acquire) {
            return Err(AnalyzerError::WriterGone { record_type: self.record_type });
        }
        let len = batch.len();
        if len == 0 {
            return Ok(0);
        }
        let sender = {
            let mut writer = self.writer.lock();
            if writer.is_none() {
                match RecordWriter::spawn(self.record_type, self.path.clone(), self.queue_capacity) {
                    Ok(spawned) => *writer = Some(spawned),
                    Err(e) => {
                        self.failed.store(true, Ordering::Release);
                        return Err(e);
                    }
                }
            }
            writer.as_ref().map(RecordWriter::sender)
        };
        let sent = match sender {
            Some(sender) => sender.send(batch).is_ok(),
            None => false,
        };
        if !sent {
            return Err(self.writer_failure());
        }
        self.flushed.fetch_add(len, Ordering::Relaxed);
        Ok(len)
    }

    /// Moves the whole buffer to the writer.
    pub fn flush(&self) -> Result<usize> {
        let batch = mem::take(&mut *self.buffer.lock());
        self.write(batch)
    }

    /// Flushes, stops the writer and returns the rows it wrote. Leaves an
    /// empty raw dump behind when nothing was ever written.
    pub fn close(&self) -> Result<usize> {
        self.flush()?;
        let writer = self.writer.lock().take();
        match writer {
            Some(writer) => writer.finish(),
            None => {
                fs::File::create(&self.path).map_err(|e| AnalyzerError::io(&self.path, e))?;
                Ok(0)
            }
        }
    }

    /// Drops buffered records and stops the writer, ready for a new run.
    pub fn clear(&self) {
        self.buffer.lock().clear();
        if let Some(writer) = self.writer.lock().take() {
            if let Err(e) = writer.finish() {
                warn!(record_type = %self.record_type, "discarding writer error: {}", e);
            }
        }
        self.flushed.store(0, Ordering::Relaxed);
        self.failed.store(false, Ordering::Release);
    }

    /// The writer's own error if it stopped, otherwise a generic one.
    fn writer_failure(&self) -> AnalyzerError {
        self.failed.store(true, Ordering::Release);
        match self.writer.lock().take() {
            Some(writer) => match writer.finish() {
                Err(e) => e,
                Ok(_) => AnalyzerError::WriterGone { record_type: self.record_type },
            },
            None => AnalyzerError::WriterGone { record_type: self.record_type },
        }
    }
}
