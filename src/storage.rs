// src/storage.rs

use crate::error::{AnalyzerError, Result};
use crate::schema::RecordType;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One output directory: `records_T.csv` raw dumps, `T_train.csv` and
/// `T_test.csv` splits, `<feature>_vocabulary.csv` side files
#[derive(Debug, Clone)]
pub struct CsvStorage {
    dir: PathBuf,
}

impl CsvStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| AnalyzerError::io(&self.dir, e))
    }

    pub fn records_path(&self, record_type: RecordType) -> PathBuf {
        self.dir.join(format!("records_{}.csv", record_type))
    }

    pub fn train_path(&self, record_type: RecordType) -> PathBuf {
        self.dir.join(format!("{}_train.csv", record_type))
    }

    pub fn test_path(&self, record_type: RecordType) -> PathBuf {
        self.dir.join(format!("{}_test.csv", record_type))
    }

    pub fn vocabulary_path(&self, feature_name: &str) -> PathBuf {
        self.dir.join(format!("{}_vocabulary.csv", feature_name))
    }

    pub fn write_vocabulary(&self, feature_name: &str, values: &[String]) -> Result<PathBuf> {
        let path = self.vocabulary_path(feature_name);
        write_lines(&path, None, values)?;
        Ok(path)
    }

    /// All lines of the raw dump of `record_type`, empty if nothing was dumped
    pub fn read_records(&self, record_type: RecordType) -> Result<Vec<String>> {
        let path = self.records_path(record_type);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| AnalyzerError::io(&path, e))?;
        BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| AnalyzerError::io(&path, e))
    }

    /// Writes data lines prefixed with `<rows>,<columns>,<name1>,...`
    pub fn write_split(&self, path: &Path, names: &[&str], lines: &[String]) -> Result<()> {
        let header = split_header(lines.len(), names);
        write_lines(path, Some(&header), lines)
    }
}

pub fn split_header(rows: usize, names: &[&str]) -> String {
    format!("{},{},{}", rows, names.len(), names.join(","))
}

fn write_lines(path: &Path, header: Option<&str>, lines: &[String]) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        if let Some(header) = header {
            writeln!(out, "{}", header)?;
        }
        for line in lines {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    };
    write().map_err(|e| AnalyzerError::io(path, e))
}
