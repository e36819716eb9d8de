// src/model.rs

use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Kind of a single diff body line, decided by its marker character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Added,
    Removed,
    Unchanged,
}

impl LineKind {
    /// Numeric encoding used in feature records
    pub fn value(self) -> i64 {
        match self {
            LineKind::Added => 1,
            LineKind::Unchanged => 0,
            LineKind::Removed => -1,
        }
    }
}

/// One body line of a piece, with the diff marker stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
}

impl Line {
    pub fn parse(raw: &str) -> Self {
        let (kind, text) = match raw.as_bytes().first() {
            Some(b'+') => (LineKind::Added, &raw[1..]),
            Some(b'-') => (LineKind::Removed, &raw[1..]),
            Some(b' ') => (LineKind::Unchanged, &raw[1..]),
            _ => (LineKind::Unchanged, raw),
        };
        Line { kind, text: text.to_string() }
    }

    /// Length in characters, not bytes
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Heuristic for content which is not text: NUL or anything above 0x80.
    pub fn looks_binary(&self) -> bool {
        self.text.chars().any(|c| c == '\0' || c as u32 > 0x80)
    }
}

/// One hunk: the `@@ -a,b +c,d @@` header values plus its body lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub from_start: u32,
    pub from_count: u32,
    pub to_start: u32,
    pub to_count: u32,
    pub header_trailer: String,
    pub lines: Vec<Line>,
}

/// File types known to the static extension table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Unsupported,
    Xml,
    JavaScript,
    Python,
    Swift,
    ShScript,
    Config,
}

const EXTENSIONS: &[(&str, FileType)] = &[
    ("xml", FileType::Xml),
    ("js", FileType::JavaScript),
    ("py", FileType::Python),
    ("swift", FileType::Swift),
    ("sh", FileType::ShScript),
    ("cfg", FileType::Config),
];

impl FileType {
    pub fn from_path(path: &str) -> Self {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| EXTENSIONS.iter().find(|(known, _)| *known == ext))
            .map_or(FileType::Unsupported, |&(_, file_type)| file_type)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Unsupported => "unsupported",
            FileType::Xml => "xml",
            FileType::JavaScript => "javascript",
            FileType::Python => "python",
            FileType::Swift => "swift",
            FileType::ShScript => "sh",
            FileType::Config => "config",
        };
        f.write_str(name)
    }
}

/// One file of a diff. Never built with zero pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub base_name: String,
    pub file_type: FileType,
    /// The `index ...` metadata line, absent for hunk-only input
    pub index_line: Option<String>,
    pub pieces: Vec<Piece>,
}

impl File {
    pub fn new(path: String, index_line: Option<String>, pieces: Vec<Piece>) -> Self {
        let base_name = Path::new(&path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&path)
            .to_string();
        let file_type = FileType::from_path(&base_name);
        File { path, base_name, file_type, index_line, pieces }
    }
}

/// Review comment as stored by the persistence layer
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: i64,
    pub path: String,
    pub diff_hunk: String,
}

/// Pull request as stored by the persistence layer
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: i64,
    pub state: String,
    pub diff: String,
}

impl PullRequest {
    /// Only closed pull requests are analyzed.
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}
