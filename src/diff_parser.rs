// src/diff_parser.rs

//! Parses unified diff text into [`File`]s, [`Piece`]s and [`Line`]s.
//!
//! Two shapes are accepted:
//!
//! - hunk-only text (a review comment's `diff_hunk`) starting directly with an
//!   `@@` header, parsed with a path hint;
//! - full `git diff` output, one `diff --git` block per file.
//!
//! Either shape may arrive wrapped as a byte-string repr (`b'...'`) where line
//! breaks are the two characters `\` `n`. The `diff --git` and `@@` markers
//! are recognised everywhere. The preamble counter only decides how many
//! lines after a file start are metadata (`index`, `---`, `+++`) rather than
//! body.

use crate::model::{File, Line, Piece};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref DIFF_LINE_RE: Regex = Regex::new(r"^diff --git a/(.+) b/(.*)$").unwrap();
    // git quotes paths with special or non-ASCII bytes: "b/caf\303\251.xml"
    static ref QUOTED_DIFF_LINE_RE: Regex = Regex::new(
        r#"^diff --git (?:"a/(?:[^"\\]|\\.)*"|a/.+?) (?:"b/((?:[^"\\]|\\.)*)"|b/(.*))$"#
    )
    .unwrap();
    static ref HUNK_HEADER_RE: Regex =
        Regex::new(r"^@@ -(\d+),(\d+) \+(\d+),(\d+) @@(.*)$").unwrap();
}

/// Preamble lines of a wrapped full diff: diff, index, ---, +++, @@.
const WRAPPED_PREAMBLE: usize = 5;
/// Lines following `diff --git` before the first `@@`: index, ---, +++, @@.
const FILE_PREAMBLE: usize = 4;

/// Parses `text` into files in source order.
///
/// With `path_hint` every emitted file takes that path (hunk mode), otherwise
/// the `b/` path of the `diff --git` line is used. Pieces without lines and
/// files without pieces are never emitted.
pub fn parse(text: &str, path_hint: Option<&str>) -> Vec<File> {
    let (lines, preamble) = match unwrap_byte_string(text) {
        Some(inner) => {
            let preamble = if path_hint.is_some() { 1 } else { WRAPPED_PREAMBLE };
            (split_escaped(inner), preamble)
        }
        None => (text.lines().collect(), 1),
    };

    let mut state = ParseState::new(path_hint);
    let mut preamble_left = preamble;
    for line in lines {
        if let Some(path) = parse_diff_line(line) {
            state.start_file(path);
            preamble_left = FILE_PREAMBLE;
        } else if let Some(piece) = parse_hunk_header(line) {
            state.start_piece(piece);
            preamble_left = 0;
        } else if preamble_left > 0 {
            if line.starts_with("index ") {
                state.index_line = Some(line.to_string());
            }
            preamble_left -= 1;
        } else {
            state.push_line(line);
        }
    }
    state.finish()
}

fn unwrap_byte_string(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("b'")?;
    Some(inner.strip_suffix('\'').unwrap_or(inner))
}

fn split_escaped(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split("\\n").collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// `diff --git a/<p> b/<p>` -> the `b/` path, unquoted
fn parse_diff_line(line: &str) -> Option<String> {
    if let Some(captures) = DIFF_LINE_RE.captures(line) {
        return Some(captures[2].to_string());
    }
    let captures = QUOTED_DIFF_LINE_RE.captures(line)?;
    match (captures.get(1), captures.get(2)) {
        (Some(quoted), _) => Some(unquote(quoted.as_str())),
        (None, Some(plain)) => Some(plain.as_str().to_string()),
        (None, None) => None,
    }
}

/// Undoes git's C-style path quoting; octal escapes are raw UTF-8 bytes.
fn unquote(quoted: &str) -> String {
    let src = quoted.as_bytes();
    let mut bytes = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if src[i] != b'\\' || i + 1 == src.len() {
            bytes.push(src[i]);
            i += 1;
            continue;
        }
        let digits = src[i + 1..].iter().take(3).take_while(|&&b| (b'0'..=b'7').contains(&b)).count();
        if digits > 0 {
            let value = src[i + 1..i + 1 + digits].iter().fold(0u32, |acc, &b| acc * 8 + u32::from(b - b'0'));
            bytes.push(value as u8);
            i += 1 + digits;
            continue;
        }
        bytes.push(match src[i + 1] {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            other => other,
        });
        i += 2;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// `@@ -a,b +c,d @@trailer` -> an empty piece
fn parse_hunk_header(line: &str) -> Option<Piece> {
    let captures = HUNK_HEADER_RE.captures(line)?;
    Some(Piece {
        from_start: captures[1].parse().ok()?,
        from_count: captures[2].parse().ok()?,
        to_start: captures[3].parse().ok()?,
        to_count: captures[4].parse().ok()?,
        header_trailer: captures[5].to_string(),
        lines: Vec::new(),
    })
}

struct ParseState<'a> {
    path_hint: Option<&'a str>,
    path: Option<String>,
    index_line: Option<String>,
    piece: Option<Piece>,
    pieces: Vec<Piece>,
    files: Vec<File>,
}

impl<'a> ParseState<'a> {
    fn new(path_hint: Option<&'a str>) -> Self {
        ParseState {
            path_hint,
            path: None,
            index_line: None,
            piece: None,
            pieces: Vec::new(),
            files: Vec::new(),
        }
    }

    fn start_file(&mut self, path: String) {
        self.flush_piece();
        self.flush_file();
        self.path = Some(path);
        self.index_line = None;
    }

    fn start_piece(&mut self, piece: Piece) {
        self.flush_piece();
        self.piece = Some(piece);
    }

    fn push_line(&mut self, line: &str) {
        if let Some(piece) = self.piece.as_mut() {
            piece.lines.push(Line::parse(line));
        }
    }

    fn flush_piece(&mut self) {
        if let Some(piece) = self.piece.take() {
            if !piece.lines.is_empty() {
                self.pieces.push(piece);
            }
        }
    }

    fn flush_file(&mut self) {
        if self.pieces.is_empty() {
            return;
        }
        let pieces = std::mem::take(&mut self.pieces);
        let path = self.path_hint.map(str::to_string).or_else(|| self.path.clone());
        match path {
            Some(path) => self.files.push(File::new(path, self.index_line.take(), pieces)),
            None => debug!("dropping {} pieces without a file header", pieces.len()),
        }
    }

    fn finish(mut self) -> Vec<File> {
        self.flush_piece();
        self.flush_file();
        self.files
    }
}
