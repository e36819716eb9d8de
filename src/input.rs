// src/input.rs

use crate::error::{AnalyzerError, Result};
use crate::model::{PullRequest, RawComment};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

fn load_json_lines<T: DeserializeOwned>(path: &Path, limit: Option<usize>) -> Result<Vec<T>> {
    let file = fs::File::open(path).map_err(|e| AnalyzerError::io(path, e))?;
    let mut items = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        if limit.is_some_and(|limit| items.len() >= limit) {
            break;
        }
        let line = line.map_err(|e| AnalyzerError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| AnalyzerError::Input {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

pub fn load_raw_comments(path: &Path, limit: Option<usize>) -> Result<Vec<RawComment>> {
    load_json_lines(path, limit)
}

/// Closed pull requests only; `limit` applies after filtering.
pub fn load_pull_requests(path: &Path, limit: Option<usize>) -> Result<Vec<PullRequest>> {
    let mut prs: Vec<PullRequest> = load_json_lines(path, None)?;
    prs.retain(PullRequest::is_closed);
    if let Some(limit) = limit {
        prs.truncate(limit);
    }
    Ok(prs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_closed_pull_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prs.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"id": 1, "state": "closed", "diff": "a"}"#, "\n",
                r#"{"id": 2, "state": "open", "diff": "b"}"#, "\n",
                "\n",
                r#"{"id": 3, "state": "closed", "diff": "c"}"#, "\n",
            ),
        )
        .unwrap();
        let prs = load_pull_requests(&path, None).unwrap();
        assert_eq!(prs.iter().map(|pr| pr.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(load_pull_requests(&path, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn reports_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rcs.jsonl");
        fs::write(&path, "{\"id\": 1, \"path\": \"a.py\", \"diff_hunk\": \"@@\"}\n{oops\n").unwrap();
        match load_raw_comments(&path, None) {
            Err(AnalyzerError::Input { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|rcs| rcs.len())),
        }
        assert_eq!(load_raw_comments(&path, Some(1)).unwrap().len(), 1);
    }
}
