//! Discovering and reading plain-text source documents (`.md`, `.txt`).
//!
//! This is the local stand-in for the crawler and PDF extractors: it only reads text
//! files the user points at.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const EXTENSIONS: &[&str] = &["md", "txt"];

/// A source file: path and body (YAML frontmatter stripped).
#[derive(Debug, Clone)]
pub struct SourceDoc {
    pub path: PathBuf,
    pub body: String,
}

/// Scans `root` for text documents. Hidden files and directories are skipped.
pub fn scan_sources(root: &Path) -> Result<Vec<SourceDoc>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let mut docs = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry.map_err(|e| ScanError::Walk(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file() && has_text_extension(path) {
            docs.push(read_source(path)?);
        }
    }
    Ok(docs)
}

/// Reads a single document.
pub fn read_source(path: &Path) -> Result<SourceDoc, ScanError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ScanError::Read(path.to_path_buf(), e))?;
    Ok(SourceDoc {
        path: path.to_path_buf(),
        body: strip_frontmatter(&raw),
    })
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Removes optional YAML frontmatter (lines between first --- and second ---).
fn strip_frontmatter(content: &str) -> String {
    let s = content.trim_start();
    if !s.starts_with("---") {
        return content.to_string();
    }
    let after_first = s.strip_prefix("---").unwrap_or(s).trim_start();
    if let Some(rest) = after_first.find("\n---") {
        after_first[rest + 4..].trim_start().to_string()
    } else {
        content.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
}
