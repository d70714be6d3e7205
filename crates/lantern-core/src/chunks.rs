//! Splits document bodies into chunks before they are embedded.
//! Prefers paragraph boundaries; falls back to line breaks, then spaces, then hard cuts.

use std::path::PathBuf;

use crate::sources::SourceDoc;

/// Default maximum bytes per chunk. Keeps chunks small enough for embedding models.
pub const DEFAULT_MAX_CHARS: usize = 512;

/// A chunk of text from a source document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    /// Index of this chunk within the document (0, 1, 2, …).
    pub index: usize,
}

/// Chunk a single document's body into smaller pieces.
pub fn chunk_source(doc: &SourceDoc, max_chars: usize) -> Vec<Chunk> {
    chunk_text(&doc.body, max_chars)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            source: doc.path.clone(),
            index,
        })
        .collect()
}

/// Chunk all documents. Returns chunks from all documents in order.
pub fn chunk_sources(docs: &[SourceDoc], max_chars: usize) -> Vec<Chunk> {
    docs.iter().flat_map(|d| chunk_source(d, max_chars)).collect()
}

/// Splits text into trimmed, non-empty pieces of at most `max_chars` bytes.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![text.to_string()];
    }
    let mut result = Vec::new();
    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if para.len() <= max_chars {
            result.push(para.to_string());
        } else {
            result.extend(split_long_text(para, max_chars));
        }
    }
    result.retain(|c| !c.is_empty());
    result
}

fn split_long_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            result.push(remaining.trim().to_string());
            break;
        }
        let (chunk, rest) = split_at_boundary(remaining, max_chars);
        result.push(chunk.trim().to_string());
        remaining = rest.trim_start();
    }
    result
}

/// Prefer split at \n; else at last space within the limit; else hard cut.
fn split_at_boundary(text: &str, max_chars: usize) -> (&str, &str) {
    let window = &text[..floor_char_boundary(text, max_chars + 1)];
    if let Some(pos) = window.rfind('\n').filter(|&p| p > 0) {
        return (&text[..pos], &text[pos + 1..]);
    }
    if let Some(pos) = window.rfind(' ').filter(|&p| p > 0) {
        return (&text[..pos], &text[pos + 1..]);
    }
    let cut = floor_char_boundary(text, max_chars);
    // A single char wider than the limit still has to move forward.
    let cut = if cut == 0 {
        text.chars().next().map_or(text.len(), char::len_utf8)
    } else {
        cut
    };
    text.split_at(cut)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0)
}
