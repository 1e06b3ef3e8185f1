//! Core data models used throughout forestmind.
//!
//! These types represent the chunks, symbols, and search hits that flow
//! through the indexing and retrieval pipeline.

use std::path::PathBuf;

/// A fresh line-window chunk produced by the chunker, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkWindow {
    /// 0-based position among the file's windows.
    pub index: i64,
    /// Exact text of the window (lines joined with `\n`).
    pub text: String,
    /// Hex SHA-256 of `text`, the change-detection key.
    pub fingerprint: String,
}

/// A chunk row as stored in `vector_index`.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: i64,
    pub chunk_index: i64,
    pub chunk_hash: String,
}

/// A symbol record extracted from a parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRecord {
    /// Symbol kind from the query's kind capture (e.g. `"function"`).
    pub kind: String,
    pub name: String,
    /// 1-indexed, inclusive.
    pub start_line: i64,
    /// 1-indexed, inclusive.
    pub end_line: i64,
    /// Stable identity key: `kind:name(normalizedParams)`.
    pub signature: String,
}

/// A debounced filesystem event routed to the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileEvent {
    /// File added or changed; contents should be (re)indexed.
    Changed(PathBuf),
    /// File removed; all rows for it must be deleted.
    Removed(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileEvent::Changed(p) | FileEvent::Removed(p) => p,
        }
    }
}

/// A semantic retrieval hit: one stored chunk ranked by cosine similarity.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub file_path: String,
    pub content: String,
    pub score: f32,
}

/// A structural retrieval hit: one matched symbol with its live snippet.
#[derive(Debug, Clone)]
pub struct SymbolHit {
    pub file_path: String,
    pub kind: String,
    pub name: String,
    pub start_line: i64,
    pub end_line: i64,
    pub signature: String,
    /// Lines `[start_line, end_line]` read back from disk; empty when the
    /// file is gone or the range is stale.
    pub snippet: String,
}
