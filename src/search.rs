//! Retrieval over the two persisted indexes.
//!
//! Semantic retrieval embeds the query, ranks every stored chunk for the
//! session by cosine similarity, and returns the top-K. Structural
//! retrieval matches keywords against symbol names and signatures, then
//! reads each match's line range back from the live file as a snippet.
//!
//! Both paths are read-only and may run concurrently with indexing; a
//! query racing an in-flight sync can observe a transiently partial row
//! set, which is accepted as eventual consistency.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, embed_query};
use crate::models::{SemanticHit, SymbolHit};

/// Rank all stored chunks for `session_id` against `query`, best first.
pub async fn semantic_search(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    session_id: &str,
    k: usize,
) -> Result<Vec<SemanticHit>> {
    let query_vec = embed_query(&config.embedding, query).await?;

    let rows = sqlx::query(
        "SELECT file_path, raw_content, embedding FROM vector_index WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let mut hits: Vec<SemanticHit> = rows
        .iter()
        .map(|row| {
            // Rows indexed while the provider was down carry no vector;
            // they rank as 0 rather than failing the query.
            let score = row
                .get::<Option<Vec<u8>>, _>("embedding")
                .map(|blob| cosine_similarity(&query_vec, &blob_to_vec(&blob)))
                .unwrap_or(0.0);
            SemanticHit {
                file_path: row.get("file_path"),
                content: row.get("raw_content"),
                score,
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);

    debug!(session = session_id, hits = hits.len(), "semantic search");
    Ok(hits)
}

/// Match `keywords` against stored symbol names and signatures.
///
/// A symbol qualifies when any keyword occurs as a substring
/// (`LIKE '%kw%'`) of its name or signature, so "delete" finds
/// `deleteUser`. Snippets come from the live file; a missing file or
/// stale line range yields an empty snippet for that match rather than
/// aborting the query.
pub async fn symbol_search(
    pool: &SqlitePool,
    keywords: &[String],
    limit: i64,
) -> Result<Vec<SymbolHit>> {
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    let clauses = vec!["(name LIKE ? OR signature LIKE ?)"; keywords.len()].join(" OR ");
    let sql = format!(
        "SELECT file_path, type, name, start_line, end_line, signature FROM code_map WHERE {} LIMIT ?",
        clauses
    );

    let mut query = sqlx::query(&sql);
    for keyword in keywords {
        let pattern = format!("%{}%", keyword);
        query = query.bind(pattern.clone()).bind(pattern);
    }
    query = query.bind(limit);

    let rows = query.fetch_all(pool).await?;

    let hits = rows
        .iter()
        .map(|row| {
            let file_path: String = row.get("file_path");
            let start_line: i64 = row.get("start_line");
            let end_line: i64 = row.get("end_line");
            let snippet = read_snippet(Path::new(&file_path), start_line, end_line);
            SymbolHit {
                file_path,
                kind: row.get("type"),
                name: row.get("name"),
                start_line,
                end_line,
                signature: row.get("signature"),
                snippet,
            }
        })
        .collect();

    Ok(hits)
}

/// Slice lines `[start_line, end_line]` (1-indexed, inclusive) out of the
/// file on disk. Returns an empty string when the file is unreadable or
/// the range no longer fits.
pub fn read_snippet(path: &Path, start_line: i64, end_line: i64) -> String {
    let Ok(content) = std::fs::read_to_string(path) else {
        return String::new();
    };
    if start_line < 1 || end_line < start_line {
        return String::new();
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let start = (start_line - 1) as usize;
    if start >= lines.len() {
        return String::new();
    }
    let end = (end_line as usize).min(lines.len());

    lines[start..end].join("\n")
}

/// Context strings handed to the chat layer for a semantic result set.
pub fn render_semantic(hits: &[SemanticHit]) -> Vec<String> {
    hits.iter()
        .map(|hit| format!("Chunk for -> Filepath: ({})\n=============\n{}", hit.file_path, hit.content))
        .collect()
}

/// Context strings for a structural result set, with file/line headers.
pub fn render_symbols(hits: &[SymbolHit]) -> Vec<String> {
    hits.iter()
        .map(|hit| {
            format!(
                "Chunk for -> Filepath: ({}), Lines: ({}-{})\n====================\n{}",
                hit.file_path, hit.start_line, hit.end_line, hit.snippet
            )
        })
        .collect()
}
