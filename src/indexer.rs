//! Per-file sync orchestration.
//!
//! [`sync_file`] is the single entry point the watcher (and the one-shot
//! CLI scan) routes add/change events through: chunk the file, diff
//! against the stored rows, embed only what the plan demands, and apply
//! the plan inside one transaction per index. [`remove_file`] handles
//! delete events.
//!
//! Failure policy per file:
//! - unsupported extension: skipped silently before any I/O;
//! - embedding provider failure: the semantic update is skipped this
//!   cycle (a later event retries), the structural sync still runs;
//! - parse failure: logged, the file's existing `code_map` rows are left
//!   untouched — never treated as "zero symbols found";
//! - store failure: aborts this file's sync and propagates so the caller
//!   does not mark the file processed.

use std::path::Path;

use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::chunk::chunk_lines_with;
use crate::config::Config;
use crate::embedding::{embed_texts, vec_to_blob};
use crate::error::{IndexError, Result};
use crate::models::{ChunkWindow, StoredChunk};
use crate::reconcile::{plan_chunk_sync, plan_symbol_sync};
use crate::symbols::{extract_symbols, is_source_file};

/// Counters from one vector sync, mirrored into the logs.
#[derive(Debug, Default, PartialEq)]
pub struct VectorStats {
    pub same_hash: usize,
    pub same_index: usize,
    pub inserted: usize,
    pub ghosts: usize,
}

/// Counters from one symbol sync.
#[derive(Debug, Default, PartialEq)]
pub struct SymbolStats {
    pub stayers: usize,
    pub newcomers: usize,
    pub ghosts: usize,
}

/// Re-index one file into both persisted indexes.
pub async fn sync_file(
    pool: &SqlitePool,
    config: &Config,
    path: &Path,
    session_id: &str,
) -> Result<()> {
    if !is_source_file(path) {
        debug!(path = %path.display(), "skipping unsupported file type");
        return Ok(());
    }

    let source = std::fs::read_to_string(path).map_err(|e| IndexError::FileRead {
        path: path.into(),
        source: e,
    })?;
    let file_path = path.to_string_lossy().to_string();

    match sync_vectors(pool, config, &file_path, session_id, &source).await {
        Ok(stats) => {
            if stats != VectorStats::default() {
                info!(
                    file = %file_path,
                    same_hash = stats.same_hash,
                    same_index = stats.same_index,
                    inserted = stats.inserted,
                    ghosts = stats.ghosts,
                    "vector index synced"
                );
            }
        }
        // Provider outages skip this cycle's semantic update; the
        // structural sync below still runs.
        Err(IndexError::Provider(e)) => {
            warn!(file = %file_path, error = %e, "embedding unavailable, semantic update skipped");
        }
        Err(e) => return Err(e),
    }

    match sync_symbols(pool, path, &file_path, session_id, &source).await {
        Ok(stats) => {
            info!(
                file = %file_path,
                stayers = stats.stayers,
                newcomers = stats.newcomers,
                ghosts = stats.ghosts,
                "code map synced"
            );
            Ok(())
        }
        Err(IndexError::ParseFailure { path, reason }) => {
            warn!(file = %path.display(), %reason, "parse failed, structural rows preserved");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Delete all rows for `path` in both tables, scoped to `session_id`.
///
/// Rows for a same-named file attached under a different session are
/// untouched.
pub async fn remove_file(pool: &SqlitePool, path: &Path, session_id: &str) -> Result<()> {
    let file_path = path.to_string_lossy().to_string();

    sqlx::query("DELETE FROM vector_index WHERE file_path = ? AND session_id = ?")
        .bind(&file_path)
        .bind(session_id)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM code_map WHERE file_path = ? AND session_id = ?")
        .bind(&file_path)
        .bind(session_id)
        .execute(pool)
        .await?;

    info!(file = %file_path, session = session_id, "removed from both indexes");
    Ok(())
}

async fn sync_vectors(
    pool: &SqlitePool,
    config: &Config,
    file_path: &str,
    session_id: &str,
    source: &str,
) -> Result<VectorStats> {
    let fresh = chunk_lines_with(
        source,
        config.chunking.window_lines,
        config.chunking.stride_lines,
    );

    let existing = load_stored_chunks(pool, file_path, session_id).await?;
    let plan = plan_chunk_sync(&fresh, &existing);

    if plan.is_noop() {
        return Ok(VectorStats::default());
    }

    // Embeddings are requested only for rewrites and inserts; pure moves
    // and ghost deletions go through without touching the provider.
    let positions = plan.embedding_positions();
    let vectors = if positions.is_empty() {
        Vec::new()
    } else {
        let texts: Vec<String> = positions.iter().map(|&p| fresh[p].text.clone()).collect();
        embed_texts(&config.embedding, &texts)
            .await
            .map_err(IndexError::Provider)?
    };
    let vector_for = |pos: usize| -> Option<&Vec<f32>> {
        positions.iter().position(|&p| p == pos).and_then(|i| vectors.get(i))
    };

    let stats = VectorStats {
        same_hash: plan.refresh_text.len(),
        same_index: plan.rewrite.len(),
        inserted: plan.insert.len(),
        ghosts: plan.ghost_ids.len(),
    };

    let mut tx = pool.begin().await?;

    // Ghosts go first so the indexes they held are free for reuse.
    for ghost_id in &plan.ghost_ids {
        sqlx::query("DELETE FROM vector_index WHERE id = ?")
            .bind(ghost_id)
            .execute(&mut *tx)
            .await?;
    }

    // Park every surviving row on a distinct negative index before
    // reassignment. A moved block may land on an index another surviving
    // row still holds, and the unique (file_path, chunk_index,
    // session_id) key is enforced per statement, not per transaction.
    for (row_id, fresh_pos) in plan.refresh_text.iter().chain(plan.rewrite.iter()) {
        sqlx::query("UPDATE vector_index SET chunk_index = ? WHERE id = ?")
            .bind(-(*fresh_pos as i64) - 1)
            .bind(row_id)
            .execute(&mut *tx)
            .await?;
    }

    for (row_id, fresh_pos) in &plan.refresh_text {
        let chunk: &ChunkWindow = &fresh[*fresh_pos];
        sqlx::query("UPDATE vector_index SET chunk_index = ?, raw_content = ? WHERE id = ?")
            .bind(chunk.index)
            .bind(&chunk.text)
            .bind(row_id)
            .execute(&mut *tx)
            .await?;
    }

    for (row_id, fresh_pos) in &plan.rewrite {
        let chunk: &ChunkWindow = &fresh[*fresh_pos];
        let blob = vector_for(*fresh_pos).map(|v| vec_to_blob(v));
        sqlx::query(
            "UPDATE vector_index SET chunk_index = ?, raw_content = ?, chunk_hash = ?, embedding = ? WHERE id = ?",
        )
        .bind(chunk.index)
        .bind(&chunk.text)
        .bind(&chunk.fingerprint)
        .bind(&blob)
        .bind(row_id)
        .execute(&mut *tx)
        .await?;
    }

    // Matched rows all sit on their final indexes now; fresh indexes are
    // unique, so inserts cannot collide.
    for fresh_pos in &plan.insert {
        let chunk: &ChunkWindow = &fresh[*fresh_pos];
        let blob = vector_for(*fresh_pos).map(|v| vec_to_blob(v));
        sqlx::query(
            r#"
            INSERT INTO vector_index (file_path, chunk_index, chunk_hash, embedding, raw_content, session_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(file_path)
        .bind(chunk.index)
        .bind(&chunk.fingerprint)
        .bind(&blob)
        .bind(&chunk.text)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(stats)
}

async fn load_stored_chunks(
    pool: &SqlitePool,
    file_path: &str,
    session_id: &str,
) -> Result<Vec<StoredChunk>> {
    let rows = sqlx::query(
        "SELECT id, chunk_index, chunk_hash FROM vector_index WHERE file_path = ? AND session_id = ?",
    )
    .bind(file_path)
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StoredChunk {
            id: row.get("id"),
            chunk_index: row.get("chunk_index"),
            chunk_hash: row.get("chunk_hash"),
        })
        .collect())
}

async fn sync_symbols(
    pool: &SqlitePool,
    path: &Path,
    file_path: &str,
    session_id: &str,
    source: &str,
) -> Result<SymbolStats> {
    let fresh = extract_symbols(path, source)?;

    let existing: Vec<String> =
        sqlx::query_scalar("SELECT signature FROM code_map WHERE file_path = ? AND session_id = ?")
            .bind(file_path)
            .bind(session_id)
            .fetch_all(pool)
            .await?;

    let plan = plan_symbol_sync(&fresh, &existing);

    let stats = SymbolStats {
        stayers: plan.update.len(),
        newcomers: plan.insert.len(),
        ghosts: plan.ghost_signatures.len(),
    };

    // One transaction per file: a crash mid-sync cannot leave
    // half-applied symbol deletions visible.
    let mut tx = pool.begin().await?;

    for pos in &plan.update {
        let symbol = &fresh[*pos];
        sqlx::query(
            r#"
            UPDATE code_map SET start_line = ?, end_line = ?
            WHERE file_path = ? AND signature = ? AND session_id = ?
            "#,
        )
        .bind(symbol.start_line)
        .bind(symbol.end_line)
        .bind(file_path)
        .bind(&symbol.signature)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
    }

    for pos in &plan.insert {
        let symbol = &fresh[*pos];
        sqlx::query(
            r#"
            INSERT INTO code_map (file_path, type, name, start_line, end_line, signature, session_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(file_path)
        .bind(&symbol.kind)
        .bind(&symbol.name)
        .bind(symbol.start_line)
        .bind(symbol.end_line)
        .bind(&symbol.signature)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
    }

    for signature in &plan.ghost_signatures {
        sqlx::query("DELETE FROM code_map WHERE signature = ? AND file_path = ? AND session_id = ?")
            .bind(signature)
            .bind(file_path)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(stats)
}
