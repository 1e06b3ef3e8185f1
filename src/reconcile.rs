//! Diff planners for the two persisted indexes.
//!
//! Both planners are pure: they compare a file's fresh extraction against
//! the rows previously stored for that (file, session) and emit the
//! minimal set of inserts, updates, and deletes. Persistence is applied
//! separately by [`crate::indexer`], which lets the diff logic be tested
//! without a database.
//!
//! Ghost detection is map-based: stored rows are keyed into maps consumed
//! by removal as fresh items match; whatever keys remain after the pass
//! are the ghosts to delete.

use std::collections::HashMap;

use crate::models::{ChunkWindow, StoredChunk, SymbolRecord};

/// Plan for syncing one file's chunk windows into `vector_index`.
///
/// Fresh-chunk classification, in order of preference:
///
/// 1. **Fingerprint match** (`refresh_text`) — content unchanged but
///    possibly shifted to a new index; the stored text and index are
///    refreshed, the embedding is kept as is.
/// 2. **Index match** (`rewrite`) — same position, different content;
///    text, fingerprint, and embedding are all replaced.
/// 3. **Newcomer** (`insert`) — brand-new row.
///
/// Preferring fingerprint over index matches is what avoids recomputing
/// embeddings when a block of text merely moves: only `rewrite` and
/// `insert` entries need an embedding.
#[derive(Debug, Default, PartialEq)]
pub struct ChunkPlan {
    /// `(stored row id, fresh chunk position)` pairs for path 1.
    pub refresh_text: Vec<(i64, usize)>,
    /// `(stored row id, fresh chunk position)` pairs for path 2.
    pub rewrite: Vec<(i64, usize)>,
    /// Fresh chunk positions for path 3.
    pub insert: Vec<usize>,
    /// Stored row ids with no fresh counterpart.
    pub ghost_ids: Vec<i64>,
}

impl ChunkPlan {
    /// Fresh chunk positions whose embeddings must be computed.
    pub fn embedding_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .rewrite
            .iter()
            .map(|(_, pos)| *pos)
            .chain(self.insert.iter().copied())
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn is_noop(&self) -> bool {
        self.refresh_text.is_empty()
            && self.rewrite.is_empty()
            && self.insert.is_empty()
            && self.ghost_ids.is_empty()
    }
}

/// Three-way diff of fresh chunk windows against stored rows.
///
/// Fingerprint matching runs as a full pass over the fresh list before
/// any index matching: an index match may only consume rows no
/// fingerprint anywhere in the file claims, so an earlier chunk's
/// position can never steal the stored row of a block that merely moved.
pub fn plan_chunk_sync(fresh: &[ChunkWindow], existing: &[StoredChunk]) -> ChunkPlan {
    let mut matched = vec![false; existing.len()];

    // A fingerprint can repeat within a file (identical windows); keep
    // every row position so each fresh duplicate consumes one.
    let mut by_hash: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut by_index: HashMap<i64, usize> = HashMap::new();
    for (pos, row) in existing.iter().enumerate() {
        by_hash.entry(row.chunk_hash.as_str()).or_default().push(pos);
        by_index.insert(row.chunk_index, pos);
    }

    let mut plan = ChunkPlan::default();
    let mut unresolved = Vec::new();

    for (fresh_pos, chunk) in fresh.iter().enumerate() {
        let hash_match = by_hash
            .get_mut(chunk.fingerprint.as_str())
            .and_then(|rows| {
                let slot = rows.iter().position(|&p| !matched[p]);
                slot.map(|i| rows.remove(i))
            });

        match hash_match {
            Some(row_pos) => {
                matched[row_pos] = true;
                plan.refresh_text.push((existing[row_pos].id, fresh_pos));
            }
            None => unresolved.push(fresh_pos),
        }
    }

    for fresh_pos in unresolved {
        match by_index.get(&fresh[fresh_pos].index) {
            Some(&row_pos) if !matched[row_pos] => {
                matched[row_pos] = true;
                plan.rewrite.push((existing[row_pos].id, fresh_pos));
            }
            _ => plan.insert.push(fresh_pos),
        }
    }

    plan.ghost_ids = existing
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(row, _)| row.id)
        .collect();

    plan
}

/// Plan for syncing one file's symbols into `code_map`.
#[derive(Debug, Default, PartialEq)]
pub struct SymbolPlan {
    /// Fresh symbol positions whose signature already exists; only the
    /// stored line range is updated ("stayers").
    pub update: Vec<usize>,
    /// Fresh symbol positions with a new signature.
    pub insert: Vec<usize>,
    /// Stored signatures with no fresh counterpart.
    pub ghost_signatures: Vec<String>,
}

/// Diff fresh symbols against the signatures previously stored for the
/// file.
///
/// A duplicate signature within one extraction (e.g. two overloads that
/// normalize identically) is kept once; later occurrences are dropped so
/// the unique (file, signature, session) constraint cannot trip mid-sync.
pub fn plan_symbol_sync(fresh: &[SymbolRecord], existing_signatures: &[String]) -> SymbolPlan {
    let mut remaining: HashMap<&str, ()> = existing_signatures
        .iter()
        .map(|s| (s.as_str(), ()))
        .collect();

    let mut plan = SymbolPlan::default();
    let mut seen: HashMap<&str, ()> = HashMap::new();

    for (pos, symbol) in fresh.iter().enumerate() {
        if seen.insert(symbol.signature.as_str(), ()).is_some() {
            continue;
        }
        if remaining.remove(symbol.signature.as_str()).is_some() {
            plan.update.push(pos);
        } else {
            plan.insert.push(pos);
        }
    }

    plan.ghost_signatures = remaining.into_keys().map(String::from).collect();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_lines, fingerprint};

    fn stored(id: i64, index: i64, hash: &str) -> StoredChunk {
        StoredChunk {
            id,
            chunk_index: index,
            chunk_hash: hash.to_string(),
        }
    }

    fn window(index: i64, text: &str) -> ChunkWindow {
        ChunkWindow {
            index,
            fingerprint: fingerprint(text),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_first_index_all_inserts() {
        let fresh = vec![window(0, "a"), window(1, "b")];
        let plan = plan_chunk_sync(&fresh, &[]);
        assert_eq!(plan.insert, vec![0, 1]);
        assert!(plan.refresh_text.is_empty());
        assert!(plan.rewrite.is_empty());
        assert!(plan.ghost_ids.is_empty());
        assert_eq!(plan.embedding_positions(), vec![0, 1]);
    }

    #[test]
    fn test_unchanged_content_is_fixed_point() {
        let fresh = vec![window(0, "a"), window(1, "b")];
        let existing = vec![
            stored(10, 0, &fingerprint("a")),
            stored(11, 1, &fingerprint("b")),
        ];
        let plan = plan_chunk_sync(&fresh, &existing);
        // Hash matches refresh text but insert/delete nothing and need no
        // embeddings.
        assert_eq!(plan.refresh_text, vec![(10, 0), (11, 1)]);
        assert!(plan.insert.is_empty());
        assert!(plan.ghost_ids.is_empty());
        assert!(plan.embedding_positions().is_empty());
    }

    #[test]
    fn test_shifted_block_matches_by_fingerprint() {
        // A block whose index shifted keeps its embedding: hash match
        // beats index match.
        let fresh = vec![window(0, "new top"), window(1, "stable block")];
        let existing = vec![stored(20, 0, &fingerprint("stable block"))];
        let plan = plan_chunk_sync(&fresh, &existing);
        assert_eq!(plan.refresh_text, vec![(20, 1)]);
        assert_eq!(plan.insert, vec![0]);
        assert!(plan.rewrite.is_empty());
        assert!(plan.ghost_ids.is_empty());
        // Only the genuinely new window needs an embedding.
        assert_eq!(plan.embedding_positions(), vec![0]);
    }

    #[test]
    fn test_same_index_different_content_rewrites() {
        let fresh = vec![window(0, "edited")];
        let existing = vec![stored(30, 0, &fingerprint("original"))];
        let plan = plan_chunk_sync(&fresh, &existing);
        assert_eq!(plan.rewrite, vec![(30, 0)]);
        assert!(plan.ghost_ids.is_empty());
        assert_eq!(plan.embedding_positions(), vec![0]);
    }

    #[test]
    fn test_index_match_never_steals_a_later_hash_match() {
        // The chunk at index 0 changed; the block that used to live
        // there reappears at index 2. The edited chunk must not consume
        // the moved block's row by index, which would force a
        // re-embedding of content that merely moved.
        let fresh = vec![
            window(0, "edited top"),
            window(1, "middle"),
            window(2, "moved block"),
        ];
        let existing = vec![
            stored(40, 0, &fingerprint("moved block")),
            stored(41, 1, &fingerprint("middle")),
        ];
        let plan = plan_chunk_sync(&fresh, &existing);
        assert_eq!(plan.refresh_text, vec![(41, 1), (40, 2)]);
        assert_eq!(plan.insert, vec![0]);
        assert!(plan.rewrite.is_empty());
        assert!(plan.ghost_ids.is_empty());
        assert_eq!(plan.embedding_positions(), vec![0]);
    }

    #[test]
    fn test_shrunk_file_ghosts_trailing_rows() {
        let fresh = vec![window(0, "a")];
        let existing = vec![
            stored(1, 0, &fingerprint("a")),
            stored(2, 1, &fingerprint("b")),
            stored(3, 2, &fingerprint("c")),
        ];
        let plan = plan_chunk_sync(&fresh, &existing);
        assert_eq!(plan.ghost_ids, vec![2, 3]);
    }

    #[test]
    fn test_duplicate_fingerprints_consume_one_row_each() {
        let dup = fingerprint("same");
        let fresh = vec![window(0, "same"), window(1, "same")];
        let existing = vec![stored(1, 0, &dup), stored(2, 1, &dup)];
        let plan = plan_chunk_sync(&fresh, &existing);
        assert_eq!(plan.refresh_text.len(), 2);
        assert!(plan.ghost_ids.is_empty());
    }

    #[test]
    fn test_stride_aligned_removal_reuses_every_embedding() {
        // Deleting exactly one stride of lines from the top realigns
        // every remaining window on a stored fingerprint: the whole file
        // shifts, yet nothing re-embeds and only the vacated window is
        // ghosted.
        let lines: Vec<String> = (1..=130).map(|i| format!("line {i}")).collect();
        let original = lines.join("\n");
        let trimmed = lines[40..].join("\n");

        let before = chunk_lines(&original);
        assert_eq!(before.len(), 3);
        let existing: Vec<StoredChunk> = before
            .iter()
            .map(|c| stored(c.index + 1, c.index, &c.fingerprint))
            .collect();

        let after = chunk_lines(&trimmed);
        assert_eq!(after.len(), 2);
        let plan = plan_chunk_sync(&after, &existing);

        assert!(plan.embedding_positions().is_empty());
        assert_eq!(plan.refresh_text.len(), after.len());
        assert!(plan.rewrite.is_empty());
        assert_eq!(plan.ghost_ids, vec![1]);
    }

    fn symbol(signature: &str) -> SymbolRecord {
        SymbolRecord {
            kind: "function".to_string(),
            name: signature.to_string(),
            start_line: 1,
            end_line: 2,
            signature: signature.to_string(),
        }
    }

    #[test]
    fn test_symbol_stayers_and_ghosts() {
        let fresh = vec![symbol("function:a()"), symbol("function:b()")];
        let existing = vec!["function:a()".to_string(), "function:gone()".to_string()];
        let plan = plan_symbol_sync(&fresh, &existing);
        assert_eq!(plan.update, vec![0]);
        assert_eq!(plan.insert, vec![1]);
        assert_eq!(plan.ghost_signatures, vec!["function:gone()".to_string()]);
    }

    #[test]
    fn test_symbol_sync_is_fixed_point() {
        let fresh = vec![symbol("function:a()")];
        let existing = vec!["function:a()".to_string()];
        let plan = plan_symbol_sync(&fresh, &existing);
        assert_eq!(plan.update, vec![0]);
        assert!(plan.insert.is_empty());
        assert!(plan.ghost_signatures.is_empty());
    }

    #[test]
    fn test_duplicate_signatures_kept_once() {
        let fresh = vec![symbol("function:dup()"), symbol("function:dup()")];
        let plan = plan_symbol_sync(&fresh, &[]);
        assert_eq!(plan.insert, vec![0]);
    }
}
