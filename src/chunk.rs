//! Fixed-size overlapping line-window chunker.
//!
//! Splits a file's text into windows of up to [`WINDOW_LINES`] lines,
//! starting a new window every [`STRIDE_LINES`] lines, so consecutive
//! windows share a 10-line overlap. Each window is fingerprinted with
//! SHA-256 for cheap change detection in the reconciler.
//!
//! Chunking is a pure function of the input text: the same text always
//! yields the same `(index, fingerprint)` sequence, which is what makes
//! the diff-based sync in [`crate::reconcile`] possible.

use sha2::{Digest, Sha256};

use crate::models::ChunkWindow;

/// Maximum lines per window.
pub const WINDOW_LINES: usize = 50;
/// Lines between consecutive window starts (overlap = window - stride).
pub const STRIDE_LINES: usize = 40;

/// Split `text` into overlapping line windows.
///
/// The final partial window is emitted even when shorter than a full
/// window, and production stops once a window reaches the end of the
/// text. Empty text yields no chunks.
pub fn chunk_lines(text: &str) -> Vec<ChunkWindow> {
    chunk_lines_with(text, WINDOW_LINES, STRIDE_LINES)
}

/// [`chunk_lines`] with explicit window and stride, for configuration
/// overrides and tests.
pub fn chunk_lines_with(text: &str, window: usize, stride: usize) -> Vec<ChunkWindow> {
    if text.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks = Vec::new();
    let mut index: i64 = 0;
    let mut start = 0usize;

    loop {
        let end = (start + window).min(lines.len());
        let window_text = lines[start..end].join("\n");
        chunks.push(ChunkWindow {
            index,
            fingerprint: fingerprint(&window_text),
            text: window_text,
        });
        index += 1;

        // Stop once this window reached or passed the end of the file.
        if start + window >= lines.len() {
            break;
        }
        start += stride;
    }

    chunks
}

/// Hex-encoded SHA-256 of the exact text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_empty_text_zero_chunks() {
        assert!(chunk_lines("").is_empty());
    }

    #[test]
    fn test_short_file_single_chunk() {
        let text = numbered_lines(45);
        let chunks = chunk_lines(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_hundred_lines_three_chunks() {
        let text = numbered_lines(100);
        let chunks = chunk_lines(&text);
        assert_eq!(chunks.len(), 3);

        // index 0: lines 1-50, index 1: lines 41-90, index 2: lines 81-100
        assert!(chunks[0].text.starts_with("line 1\n"));
        assert!(chunks[0].text.ends_with("line 50"));
        assert!(chunks[1].text.starts_with("line 41\n"));
        assert!(chunks[1].text.ends_with("line 90"));
        assert!(chunks[2].text.starts_with("line 81\n"));
        assert!(chunks[2].text.ends_with("line 100"));
    }

    #[test]
    fn test_exact_window_stops_after_one() {
        let text = numbered_lines(50);
        let chunks = chunk_lines(&text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_indices_contiguous() {
        let chunks = chunk_lines(&numbered_lines(250));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i as i64);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_lines(123);
        let a = chunk_lines(&text);
        let b = chunk_lines(&text);
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlap_between_windows() {
        let chunks = chunk_lines(&numbered_lines(100));
        // Last 10 lines of window 0 are the first 10 lines of window 1.
        let tail: Vec<&str> = chunks[0].text.split('\n').skip(40).collect();
        let head: Vec<&str> = chunks[1].text.split('\n').take(10).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint("hello\nworld");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint("hello\nworld"));
        assert_ne!(fp, fingerprint("hello\nworld\n"));
    }
}
