//! Folder attachment records.
//!
//! A session is a logical workspace: the set of folders attached to it
//! determines what the watcher sees when the session is active.
//! Attachment rows persist independently of whether a watcher is
//! currently running, so a session switch can rebuild its watch set from
//! the database alone.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::PathBuf;

/// Record a folder attachment. Re-attaching is a no-op.
pub async fn attach_folder(pool: &SqlitePool, folder_path: &str, session_id: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO attachment_path (folder_path, session_id, added_at) VALUES (?, ?, ?)",
    )
    .bind(folder_path)
    .bind(session_id)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove a folder attachment.
pub async fn detach_folder(pool: &SqlitePool, folder_path: &str, session_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM attachment_path WHERE folder_path = ? AND session_id = ?")
        .bind(folder_path)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All folders attached to a session, in attachment order.
pub async fn attached_folders(pool: &SqlitePool, session_id: &str) -> Result<Vec<PathBuf>> {
    let paths: Vec<String> =
        sqlx::query_scalar("SELECT folder_path FROM attachment_path WHERE session_id = ? ORDER BY id")
            .bind(session_id)
            .fetch_all(pool)
            .await?;
    Ok(paths.into_iter().map(PathBuf::from).collect())
}
