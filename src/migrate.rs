use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema if it does not exist. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Structural index: where symbols live.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS code_map (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            type TEXT NOT NULL,
            name TEXT NOT NULL,
            start_line INTEGER,
            end_line INTEGER,
            signature TEXT NOT NULL,
            session_id TEXT NOT NULL,
            UNIQUE(file_path, signature, session_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Semantic index: chunk windows and their embeddings.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vector_index (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_hash TEXT NOT NULL,
            embedding BLOB,
            raw_content TEXT NOT NULL,
            session_id TEXT NOT NULL,
            UNIQUE(file_path, chunk_index, session_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Folders attached to each session; survives watcher restarts.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attachment_path (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_path TEXT NOT NULL,
            session_id TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            UNIQUE(folder_path, session_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_code_map_file_session ON code_map(file_path, session_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vector_index_file_session ON vector_index(file_path, session_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vector_index_session ON vector_index(session_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
