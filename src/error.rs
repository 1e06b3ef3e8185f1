use std::path::PathBuf;
use thiserror::Error;

/// Classified failures on the indexing path.
///
/// Per-file failures ([`IndexError::UnsupportedFileType`],
/// [`IndexError::ParseFailure`], [`IndexError::Provider`]) never abort
/// processing of other files in the same batch; the watcher logs them and
/// moves on. [`IndexError::Store`] aborts the current file's sync so a
/// later event can retry it. [`IndexError::WatcherTeardown`] is fatal to
/// a session switch.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),

    #[error("parse failure for {path}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    #[error("embedding provider unavailable: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("store I/O failure: {0}")]
    Store(#[from] sqlx::Error),

    #[error("file read failure for {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watcher teardown failure: {0}")]
    WatcherTeardown(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
