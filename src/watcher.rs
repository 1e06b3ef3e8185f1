//! Watch session manager.
//!
//! Owns the process's single live filesystem watcher, bound to the
//! folders attached to the active session. Switching sessions tears the
//! old watcher down completely before the new one is created, so no
//! event from the previous session's paths can be attributed to the new
//! session.
//!
//! Raw notify events are converted to tagged [`FileEvent`]s at the
//! boundary and fed through a debounce loop: a file is processed only
//! after a configured quiet period with no further writes, checked on a
//! fixed poll tick. Flushed events are handled one at a time in arrival
//! order, so persistence writes for one file never overlap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::IndexError;
use crate::indexer;
use crate::models::FileEvent;
use crate::session;
use crate::symbols::is_source_file;

/// Directory components never watched or processed.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    ".git",
    "target",
    "dist",
    "build",
];

/// Extensions of binary assets and config/metadata files.
const IGNORED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "ico", "json", "txt", "md", "lock", "gitignore",
];

/// The single active watcher and its processing pipeline.
struct ActiveWatch {
    session_id: String,
    roots: Vec<PathBuf>,
    // Dropped on teardown, which stops the event flow at the source.
    watcher: RecommendedWatcher,
    event_tx: mpsc::UnboundedSender<FileEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Exclusive owner of the watch lifecycle.
///
/// State machine: `Idle -> Watching(session, paths) -> Idle -> ...`.
/// All transitions go through [`activate`](Self::activate),
/// [`add_path`](Self::add_path), and [`remove_path`](Self::remove_path);
/// there is no other way to start or stop a watcher.
pub struct WatchManager {
    pool: SqlitePool,
    config: Config,
    excludes: GlobSet,
    active: Option<ActiveWatch>,
}

impl WatchManager {
    pub fn new(pool: SqlitePool, config: Config) -> Result<Self> {
        let excludes = build_globset(&config.watcher.exclude_globs)?;
        Ok(Self {
            pool,
            config,
            excludes,
            active: None,
        })
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.session_id.as_str())
    }

    /// Bind the watcher to `session_id`'s attached folders.
    ///
    /// Any previous watcher is fully closed first, including its
    /// in-flight processing queue. With no attached folders the manager
    /// stays idle. Already-present files under the new roots are queued
    /// for indexing.
    pub async fn activate(&mut self, session_id: &str) -> Result<Vec<PathBuf>> {
        let paths = session::attached_folders(&self.pool, session_id).await?;

        self.deactivate().await?;

        if paths.is_empty() {
            info!(session = session_id, "no attached folders, staying idle");
            return Ok(paths);
        }

        info!(session = session_id, folders = paths.len(), "starting watcher");
        let active = self.spawn_watch(session_id, paths.clone())?;
        self.active = Some(active);
        Ok(paths)
    }

    /// Add one folder to the live watch set.
    ///
    /// From idle this transitions to watching `session_id` with that
    /// single folder; while watching, the folder joins the live watcher
    /// without a teardown. Existing files under the folder are queued.
    pub async fn add_path(&mut self, session_id: &str, path: &Path) -> Result<()> {
        match &mut self.active {
            None => {
                info!(session = session_id, path = %path.display(), "starting watcher for first folder");
                let active = self.spawn_watch(session_id, vec![path.to_path_buf()])?;
                self.active = Some(active);
                Ok(())
            }
            Some(active) => {
                active.watcher.watch(path, RecursiveMode::Recursive)?;
                active.roots.push(path.to_path_buf());
                enqueue_existing_files(&active.event_tx, &[path.to_path_buf()], &self.excludes);
                Ok(())
            }
        }
    }

    /// Remove one folder from the live watch set.
    ///
    /// The manager may remain in the watching state with zero folders
    /// rather than forcing a teardown. Detaching a folder that was never
    /// watched is a no-op, so detach and watcher state cannot drift apart.
    pub async fn remove_path(&mut self, path: &Path) -> Result<()> {
        let Some(active) = &mut self.active else {
            return Ok(());
        };
        let Some(pos) = active.roots.iter().position(|r| r == path) else {
            debug!(path = %path.display(), "folder was not in the watch set");
            return Ok(());
        };

        match active.watcher.unwatch(path) {
            Ok(()) => {}
            Err(e) if matches!(e.kind, notify::ErrorKind::WatchNotFound) => {}
            Err(e) => return Err(e.into()),
        }
        active.roots.remove(pos);
        info!(path = %path.display(), "folder removed from watch set");
        Ok(())
    }

    /// Tear down the active watcher, if any.
    ///
    /// The watcher handle is dropped first (no new events), then the
    /// processing task is signalled and awaited, so nothing scheduled for
    /// the old session can run once this returns. A stuck teardown is
    /// surfaced as [`IndexError::WatcherTeardown`] because a lingering
    /// watcher would corrupt the single-active-watcher invariant.
    pub async fn deactivate(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        info!(session = %active.session_id, "closing watcher");
        drop(active.watcher);
        let _ = active.shutdown_tx.send(true);
        active
            .task
            .await
            .map_err(|e| IndexError::WatcherTeardown(e.to_string()))?;
        Ok(())
    }

    /// Count of eligible files under the watched roots, or -1 when idle.
    ///
    /// The directory walk runs on the blocking pool; callers hold the
    /// manager lock inside async handlers.
    pub async fn file_count(&self) -> i64 {
        let Some(active) = &self.active else {
            return -1;
        };
        let roots = active.roots.clone();
        let excludes = self.excludes.clone();
        tokio::task::spawn_blocking(move || eligible_files(&roots, &excludes).len() as i64)
            .await
            .unwrap_or(-1)
    }

    fn spawn_watch(&self, session_id: &str, roots: Vec<PathBuf>) -> Result<ActiveWatch> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<FileEvent>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let callback_tx = event_tx.clone();
        let callback_excludes = self.excludes.clone();
        let event_handler = move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                for file_event in classify_event(&event, &callback_excludes) {
                    let _ = callback_tx.send(file_event);
                }
            }
            Err(e) => error!(error = %e, "watch error"),
        };

        let mut watcher = RecommendedWatcher::new(event_handler, notify::Config::default())?;
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        // Index what is already there, through the same debounced path.
        enqueue_existing_files(&event_tx, &roots, &self.excludes);

        let task = tokio::spawn(run_pipeline(
            self.pool.clone(),
            self.config.clone(),
            session_id.to_string(),
            event_rx,
            shutdown_rx,
        ));

        Ok(ActiveWatch {
            session_id: session_id.to_string(),
            roots,
            watcher,
            event_tx,
            shutdown_tx,
            task,
        })
    }
}

/// Convert one raw notify event into tagged [`FileEvent`]s, applying the
/// ignore policy at the boundary.
fn classify_event(event: &Event, excludes: &GlobSet) -> Vec<FileEvent> {
    let mut out = Vec::new();
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                if is_eligible(path, excludes) {
                    out.push(FileEvent::Changed(path.clone()));
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                // The file is gone; judge by extension and path alone.
                if !is_ignored(path, excludes) && is_source_file(path) {
                    out.push(FileEvent::Removed(path.clone()));
                }
            }
        }
        _ => {}
    }
    out
}

/// Debounce-and-process loop for one watch session.
///
/// Pending events are keyed by path; each new event for a path restarts
/// its quiet period, and a later event kind replaces an earlier one
/// (changed-then-removed acts as removed, removed-then-recreated as
/// changed). On every poll tick, paths quiet for the configured period
/// are flushed and handled sequentially.
async fn run_pipeline(
    pool: SqlitePool,
    config: Config,
    session_id: String,
    mut event_rx: mpsc::UnboundedReceiver<FileEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let quiet = Duration::from_millis(config.watcher.quiet_period_ms);
    let mut tick = tokio::time::interval(Duration::from_millis(config.watcher.poll_interval_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut pending: HashMap<PathBuf, (FileEvent, tokio::time::Instant)> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!(session = %session_id, dropped = pending.len(), "pipeline shutdown");
                break;
            }
            received = event_rx.recv() => {
                match received {
                    Some(event) => {
                        let path = event.path().clone();
                        pending.insert(path, (event, tokio::time::Instant::now()));
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {
                let now = tokio::time::Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, last))| now.duration_since(*last) >= quiet)
                    .map(|(path, _)| path.clone())
                    .collect();

                for path in due {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if let Some((event, _)) = pending.remove(&path) {
                        handle_event(&pool, &config, &session_id, event).await;
                    }
                }
            }
        }
    }
}

async fn handle_event(pool: &SqlitePool, config: &Config, session_id: &str, event: FileEvent) {
    let result = match &event {
        FileEvent::Changed(path) => indexer::sync_file(pool, config, path, session_id).await,
        FileEvent::Removed(path) => indexer::remove_file(pool, path, session_id).await,
    };

    // Per-file failures never abort the rest of the queue; the file is
    // not marked processed, so a future event retries it.
    if let Err(e) = result {
        warn!(path = %event.path().display(), error = %e, "file sync failed");
    }
}

fn enqueue_existing_files(
    tx: &mpsc::UnboundedSender<FileEvent>,
    roots: &[PathBuf],
    excludes: &GlobSet,
) {
    for path in eligible_files(roots, excludes) {
        let _ = tx.send(FileEvent::Changed(path));
    }
}

/// All files under `roots` that pass the ignore policy and have a
/// recognized source extension.
pub fn eligible_files(roots: &[PathBuf], excludes: &GlobSet) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && is_eligible(entry.path(), excludes) {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

fn is_eligible(path: &Path, excludes: &GlobSet) -> bool {
    !is_ignored(path, excludes) && is_source_file(path)
}

/// Built-in ignore policy plus configured exclusion globs.
///
/// Dependency, virtual-env, and version-control directories are never
/// watched, and neither are the store's own sqlite files; watching those
/// would feed the indexer its own writes.
pub fn is_ignored(path: &Path, excludes: &GlobSet) -> bool {
    let text = path.to_string_lossy().replace('\\', "/");

    for component in path.components() {
        if let Some(name) = component.as_os_str().to_str() {
            if IGNORED_DIRS.contains(&name) {
                return true;
            }
        }
    }

    // Store artifacts: .sqlite plus its -wal/-shm companions.
    if text.ends_with(".sqlite") || text.contains(".sqlite-") || text.ends_with(".db") {
        return true;
    }

    if text.contains(".env") || text.ends_with(".gitignore") {
        return true;
    }

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if IGNORED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return true;
        }
    }

    excludes.is_match(&text)
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_excludes() -> GlobSet {
        build_globset(&[]).unwrap()
    }

    #[test]
    fn test_ignores_dependency_dirs() {
        let ex = no_excludes();
        assert!(is_ignored(Path::new("/p/node_modules/lib/index.js"), &ex));
        assert!(is_ignored(Path::new("/p/venv/lib/site.py"), &ex));
        assert!(is_ignored(Path::new("/p/__pycache__/mod.py"), &ex));
        assert!(is_ignored(Path::new("/p/.git/HEAD"), &ex));
        assert!(is_ignored(Path::new("/p/target/debug/main.rs"), &ex));
    }

    #[test]
    fn test_ignores_store_artifacts() {
        let ex = no_excludes();
        assert!(is_ignored(Path::new("/p/forestmind.sqlite"), &ex));
        assert!(is_ignored(Path::new("/p/forestmind.sqlite-wal"), &ex));
        assert!(is_ignored(Path::new("/p/forestmind.sqlite-shm"), &ex));
        assert!(is_ignored(Path::new("/p/chat_history.db"), &ex));
    }

    #[test]
    fn test_ignores_assets_and_config() {
        let ex = no_excludes();
        assert!(is_ignored(Path::new("/p/logo.png"), &ex));
        assert!(is_ignored(Path::new("/p/photo.JPEG"), &ex));
        assert!(is_ignored(Path::new("/p/package.json"), &ex));
        assert!(is_ignored(Path::new("/p/notes.txt"), &ex));
        assert!(is_ignored(Path::new("/p/README.md"), &ex));
        assert!(is_ignored(Path::new("/p/.env"), &ex));
        assert!(is_ignored(Path::new("/p/.env.local"), &ex));
        assert!(is_ignored(Path::new("/p/.gitignore"), &ex));
    }

    #[test]
    fn test_accepts_source_files() {
        let ex = no_excludes();
        assert!(is_eligible(Path::new("/p/src/server.ts"), &ex));
        assert!(is_eligible(Path::new("/p/app/main.py"), &ex));
        assert!(is_eligible(Path::new("/p/src/lib.rs"), &ex));
        assert!(!is_eligible(Path::new("/p/src/data.csv"), &ex));
    }

    #[test]
    fn test_configured_excludes_apply() {
        let ex = build_globset(&["**/generated/**".to_string()]).unwrap();
        assert!(is_ignored(Path::new("/p/generated/api.ts"), &ex));
        assert!(!is_ignored(Path::new("/p/src/api.ts"), &ex));
    }

    #[test]
    fn test_classify_create_and_remove() {
        let ex = no_excludes();
        let create = Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(PathBuf::from("/p/a.ts"))
            .add_path(PathBuf::from("/p/skip.png"));
        let events = classify_event(&create, &ex);
        assert_eq!(events, vec![FileEvent::Changed(PathBuf::from("/p/a.ts"))]);

        let remove = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/p/a.ts"));
        let events = classify_event(&remove, &ex);
        assert_eq!(events, vec![FileEvent::Removed(PathBuf::from("/p/a.ts"))]);
    }

    #[test]
    fn test_access_events_dropped() {
        let ex = no_excludes();
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Read))
            .add_path(PathBuf::from("/p/a.ts"));
        assert!(classify_event(&access, &ex).is_empty());
    }
}
