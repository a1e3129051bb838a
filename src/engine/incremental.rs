//! Applying file change events to completed indexes.

use crate::engine::Registry;
use crate::error::{Result, SearchError};
use crate::index::SharedIndex;
use crate::index::build::{WalkOptions, walk_files};
use crate::index::file::{file_triplets_lossy, modified_time};
use crate::utils::FileFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the updater thread checks for shutdown while idle
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Kind of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

/// A change to one file under an indexed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    /// Indexed folder the event is addressed to
    pub folder: PathBuf,
    /// Path of the file, relative to `folder` (absolute paths are accepted too)
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, folder: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            folder: folder.into(),
            path: path.into(),
        }
    }

    pub fn created(folder: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Created, folder, path)
    }

    pub fn modified(folder: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Modified, folder, path)
    }

    pub fn deleted(folder: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Deleted, folder, path)
    }

    /// The file's full path
    pub fn absolute_path(&self) -> PathBuf {
        self.folder.join(&self.path)
    }
}

/// What an event did to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Added,
    Replaced,
    Removed,
    /// Unindexed folder, stale or duplicate event, or not a regular file
    Ignored,
}

/// Applies [`FileEvent`]s to the indexes in the engine's registry.
#[derive(Debug, Clone)]
pub struct IncrementalUpdater {
    registry: Registry,
    filter: Arc<FileFilter>,
    walk: WalkOptions,
}

impl IncrementalUpdater {
    pub(crate) fn new(registry: Registry, filter: Arc<FileFilter>, walk: WalkOptions) -> Self {
        Self {
            registry,
            filter,
            walk,
        }
    }

    pub fn apply(&self, event: &FileEvent) -> UpdateOutcome {
        let Some(index) = self.registry.read().get(&event.folder).cloned() else {
            tracing::debug!("No index for {}, ignoring event", event.folder.display());
            return UpdateOutcome::Ignored;
        };
        let path = event.absolute_path();

        let outcome = match event.kind {
            FileEventKind::Created if path.is_dir() => {
                // A directory moved in arrives as one event for the directory
                let added = walk_files(&path, self.walk)
                    .filter(|file| self.add_new(&index, file))
                    .count();
                if added == 0 {
                    return UpdateOutcome::Ignored;
                }
                tracing::debug!("Added {} files under {}", added, path.display());
                UpdateOutcome::Added
            }
            FileEventKind::Created => {
                if !path.is_file() || !self.add_new(&index, &path) {
                    return UpdateOutcome::Ignored;
                }
                UpdateOutcome::Added
            }
            FileEventKind::Deleted => {
                let mut index = index.write();
                if index.path_time(&path).is_some() {
                    index.bulk_remove(&path);
                    UpdateOutcome::Removed
                } else {
                    // Possibly a directory: drop everything registered below it
                    let below: Vec<PathBuf> = index
                        .paths()
                        .into_iter()
                        .filter(|p| p.starts_with(&path))
                        .collect();
                    if below.is_empty() {
                        return UpdateOutcome::Ignored;
                    }
                    for p in &below {
                        index.bulk_remove(p);
                    }
                    UpdateOutcome::Removed
                }
            }
            FileEventKind::Modified => {
                if !path.is_file() {
                    return UpdateOutcome::Ignored;
                }
                let Ok(current) = modified_time(&path) else {
                    return UpdateOutcome::Ignored;
                };
                let recorded = index.read().path_time(&path);
                if recorded.is_some_and(|recorded| recorded >= current) {
                    return UpdateOutcome::Ignored;
                }
                let triplets = file_triplets_lossy(&path, &self.filter);
                // bulk_add drops the old memberships under the same lock
                index.write().bulk_add(triplets, &path, current);
                UpdateOutcome::Replaced
            }
        };

        tracing::debug!("{:?} {}: {:?}", event.kind, path.display(), outcome);
        outcome
    }

    /// Add `path` unless it is already registered or its mtime is unreadable.
    fn add_new(&self, index: &SharedIndex, path: &Path) -> bool {
        if index.read().path_time(path).is_some() {
            return false;
        }
        let Ok(mtime) = modified_time(path) else {
            return false;
        };
        let triplets = file_triplets_lossy(path, &self.filter);
        index.write().bulk_add(triplets, path, mtime);
        true
    }
}

/// Background thread applying queued events one at a time.
pub(crate) struct UpdaterHandle {
    events: Sender<FileEvent>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl UpdaterHandle {
    pub(crate) fn start(updater: IncrementalUpdater) -> Result<Self> {
        let (events, queue) = mpsc::channel::<FileEvent>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let stop = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("triseek-updater".to_string())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match queue.recv_timeout(POLL_INTERVAL) {
                        Ok(event) => {
                            updater.apply(&event);
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| SearchError::failed("Failed to spawn updater thread", e))?;

        Ok(Self {
            events,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Queue for events; also handed to the filesystem watcher
    pub(crate) fn sender(&self) -> Sender<FileEvent> {
        self.events.clone()
    }

    pub(crate) fn submit(&self, event: FileEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub(crate) fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for UpdaterHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
