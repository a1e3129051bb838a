//! Filesystem watcher feeding the incremental updater.
//!
//! Raw `notify` events are translated into [`FileEvent`]s addressed to every
//! indexed folder that contains the changed path.

use crate::engine::Registry;
use crate::engine::incremental::{FileEvent, FileEventKind};
use crate::error::{Result, SearchError};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

/// Watches indexed folders recursively.
pub(crate) struct FolderWatcher {
    watcher: RecommendedWatcher,
    watched: FxHashSet<PathBuf>,
}

impl FolderWatcher {
    pub(crate) fn new(registry: Registry, events: Sender<FileEvent>) -> Result<Self> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let folders: Vec<PathBuf> = registry.read().keys().cloned().collect();
                    for file_event in translate(&event, &folders) {
                        if events.send(file_event).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => tracing::warn!("Filesystem watcher error: {}", e),
            },
            notify::Config::default(),
        )
        .map_err(watcher_error)?;

        Ok(Self {
            watcher,
            watched: FxHashSet::default(),
        })
    }

    /// Start watching `folder`. Failures are logged; the folder then only
    /// receives manually submitted events.
    pub(crate) fn watch(&mut self, folder: &Path) {
        if self.watched.contains(folder) {
            return;
        }
        match self.watcher.watch(folder, RecursiveMode::Recursive) {
            Ok(()) => {
                tracing::debug!("Watching {}", folder.display());
                self.watched.insert(folder.to_path_buf());
            }
            Err(e) => tracing::warn!("Failed to watch {}: {}", folder.display(), e),
        }
    }

    pub(crate) fn unwatch(&mut self, folder: &Path) {
        if self.watched.remove(folder) {
            if let Err(e) = self.watcher.unwatch(folder) {
                tracing::debug!("Failed to unwatch {}: {}", folder.display(), e);
            }
        }
    }

    pub(crate) fn unwatch_all(&mut self) {
        let folders: Vec<PathBuf> = self.watched.iter().cloned().collect();
        for folder in folders {
            self.unwatch(&folder);
        }
    }
}

fn watcher_error(e: notify::Error) -> SearchError {
    SearchError::failed("Failed to start filesystem watcher", io::Error::other(e))
}

/// Translate one notify event into per-folder file events.
///
/// Renames become a deletion of the old path and a creation of the new one.
/// A rename reported without direction is resolved by whether the path
/// still exists.
pub(crate) fn translate(event: &Event, folders: &[PathBuf]) -> Vec<FileEvent> {
    let changes: Vec<(FileEventKind, &PathBuf)> = match &event.kind {
        EventKind::Create(_) => created_or_deleted(&event.paths, FileEventKind::Created),
        EventKind::Remove(_) => created_or_deleted(&event.paths, FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            created_or_deleted(&event.paths, FileEventKind::Deleted)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            created_or_deleted(&event.paths, FileEventKind::Created)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![(FileEventKind::Deleted, from), (FileEventKind::Created, to)],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    FileEventKind::Created
                } else {
                    FileEventKind::Deleted
                };
                (kind, path)
            })
            .collect(),
        EventKind::Modify(_) => created_or_deleted(&event.paths, FileEventKind::Modified),
        _ => Vec::new(),
    };

    let mut file_events = Vec::new();
    for (kind, path) in changes {
        for folder in folders {
            if let Ok(relative) = path.strip_prefix(folder) {
                if relative.as_os_str().is_empty() {
                    continue;
                }
                file_events.push(FileEvent::new(kind, folder.clone(), relative));
            }
        }
    }
    file_events
}

fn created_or_deleted(paths: &[PathBuf], kind: FileEventKind) -> Vec<(FileEventKind, &PathBuf)> {
    paths.iter().map(|path| (kind, path)).collect()
}
