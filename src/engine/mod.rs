//! The search engine facade.
//!
//! A [`SearchEngine`] owns one [`TrigramIndex`](crate::index::TrigramIndex)
//! per indexed folder and enforces its concurrency contract: while an index
//! build is in flight on an engine, every other build or search on that same
//! engine fails with [`SearchError::Busy`]. Separate engine instances are
//! fully independent.

pub mod incremental;
pub(crate) mod watcher;

pub use incremental::{FileEvent, FileEventKind, IncrementalUpdater, UpdateOutcome};

use crate::config::{EngineConfig, SearchSettings};
use crate::error::{Result, SearchError, canonical_folder, canonicalize_existing_path};
use crate::index::build::WalkOptions;
use crate::index::{IndexBuilder, IndexStats, SharedIndex};
use crate::search::{Searcher, validate_token};
use crate::state::{IndexingAndSearchingState, IndexingState, OperationStatus, SearchingState};
use crate::utils::FileFilter;
use incremental::UpdaterHandle;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use watcher::FolderWatcher;

/// Completed indexes by canonical folder path
pub(crate) type Registry = Arc<RwLock<HashMap<PathBuf, SharedIndex>>>;

/// Entry point for indexing folders and searching them.
///
/// Cloning is cheap and every clone drives the same engine.
#[derive(Clone)]
pub struct SearchEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    filter: Arc<FileFilter>,
    builder: IndexBuilder,
    searcher: Searcher,
    registry: Registry,
    /// Folder currently being indexed, if any
    building: Mutex<Option<PathBuf>>,
    incremental: Mutex<Option<Incremental>>,
}

/// Running incremental indexing. The watcher is declared first so it is
/// dropped before the updater it feeds.
struct Incremental {
    watcher: Option<FolderWatcher>,
    updater: UpdaterHandle,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let filter = Arc::new(FileFilter::from_config(&config)?);
        let builder = IndexBuilder::new(&config, Arc::clone(&filter));
        let searcher = Searcher::new(&config, Arc::clone(&filter));
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                filter,
                builder,
                searcher,
                registry: Arc::new(RwLock::new(HashMap::new())),
                building: Mutex::new(None),
                incremental: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Build the index for `folder`, or return the cached one.
    ///
    /// A cached index yields an already finished state listing its files.
    /// Fails with [`SearchError::NotADirectory`] for anything but an existing
    /// directory, and with [`SearchError::Busy`] while another build runs on
    /// this engine.
    pub fn create_index_at_folder(&self, folder: impl AsRef<Path>) -> Result<IndexingState> {
        let folder = canonical_folder(folder.as_ref())?;

        let mut building = self.inner.building.lock();
        if let Some(current) = building.as_ref() {
            tracing::debug!(
                "Refusing to index {} while {} is being indexed",
                folder.display(),
                current.display()
            );
            return Err(SearchError::Busy);
        }

        if let Some(index) = self.index_for(&folder) {
            tracing::debug!("Reusing cached index for {}", folder.display());
            let paths = index.read().paths();
            return Ok(IndexingState::cached(folder, paths));
        }

        *building = Some(folder.clone());

        let inner = Arc::clone(&self.inner);
        let key = folder.clone();
        let spawned = self.inner.builder.spawn(folder, move |index| {
            if let Some(index) = index {
                inner.registry.write().insert(key.clone(), index.into_shared());
                inner.watch(&key);
            }
            *inner.building.lock() = None;
        });

        if spawned.is_err() {
            *building = None;
        }
        spawned
    }

    /// Search `folder`'s completed index for `token`.
    pub fn search_string(
        &self,
        folder: impl AsRef<Path>,
        token: &str,
        settings: SearchSettings,
    ) -> Result<SearchingState> {
        validate_token(token)?;
        let folder = canonical_folder(folder.as_ref())?;

        if self.inner.building.lock().is_some() {
            return Err(SearchError::Busy);
        }
        let index = self
            .index_for(&folder)
            .ok_or_else(|| SearchError::NoIndex(folder.clone()))?;

        tracing::info!("Searching {} for {:?}", folder.display(), token);
        Ok(self
            .inner
            .searcher
            .spawn(folder, token.to_string(), index, settings))
    }

    /// Index `folder` (or reuse its index), then search it for `token`.
    pub fn index_and_search_string(
        &self,
        folder: impl AsRef<Path>,
        token: &str,
    ) -> Result<IndexingAndSearchingState> {
        self.index_and_search_string_with_settings(folder, token, SearchSettings::default())
    }

    pub fn index_and_search_string_with_settings(
        &self,
        folder: impl AsRef<Path>,
        token: &str,
        settings: SearchSettings,
    ) -> Result<IndexingAndSearchingState> {
        validate_token(token)?;
        let indexing = self.create_index_at_folder(folder)?;
        let combined = IndexingAndSearchingState::new(indexing.clone(), token.to_string());

        let engine = self.clone();
        let driver = combined.clone();
        let spawned = thread::Builder::new()
            .name("triseek-index-search".to_string())
            .spawn(move || engine.search_after_index(&driver, settings));

        if let Err(e) = spawned {
            indexing.cancel();
            return Err(SearchError::failed("Failed to spawn search thread", e));
        }
        Ok(combined)
    }

    fn search_after_index(&self, combined: &IndexingAndSearchingState, settings: SearchSettings) {
        let indexing = combined.indexing();
        let folder = indexing.folder().to_path_buf();
        let token = combined.token().to_string();

        if let Err(error) = indexing.result().wait() {
            combined.resolve(Err(error));
            return;
        }
        if indexing.status() == OperationStatus::Cancelled || combined.is_cancel_requested() {
            combined.attach_search(SearchingState::cancelled(folder, token));
            combined.resolve(Ok(Vec::new()));
            return;
        }

        match self.search_string(&folder, &token, settings) {
            Ok(searching) => {
                combined.attach_search(searching.clone());
                combined.resolve(searching.result().wait());
            }
            Err(error) => {
                tracing::warn!("Search after indexing {} failed: {}", folder.display(), error);
                combined.fail(error);
            }
        }
    }

    pub fn has_index_at_folder(&self, folder: impl AsRef<Path>) -> bool {
        let folder = canonicalize_existing_path(folder.as_ref());
        self.inner.registry.read().contains_key(&folder)
    }

    /// Drop the index for exactly `folder`. Returns whether one existed.
    pub fn remove_index_at_folder(&self, folder: impl AsRef<Path>) -> bool {
        let folder = canonicalize_existing_path(folder.as_ref());
        let removed = self.inner.registry.write().remove(&folder).is_some();
        if removed {
            tracing::info!("Removed index for {}", folder.display());
            self.inner.unwatch(&folder);
        }
        removed
    }

    pub fn remove_full_index(&self) {
        let folders: Vec<PathBuf> = self.inner.registry.write().drain().map(|(k, _)| k).collect();
        for folder in &folders {
            self.inner.unwatch(folder);
        }
        tracing::info!("Removed {} indexes", folders.len());
    }

    /// Indexed folders, sorted.
    pub fn get_all_indexed_folders(&self) -> Vec<PathBuf> {
        let mut folders: Vec<PathBuf> = self.inner.registry.read().keys().cloned().collect();
        folders.sort();
        folders
    }

    /// Folder whose index is currently being built on this engine.
    pub fn indexing_in_progress(&self) -> Option<PathBuf> {
        self.inner.building.lock().clone()
    }

    pub fn index_stats(&self, folder: impl AsRef<Path>) -> Option<IndexStats> {
        let folder = canonicalize_existing_path(folder.as_ref());
        self.index_for(&folder).map(|index| index.read().stats())
    }

    /// Start applying file events to completed indexes.
    ///
    /// With `watch_filesystem` enabled, indexed folders are also watched for
    /// changes. Returns `false` if incremental indexing was already running
    /// or could not be started.
    pub fn start_incremental_indexing(&self) -> bool {
        let mut incremental = self.inner.incremental.lock();
        if incremental.is_some() {
            return false;
        }

        let updater = IncrementalUpdater::new(
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.filter),
            WalkOptions::from_config(&self.inner.config),
        );
        let updater = match UpdaterHandle::start(updater) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Could not start incremental indexing: {}", e);
                return false;
            }
        };

        let watcher = if self.inner.config.watch_filesystem {
            match FolderWatcher::new(Arc::clone(&self.inner.registry), updater.sender()) {
                Ok(mut watcher) => {
                    for folder in self.inner.registry.read().keys() {
                        watcher.watch(folder);
                    }
                    Some(watcher)
                }
                Err(e) => {
                    tracing::warn!("Incremental indexing runs without a watcher: {}", e);
                    None
                }
            }
        } else {
            None
        };

        *incremental = Some(Incremental { watcher, updater });
        tracing::info!("Incremental indexing started");
        true
    }

    /// Stop applying file events. Returns `false` if it was not running.
    pub fn stop_incremental_indexing(&self) -> bool {
        let Some(mut running) = self.inner.incremental.lock().take() else {
            return false;
        };
        if let Some(watcher) = running.watcher.as_mut() {
            watcher.unwatch_all();
        }
        drop(running);
        tracing::info!("Incremental indexing stopped");
        true
    }

    pub fn is_incremental_indexing(&self) -> bool {
        self.inner.incremental.lock().is_some()
    }

    /// Queue a file event for the incremental updater.
    ///
    /// Returns `false` if incremental indexing is not running.
    pub fn submit_file_event(&self, mut event: FileEvent) -> bool {
        event.folder = canonicalize_existing_path(&event.folder);
        match self.inner.incremental.lock().as_ref() {
            Some(running) => running.updater.submit(event),
            None => false,
        }
    }

    fn index_for(&self, folder: &Path) -> Option<SharedIndex> {
        self.inner.registry.read().get(folder).cloned()
    }
}

impl EngineInner {
    fn watch(&self, folder: &Path) {
        if let Some(watcher) = self
            .incremental
            .lock()
            .as_mut()
            .and_then(|running| running.watcher.as_mut())
        {
            watcher.watch(folder);
        }
    }

    fn unwatch(&self, folder: &Path) {
        if let Some(watcher) = self
            .incremental
            .lock()
            .as_mut()
            .and_then(|running| running.watcher.as_mut())
        {
            watcher.unwatch(folder);
        }
    }
}
