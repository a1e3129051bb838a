//! Full index build for one folder.
//!
//! The build runs as four stages on their own threads, connected by unbounded
//! channels:
//!
//! ```text
//! walk ──paths──▶ parse ──triplets──▶ triplet sink ──▶ TrigramIndex
//!                   │
//!                   └───indexed paths──▶ path sink ──▶ result list
//! ```
//!
//! A coordinator thread joins the stages and settles the [`IndexingState`].

use crate::config::EngineConfig;
use crate::error::{Result, SearchError};
use crate::index::TrigramIndex;
use crate::index::file::{FileText, collect_triplets, modified_time, read_text};
use crate::state::IndexingState;
use crate::utils::{FileFilter, Triplet};
use ignore::WalkBuilder;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

/// Triplets of one file, sent from the parse stage to the triplet sink
struct FileTriplets {
    path: Arc<Path>,
    triplets: FxHashSet<Triplet>,
    /// `None` if the file vanished before its mtime could be read
    mtime: Option<SystemTime>,
}

/// Everything a finished pipeline hands back to the coordinator
struct Built {
    paths: Vec<PathBuf>,
    index: TrigramIndex,
}

/// Walk options
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkOptions {
    respect_ignore_files: bool,
    include_hidden: bool,
    follow_links: bool,
}

impl WalkOptions {
    pub(crate) fn from_config(config: &EngineConfig) -> Self {
        Self {
            respect_ignore_files: config.respect_ignore_files,
            include_hidden: config.include_hidden,
            follow_links: config.follow_links,
        }
    }
}

/// Regular files under `root` in walk order. Unwalkable entries are skipped.
pub(crate) fn walk_files(root: &Path, options: WalkOptions) -> impl Iterator<Item = PathBuf> {
    WalkBuilder::new(root)
        .standard_filters(options.respect_ignore_files)
        .hidden(!options.include_hidden)
        .follow_links(options.follow_links)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unwalkable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
}

/// Builds a [`TrigramIndex`] for a folder in the background.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    filter: Arc<FileFilter>,
    walk: WalkOptions,
}

impl IndexBuilder {
    pub fn new(config: &EngineConfig, filter: Arc<FileFilter>) -> Self {
        Self {
            filter,
            walk: WalkOptions::from_config(config),
        }
    }

    /// Start indexing `folder` and return its live state.
    ///
    /// `on_complete` runs on the coordinator thread exactly once, before the
    /// state's result resolves: with the finished index on success, with
    /// `None` if the build was cancelled or failed.
    pub fn spawn<F>(&self, folder: PathBuf, on_complete: F) -> Result<IndexingState>
    where
        F: FnOnce(Option<TrigramIndex>) + Send + 'static,
    {
        let state = IndexingState::new(folder.clone());
        state.start();
        tracing::info!("Indexing {}", folder.display());

        let worker = state.clone();
        let builder = self.clone();
        thread::Builder::new()
            .name("triseek-index".to_string())
            .spawn(move || {
                let outcome = builder.run(&worker, &folder);
                settle(&worker, outcome, on_complete);
            })
            .map_err(|e| SearchError::failed("Failed to spawn indexing thread", e))?;

        Ok(state)
    }

    fn run(&self, state: &IndexingState, folder: &Path) -> Result<Built> {
        let (path_tx, path_rx) = mpsc::channel::<PathBuf>();
        let (triplet_tx, triplet_rx) = mpsc::channel::<FileTriplets>();
        let (indexed_tx, indexed_rx) = mpsc::channel::<PathBuf>();

        let walk = {
            let state = state.clone();
            let folder = folder.to_path_buf();
            let options = self.walk;
            spawn_stage("walk", move || walk_stage(&state, &folder, options, path_tx))
        };
        let parse = {
            let state = state.clone();
            let filter = Arc::clone(&self.filter);
            spawn_stage("parse", move || {
                parse_stage(&state, &filter, path_rx, triplet_tx, indexed_tx)
            })
        };
        let path_sink = {
            let state = state.clone();
            spawn_stage("paths", move || path_sink_stage(&state, indexed_rx))
        };
        let triplet_sink = spawn_stage("triplets", move || triplet_sink_stage(triplet_rx));

        // Join every stage before looking at any outcome so no thread
        // outlives the build
        let walked = join_stage(walk, "walk");
        let parsed = join_stage(parse, "parse").and_then(|r| r);
        let paths = join_stage(path_sink, "path sink");
        let index = join_stage(triplet_sink, "triplet sink");

        walked?;
        parsed?;
        Ok(Built {
            paths: paths?,
            index: index?,
        })
    }
}

/// Commit, cancel or fail the build once the pipeline has stopped.
fn settle<F>(state: &IndexingState, outcome: Result<Built>, on_complete: F)
where
    F: FnOnce(Option<TrigramIndex>),
{
    match outcome {
        Ok(built) if state.seal() => {
            tracing::info!(
                "Indexed {} files ({} triplets) under {} in {:?}",
                built.paths.len(),
                built.index.triplet_count(),
                state.folder().display(),
                state.elapsed()
            );
            on_complete(Some(built.index));
            state.complete(Ok(built.paths));
        }
        Err(error) if !state.is_cancelled() => {
            tracing::warn!("Indexing {} failed: {}", state.folder().display(), error);
            on_complete(None);
            state.complete(Err(error));
        }
        _ => {
            tracing::debug!("Indexing {} stopped after cancel", state.folder().display());
            on_complete(None);
            state.complete_cancelled();
        }
    }
}

fn spawn_stage<T, F>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(format!("triseek-{name}"))
        .spawn(f)
        .map_err(|e| SearchError::failed(format!("Failed to spawn {name} stage"), e))
}

fn join_stage<T>(handle: Result<JoinHandle<T>>, name: &str) -> Result<T> {
    handle?
        .join()
        .map_err(|_| SearchError::worker_panicked(name))
}

/// Enumerate regular files in walk order, forwarding each path.
fn walk_stage(state: &IndexingState, folder: &Path, options: WalkOptions, out: Sender<PathBuf>) {
    let mut total = 0usize;
    for path in walk_files(folder, options) {
        if state.should_stop() {
            return;
        }
        state.record_visited(path.clone());
        total += 1;
        if out.send(path).is_err() {
            return;
        }
    }

    state.set_total_files(total);
}

/// Read each file and emit its triplets; every path is forwarded, indexable
/// or not. A genuine I/O error stops the whole build.
fn parse_stage(
    state: &IndexingState,
    filter: &FileFilter,
    paths: Receiver<PathBuf>,
    triplets_out: Sender<FileTriplets>,
    indexed_out: Sender<PathBuf>,
) -> Result<()> {
    for path in paths {
        if state.should_stop() {
            break;
        }

        let triplets = match read_text(&path, filter) {
            Ok(FileText::Text(text)) => match collect_triplets(&text, || state.should_stop()) {
                Some(triplets) => triplets,
                None => break,
            },
            Ok(FileText::Skipped(reason)) => {
                tracing::debug!("Not indexing {}: {:?}", path.display(), reason);
                FxHashSet::default()
            }
            Err(e) => {
                state.abort();
                return Err(SearchError::io_at(&path, e));
            }
        };

        let shared: Arc<Path> = Arc::from(path.as_path());
        let file = FileTriplets {
            path: shared,
            triplets,
            mtime: modified_time(&path).ok(),
        };
        if triplets_out.send(file).is_err() {
            break;
        }
        state.record_indexed();
        if indexed_out.send(path).is_err() {
            break;
        }
    }
    Ok(())
}

fn path_sink_stage(state: &IndexingState, indexed: Receiver<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for path in indexed {
        state.push_indexed_path(path.clone());
        paths.push(path);
    }
    paths
}

fn triplet_sink_stage(files: Receiver<FileTriplets>) -> TrigramIndex {
    let mut index = TrigramIndex::new();
    for file in files {
        for key in file.triplets {
            index.add_triplet(key, &file.path);
        }
        if let Some(mtime) = file.mtime {
            index.register_path_time(&file.path, mtime);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OperationStatus;
    use std::fs;

    fn builder(config: &EngineConfig) -> IndexBuilder {
        let filter = Arc::new(FileFilter::from_config(config).unwrap());
        IndexBuilder::new(config, filter)
    }

    fn build(dir: &Path, config: &EngineConfig) -> (IndexingState, Option<TrigramIndex>) {
        let (tx, rx) = mpsc::channel();
        let state = builder(config)
            .spawn(dir.to_path_buf(), move |index| {
                let _ = tx.send(index);
            })
            .unwrap();
        state.result().wait().unwrap();
        (state, rx.recv().unwrap())
    }

    #[test]
    fn test_build_indexes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "help me").unwrap();

        let (state, index) = build(dir.path(), &EngineConfig::default());
        let index = index.unwrap();

        assert_eq!(state.status(), OperationStatus::Finished);
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.total_files_number(), Some(2));
        assert_eq!(state.visited_files_number(), 2);
        assert_eq!(state.indexed_files_number(), 2);

        let mut paths = state.result().wait().unwrap();
        paths.sort();
        assert_eq!(paths, vec![dir.path().join("a.txt"), dir.path().join("sub/b.txt")]);

        assert_eq!(index.lookup(&Triplet::new("hel")).len(), 2);
        assert_eq!(index.lookup(&Triplet::new("wor")).len(), 1);
        assert!(index.path_time(&dir.path().join("a.txt")).is_some());
    }

    #[test]
    fn test_skipped_files_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("image.png"), "not really png").unwrap();
        fs::write(dir.path().join("blob.txt"), b"nul\0\0\0\0cd\0\0\0").unwrap();
        fs::write(dir.path().join("latin1.txt"), b"caf\xe9 latte").unwrap();
        fs::write(dir.path().join("ok.txt"), "really").unwrap();

        let (state, index) = build(dir.path(), &EngineConfig::default());
        let index = index.unwrap();

        assert_eq!(state.indexed_files_number(), 4);
        assert_eq!(state.result().wait().unwrap().len(), 4);
        assert!(index.lookup(&Triplet::new("not")).is_empty());
        assert!(index.lookup(&Triplet::new("lat")).is_empty());
        assert!(index.lookup(&Triplet::new("nul")).is_empty());
        assert_eq!(index.lookup(&Triplet::new("rea")).len(), 1);
        assert!(index.contains_path(&dir.path().join("image.png")));
    }

    #[test]
    fn test_large_files_are_not_indexed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(64)).unwrap();
        let config = EngineConfig {
            max_file_size: 16,
            ..EngineConfig::default()
        };

        let (_, index) = build(dir.path(), &config);
        assert_eq!(index.unwrap().triplet_count(), 0);
    }

    #[test]
    fn test_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let (state, index) = build(dir.path(), &EngineConfig::default());
        assert_eq!(state.status(), OperationStatus::Finished);
        assert_eq!(state.total_files_number(), Some(0));
        assert_eq!(index.unwrap().path_count(), 0);
    }

    #[test]
    fn test_ignore_files_respected_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".ignore"), "skipped.txt\n").unwrap();
        fs::write(dir.path().join("skipped.txt"), "abc").unwrap();
        fs::write(dir.path().join("kept.txt"), "abc").unwrap();

        let config = EngineConfig {
            respect_ignore_files: true,
            include_hidden: false,
            ..EngineConfig::default()
        };
        let (state, _) = build(dir.path(), &config);
        assert_eq!(state.result().wait().unwrap(), vec![dir.path().join("kept.txt")]);

        let (state, _) = build(dir.path(), &EngineConfig::default());
        assert_eq!(state.result().wait().unwrap().len(), 3);
    }

    #[test]
    fn test_cancel_resolves_empty() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..200 {
            fs::write(dir.path().join(format!("f{i}.txt")), "some content here").unwrap();
        }

        let (tx, rx) = mpsc::channel();
        let state = builder(&EngineConfig::default())
            .spawn(dir.path().to_path_buf(), move |index| {
                let _ = tx.send(index.is_some());
            })
            .unwrap();

        let cancelled = state.cancel();
        let paths = state.result().wait().unwrap();
        let committed = rx.recv().unwrap();

        if cancelled {
            assert_eq!(state.status(), OperationStatus::Cancelled);
            assert!(paths.is_empty());
            assert!(!committed);
        } else {
            assert_eq!(state.status(), OperationStatus::Finished);
            assert_eq!(paths.len(), 200);
            assert!(committed);
        }
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_read_error_aborts_parse_stage() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("not_a_file")).unwrap();
        let state = IndexingState::new(dir.path().to_path_buf());
        state.start();
        let filter = FileFilter::from_config(&EngineConfig::default()).unwrap();

        let (path_tx, path_rx) = mpsc::channel();
        let (triplet_tx, triplet_rx) = mpsc::channel();
        let (indexed_tx, indexed_rx) = mpsc::channel();
        path_tx.send(dir.path().join("not_a_file")).unwrap();
        drop(path_tx);

        let outcome = parse_stage(&state, &filter, path_rx, triplet_tx, indexed_tx);
        assert!(matches!(outcome, Err(SearchError::Failed { .. })));
        assert!(state.should_stop());
        assert!(!state.seal());
        assert_eq!(state.indexed_files_number(), 0);
        assert!(triplet_rx.recv().is_err());
        assert!(indexed_rx.recv().is_err());
    }

    #[test]
    fn test_failed_build_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = IndexingState::new(dir.path().to_path_buf());
        state.start();

        let mut committed = None;
        let error = SearchError::failed("Failed to read x", std::io::Error::other("eio"));
        settle(&state, Err(error), |index| committed = Some(index.is_some()));

        assert_eq!(committed, Some(false));
        assert_eq!(state.status(), OperationStatus::Failed);
        assert!(state.failure().is_some());
        assert!(state.result().wait().is_err());
    }

    #[test]
    fn test_cancel_mid_parse_stops_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt"] {
            fs::write(dir.path().join(name), "contents").unwrap();
        }
        let state = IndexingState::new(dir.path().to_path_buf());
        state.start();
        let filter = Arc::new(FileFilter::from_config(&EngineConfig::default()).unwrap());

        let (path_tx, path_rx) = mpsc::channel();
        let (triplet_tx, triplet_rx) = mpsc::channel();
        let (indexed_tx, indexed_rx) = mpsc::channel();
        let parse = {
            let state = state.clone();
            thread::spawn(move || parse_stage(&state, &filter, path_rx, triplet_tx, indexed_tx))
        };

        // The first file goes through; the second is only sent after cancel
        path_tx.send(dir.path().join("a.txt")).unwrap();
        assert_eq!(indexed_rx.recv().unwrap(), dir.path().join("a.txt"));
        assert!(state.cancel());
        path_tx.send(dir.path().join("b.txt")).unwrap();
        drop(path_tx);

        assert!(parse.join().unwrap().is_ok());
        assert_eq!(state.indexed_files_number(), 1);
        assert!(indexed_rx.recv().is_err());
        let index = triplet_sink_stage(triplet_rx);
        assert_eq!(index.path_count(), 1);

        let mut committed = None;
        let built = Built {
            paths: vec![dir.path().join("a.txt")],
            index,
        };
        settle(&state, Ok(built), |index| committed = Some(index.is_some()));

        assert_eq!(committed, Some(false));
        assert_eq!(state.status(), OperationStatus::Cancelled);
        assert!(state.result().wait().unwrap().is_empty());
        assert_eq!(state.progress(), 1.0);
    }
}
