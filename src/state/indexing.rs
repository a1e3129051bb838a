use crate::error::{Result, SearchError};
use crate::state::base::{OperationCore, partial_progress};
use crate::state::{DeltaBuffer, OperationResult, OperationStatus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Live view of a folder index build.
///
/// Cloning is cheap; all clones observe the same build. Counters and buffers
/// are updated by the pipeline while callers poll.
#[derive(Debug, Clone)]
pub struct IndexingState {
    inner: Arc<IndexingInner>,
}

#[derive(Debug)]
struct IndexingInner {
    folder: PathBuf,
    core: OperationCore,
    visited_files: AtomicUsize,
    indexed_files: AtomicUsize,
    total_files: OnceLock<usize>,
    visited_buffer: DeltaBuffer<PathBuf>,
    indexed_buffer: DeltaBuffer<PathBuf>,
    result: OperationResult<Vec<PathBuf>>,
}

impl IndexingState {
    pub(crate) fn new(folder: PathBuf) -> Self {
        Self {
            inner: Arc::new(IndexingInner {
                folder,
                core: OperationCore::new(),
                visited_files: AtomicUsize::new(0),
                indexed_files: AtomicUsize::new(0),
                total_files: OnceLock::new(),
                visited_buffer: DeltaBuffer::new(),
                indexed_buffer: DeltaBuffer::new(),
                result: OperationResult::new(),
            }),
        }
    }

    /// An already finished state for a folder whose index is cached.
    pub(crate) fn cached(folder: PathBuf, paths: Vec<PathBuf>) -> Self {
        let state = Self::new(folder);
        let count = paths.len();
        state.inner.visited_files.store(count, Ordering::SeqCst);
        state.inner.indexed_files.store(count, Ordering::SeqCst);
        let _ = state.inner.total_files.set(count);
        state.inner.visited_buffer.extend(paths.iter().cloned());
        state.inner.indexed_buffer.extend(paths.iter().cloned());
        state.inner.core.start();
        state.inner.core.seal();
        state.inner.core.finish();
        state.inner.result.resolve(Ok(paths));
        state
    }

    pub fn folder(&self) -> &Path {
        &self.inner.folder
    }

    pub fn status(&self) -> OperationStatus {
        self.inner.core.status()
    }

    /// Fraction of visited files that have been indexed.
    ///
    /// 0.0 while the walk is still discovering files, 1.0 only once terminal.
    pub fn progress(&self) -> f64 {
        if self.status().is_terminal() {
            return 1.0;
        }
        match self.total_files_number() {
            None => 0.0,
            Some(total) => partial_progress(self.indexed_files_number() as u64, total as u64),
        }
    }

    /// Request cancellation. Returns `false` if the build already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = self.inner.core.cancel();
        if cancelled {
            tracing::info!("Indexing of {} cancelled", self.inner.folder.display());
        }
        cancelled
    }

    /// Indexed paths once the build resolves; empty if cancelled.
    pub fn result(&self) -> &OperationResult<Vec<PathBuf>> {
        &self.inner.result
    }

    pub fn visited_files_number(&self) -> usize {
        self.inner.visited_files.load(Ordering::SeqCst)
    }

    pub fn indexed_files_number(&self) -> usize {
        self.inner.indexed_files.load(Ordering::SeqCst)
    }

    /// Number of files under the folder, known once the walk completes.
    pub fn total_files_number(&self) -> Option<usize> {
        self.inner.total_files.get().copied()
    }

    /// Paths visited since the previous flush
    pub fn flush_visited_files(&self) -> Vec<PathBuf> {
        self.inner.visited_buffer.flush()
    }

    /// Paths indexed since the previous flush
    pub fn flush_indexed_files(&self) -> Vec<PathBuf> {
        self.inner.indexed_buffer.flush()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.inner.core.started_at()
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.inner.core.finished_at()
    }

    pub fn last_activity(&self) -> Instant {
        self.inner.core.last_activity()
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.core.elapsed()
    }

    pub fn failure(&self) -> Option<SearchError> {
        self.inner.core.failure()
    }

    // Pipeline side

    pub(crate) fn start(&self) {
        self.inner.core.start();
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.inner.core.should_stop()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.inner.core.is_cancelled()
    }

    pub(crate) fn abort(&self) {
        self.inner.core.abort();
    }

    pub(crate) fn seal(&self) -> bool {
        self.inner.core.seal()
    }

    pub(crate) fn record_visited(&self, path: PathBuf) {
        self.inner.visited_files.fetch_add(1, Ordering::SeqCst);
        self.inner.visited_buffer.push(path);
        self.inner.core.touch();
    }

    pub(crate) fn record_indexed(&self) {
        self.inner.indexed_files.fetch_add(1, Ordering::SeqCst);
        self.inner.core.touch();
    }

    pub(crate) fn push_indexed_path(&self, path: PathBuf) {
        self.inner.indexed_buffer.push(path);
    }

    pub(crate) fn set_total_files(&self, total: usize) {
        let _ = self.inner.total_files.set(total);
    }

    pub(crate) fn complete(&self, outcome: Result<Vec<PathBuf>>) {
        match outcome {
            Ok(paths) => {
                self.inner.core.finish();
                self.inner.result.resolve(Ok(paths));
            }
            Err(error) => {
                self.inner.core.fail(error.clone());
                self.inner.result.resolve(Err(error));
            }
        }
    }

    pub(crate) fn complete_cancelled(&self) {
        self.inner.core.cancel();
        self.inner.result.resolve(Ok(Vec::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_zero_until_total_known() {
        let state = IndexingState::new(PathBuf::from("/f"));
        state.start();
        state.record_visited(PathBuf::from("/f/a"));
        state.record_indexed();
        assert_eq!(state.total_files_number(), None);
        assert_eq!(state.progress(), 0.0);

        state.set_total_files(2);
        assert_eq!(state.progress(), 0.5);
        state.set_total_files(100);
        assert_eq!(state.total_files_number(), Some(2));
    }

    #[test]
    fn test_progress_one_only_when_terminal() {
        let state = IndexingState::new(PathBuf::from("/f"));
        state.start();
        state.record_visited(PathBuf::from("/f/a"));
        state.record_indexed();
        state.set_total_files(1);
        assert!(state.progress() < 1.0);

        state.seal();
        state.complete(Ok(vec![PathBuf::from("/f/a")]));
        assert_eq!(state.status(), OperationStatus::Finished);
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.result().wait().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_resolves_empty() {
        let state = IndexingState::new(PathBuf::from("/f"));
        state.start();
        assert!(state.cancel());
        assert_eq!(state.status(), OperationStatus::Cancelled);
        assert_eq!(state.progress(), 1.0);

        state.complete_cancelled();
        assert!(state.result().wait().unwrap().is_empty());
        assert!(!state.cancel());
    }

    #[test]
    fn test_failure_is_recorded() {
        let state = IndexingState::new(PathBuf::from("/f"));
        state.start();
        state.complete(Err(SearchError::failed("read", std::io::Error::other("eio"))));
        assert_eq!(state.status(), OperationStatus::Failed);
        assert!(state.failure().is_some());
        assert!(state.result().wait().is_err());
    }

    #[test]
    fn test_cached_state_is_finished() {
        let paths = vec![PathBuf::from("/f/a"), PathBuf::from("/f/b")];
        let state = IndexingState::cached(PathBuf::from("/f"), paths.clone());
        assert_eq!(state.status(), OperationStatus::Finished);
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.total_files_number(), Some(2));
        assert_eq!(state.flush_indexed_files(), paths);
        assert_eq!(state.result().try_get().unwrap().unwrap(), paths);
        assert!(!state.cancel());
    }

    #[test]
    fn test_buffers_flush_independently() {
        let state = IndexingState::new(PathBuf::from("/f"));
        state.record_visited(PathBuf::from("/f/a"));
        state.push_indexed_path(PathBuf::from("/f/a"));
        assert_eq!(state.flush_visited_files().len(), 1);
        assert!(state.flush_visited_files().is_empty());
        assert_eq!(state.flush_indexed_files().len(), 1);
    }
}
