use crate::error::{Result, SearchError};
use crate::search::TokenMatch;
use crate::state::base::{OperationCore, partial_progress};
use crate::state::{DeltaBuffer, OperationResult, OperationStatus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Live view of a search over an indexed folder.
///
/// Progress is measured in bytes: the candidate files are known before
/// scanning starts, so their total size is known up front.
#[derive(Debug, Clone)]
pub struct SearchingState {
    inner: Arc<SearchingInner>,
}

#[derive(Debug)]
struct SearchingInner {
    folder: PathBuf,
    token: String,
    core: OperationCore,
    candidate_files: OnceLock<usize>,
    total_bytes: OnceLock<u64>,
    parsed_bytes: AtomicU64,
    visited_files: AtomicUsize,
    found_matches: AtomicUsize,
    visited_buffer: DeltaBuffer<PathBuf>,
    matches_buffer: DeltaBuffer<TokenMatch>,
    result: OperationResult<Vec<TokenMatch>>,
}

impl SearchingState {
    pub(crate) fn new(folder: PathBuf, token: String) -> Self {
        Self {
            inner: Arc::new(SearchingInner {
                folder,
                token,
                core: OperationCore::new(),
                candidate_files: OnceLock::new(),
                total_bytes: OnceLock::new(),
                parsed_bytes: AtomicU64::new(0),
                visited_files: AtomicUsize::new(0),
                found_matches: AtomicUsize::new(0),
                visited_buffer: DeltaBuffer::new(),
                matches_buffer: DeltaBuffer::new(),
                result: OperationResult::new(),
            }),
        }
    }

    /// A search that was cancelled before it could start.
    pub(crate) fn cancelled(folder: PathBuf, token: String) -> Self {
        let state = Self::new(folder, token);
        state.complete_cancelled();
        state
    }

    pub fn folder(&self) -> &Path {
        &self.inner.folder
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn status(&self) -> OperationStatus {
        self.inner.core.status()
    }

    /// Fraction of candidate bytes scanned; 1.0 only once terminal.
    pub fn progress(&self) -> f64 {
        if self.status().is_terminal() {
            return 1.0;
        }
        match self.total_bytes() {
            None => 0.0,
            Some(total) => partial_progress(self.parsed_bytes(), total),
        }
    }

    /// Request cancellation. Returns `false` if the search already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = self.inner.core.cancel();
        if cancelled {
            tracing::info!(
                "Search for {:?} in {} cancelled",
                self.inner.token,
                self.inner.folder.display()
            );
        }
        cancelled
    }

    /// All matches once the search resolves; empty if cancelled.
    pub fn result(&self) -> &OperationResult<Vec<TokenMatch>> {
        &self.inner.result
    }

    /// Number of files that survived the triplet intersection
    pub fn candidate_files_number(&self) -> Option<usize> {
        self.inner.candidate_files.get().copied()
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.inner.total_bytes.get().copied()
    }

    pub fn parsed_bytes(&self) -> u64 {
        self.inner.parsed_bytes.load(Ordering::SeqCst)
    }

    pub fn visited_files_number(&self) -> usize {
        self.inner.visited_files.load(Ordering::SeqCst)
    }

    pub fn found_matches_number(&self) -> usize {
        self.inner.found_matches.load(Ordering::SeqCst)
    }

    /// Files scanned since the previous flush
    pub fn flush_visited_files(&self) -> Vec<PathBuf> {
        self.inner.visited_buffer.flush()
    }

    /// Matches found since the previous flush
    pub fn flush_found_matches(&self) -> Vec<TokenMatch> {
        self.inner.matches_buffer.flush()
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

    pub(crate) fn set_candidates(&self, files: usize, bytes: u64) {
        let _ = self.inner.candidate_files.set(files);
        let _ = self.inner.total_bytes.set(bytes);
        self.inner.core.touch();
    }

    pub(crate) fn record_matches(&self, matches: &[TokenMatch]) {
        if matches.is_empty() {
            return;
        }
        self.inner
            .found_matches
            .fetch_add(matches.len(), Ordering::SeqCst);
        self.inner.matches_buffer.extend(matches.iter().cloned());
        self.inner.core.touch();
    }

    pub(crate) fn record_visited(&self, path: &Path, bytes: u64) {
        self.inner.visited_files.fetch_add(1, Ordering::SeqCst);
        self.inner.parsed_bytes.fetch_add(bytes, Ordering::SeqCst);
        self.inner.visited_buffer.push(path.to_path_buf());
        self.inner.core.touch();
    }

    pub(crate) fn complete(&self, outcome: Result<Vec<TokenMatch>>) {
        match outcome {
            Ok(matches) => {
                self.inner.core.finish();
                self.inner.result.resolve(Ok(matches));
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

    fn state() -> SearchingState {
        SearchingState::new(PathBuf::from("/f"), "needle".to_string())
    }

    #[test]
    fn test_progress_by_bytes() {
        let state = state();
        state.start();
        assert_eq!(state.progress(), 0.0);

        state.set_candidates(2, 100);
        state.record_visited(Path::new("/f/a"), 25);
        assert_eq!(state.progress(), 0.25);
        state.record_visited(Path::new("/f/b"), 75);
        assert!(state.progress() < 1.0);

        state.seal();
        state.complete(Ok(Vec::new()));
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.visited_files_number(), 2);
    }

    #[test]
    fn test_matches_buffer() {
        let state = state();
        let m = TokenMatch::new(PathBuf::from("/f/a"), 1, 3);
        state.record_matches(&[m.clone(), m.clone()]);
        assert_eq!(state.found_matches_number(), 2);
        assert_eq!(state.flush_found_matches().len(), 2);
        assert!(state.flush_found_matches().is_empty());
    }

    #[test]
    fn test_cancelled_constructor() {
        let state = SearchingState::cancelled(PathBuf::from("/f"), "abc".to_string());
        assert_eq!(state.status(), OperationStatus::Cancelled);
        assert_eq!(state.progress(), 1.0);
        assert!(state.result().wait().unwrap().is_empty());
    }
}
