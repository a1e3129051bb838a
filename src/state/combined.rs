use crate::error::{Result, SearchError};
use crate::search::TokenMatch;
use crate::state::{IndexingState, OperationResult, OperationStatus, SearchingState};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Share of the reported progress attributed to indexing.
pub const INDEX_PROGRESS_WEIGHT: f64 = 0.9;
/// Share of the reported progress attributed to searching.
pub const SEARCH_PROGRESS_WEIGHT: f64 = 0.1;

/// Aggregated view of an index build followed by a search on the same folder.
#[derive(Debug, Clone)]
pub struct IndexingAndSearchingState {
    inner: Arc<CombinedInner>,
}

#[derive(Debug)]
struct CombinedInner {
    token: String,
    indexing: IndexingState,
    searching: OnceLock<SearchingState>,
    /// Set when the search could not be started at all
    failure: OnceLock<SearchError>,
    cancel_requested: AtomicBool,
    cancelled_at: Mutex<Option<Instant>>,
    result: OperationResult<Vec<TokenMatch>>,
}

impl IndexingAndSearchingState {
    pub(crate) fn new(indexing: IndexingState, token: String) -> Self {
        Self {
            inner: Arc::new(CombinedInner {
                token,
                indexing,
                searching: OnceLock::new(),
                failure: OnceLock::new(),
                cancel_requested: AtomicBool::new(false),
                cancelled_at: Mutex::new(None),
                result: OperationResult::new(),
            }),
        }
    }

    pub fn folder(&self) -> &Path {
        self.inner.indexing.folder()
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn indexing(&self) -> &IndexingState {
        &self.inner.indexing
    }

    /// The search half, once it has been started.
    pub fn searching(&self) -> Option<&SearchingState> {
        self.inner.searching.get()
    }

    /// Status derived from the index and search statuses.
    ///
    /// A cancel requested before the search started is reported as a
    /// `Cancelling` search until the search slot is settled.
    pub fn status(&self) -> OperationStatus {
        if self.inner.failure.get().is_some() {
            return OperationStatus::Failed;
        }
        let index = self.inner.indexing.status();
        let search = match self.inner.searching.get() {
            Some(searching) => searching.status(),
            None if self.is_cancel_requested() => OperationStatus::Cancelling,
            None => OperationStatus::NotStarted,
        };
        OperationStatus::combine(index, search)
    }

    /// Weighted progress, indexing dominating; 1.0 once terminal.
    pub fn progress(&self) -> f64 {
        if self.status().is_terminal() {
            return 1.0;
        }
        let search = self.inner.searching.get().map_or(0.0, |s| s.progress());
        INDEX_PROGRESS_WEIGHT * self.inner.indexing.progress() + SEARCH_PROGRESS_WEIGHT * search
    }

    /// Cancel whichever half is running. Returns `false` if already terminal.
    pub fn cancel(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.inner.cancel_requested.store(true, Ordering::SeqCst);
        self.inner.cancelled_at.lock().get_or_insert_with(Instant::now);
        self.inner.indexing.cancel();
        if let Some(searching) = self.inner.searching.get() {
            searching.cancel();
        }
        true
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> &OperationResult<Vec<TokenMatch>> {
        &self.inner.result
    }

    /// Matches found since the previous flush
    pub fn flush_found_matches(&self) -> Vec<TokenMatch> {
        self.inner
            .searching
            .get()
            .map(|s| s.flush_found_matches())
            .unwrap_or_default()
    }

    /// Time since indexing started, up to the cancel request or completion.
    pub fn elapsed(&self) -> Duration {
        let Some(start) = self.inner.indexing.started_at() else {
            return Duration::ZERO;
        };
        let cancelled_at = *self.inner.cancelled_at.lock();
        let end = cancelled_at
            .or_else(|| self.finished_at())
            .unwrap_or_else(Instant::now);
        end.saturating_duration_since(start)
    }

    pub fn last_activity(&self) -> Instant {
        let index = self.inner.indexing.last_activity();
        match self.inner.searching.get() {
            Some(searching) => index.max(searching.last_activity()),
            None => index,
        }
    }

    pub fn failure(&self) -> Option<SearchError> {
        self.inner
            .failure
            .get()
            .cloned()
            .or_else(|| self.inner.indexing.failure())
            .or_else(|| self.inner.searching.get().and_then(|s| s.failure()))
    }

    fn finished_at(&self) -> Option<Instant> {
        if !self.status().is_terminal() {
            return None;
        }
        let index = self.inner.indexing.finished_at();
        let search = self.inner.searching.get().and_then(|s| s.finished_at());
        index.max(search)
    }

    // Driver side

    /// Install the search half. Cancels it straight away if a cancel
    /// arrived while indexing was wrapping up.
    pub(crate) fn attach_search(&self, searching: SearchingState) {
        if self.inner.searching.set(searching.clone()).is_err() {
            return;
        }
        if self.is_cancel_requested() {
            searching.cancel();
        }
    }

    pub(crate) fn fail(&self, error: SearchError) {
        let _ = self.inner.failure.set(error.clone());
        self.inner.result.resolve(Err(error));
    }

    pub(crate) fn resolve(&self, outcome: Result<Vec<TokenMatch>>) {
        self.inner.result.resolve(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn running_index() -> IndexingState {
        let indexing = IndexingState::new(PathBuf::from("/f"));
        indexing.start();
        indexing
    }

    fn finished_index() -> IndexingState {
        let indexing = running_index();
        indexing.seal();
        indexing.complete(Ok(Vec::new()));
        indexing
    }

    #[test]
    fn test_status_follows_index_then_search() {
        let combined = IndexingAndSearchingState::new(running_index(), "abc".into());
        assert_eq!(combined.status(), OperationStatus::InProgress);

        let combined = IndexingAndSearchingState::new(finished_index(), "abc".into());
        assert_eq!(combined.status(), OperationStatus::InProgress);

        let searching = SearchingState::new(PathBuf::from("/f"), "abc".into());
        searching.start();
        combined.attach_search(searching.clone());
        assert_eq!(combined.status(), OperationStatus::InProgress);

        searching.seal();
        searching.complete(Ok(Vec::new()));
        assert_eq!(combined.status(), OperationStatus::Finished);
        assert_eq!(combined.progress(), 1.0);
    }

    #[test]
    fn test_progress_weights() {
        let indexing = running_index();
        indexing.record_visited(PathBuf::from("/f/a"));
        indexing.record_visited(PathBuf::from("/f/b"));
        indexing.record_indexed();
        indexing.set_total_files(2);

        let combined = IndexingAndSearchingState::new(indexing, "abc".into());
        assert!((combined.progress() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_during_indexing() {
        let combined = IndexingAndSearchingState::new(running_index(), "abc".into());
        assert!(combined.cancel());
        assert_eq!(combined.indexing().status(), OperationStatus::Cancelled);
        assert_eq!(combined.status(), OperationStatus::Cancelled);
        assert_eq!(combined.progress(), 1.0);
        assert!(!combined.cancel());
    }

    #[test]
    fn test_cancel_between_index_and_search() {
        let combined = IndexingAndSearchingState::new(finished_index(), "abc".into());
        assert!(combined.cancel());
        assert_eq!(combined.status(), OperationStatus::Cancelling);
        assert!(combined.progress() < 1.0);

        combined.attach_search(SearchingState::cancelled(PathBuf::from("/f"), "abc".into()));
        assert_eq!(combined.status(), OperationStatus::Cancelled);
    }

    #[test]
    fn test_attach_after_cancel_cancels_search() {
        let combined = IndexingAndSearchingState::new(finished_index(), "abc".into());
        combined.cancel();

        let searching = SearchingState::new(PathBuf::from("/f"), "abc".into());
        searching.start();
        combined.attach_search(searching.clone());
        assert_eq!(searching.status(), OperationStatus::Cancelled);
        assert_eq!(combined.status(), OperationStatus::Cancelled);
    }

    #[test]
    fn test_search_start_failure() {
        let combined = IndexingAndSearchingState::new(finished_index(), "abc".into());
        combined.fail(SearchError::Busy);
        assert_eq!(combined.status(), OperationStatus::Failed);
        assert!(matches!(combined.failure(), Some(SearchError::Busy)));
        assert!(combined.result().wait().is_err());
    }

    #[test]
    fn test_last_activity_is_max() {
        let combined = IndexingAndSearchingState::new(finished_index(), "abc".into());
        let searching = SearchingState::new(PathBuf::from("/f"), "abc".into());
        searching.start();
        combined.attach_search(searching.clone());
        assert_eq!(combined.last_activity(), searching.last_activity());
    }
}
