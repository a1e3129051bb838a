use crate::config::{EngineConfig, SearchSettings};
use crate::error::{Result, SearchError};
use crate::index::SharedIndex;
use crate::index::file::{FileText, read_text};
use crate::search::{TokenMatch, TokenMatcher};
use crate::state::SearchingState;
use crate::utils::{FileFilter, token_triplets};
use rayon::prelude::*;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Candidate files per scan thread in one capped batch
const SCAN_BATCH_PER_THREAD: usize = 4;

/// Runs token searches against completed indexes.
///
/// Candidate files are scanned in parallel on a rayon pool: the engine's own
/// pool when `search_threads` is set, otherwise rayon's global pool.
#[derive(Debug, Clone)]
pub struct Searcher {
    filter: Arc<FileFilter>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

/// A candidate file and its size when the search started
struct Candidate {
    path: Arc<Path>,
    bytes: u64,
}

impl Searcher {
    pub fn new(config: &EngineConfig, filter: Arc<FileFilter>) -> Self {
        let pool = match config.search_threads {
            0 => None,
            threads => match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("triseek-scan-{i}"))
                .build()
            {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    tracing::warn!("Falling back to the global scan pool: {}", e);
                    None
                }
            },
        };
        Self { filter, pool }
    }

    /// Start searching `folder`'s index for `token` in the background.
    ///
    /// The token must already be validated. The returned state is live:
    /// poll it or wait on its result.
    pub fn spawn(
        &self,
        folder: PathBuf,
        token: String,
        index: SharedIndex,
        settings: SearchSettings,
    ) -> SearchingState {
        let state = SearchingState::new(folder, token);
        state.start();

        let worker = state.clone();
        let searcher = self.clone();
        let spawned = thread::Builder::new()
            .name("triseek-search".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    searcher.run(&worker, &index, &settings)
                }))
                .unwrap_or_else(|_| Err(SearchError::worker_panicked("search")));
                searcher.finish(&worker, outcome);
            });

        if let Err(e) = spawned {
            state.complete(Err(SearchError::failed("Failed to spawn search thread", e)));
        }
        state
    }

    fn finish(&self, state: &SearchingState, outcome: Result<Vec<TokenMatch>>) {
        match outcome {
            Ok(matches) if state.seal() => {
                tracing::info!(
                    "Found {} matches for {:?} in {} files under {} ({:?})",
                    matches.len(),
                    state.token(),
                    state.visited_files_number(),
                    state.folder().display(),
                    state.elapsed()
                );
                state.complete(Ok(matches));
            }
            Err(error) if !state.is_cancelled() => {
                tracing::warn!(
                    "Search for {:?} in {} failed: {}",
                    state.token(),
                    state.folder().display(),
                    error
                );
                state.complete(Err(error));
            }
            _ => state.complete_cancelled(),
        }
    }

    fn run(
        &self,
        state: &SearchingState,
        index: &SharedIndex,
        settings: &SearchSettings,
    ) -> Result<Vec<TokenMatch>> {
        let triplets = token_triplets(state.token());
        let paths = index.read().candidates(&triplets);

        // Path order, so per-file matches concatenate into sorted order and a
        // match cap keeps the first matches by path
        let mut candidates: Vec<Candidate> = paths
            .into_iter()
            .map(|path| {
                let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Candidate { path, bytes }
            })
            .collect();
        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        let total_bytes = candidates.iter().map(|c| c.bytes).sum();
        state.set_candidates(candidates.len(), total_bytes);
        tracing::debug!(
            "{} candidate files ({} bytes) for {:?}",
            candidates.len(),
            total_bytes,
            state.token()
        );

        let matcher = TokenMatcher::new(state.token());
        let scan = || self.scan_candidates(state, &matcher, &candidates, settings.max_matches);
        let matches = match &self.pool {
            Some(pool) => pool.install(scan),
            None => scan(),
        };
        let mut matches = matches.inspect_err(|_| state.abort())?;

        if settings.sort_results {
            matches.sort();
        }
        if let Some(limit) = settings.max_matches {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    /// Scan candidates in parallel, keeping per-file results in candidate
    /// order. With a cap, files are taken in ordered batches and no batch is
    /// started once the matches so far reach it.
    fn scan_candidates(
        &self,
        state: &SearchingState,
        matcher: &TokenMatcher,
        candidates: &[Candidate],
        max_matches: Option<usize>,
    ) -> Result<Vec<TokenMatch>> {
        let scan_batch = |batch: &[Candidate]| {
            batch
                .par_iter()
                .map(|candidate| self.scan_file(state, matcher, candidate))
                .collect::<Result<Vec<Vec<TokenMatch>>>>()
        };

        let Some(limit) = max_matches else {
            return Ok(scan_batch(candidates)?.into_iter().flatten().collect());
        };

        let batch_size = rayon::current_num_threads().max(1) * SCAN_BATCH_PER_THREAD;
        let mut matches = Vec::new();
        for batch in candidates.chunks(batch_size) {
            if matches.len() >= limit || state.should_stop() {
                break;
            }
            matches.extend(scan_batch(batch)?.into_iter().flatten());
        }
        Ok(matches)
    }

    fn scan_file(
        &self,
        state: &SearchingState,
        matcher: &TokenMatcher,
        candidate: &Candidate,
    ) -> Result<Vec<TokenMatch>> {
        if state.should_stop() {
            return Ok(Vec::new());
        }

        let path = &candidate.path;
        let text = match read_text(path, &self.filter) {
            Ok(FileText::Text(text)) => text,
            Ok(FileText::Skipped(reason)) => {
                tracing::debug!("Not scanning {}: {:?}", path.display(), reason);
                state.record_visited(path, candidate.bytes);
                return Ok(Vec::new());
            }
            Err(e) => return Err(SearchError::io_at(path, e)),
        };

        let mut matches = Vec::new();
        for (line_index, line) in text.lines().enumerate() {
            if state.should_stop() {
                return Ok(matches);
            }
            for column in matcher.columns(line) {
                matches.push(TokenMatch::new(path.to_path_buf(), line_index + 1, column));
            }
        }

        state.record_matches(&matches);
        state.record_visited(path, candidate.bytes);
        Ok(matches)
    }
}
