use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors surfaced by the search engine.
///
/// `InvalidArgument`, `NotADirectory`, `Busy` and `NoIndex` are returned
/// synchronously by the call that violates the precondition. `Failed` is
/// produced by the background pipelines and reported through the operation
/// state and its result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("An indexing operation is already in progress")]
    Busy,

    #[error("No index for folder: {}", .0.display())]
    NoIndex(PathBuf),

    #[error("{context}: {source}")]
    Failed {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },
}

impl SearchError {
    pub fn failed(context: impl Into<String>, source: io::Error) -> Self {
        SearchError::Failed {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn io_at(path: &Path, source: io::Error) -> Self {
        Self::failed(format!("Failed to read {}", path.display()), source)
    }

    pub(crate) fn worker_panicked(stage: &str) -> Self {
        Self::failed(
            format!("{stage} worker panicked"),
            io::Error::other("worker thread panicked"),
        )
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Canonicalizes a path, returning the original if canonicalization fails.
pub fn canonicalize_existing_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolves `path` to the canonical folder key, failing with
/// [`SearchError::NotADirectory`] when it is missing or not a directory.
pub fn canonical_folder(path: &Path) -> Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(folder) if folder.is_dir() => Ok(folder),
        _ => Err(SearchError::NotADirectory(path.to_path_buf())),
    }
}
