//! Reading a single file for indexing or scanning.

use crate::utils::{FileFilter, Triplet, for_each_line_triplet, is_binary};
use rustc_hash::FxHashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Why a file contributed no text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Name matched the skip-list
    Filtered,
    /// Larger than the configured limit
    TooLarge,
    /// Content looks binary
    Binary,
    /// Content is not valid UTF-8
    NotUtf8,
    /// Vanished between being listed and being read
    Missing,
}

/// Outcome of reading a file
#[derive(Debug)]
pub enum FileText {
    Text(String),
    Skipped(SkipReason),
}

/// Read `path` as text, applying the skip rules.
///
/// Per-file problems (skip-list, size, binary or non-UTF-8 content, a file
/// deleted since it was listed) are reported as [`FileText::Skipped`]; any
/// other I/O error is returned.
pub fn read_text(path: &Path, filter: &FileFilter) -> io::Result<FileText> {
    if !filter.is_indexable(path) {
        return Ok(FileText::Skipped(SkipReason::Filtered));
    }

    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(FileText::Skipped(SkipReason::Missing));
        }
        Err(e) => return Err(e),
    };
    if metadata.len() > filter.max_file_size() {
        return Ok(FileText::Skipped(SkipReason::TooLarge));
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(FileText::Skipped(SkipReason::Missing));
        }
        Err(e) => return Err(e),
    };
    if is_binary(&bytes) {
        return Ok(FileText::Skipped(SkipReason::Binary));
    }

    match String::from_utf8(bytes) {
        Ok(text) => Ok(FileText::Text(text)),
        Err(_) => Ok(FileText::Skipped(SkipReason::NotUtf8)),
    }
}

/// Unique triplets of `text`, checking `should_stop` between lines.
///
/// Returns `None` if stopped before the whole text was processed.
pub fn collect_triplets(text: &str, should_stop: impl Fn() -> bool) -> Option<FxHashSet<Triplet>> {
    let mut triplets = FxHashSet::default();
    for line in text.lines() {
        if should_stop() {
            return None;
        }
        for_each_line_triplet(line, |t| {
            triplets.insert(t);
        });
    }
    Some(triplets)
}

/// Triplets of the file at `path`, treating every read problem as "no
/// triplets". Used where one bad file must not stop processing of others.
pub fn file_triplets_lossy(path: &Path, filter: &FileFilter) -> FxHashSet<Triplet> {
    match read_text(path, filter) {
        Ok(FileText::Text(text)) => collect_triplets(&text, || false).unwrap_or_default(),
        Ok(FileText::Skipped(reason)) => {
            tracing::debug!("Skipping {}: {:?}", path.display(), reason);
            FxHashSet::default()
        }
        Err(e) => {
            tracing::debug!("Treating unreadable {} as empty: {}", path.display(), e);
            FxHashSet::default()
        }
    }
}

pub fn modified_time(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}
