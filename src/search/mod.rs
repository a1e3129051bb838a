//! Token search over an indexed folder.
//!
//! A token is looked up by its triplets: only files that contain every
//! triplet of the token are scanned, line by line, for literal occurrences.

pub mod matcher;
pub mod searcher;

pub use matcher::TokenMatcher;
pub use searcher::Searcher;

use crate::error::{Result, SearchError};
use crate::utils::Triplet;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One occurrence of a token: file, 1-based line and 1-based column.
///
/// Ordering is by path, then line, then column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TokenMatch {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl TokenMatch {
    pub fn new(path: PathBuf, line: usize, column: usize) -> Self {
        Self { path, line, column }
    }
}

impl fmt::Display for TokenMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// Reject tokens that the 3-character window cannot represent.
pub fn validate_token(token: &str) -> Result<()> {
    if token.chars().count() < Triplet::LEN {
        return Err(SearchError::InvalidArgument(format!(
            "token {token:?} is shorter than {} characters",
            Triplet::LEN
        )));
    }
    if token.contains(['\n', '\r']) {
        return Err(SearchError::InvalidArgument(format!(
            "token {token:?} contains a line break"
        )));
    }
    Ok(())
}
