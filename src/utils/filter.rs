use crate::config::EngineConfig;
use crate::error::{Result, SearchError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Decides which files are worth reading for triplets.
///
/// Files rejected here are still walked and reported as indexed; they simply
/// contribute no triplets, so they never become search candidates.
#[derive(Debug, Clone)]
pub struct FileFilter {
    skip: GlobSet,
    max_file_size: u64,
}

impl FileFilter {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        let extension_patterns = config
            .skip_extensions
            .iter()
            .map(|ext| format!("*.{}", ext.trim_start_matches('.')));

        for pattern in extension_patterns.chain(config.skip_file_names.iter().cloned()) {
            let glob = GlobBuilder::new(&pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    SearchError::InvalidArgument(format!("bad skip pattern {pattern:?}: {e}"))
                })?;
            builder.add(glob);
        }

        let skip = builder
            .build()
            .map_err(|e| SearchError::InvalidArgument(format!("bad skip patterns: {e}")))?;

        Ok(Self {
            skip,
            max_file_size: config.max_file_size,
        })
    }

    /// Whether the file name passes the skip-list.
    pub fn is_indexable(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => !self.skip.is_match(Path::new(name)),
            None => false,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}
