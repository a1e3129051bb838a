//! # triseek - folder-scoped text search on a trigram index
//!
//! triseek indexes every 3-character substring ("triplet") of the text files
//! under a folder and answers "where does this token occur?" by intersecting
//! the file sets of the token's triplets, then scanning only those files.
//!
//! ## Architecture
//!
//! - [`engine`] - [`SearchEngine`] facade, incremental updates, file watching
//! - [`index`] - the in-memory [`TrigramIndex`] and its 4-stage build pipeline
//! - [`search`] - candidate selection and literal token scanning
//! - [`state`] - live progress, status and cancellation of operations
//! - [`config`] - engine configuration (defaults, config file, environment)
//! - [`output`] - result printing for the CLI
//! - [`utils`] - triplet extraction, skip-list, progress bar shim
//!
//! ## Quick Start
//!
//! ```no_run
//! use triseek::{EngineConfig, SearchEngine, SearchSettings};
//!
//! let engine = SearchEngine::new(EngineConfig::default())?;
//!
//! // Build the index; progress can be polled while it runs
//! let indexing = engine.create_index_at_folder("/path/to/folder")?;
//! indexing.result().wait()?;
//!
//! let searching = engine.search_string("/path/to/folder", "needle", SearchSettings::default())?;
//! for m in searching.result().wait()? {
//!     println!("{}:{}:{}", m.path.display(), m.line, m.column);
//! }
//! # Ok::<(), triseek::SearchError>(())
//! ```
//!
//! Every operation returns immediately with a state handle; its `result()`
//! resolves once the background work is done, and `cancel()` stops it.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod output;
pub mod search;
pub mod state;
pub mod utils;

pub use config::{EngineConfig, SearchSettings};
pub use engine::{FileEvent, FileEventKind, SearchEngine};
pub use error::{Result, SearchError};
pub use index::{IndexStats, TrigramIndex};
pub use search::TokenMatch;
pub use state::{
    IndexingAndSearchingState, IndexingState, OperationResult, OperationStatus, SearchingState,
};
