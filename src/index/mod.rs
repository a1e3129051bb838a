//! In-memory trigram index and the pipeline that builds it.

pub mod build;
pub mod file;
pub mod trigram_index;

pub use build::IndexBuilder;
pub use trigram_index::{IndexStats, SharedIndex, TrigramIndex};
