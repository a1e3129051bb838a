//! Progress, status and cancellation tracking for long-running operations.
//!
//! Every operation returns a cheap-to-clone state handle immediately and keeps
//! updating it from background threads:
//!
//! - [`IndexingState`] - a folder index build (progress by file count)
//! - [`SearchingState`] - a search over a built index (progress by bytes)
//! - [`IndexingAndSearchingState`] - both, reported as one operation
//!
//! States never block the pipeline that feeds them; polling callers read
//! atomics and drain [`DeltaBuffer`]s.

pub(crate) mod base;
pub mod buffer;
pub mod combined;
pub mod indexing;
pub mod result;
pub mod searching;
pub mod status;

pub use buffer::DeltaBuffer;
pub use combined::IndexingAndSearchingState;
pub use indexing::IndexingState;
pub use result::OperationResult;
pub use searching::SearchingState;
pub use status::OperationStatus;
