//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`trigram`] - 3-character triplet extraction for indexing and queries
//! - [`filter`] - Skip-list of files that are never read for triplets
//! - [`progress`] - Progress bar shim used by the CLI
//!
//! ## Key Functions
//!
//! ```
//! use triseek::utils::{extract_triplets, token_triplets};
//!
//! // Unique triplets of every line
//! let triplets = extract_triplets("hello");
//! assert_eq!(triplets.len(), 3);
//!
//! // Triplets a file must contain to match a token
//! let needed = token_triplets("hello");
//! assert_eq!(needed.len(), 3);
//! ```

pub mod filter;
pub mod progress;
pub mod trigram;

pub use filter::*;
pub use trigram::*;
