//! Core types and traits for the runcycle run recycler.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared between the recycler and the heap that owns the
//! runs: run identifiers and handles, the free-space score and its
//! best-fit ordering, the occupancy bitmap, the heap layout trait, and
//! error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bitmap;
pub mod error;
pub mod handle;
pub mod id;
pub mod score;
pub mod traits;

// Public re-exports for the primary API surface.
pub use bitmap::{RunBitmap, BITS_PER_WORD};
pub use error::{ConfigError, RecycleError};
pub use handle::{RunHandle, RunLocation};
pub use id::{ChunkId, ZoneId};
pub use score::RunScore;
pub use traits::HeapLayout;
