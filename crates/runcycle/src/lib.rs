//! runcycle: best-fit recycling of partially-free runs for
//! persistent-memory allocators.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the runcycle sub-crates. For most users, adding `runcycle` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use runcycle::prelude::*;
//! use runcycle_test_utils::MockHeap;
//!
//! let heap = Arc::new(MockHeap::new(10));
//! let recycler = Recycler::new(Arc::clone(&heap), RecyclerConfig::new(10)).unwrap();
//!
//! // A run with its first four blocks in use.
//! let run = RunHandle::new(0, 1);
//! heap.occupy(run.location(), 0, 4).unwrap();
//! recycler.put(run, recycler.score_of(run)).unwrap();
//!
//! let reused = recycler.get(6).unwrap();
//! assert_eq!(reused.location(), run.location());
//! assert!(recycler.get(6).is_err());
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types: identifiers, handles, scores, bitmaps, errors, heap trait.
pub mod types {
    pub use runcycle_core::*;
}

/// The recycler and its components.
pub mod recycler {
    pub use runcycle_recycler::*;
}

/// Convenience re-exports for the common case.
pub mod prelude {
    pub use runcycle_core::{
        ChunkId, HeapLayout, RecycleError, RunBitmap, RunHandle, RunLocation, RunScore, ZoneId,
    };
    pub use runcycle_recycler::{
        EmptyRuns, Recycler, RecyclerConfig, RecyclerStats, Reservations, ReservedRun,
    };
}
