//! Best-fit recycler of partially-free persistent-memory runs.
//!
//! A *run* is a heap region split into equal-size blocks tracked by a
//! bitmap. When a run is no longer the allocator's active run for its
//! size class it still has free blocks worth reusing; the [`Recycler`]
//! keeps those runs indexed by a free-space score so the allocator can
//! pick the best fit instead of carving fresh space.
//!
//! # Architecture
//!
//! ```text
//! Recycler (façade, one per heap)
//! ├── Mutex<RecyclerState>
//! │   ├── ScoredIndex   (ordered multiset of RunScore, best-fit lookup)
//! │   ├── PendingQueue  (runs with in-flight reservations)
//! │   └── scratch       (refreshed scores during recalculation)
//! ├── UnaccountedUnits  (lock-free count of blocks freed since last pass)
//! └── RecalcGate        (single-flight flag for recalculation)
//! ```
//!
//! # Approximate scores
//!
//! Scoring a run means scanning its bitmap under the run's own lock, so
//! it is not done on every deallocation. Deallocations only bump
//! [`UnaccountedUnits`]; indexed scores drift low until
//! [`Recycler::recalc`] rescores them. Because scores never overstate
//! free space, a run picked by best fit can always satisfy the request,
//! and the run's persistent header stays the single source of truth for
//! its size.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod index;
pub mod pending;
pub mod recalc;
pub mod recycler;
pub mod scorer;

// Public re-exports for the primary API surface.
pub use config::RecyclerConfig;
pub use index::ScoredIndex;
pub use pending::{PendingQueue, Reservations, ReservedRun};
pub use recalc::{EmptyRuns, RecalcGate, UnaccountedUnits};
pub use recycler::{Recycler, RecyclerStats};
pub use scorer::{score_run, score_words};
