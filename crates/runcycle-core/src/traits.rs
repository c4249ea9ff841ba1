//! The heap layout seam between the recycler and the heap that owns runs.

use std::sync::Mutex;

use crate::bitmap::RunBitmap;
use crate::handle::{RunHandle, RunLocation};

/// Access to the runs of a persistent heap.
///
/// The recycler never owns run memory; everything it needs to know about a
/// run comes through this trait. Implementations must be shareable across
/// allocator threads.
///
/// # Lock ordering
///
/// The recycler may hold its own lock while taking a run's bitmap lock.
/// Implementations and callers must never call into the recycler while
/// holding a run's bitmap lock.
pub trait HeapLayout: Send + Sync {
    /// The per-run lock guarding the run's occupancy bitmap.
    ///
    /// `run` must name a run that exists in the heap.
    fn run_bitmap(&self, run: RunLocation) -> &Mutex<RunBitmap>;

    /// The run's size as recorded in its persistent chunk header.
    ///
    /// This is the only authoritative source of a run's size; scores are
    /// hints.
    fn header_size_idx(&self, run: RunLocation) -> u32;

    /// Rebuild the run's volatile block state from its persistent header.
    ///
    /// Called whenever a run leaves the index, before it is rescored or
    /// handed back to the allocator.
    fn rebuild_state(&self, run: &RunHandle);
}
