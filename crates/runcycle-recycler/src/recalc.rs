//! Amortized recalculation of drifted scores.
//!
//! Deallocation never touches the scoring machinery: it only bumps the
//! [`UnaccountedUnits`] counter. Indexed scores therefore understate real
//! free space over time. A recalculation pass walks the index from the
//! lowest score upwards, rescoring runs until it has recovered as many
//! blocks as were reported freed, and harvests runs that turned out to be
//! completely empty.
//!
//! At most one pass runs at a time. The [`RecalcGate`] is a single-flight
//! flag: a thread that loses the race skips the pass instead of waiting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use indexmap::IndexSet;
use runcycle_core::{HeapLayout, RunHandle, RunScore};
use tracing::debug;

use crate::index::ScoredIndex;
use crate::scorer::score_run;

/// Fully-empty runs harvested by a recalculation pass, in harvest order.
///
/// Ownership of these runs passes to the caller, who must return them to
/// the heap's free chunk pool.
pub type EmptyRuns = IndexSet<RunHandle>;

/// Approximate count of blocks freed since the last recalculation.
///
/// Incremented lock-free on every deallocation; decremented only by the
/// recalculation pass holding the [`RecalcGate`].
#[derive(Debug, Default)]
pub struct UnaccountedUnits {
    units: AtomicU64,
}

impl UnaccountedUnits {
    /// Create a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `blocks` newly freed blocks.
    pub fn add(&self, blocks: u64) {
        self.units.fetch_add(blocks, Ordering::Relaxed);
    }

    /// Subtract a previously loaded snapshot.
    ///
    /// Subtracting the snapshot rather than storing zero keeps increments
    /// that raced with the pass.
    pub fn settle(&self, snapshot: u64) {
        self.units.fetch_sub(snapshot, Ordering::Relaxed);
    }

    /// Current value. Only used for threshold decisions, so staleness
    /// affects when a pass triggers, never correctness.
    pub fn load(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }
}

/// Single-flight gate for recalculation passes.
#[derive(Debug, Default)]
pub struct RecalcGate {
    in_progress: AtomicBool,
}

// Compile-time assertion: RecalcGate must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RecalcGate>();
};

impl RecalcGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. Returns `None` if another pass holds it.
    pub fn try_claim(&self) -> Option<RecalcClaim<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RecalcClaim { gate: self })
    }

    /// Whether a pass currently holds the gate.
    pub fn is_claimed(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }
}

/// Proof of holding the [`RecalcGate`]; releases it on drop.
#[must_use]
pub struct RecalcClaim<'a> {
    gate: &'a RecalcGate,
}

impl Drop for RecalcClaim<'_> {
    fn drop(&mut self) {
        let released =
            self.gate
                .in_progress
                .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed);
        assert!(
            released.is_ok(),
            "recalculation gate was released while not held"
        );
    }
}

/// Rescore index entries from the lowest score upwards.
///
/// Stops once the rescored runs have recovered at least `search_limit`
/// free blocks, or when the index runs dry. Rescored runs that are still
/// partially used go back into the index; fully empty runs are returned
/// and are no longer tracked.
///
/// `scratch` holds the refreshed scores until the walk is over so that a
/// run is never visited twice; it is left empty on return.
///
/// # Panics
///
/// Panics if a rescored run has less free space than its indexed score
/// claimed. Scores only drift low; anything else means the index and the
/// heap disagree.
pub(crate) fn rescan<H: HeapLayout + ?Sized>(
    heap: &H,
    index: &mut ScoredIndex,
    scratch: &mut Vec<RunScore>,
    nallocs: u16,
    search_limit: u64,
) -> EmptyRuns {
    let mut empty = EmptyRuns::new();
    let mut found_units: u64 = 0;
    let mut rescanned: usize = 0;

    while let Some(old) = index.take_at_least(&RunScore::ZERO) {
        let location = old.location();
        let handle = RunHandle::from(location).with_size_idx(heap.header_size_idx(location));
        heap.rebuild_state(&handle);

        let fresh = score_run(heap, location);
        assert!(
            fresh.free_space >= old.free_space,
            "run at {location} lost free space while indexed: {} -> {}",
            old.free_space,
            fresh.free_space
        );
        found_units += (fresh.free_space - old.free_space) as u64;
        rescanned += 1;

        if fresh.is_fully_free(nallocs) {
            empty.insert(handle);
        } else {
            scratch.push(fresh);
        }

        if found_units >= search_limit {
            break;
        }
    }

    for score in scratch.drain(..) {
        // Every reinserted score replaces one taken above.
        let reinserted = index.insert(score);
        debug_assert!(reinserted.is_ok(), "reinserted score overflowed the index");
    }

    debug!(
        rescanned,
        found_units,
        empty = empty.len(),
        remaining = index.len(),
        "recalculated run scores"
    );
    empty
}
