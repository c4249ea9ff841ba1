//! The [`Recycler`] façade.
//!
//! One recycler exists per heap. It owns the scored index and the pending
//! queue behind a single lock, and the lock-free counter and gate that
//! drive recalculation.

use std::sync::{Arc, Mutex, MutexGuard};

use runcycle_core::{ConfigError, HeapLayout, RecycleError, RunHandle, RunScore};
use tracing::{debug, trace, warn};

use crate::config::RecyclerConfig;
use crate::index::ScoredIndex;
use crate::pending::{PendingQueue, ReservedRun};
use crate::recalc::{rescan, EmptyRuns, RecalcGate, UnaccountedUnits};
use crate::scorer::score_run;

/// Everything protected by the recycler lock.
struct RecyclerState {
    index: ScoredIndex,
    pending: PendingQueue,
    /// Refreshed scores awaiting reinsertion during a recalculation pass.
    scratch: Vec<RunScore>,
}

impl RecyclerState {
    /// Score and index every pending run whose reservations have settled.
    ///
    /// A run that cannot be indexed is dropped from tracking: its
    /// persistent state is untouched, only the recycler forgets it.
    fn promote_settled<H: HeapLayout + ?Sized>(&mut self, heap: &H) {
        for run in self.pending.take_settled() {
            let location = run.handle().location();
            let score = score_run(heap, location);
            match self.index.insert(score) {
                Ok(()) => trace!(run = %location, "promoted pending run"),
                Err(err) => warn!(run = %location, %err, "unable to track run"),
            }
        }
    }
}

/// Point-in-time counters of a [`Recycler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecyclerStats {
    /// Scores in the index.
    pub tracked_runs: usize,
    /// Runs waiting for reservations to settle.
    pub pending_runs: usize,
    /// Blocks freed since the last recalculation.
    pub unaccounted_units: u64,
    /// Unaccounted blocks that arm a non-forced recalculation.
    pub recalc_threshold: u64,
    /// Whether a recalculation pass is running.
    pub recalc_in_progress: bool,
}

/// Tracks partially-free runs so the allocator can reuse them.
///
/// All methods take `&self`; share the recycler between allocator threads
/// with an `Arc`.
pub struct Recycler<H: HeapLayout> {
    heap: Arc<H>,
    nallocs: u16,
    recalc_threshold: u64,
    state: Mutex<RecyclerState>,
    unaccounted: UnaccountedUnits,
    gate: RecalcGate,
}

impl<H: HeapLayout> Recycler<H> {
    /// Create a recycler for runs of `config.nallocs` blocks in `heap`.
    pub fn new(heap: Arc<H>, config: RecyclerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            heap,
            nallocs: config.nallocs,
            recalc_threshold: config.recalc_threshold(),
            state: Mutex::new(RecyclerState {
                index: ScoredIndex::new(config.max_tracked_runs),
                pending: PendingQueue::new(config.max_pending_runs),
                scratch: Vec::new(),
            }),
            unaccounted: UnaccountedUnits::new(),
            gate: RecalcGate::new(),
        })
    }

    /// Compute a fresh score for `run`.
    ///
    /// Takes only the run's own lock.
    pub fn score_of(&self, run: RunHandle) -> RunScore {
        score_run(&*self.heap, run.location())
    }

    /// Start tracking `run` with the given score.
    ///
    /// Returns `Err(RecycleError::OutOfMemory)` if the index is full. The
    /// error is not retried here.
    pub fn put(&self, run: RunHandle, score: RunScore) -> Result<(), RecycleError> {
        debug_assert_eq!(run.location(), score.location(), "score of another run");
        self.state().index.insert(score)?;
        trace!(%score, "tracking run");
        Ok(())
    }

    /// Take the best-fitting run with at least `requested` contiguous free
    /// blocks.
    ///
    /// Settled pending runs are indexed first, since one of them may fit
    /// better. The returned handle carries the size recorded in the run's
    /// header, and the run's volatile state has been rebuilt. Returns
    /// `Err(RecycleError::OutOfStock)` when no tracked run is large enough;
    /// the caller should carve a fresh run instead.
    pub fn get(&self, requested: u16) -> Result<RunHandle, RecycleError> {
        let mut state = self.state();
        state.promote_settled(&*self.heap);

        let Some(best) = state.index.take_at_least(&RunScore::probe(requested)) else {
            trace!(requested, "no recyclable run");
            return Err(RecycleError::OutOfStock { requested });
        };

        let location = best.location();
        let run = RunHandle::from(location).with_size_idx(self.heap.header_size_idx(location));
        self.heap.rebuild_state(&run);
        trace!(requested, %best, "recycled run");
        Ok(run)
    }

    /// Withhold a released run until its reservations settle.
    ///
    /// The run becomes visible to [`get`](Self::get) on the first call
    /// after its reservation counter reaches zero.
    pub fn enqueue_pending(&self, run: ReservedRun) -> Result<(), RecycleError> {
        self.state().pending.push(run)
    }

    /// Record that `block_count` blocks of a tracked run were freed.
    ///
    /// Lock-free; called on every deallocation of a run-backed block.
    pub fn note_freed(&self, block_count: u32) {
        self.unaccounted.add(block_count as u64);
    }

    /// Rescore drifted runs and harvest the fully empty ones.
    ///
    /// Unless `force` is set, does nothing until the unaccounted blocks
    /// reach the threshold. If another thread is already recalculating,
    /// returns immediately. A forced pass rescores the whole index.
    ///
    /// The returned runs are no longer tracked; the caller must return
    /// them to the heap's free chunk pool.
    pub fn recalc(&self, force: bool) -> EmptyRuns {
        let units = self.unaccounted.load();
        if self.gate.is_claimed() || (!force && units < self.recalc_threshold) {
            return EmptyRuns::new();
        }

        let Some(claim) = self.gate.try_claim() else {
            debug!("recalculation already in progress");
            return EmptyRuns::new();
        };

        let search_limit = if force { u64::MAX } else { units };
        let empty = {
            let mut state = self.state();
            let RecyclerState { index, scratch, .. } = &mut *state;
            rescan(&*self.heap, index, scratch, self.nallocs, search_limit)
        };

        self.unaccounted.settle(units);
        drop(claim);
        empty
    }

    /// Lock the index and pending queue.
    ///
    /// A poisoned lock means an invariant check fired mid-update; the
    /// index may have lost runs, so every later call panics too.
    fn state(&self) -> MutexGuard<'_, RecyclerState> {
        self.state.lock().expect("recycler state poisoned")
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> RecyclerStats {
        let state = self.state();
        RecyclerStats {
            tracked_runs: state.index.len(),
            pending_runs: state.pending.len(),
            unaccounted_units: self.unaccounted.load(),
            recalc_threshold: self.recalc_threshold,
            recalc_in_progress: self.gate.is_claimed(),
        }
    }

    /// Number of scores in the index.
    pub fn len(&self) -> usize {
        self.state().index.len()
    }

    /// Whether the index is empty. Pending runs are not counted.
    pub fn is_empty(&self) -> bool {
        self.state().index.is_empty()
    }

    /// Number of runs waiting for reservations to settle.
    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    /// Blocks freed since the last recalculation.
    pub fn unaccounted_units(&self) -> u64 {
        self.unaccounted.load()
    }

    /// Unaccounted blocks that arm a non-forced recalculation.
    pub fn recalc_threshold(&self) -> u64 {
        self.recalc_threshold
    }

    /// The heap this recycler serves.
    pub fn heap(&self) -> &Arc<H> {
        &self.heap
    }

    /// Tear down the recycler, returning the runs still pending.
    ///
    /// Dropping the recycler releases them instead.
    pub fn into_pending(self) -> Vec<ReservedRun> {
        self.state
            .into_inner()
            .expect("recycler state poisoned")
            .pending
            .drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::Reservations;
    use runcycle_core::RunLocation;
    use runcycle_test_utils::MockHeap;

    const NALLOCS: u16 = 10;

    fn recycler() -> Recycler<MockHeap> {
        Recycler::new(Arc::new(MockHeap::new(NALLOCS)), RecyclerConfig::new(NALLOCS)).unwrap()
    }

    /// Add a run with the first `used` blocks occupied.
    fn add_run(r: &Recycler<MockHeap>, chunk: u32, used: u16) -> RunHandle {
        let loc = RunLocation::new(0, chunk);
        r.heap().add_run(loc, 1);
        r.heap().occupy(loc, 0, used).unwrap();
        RunHandle::from(loc)
    }

    #[test]
    fn recycler_is_send_sync() {
        fn assert<T: Send + Sync>() {}
        assert::<Recycler<MockHeap>>();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let heap = Arc::new(MockHeap::new(NALLOCS));
        let err = Recycler::new(heap, RecyclerConfig::new(0)).err();
        assert_eq!(err, Some(ConfigError::ZeroRunCapacity));
    }

    #[test]
    fn put_then_get_returns_same_run() {
        let r = recycler();
        let run = add_run(&r, 3, 4);
        let score = r.score_of(run);
        r.put(run, score).unwrap();

        let got = r.get(score.max_free_block).unwrap();
        assert_eq!(got.location(), run.location());
        assert_eq!(got.size_idx, 1, "size comes from the header");
        assert_eq!(r.heap().rebuild_count(run.location()), 1);
        assert!(r.is_empty());
    }

    #[test]
    fn get_on_empty_is_out_of_stock() {
        let r = recycler();
        assert_eq!(r.get(1), Err(RecycleError::OutOfStock { requested: 1 }));
    }

    #[test]
    fn put_into_full_index_is_out_of_memory() {
        let heap = Arc::new(MockHeap::new(NALLOCS));
        let config = RecyclerConfig {
            max_tracked_runs: 1,
            ..RecyclerConfig::new(NALLOCS)
        };
        let r = Recycler::new(heap, config).unwrap();
        let a = add_run(&r, 0, 2);
        let b = add_run(&r, 1, 2);
        r.put(a, r.score_of(a)).unwrap();
        let err = r.put(b, r.score_of(b)).unwrap_err();
        assert!(matches!(err, RecycleError::OutOfMemory { limit: 1, .. }));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn enqueue_into_full_pending_queue_is_out_of_memory() {
        let heap = Arc::new(MockHeap::new(NALLOCS));
        let config = RecyclerConfig {
            max_pending_runs: 1,
            ..RecyclerConfig::new(NALLOCS)
        };
        let r = Recycler::new(heap, config).unwrap();
        let waiting = Arc::new(Reservations::new(1));
        r.enqueue_pending(ReservedRun::new(add_run(&r, 0, 0), Arc::clone(&waiting)))
            .unwrap();

        let err = r
            .enqueue_pending(ReservedRun::new(add_run(&r, 1, 0), waiting))
            .unwrap_err();
        assert_eq!(
            err,
            RecycleError::OutOfMemory {
                what: "pending queue",
                limit: 1,
            }
        );
        assert_eq!(r.pending_len(), 1);
    }

    #[test]
    #[should_panic(expected = "recycler state poisoned")]
    fn calls_after_failed_rescan_panic() {
        let r = recycler();
        let run = add_run(&r, 0, 2);
        r.put(run, r.score_of(run)).unwrap();
        // Shrink the run's free space behind the index's back.
        r.heap().occupy(run.location(), 5, 2).unwrap();

        let rescan = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| r.recalc(true)));
        assert!(rescan.is_err(), "rescan must reject a run that lost free space");
        // The run was taken out of the index before the check fired.
        let _ = r.get(1);
    }

    #[test]
    fn pending_run_waits_for_reservations() {
        let r = recycler();
        let run = add_run(&r, 5, 0);
        let reservations = Arc::new(Reservations::new(1));
        r.enqueue_pending(ReservedRun::new(run, Arc::clone(&reservations)))
            .unwrap();

        assert_eq!(r.get(1), Err(RecycleError::OutOfStock { requested: 1 }));
        assert_eq!(r.pending_len(), 1);

        reservations.fulfil();
        assert_eq!(r.get(1).unwrap().location(), run.location());
        assert_eq!(r.pending_len(), 0);
        assert_eq!(r.get(1), Err(RecycleError::OutOfStock { requested: 1 }));
    }

    #[test]
    fn settled_pending_run_dropped_when_index_full() {
        let heap = Arc::new(MockHeap::new(NALLOCS));
        let config = RecyclerConfig {
            max_tracked_runs: 1,
            ..RecyclerConfig::new(NALLOCS)
        };
        let r = Recycler::new(heap, config).unwrap();
        let a = add_run(&r, 0, 8);
        let b = add_run(&r, 1, 0);
        r.put(a, r.score_of(a)).unwrap();
        r.enqueue_pending(ReservedRun::settled(b)).unwrap();

        // b cannot be indexed; the get still succeeds with a.
        assert_eq!(r.get(1).unwrap().location(), a.location());
        assert_eq!(r.pending_len(), 0);
        assert!(r.is_empty());
    }

    #[test]
    fn recalc_below_threshold_is_noop() {
        let r = recycler();
        let run = add_run(&r, 0, 10);
        r.put(run, r.score_of(run)).unwrap();
        r.heap().release(run.location(), 0, 10).unwrap();
        r.note_freed(10);

        assert!(r.recalc(false).is_empty());
        assert_eq!(r.len(), 1);
        assert_eq!(r.unaccounted_units(), 10);
        assert_eq!(r.heap().rebuild_count(run.location()), 0);
    }

    #[test]
    fn forced_recalc_harvests_empty_runs() {
        let r = recycler();
        let empty = add_run(&r, 0, 10);
        let partial = add_run(&r, 1, 10);
        r.put(empty, r.score_of(empty)).unwrap();
        r.put(partial, r.score_of(partial)).unwrap();
        r.heap().release(empty.location(), 0, 10).unwrap();
        r.heap().release(partial.location(), 0, 4).unwrap();

        let harvested = r.recalc(true);
        assert_eq!(harvested.len(), 1);
        assert_eq!(harvested[0].location(), empty.location());
        assert_eq!(r.len(), 1);

        // The partial run is back with its refreshed score.
        let got = r.get(4).unwrap();
        assert_eq!(got.location(), partial.location());
    }

    #[test]
    fn recalc_settles_snapshot_only() {
        let r = recycler();
        r.note_freed(25);
        assert!(r.recalc(false).is_empty());
        assert_eq!(r.unaccounted_units(), 0);
    }

    #[test]
    fn recalc_skipped_while_gate_held() {
        let r = recycler();
        let run = add_run(&r, 0, 10);
        r.put(run, r.score_of(run)).unwrap();
        r.heap().release(run.location(), 0, 10).unwrap();

        let claim = r.gate.try_claim().unwrap();
        assert!(r.stats().recalc_in_progress);
        assert!(r.recalc(true).is_empty());
        assert_eq!(r.len(), 1);
        drop(claim);
        assert_eq!(r.recalc(true).len(), 1);
        assert!(!r.gate.is_claimed());
    }

    #[test]
    fn into_pending_returns_queued_runs() {
        let r = recycler();
        let run = add_run(&r, 0, 0);
        r.enqueue_pending(ReservedRun::new(run, Arc::new(Reservations::new(2))))
            .unwrap();
        let pending = r.into_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].handle(), run);
    }

    #[test]
    fn stats_reflect_state() {
        let r = recycler();
        let a = add_run(&r, 0, 3);
        r.put(a, r.score_of(a)).unwrap();
        r.enqueue_pending(ReservedRun::settled(add_run(&r, 1, 0)))
            .unwrap();
        r.note_freed(7);
        assert_eq!(
            r.stats(),
            RecyclerStats {
                tracked_runs: 1,
                pending_runs: 1,
                unaccounted_units: 7,
                recalc_threshold: 20,
                recalc_in_progress: false,
            }
        );
    }
}
