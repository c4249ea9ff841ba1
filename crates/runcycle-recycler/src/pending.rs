//! Runs withheld from the index while reservations are outstanding.
//!
//! A released run can still have blocks claimed by allocations that have
//! reserved but not yet committed. Its free space is unknowable until
//! those settle, so the run waits in the [`PendingQueue`] and is only
//! scored and indexed once its [`Reservations`] counter drops to zero.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use runcycle_core::{RecycleError, RunHandle};

/// Count of in-flight reservations against a run.
///
/// Shared between the pending record and every allocator thread holding a
/// reservation on the run.
#[derive(Debug, Default)]
pub struct Reservations {
    outstanding: AtomicUsize,
}

// Compile-time assertion: Reservations must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Reservations>();
};

impl Reservations {
    /// Create a counter with `outstanding` reservations.
    pub fn new(outstanding: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(outstanding),
        }
    }

    /// Record one more reservation.
    pub fn reserve(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Settle one reservation.
    ///
    /// # Panics
    ///
    /// Panics if no reservation is outstanding.
    pub fn fulfil(&self) {
        let settled = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        assert!(settled.is_ok(), "fulfilled a reservation that was never made");
    }

    /// Number of reservations not yet settled.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// A released run waiting for its reservations to settle.
pub struct ReservedRun {
    handle: RunHandle,
    reservations: Arc<Reservations>,
}

impl ReservedRun {
    /// A pending record for `handle` sharing the given counter.
    pub fn new(handle: RunHandle, reservations: Arc<Reservations>) -> Self {
        Self {
            handle,
            reservations,
        }
    }

    /// A pending record for `handle` with no outstanding reservations.
    pub fn settled(handle: RunHandle) -> Self {
        Self::new(handle, Arc::new(Reservations::default()))
    }

    /// The withheld run.
    pub fn handle(&self) -> RunHandle {
        self.handle
    }

    /// Whether every reservation has settled.
    pub fn is_settled(&self) -> bool {
        self.reservations.outstanding() == 0
    }
}

impl fmt::Debug for ReservedRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservedRun")
            .field("handle", &self.handle)
            .field("outstanding", &self.reservations.outstanding())
            .finish()
    }
}

/// Append-only queue of [`ReservedRun`]s with a fixed entry limit.
#[derive(Debug)]
pub struct PendingQueue {
    runs: Vec<ReservedRun>,
    limit: usize,
}

impl PendingQueue {
    /// Create an empty queue holding at most `limit` runs.
    pub fn new(limit: usize) -> Self {
        Self {
            runs: Vec::new(),
            limit,
        }
    }

    /// Append a run.
    ///
    /// Returns `Err(RecycleError::OutOfMemory)` if the queue is at its
    /// limit or its storage cannot grow. The run is dropped in that case;
    /// its persistent state is untouched.
    pub fn push(&mut self, run: ReservedRun) -> Result<(), RecycleError> {
        let full = RecycleError::OutOfMemory {
            what: "pending queue",
            limit: self.limit,
        };
        if self.runs.len() >= self.limit {
            return Err(full);
        }
        self.runs.try_reserve(1).map_err(|_| full)?;
        self.runs.push(run);
        Ok(())
    }

    /// Remove and return every run whose reservations have settled.
    ///
    /// Runs still waiting keep their relative order. Allocation-free when
    /// nothing has settled.
    pub fn take_settled(&mut self) -> Vec<ReservedRun> {
        if !self.runs.iter().any(ReservedRun::is_settled) {
            return Vec::new();
        }
        let (settled, waiting) = std::mem::take(&mut self.runs)
            .into_iter()
            .partition(ReservedRun::is_settled);
        self.runs = waiting;
        settled
    }

    /// Remove and return every queued run, settled or not.
    pub fn drain(&mut self) -> Vec<ReservedRun> {
        std::mem::take(&mut self.runs)
    }

    /// Number of queued runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_count_up_and_down() {
        let r = Reservations::new(0);
        r.reserve();
        r.reserve();
        assert_eq!(r.outstanding(), 2);
        r.fulfil();
        r.fulfil();
        assert_eq!(r.outstanding(), 0);
    }

    #[test]
    #[should_panic(expected = "never made")]
    fn fulfil_without_reservation_panics() {
        Reservations::default().fulfil();
    }

    #[test]
    fn only_settled_runs_are_taken() {
        let mut queue = PendingQueue::new(8);
        let busy = Arc::new(Reservations::new(1));
        queue
            .push(ReservedRun::new(RunHandle::new(0, 1), Arc::clone(&busy)))
            .unwrap();
        queue.push(ReservedRun::settled(RunHandle::new(0, 2))).unwrap();
        queue.push(ReservedRun::settled(RunHandle::new(0, 3))).unwrap();

        let taken: Vec<_> = queue.take_settled().iter().map(|r| r.handle()).collect();
        assert_eq!(taken, vec![RunHandle::new(0, 2), RunHandle::new(0, 3)]);
        assert_eq!(queue.len(), 1);

        assert!(queue.take_settled().is_empty());
        busy.fulfil();
        let taken = queue.take_settled();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].handle(), RunHandle::new(0, 1));
        assert!(queue.is_empty());
    }

    #[test]
    fn push_past_limit_is_out_of_memory() {
        let mut queue = PendingQueue::new(1);
        queue.push(ReservedRun::settled(RunHandle::new(0, 0))).unwrap();
        let err = queue
            .push(ReservedRun::settled(RunHandle::new(0, 1)))
            .unwrap_err();
        assert_eq!(
            err,
            RecycleError::OutOfMemory {
                what: "pending queue",
                limit: 1
            }
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_returns_waiting_runs_too() {
        let mut queue = PendingQueue::new(8);
        queue
            .push(ReservedRun::new(
                RunHandle::new(1, 1),
                Arc::new(Reservations::new(3)),
            ))
            .unwrap();
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert!(!drained[0].is_settled());
        assert!(queue.is_empty());
    }
}
