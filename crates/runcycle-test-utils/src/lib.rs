//! Test utilities and mock heaps for runcycle development.
//!
//! Provides [`MockHeap`], an in-memory [`HeapLayout`] with a fixed grid
//! of runs, per-run bitmap locks, authoritative headers and counters of
//! state rebuilds.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use runcycle_core::{HeapLayout, RecycleError, RunBitmap, RunHandle, RunLocation};

/// Default number of zones in a [`MockHeap`].
pub const DEFAULT_ZONES: u32 = 4;

/// Default number of chunks per zone in a [`MockHeap`].
pub const DEFAULT_CHUNKS_PER_ZONE: u32 = 64;

/// One run of the mock heap.
struct MockRun {
    bitmap: Mutex<RunBitmap>,
    /// Stand-in for the persistent chunk header.
    size_idx: AtomicU32,
    rebuilds: AtomicUsize,
}

/// In-memory heap of `zones × chunks_per_zone` runs, all of `nallocs`
/// blocks.
///
/// Every run exists from construction, all blocks free, with header
/// `size_idx` 1. All mutators take `&self`, so the heap can be shared
/// with a recycler through an `Arc` and still be driven by the test.
pub struct MockHeap {
    runs: Vec<MockRun>,
    nallocs: u16,
    chunks_per_zone: u32,
}

impl MockHeap {
    /// A heap with the default geometry.
    pub fn new(nallocs: u16) -> Self {
        Self::with_geometry(nallocs, DEFAULT_ZONES, DEFAULT_CHUNKS_PER_ZONE)
    }

    pub fn with_geometry(nallocs: u16, zones: u32, chunks_per_zone: u32) -> Self {
        let runs = (0..zones * chunks_per_zone)
            .map(|_| MockRun {
                bitmap: Mutex::new(RunBitmap::new(nallocs)),
                size_idx: AtomicU32::new(1),
                rebuilds: AtomicUsize::new(0),
            })
            .collect();
        Self {
            runs,
            nallocs,
            chunks_per_zone,
        }
    }

    /// Format the run at `loc`: all blocks free, header `size_idx` set,
    /// rebuild counter reset.
    pub fn add_run(&self, loc: RunLocation, size_idx: u32) {
        let run = self.run(loc);
        *lock(&run.bitmap) = RunBitmap::new(self.nallocs);
        run.size_idx.store(size_idx, Ordering::Release);
        run.rebuilds.store(0, Ordering::Release);
    }

    /// Mark blocks of the run at `loc` as allocated.
    pub fn occupy(&self, loc: RunLocation, first: u16, count: u16) -> Result<(), RecycleError> {
        lock(&self.run(loc).bitmap).occupy(first, count)
    }

    /// Mark blocks of the run at `loc` as freed.
    pub fn release(&self, loc: RunLocation, first: u16, count: u16) -> Result<(), RecycleError> {
        lock(&self.run(loc).bitmap).release(first, count)
    }

    /// Exact free blocks of the run at `loc`.
    pub fn free_count(&self, loc: RunLocation) -> u16 {
        lock(&self.run(loc).bitmap).free_count()
    }

    /// Rewrite the persistent header size of the run at `loc`.
    pub fn set_header_size_idx(&self, loc: RunLocation, size_idx: u32) {
        self.run(loc).size_idx.store(size_idx, Ordering::Release);
    }

    /// How often the recycler rebuilt the run at `loc`.
    pub fn rebuild_count(&self, loc: RunLocation) -> usize {
        self.run(loc).rebuilds.load(Ordering::Acquire)
    }

    /// Every run location of the heap, zone-major.
    pub fn locations(&self) -> impl Iterator<Item = RunLocation> + '_ {
        (0..self.runs.len() as u32)
            .map(move |i| RunLocation::new(i / self.chunks_per_zone, i % self.chunks_per_zone))
    }

    fn run(&self, loc: RunLocation) -> &MockRun {
        assert!(
            loc.chunk_id.0 < self.chunks_per_zone,
            "chunk {} outside mock zone of {} chunks",
            loc.chunk_id,
            self.chunks_per_zone
        );
        let idx = (loc.zone_id.0 * self.chunks_per_zone + loc.chunk_id.0) as usize;
        self.runs
            .get(idx)
            .unwrap_or_else(|| panic!("no mock run at {loc}"))
    }
}

impl HeapLayout for MockHeap {
    fn run_bitmap(&self, run: RunLocation) -> &Mutex<RunBitmap> {
        &self.run(run).bitmap
    }

    fn header_size_idx(&self, run: RunLocation) -> u32 {
        self.run(run).size_idx.load(Ordering::Acquire)
    }

    fn rebuild_state(&self, run: &RunHandle) {
        self.run(run.location())
            .rebuilds
            .fetch_add(1, Ordering::AcqRel);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
