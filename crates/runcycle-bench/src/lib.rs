//! Benchmark fixtures for the runcycle run recycler.
//!
//! - [`fragmented_heap`]: a mock heap whose runs are deterministically
//!   fragmented from a seed
//! - [`Lcg`]: the tiny generator behind it

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use runcycle_core::RunLocation;
use runcycle_test_utils::MockHeap;

/// Deterministic 64-bit linear congruential generator.
pub struct Lcg(u64);

impl Lcg {
    /// Seed a generator.
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next value in `0..bound`.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound.max(1)
    }
}

/// Build a mock heap with `runs` runs of `nallocs` blocks in zone 0.
///
/// Each run gets a handful of occupied stretches at seeded positions, so
/// scores spread across the whole range of `max_free_block`.
pub fn fragmented_heap(nallocs: u16, runs: u32, seed: u64) -> (MockHeap, Vec<RunLocation>) {
    let heap = MockHeap::with_geometry(nallocs, 1, runs);
    let mut rng = Lcg::new(seed);
    let locations: Vec<_> = heap.locations().collect();
    for &loc in &locations {
        let stretches = rng.next_below(8);
        for _ in 0..stretches {
            let first = rng.next_below(nallocs as u64) as u16;
            let count = (rng.next_below(24) as u16 + 1).min(nallocs - first);
            heap.occupy(loc, first, count)
                .expect("stretch clipped to run capacity");
        }
    }
    (heap, locations)
}
