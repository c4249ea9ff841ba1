//! Free-space scoring of runs.
//!
//! [`score_run`] takes the run's own bitmap lock (never the recycler's)
//! for the duration of the scan. A deallocation racing with the scan may
//! or may not be observed; either outcome yields a valid score because
//! scores are hints and only ever drift low.

use runcycle_core::{HeapLayout, RunLocation, RunScore, BITS_PER_WORD};

/// Free-space summary of a bitmap: `(max_free_block, free_space)`.
///
/// `free_space` is the exact number of clear bits. `max_free_block` is
/// the longest stretch of clear bits *within a single word*; stretches
/// that cross a word boundary are counted per word. This bounds precision
/// but never overstates what the run can satisfy.
pub fn score_words(words: &[u64]) -> (u16, u16) {
    let mut free_space: u16 = 0;
    let mut max_block: u16 = 0;

    for &word in words {
        let mut value = !word;
        if value == 0 {
            continue;
        }

        let free_in_value = value.count_ones() as u16;
        free_space = free_space.saturating_add(free_in_value);

        // A word with fewer free bits than the best block cannot improve it.
        if free_in_value < max_block {
            continue;
        }

        if free_in_value == BITS_PER_WORD {
            max_block = BITS_PER_WORD;
            continue;
        }

        // Each AND with the left shift shortens every stretch of ones by
        // one; the number of rounds until zero is the longest stretch.
        let mut n: u16 = 0;
        while value != 0 {
            value &= value << 1;
            n += 1;
        }
        max_block = max_block.max(n);
    }

    (max_block, free_space)
}

/// Compute a fresh score for the run at `run`.
///
/// Holds the run's bitmap lock only while scanning.
///
/// # Panics
///
/// Panics if the run's bitmap lock is poisoned.
pub fn score_run<H: HeapLayout + ?Sized>(heap: &H, run: RunLocation) -> RunScore {
    let (max_free_block, free_space) = {
        let bitmap = heap
            .run_bitmap(run)
            .lock()
            .expect("run bitmap lock poisoned");
        score_words(bitmap.words())
    };
    RunScore::new(run, max_free_block, free_space)
}
