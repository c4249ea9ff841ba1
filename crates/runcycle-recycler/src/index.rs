//! Best-fit ordered index of run scores.
//!
//! [`ScoredIndex`] is a bounded ordered multiset over [`RunScore`]. The
//! score's derived order puts `max_free_block` first, so the smallest
//! entry `>=` a probe is the best fit for a request.

use std::collections::BTreeMap;

use runcycle_core::{RecycleError, RunScore};

/// Ordered multiset of run scores with a fixed entry limit.
///
/// Equal scores are kept as distinct entries: inserting the same score
/// twice requires two removals to make it disappear.
#[derive(Debug)]
pub struct ScoredIndex {
    /// Score → number of identical entries (always > 0).
    entries: BTreeMap<RunScore, usize>,
    /// Total entries, counting duplicates.
    len: usize,
    /// Maximum value of `len`.
    limit: usize,
}

impl ScoredIndex {
    /// Create an empty index holding at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            len: 0,
            limit,
        }
    }

    /// Insert a score.
    ///
    /// Returns `Err(RecycleError::OutOfMemory)` if the index is full.
    pub fn insert(&mut self, score: RunScore) -> Result<(), RecycleError> {
        if self.len >= self.limit {
            return Err(RecycleError::OutOfMemory {
                what: "scored index",
                limit: self.limit,
            });
        }
        *self.entries.entry(score).or_insert(0) += 1;
        self.len += 1;
        Ok(())
    }

    /// Remove one entry equal to `score`. Returns whether one was present.
    pub fn remove(&mut self, score: &RunScore) -> bool {
        let Some(count) = self.entries.get_mut(score) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.entries.remove(score);
        }
        self.len -= 1;
        true
    }

    /// The smallest entry `>= probe`, if any.
    pub fn find_at_least(&self, probe: &RunScore) -> Option<RunScore> {
        self.entries.range(probe..).next().map(|(score, _)| *score)
    }

    /// The best fit for a request of `max_free_block` contiguous blocks.
    ///
    /// Returns the entry with the smallest sufficient largest free block,
    /// ties broken by least free space, then lowest zone and chunk.
    pub fn find_best_fit(&self, max_free_block: u16) -> Option<RunScore> {
        self.find_at_least(&RunScore::probe(max_free_block))
    }

    /// Remove and return the smallest entry `>= probe`.
    pub fn take_at_least(&mut self, probe: &RunScore) -> Option<RunScore> {
        let found = self.find_at_least(probe)?;
        self.remove(&found);
        Some(found)
    }

    /// Number of entries, counting duplicates.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over all entries in ascending order, repeating duplicates.
    pub fn iter(&self) -> impl Iterator<Item = RunScore> + '_ {
        self.entries
            .iter()
            .flat_map(|(score, &count)| std::iter::repeat_n(*score, count))
    }
}
