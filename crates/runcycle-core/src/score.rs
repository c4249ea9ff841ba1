//! Free-space scores and the best-fit ordering.
//!
//! A [`RunScore`] summarises how much of a run is free. Scores are hints:
//! they are computed from a bitmap scan that may race with deallocation,
//! and they drift low between recalculations. Only the run's persistent
//! header is authoritative.

use std::fmt;

use crate::handle::RunLocation;
use crate::id::{ChunkId, ZoneId};

/// The free-space score of one run, used as the best-fit ordering key.
///
/// Field declaration order *is* the ordering: the derived `Ord` compares
/// `max_free_block`, then `free_space`, then `zone_id`, then `chunk_id`.
/// Searching for the smallest score `>=` [`RunScore::probe(n)`] therefore
/// yields the run with the smallest sufficient largest free block, ties
/// broken by least free space and then by lowest address.
///
/// Scores are values: a fresh score replaces an old one, it is never
/// updated in place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunScore {
    /// Longest stretch of contiguous free blocks found within one bitmap word.
    pub max_free_block: u16,
    /// Total number of free blocks in the run.
    pub free_space: u16,
    /// Zone of the scored run.
    pub zone_id: ZoneId,
    /// First chunk of the scored run.
    pub chunk_id: ChunkId,
}

impl RunScore {
    /// The smallest possible score; every entry compares `>=` to it.
    pub const ZERO: RunScore = RunScore {
        max_free_block: 0,
        free_space: 0,
        zone_id: ZoneId(0),
        chunk_id: ChunkId(0),
    };

    /// Build a score for the run at `location`.
    pub fn new(location: RunLocation, max_free_block: u16, free_space: u16) -> Self {
        Self {
            max_free_block,
            free_space,
            zone_id: location.zone_id,
            chunk_id: location.chunk_id,
        }
    }

    /// Search key for a best-fit lookup of `max_free_block` blocks.
    ///
    /// All fields other than `max_free_block` are zero, so the key sorts
    /// before every real score with the same largest free block.
    pub fn probe(max_free_block: u16) -> Self {
        Self {
            max_free_block,
            ..Self::ZERO
        }
    }

    /// Location of the scored run.
    pub fn location(&self) -> RunLocation {
        RunLocation {
            zone_id: self.zone_id,
            chunk_id: self.chunk_id,
        }
    }

    /// Whether every block of a run with `nallocs` blocks is free.
    pub fn is_fully_free(&self, nallocs: u16) -> bool {
        self.free_space == nallocs
    }
}

impl fmt::Display for RunScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunScore(max_free_block={}, free_space={}, zone={}, chunk={})",
            self.max_free_block, self.free_space, self.zone_id, self.chunk_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(max: u16, free: u16, zone: u32, chunk: u32) -> RunScore {
        RunScore::new(RunLocation::new(zone, chunk), max, free)
    }

    #[test]
    fn max_free_block_dominates() {
        assert!(score(3, 60, 0, 0) < score(4, 4, 0, 0));
    }

    #[test]
    fn free_space_breaks_max_ties() {
        assert!(score(4, 5, 9, 9) < score(4, 6, 0, 0));
    }

    #[test]
    fn zone_then_chunk_break_remaining_ties() {
        assert!(score(4, 6, 0, 9) < score(4, 6, 1, 0));
        assert!(score(4, 6, 1, 0) < score(4, 6, 1, 1));
        assert_eq!(score(4, 6, 1, 1), score(4, 6, 1, 1));
    }

    #[test]
    fn probe_sorts_before_equal_max_block() {
        assert_eq!(RunScore::probe(4), score(4, 0, 0, 0));
        assert!(RunScore::probe(4) < score(4, 1, 0, 0));
        assert!(RunScore::probe(4) > score(3, u16::MAX, u32::MAX, u32::MAX));
    }

    #[test]
    fn zero_is_minimum() {
        assert!(RunScore::ZERO <= score(0, 0, 0, 0));
        assert_eq!(RunScore::ZERO, RunScore::default());
    }

    #[test]
    fn fully_free_compares_against_capacity() {
        assert!(score(10, 10, 0, 0).is_fully_free(10));
        assert!(!score(9, 9, 0, 0).is_fully_free(10));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_score() -> impl Strategy<Value = RunScore> {
            (0u16..8, 0u16..8, 0u32..4, 0u32..4)
                .prop_map(|(max, free, zone, chunk)| score(max, free, zone, chunk))
        }

        proptest! {
            #[test]
            fn order_matches_field_tuple(a in any_score(), b in any_score()) {
                let ta = (a.max_free_block, a.free_space, a.zone_id.0, a.chunk_id.0);
                let tb = (b.max_free_block, b.free_space, b.zone_id.0, b.chunk_id.0);
                prop_assert_eq!(a.cmp(&b), ta.cmp(&tb));
            }

            #[test]
            fn order_is_antisymmetric(a in any_score(), b in any_score()) {
                prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            }

            #[test]
            fn order_is_transitive(a in any_score(), b in any_score(), c in any_score()) {
                if a <= b && b <= c {
                    prop_assert!(a <= c);
                }
            }
        }
    }
}
