//! Occupancy bitmap of a run.
//!
//! A run is subdivided into `nallocs` equal-size blocks. Each block is one
//! bit in an array of `u64` words; a set bit means the block is occupied.
//! Bits past `nallocs` in the last word are permanently set so that they
//! never read as free space.

use smallvec::SmallVec;

use crate::error::RecycleError;

/// Number of blocks tracked by one bitmap word.
pub const BITS_PER_WORD: u16 = u64::BITS as u16;

/// Words kept inline before the bitmap spills to the heap (512 blocks).
const INLINE_WORDS: usize = 8;

/// The block occupancy bitmap of a single run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunBitmap {
    words: SmallVec<[u64; INLINE_WORDS]>,
    nallocs: u16,
}

impl RunBitmap {
    /// Create an all-free bitmap for a run of `nallocs` blocks.
    pub fn new(nallocs: u16) -> Self {
        let nwords = (nallocs as usize).div_ceil(BITS_PER_WORD as usize);
        let mut words: SmallVec<[u64; INLINE_WORDS]> = SmallVec::from_elem(0, nwords);
        let tail = nallocs % BITS_PER_WORD;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last = !0u64 << tail;
            }
        }
        Self { words, nallocs }
    }

    /// The raw bitmap words; set bits are occupied blocks.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Mark `count` blocks starting at `first` as occupied.
    pub fn occupy(&mut self, first: u16, count: u16) -> Result<(), RecycleError> {
        self.check_range(first, count)?;
        for block in first..first + count {
            let (word, bit) = Self::split(block);
            self.words[word] |= 1u64 << bit;
        }
        Ok(())
    }

    /// Mark `count` blocks starting at `first` as free.
    pub fn release(&mut self, first: u16, count: u16) -> Result<(), RecycleError> {
        self.check_range(first, count)?;
        for block in first..first + count {
            let (word, bit) = Self::split(block);
            self.words[word] &= !(1u64 << bit);
        }
        Ok(())
    }

    /// Exact number of free blocks.
    pub fn free_count(&self) -> u16 {
        self.words.iter().map(|w| (!w).count_ones() as u16).sum()
    }

    fn check_range(&self, first: u16, count: u16) -> Result<(), RecycleError> {
        if first as u32 + count as u32 > self.nallocs as u32 {
            return Err(RecycleError::BlockOutOfRange {
                first,
                count,
                nallocs: self.nallocs,
            });
        }
        Ok(())
    }

    fn split(block: u16) -> (usize, u16) {
        ((block / BITS_PER_WORD) as usize, block % BITS_PER_WORD)
    }
}
