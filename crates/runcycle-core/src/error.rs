//! Error types for the run recycler.
//!
//! Only recoverable conditions are represented here. Broken internal
//! invariants (a rescored run losing free space, the recalculation gate
//! being released twice) abort via `panic!` instead: continuing would
//! operate on an inconsistent index.

use std::error::Error;
use std::fmt;

/// Recoverable errors from recycler and bitmap operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecycleError {
    /// Index or pending storage could not grow.
    OutOfMemory {
        /// Which container was full.
        what: &'static str,
        /// The configured entry limit of that container.
        limit: usize,
    },
    /// No tracked run has a large enough free block.
    ///
    /// Expected in normal operation: the caller falls back to carving a
    /// fresh run from the heap.
    OutOfStock {
        /// Requested number of contiguous blocks.
        requested: u16,
    },
    /// A block range reaches past the end of the run.
    BlockOutOfRange {
        /// First block of the range.
        first: u16,
        /// Number of blocks in the range.
        count: u16,
        /// Number of blocks in the run.
        nallocs: u16,
    },
}

impl fmt::Display for RecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { what, limit } => {
                write!(f, "{what} is full ({limit} entries)")
            }
            Self::OutOfStock { requested } => {
                write!(f, "no recyclable run with {requested} contiguous free blocks")
            }
            Self::BlockOutOfRange {
                first,
                count,
                nallocs,
            } => {
                write!(
                    f,
                    "blocks {first}..{} out of range for run of {nallocs} blocks",
                    *first as u32 + *count as u32
                )
            }
        }
    }
}

impl Error for RecycleError {}

/// Errors detected during `RecyclerConfig::validate()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Runs must hold at least one block.
    ZeroRunCapacity,
    /// The recalculation threshold multiplier must be positive.
    ZeroThresholdMultiplier,
    /// The scored index must be able to hold at least one run.
    ZeroIndexCapacity,
    /// The pending queue must be able to hold at least one run.
    ZeroPendingCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroRunCapacity => write!(f, "run capacity (nallocs) must be > 0"),
            Self::ZeroThresholdMultiplier => write!(f, "threshold multiplier must be > 0"),
            Self::ZeroIndexCapacity => write!(f, "max_tracked_runs must be > 0"),
            Self::ZeroPendingCapacity => write!(f, "max_pending_runs must be > 0"),
        }
    }
}

impl Error for ConfigError {}
