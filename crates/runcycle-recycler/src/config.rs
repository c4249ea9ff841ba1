//! Recycler configuration parameters.

use runcycle_core::ConfigError;

/// Configuration for a [`Recycler`](crate::Recycler).
///
/// Validated at construction; all values are immutable after creation.
#[derive(Clone, Debug)]
pub struct RecyclerConfig {
    /// Number of blocks in every run managed by this recycler.
    ///
    /// A rescored run whose free space equals `nallocs` is fully empty and
    /// is handed back to the heap instead of being reinserted.
    pub nallocs: u16,

    /// Multiplier applied to `nallocs` to derive the recalculation threshold.
    ///
    /// Default: 2. A non-forced recalculation only runs once at least
    /// `nallocs * threshold_multiplier` blocks have been freed since the
    /// last pass.
    pub threshold_multiplier: u32,

    /// Maximum number of scores held by the index.
    ///
    /// Default: unbounded. Inserting past the limit fails with
    /// `RecycleError::OutOfMemory`.
    pub max_tracked_runs: usize,

    /// Maximum number of runs waiting in the pending queue.
    ///
    /// Default: unbounded.
    pub max_pending_runs: usize,
}

impl RecyclerConfig {
    /// Default threshold multiplier.
    pub const DEFAULT_THRESHOLD_MULTIPLIER: u32 = 2;

    /// Default index capacity.
    pub const DEFAULT_MAX_TRACKED_RUNS: usize = usize::MAX;

    /// Default pending queue capacity.
    pub const DEFAULT_MAX_PENDING_RUNS: usize = usize::MAX;

    /// Create a new config for runs of `nallocs` blocks.
    ///
    /// Uses default values for all other parameters.
    pub fn new(nallocs: u16) -> Self {
        Self {
            nallocs,
            threshold_multiplier: Self::DEFAULT_THRESHOLD_MULTIPLIER,
            max_tracked_runs: Self::DEFAULT_MAX_TRACKED_RUNS,
            max_pending_runs: Self::DEFAULT_MAX_PENDING_RUNS,
        }
    }

    /// Number of unaccounted blocks that arms a non-forced recalculation.
    pub fn recalc_threshold(&self) -> u64 {
        self.nallocs as u64 * self.threshold_multiplier as u64
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nallocs == 0 {
            return Err(ConfigError::ZeroRunCapacity);
        }
        if self.threshold_multiplier == 0 {
            return Err(ConfigError::ZeroThresholdMultiplier);
        }
        if self.max_tracked_runs == 0 {
            return Err(ConfigError::ZeroIndexCapacity);
        }
        if self.max_pending_runs == 0 {
            return Err(ConfigError::ZeroPendingCapacity);
        }
        Ok(())
    }
}
