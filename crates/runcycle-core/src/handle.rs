//! Run handles and locations.
//!
//! A [`RunHandle`] is a coordinate into the externally-owned heap. The
//! recycler never owns the run itself; it only tracks where the run lives
//! and, once a run is handed back to the allocator, how large it is.

use std::fmt;

use crate::id::{ChunkId, ZoneId};

/// The stable `(zone, chunk)` address of a run.
///
/// This is the part of a [`RunHandle`] that identifies the run; it is
/// what the heap layout is queried with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunLocation {
    /// Zone that contains the run.
    pub zone_id: ZoneId,
    /// First chunk of the run within its zone.
    pub chunk_id: ChunkId,
}

impl RunLocation {
    /// Create a location from raw zone and chunk numbers.
    pub fn new(zone_id: impl Into<ZoneId>, chunk_id: impl Into<ChunkId>) -> Self {
        Self {
            zone_id: zone_id.into(),
            chunk_id: chunk_id.into(),
        }
    }
}

impl fmt::Display for RunLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone {} chunk {}", self.zone_id, self.chunk_id)
    }
}

/// Handle to a run in the heap plus its transient size.
///
/// `size_idx` is only meaningful on handles returned by the recycler: it
/// is read from the run's persistent header at hand-out time. Handles
/// passed *into* the recycler may carry any value there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct RunHandle {
    /// Zone that contains the run.
    pub zone_id: ZoneId,
    /// First chunk of the run within its zone.
    pub chunk_id: ChunkId,
    /// Number of contiguous units occupied by the run.
    pub size_idx: u32,
}

impl RunHandle {
    /// Create a handle with `size_idx` zero.
    pub fn new(zone_id: impl Into<ZoneId>, chunk_id: impl Into<ChunkId>) -> Self {
        Self {
            zone_id: zone_id.into(),
            chunk_id: chunk_id.into(),
            size_idx: 0,
        }
    }

    /// Return a copy of this handle with the given `size_idx`.
    pub fn with_size_idx(self, size_idx: u32) -> Self {
        Self { size_idx, ..self }
    }

    /// The stable location of the run, without the transient size.
    pub fn location(&self) -> RunLocation {
        RunLocation {
            zone_id: self.zone_id,
            chunk_id: self.chunk_id,
        }
    }
}

impl From<RunLocation> for RunHandle {
    fn from(loc: RunLocation) -> Self {
        Self {
            zone_id: loc.zone_id,
            chunk_id: loc.chunk_id,
            size_idx: 0,
        }
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunHandle(zone={}, chunk={}, size_idx={})",
            self.zone_id, self.chunk_id, self.size_idx
        )
    }
}
