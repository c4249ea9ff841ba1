//! Strongly-typed identifiers for zones and chunks of the heap.

use std::fmt;

/// Identifies a zone within the heap.
///
/// Zones are the top-level subdivision of the persistent heap and are
/// numbered from zero in address order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ZoneId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a chunk within a zone.
///
/// A run occupies one or more consecutive chunks; the run is named by the
/// id of its first chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u32);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ChunkId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_bare_number() {
        assert_eq!(ZoneId(3).to_string(), "3");
        assert_eq!(ChunkId(17).to_string(), "17");
    }

    #[test]
    fn from_u32_roundtrip() {
        assert_eq!(ZoneId::from(9), ZoneId(9));
        assert_eq!(ChunkId::from(9).0, 9);
    }
}
