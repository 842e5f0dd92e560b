//! Newtypes for values the core treats as opaque, following the teacher's
//! preference for typed wrappers over bare primitives (`RowId`, `ChunkId`,
//! `EntityPath` in `re_chunk`) even where the payload itself is meaningless
//! to this crate.

use serde::{Deserialize, Serialize};

/// Identifies a single simulation run. Used as the storage partition key
/// alongside `first_tick`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An opaque, simulation-owned organism record. The core never inspects its
/// contents, only stores and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrganismRecord(pub Vec<u8>);

/// An opaque, simulation-owned process-scheduler record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessStateRecord(pub Vec<u8>);
