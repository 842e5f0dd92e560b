//! Structure-of-arrays cell storage shared by snapshots and deltas.

use serde::{Deserialize, Serialize};

use crate::error::{DeltaError, DeltaResult};

/// A packed molecule value. Opaque to the core beyond `0` meaning "empty
/// cell" — only the integer is stored and diffed.
pub type Molecule = i32;

/// Owner id of the organism controlling a cell. `0` means unowned.
pub type OwnerId = i32;

/// Structure-of-arrays columns of cells: flat index, molecule value, owner.
///
/// All three vectors must be the same length, and `flat_indices` must be
/// unique within one instance — see [`CellColumns::sanity_check`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellColumns {
    pub flat_indices: Vec<u64>,
    pub molecule_data: Vec<Molecule>,
    pub owner_ids: Vec<OwnerId>,
}

impl CellColumns {
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            flat_indices: Vec::with_capacity(capacity),
            molecule_data: Vec::with_capacity(capacity),
            owner_ids: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.flat_indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flat_indices.is_empty()
    }

    #[inline]
    pub fn push(&mut self, flat_index: u64, molecule: Molecule, owner: OwnerId) {
        self.flat_indices.push(flat_index);
        self.molecule_data.push(molecule);
        self.owner_ids.push(owner);
    }

    /// Iterate the columns row-wise without materializing tuples up front.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Molecule, OwnerId)> + '_ {
        itertools::izip!(
            self.flat_indices.iter().copied(),
            self.molecule_data.iter().copied(),
            self.owner_ids.iter().copied()
        )
    }

    /// Checks the only invariants the core ever assumes about a `CellColumns`
    /// value: equal column lengths and unique indices. Used by the encoder
    /// (surfaces `InvalidChunk`) and the decoder (surfaces `ChunkCorrupted`)
    /// with different error wrapping, so the check itself lives here once.
    pub fn sanity_check(&self) -> Result<(), String> {
        if self.molecule_data.len() != self.flat_indices.len()
            || self.owner_ids.len() != self.flat_indices.len()
        {
            return Err(format!(
                "column length mismatch: {} indices, {} molecules, {} owners",
                self.flat_indices.len(),
                self.molecule_data.len(),
                self.owner_ids.len(),
            ));
        }

        let mut seen = ahash::AHashSet::with_capacity(self.flat_indices.len());
        for &index in &self.flat_indices {
            if !seen.insert(index) {
                return Err(format!("duplicate cell index {index}"));
            }
        }

        Ok(())
    }

    pub fn sanity_check_as_invalid_chunk(&self) -> DeltaResult<()> {
        self.sanity_check()
            .map_err(|reason| DeltaError::InvalidChunk { reason })
    }

    pub fn sanity_check_as_corrupted(&self) -> DeltaResult<()> {
        self.sanity_check()
            .map_err(|reason| DeltaError::ChunkCorrupted { reason })
    }
}
