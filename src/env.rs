//! The read side of the simulation's cell grid, as seen by the capture path.
//!
//! The core never owns the simulation's actual grid — it only needs to read
//! a cell's current value at drain time and to walk every occupied cell when
//! building a snapshot. `EnvironmentView` is the seam: the simulation
//! implements it against whatever storage it already has, and the core
//! stays decoupled from that representation entirely.

use crate::cell::{Molecule, OwnerId};

/// Read-only view onto the simulation's cell grid at a single tick.
pub trait EnvironmentView {
    /// Total addressable cells. Bitmaps are sized against this.
    fn cell_count(&self) -> u64;

    /// Current `(molecule, owner)` at `index`. Called only for indices the
    /// caller already knows are in range (`0..cell_count`).
    fn cell_at(&self, index: u64) -> (Molecule, OwnerId);

    /// Every currently occupied cell, in ascending index order. Used only to
    /// build a snapshot — never on the incremental-delta path.
    fn occupied_cells(&self) -> Vec<(u64, Molecule, OwnerId)>;
}

/// A dense in-memory `EnvironmentView`, used as a test double and as the
/// reference implementation for single-process embeddings of this crate.
#[derive(Debug, Clone)]
pub struct VecEnvironmentView {
    cells: Vec<(Molecule, OwnerId)>,
}

impl VecEnvironmentView {
    pub fn new(cell_count: usize) -> Self {
        Self {
            cells: vec![(0, 0); cell_count],
        }
    }

    pub fn set(&mut self, index: u64, molecule: Molecule, owner: OwnerId) {
        self.cells[index as usize] = (molecule, owner);
    }
}

impl EnvironmentView for VecEnvironmentView {
    fn cell_count(&self) -> u64 {
        self.cells.len() as u64
    }

    fn cell_at(&self, index: u64) -> (Molecule, OwnerId) {
        self.cells[index as usize]
    }

    fn occupied_cells(&self) -> Vec<(u64, Molecule, OwnerId)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, (molecule, _))| *molecule != 0)
            .map(|(index, (molecule, owner))| (index as u64, *molecule, *owner))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_cells_skips_empty_slots() {
        let mut env = VecEnvironmentView::new(4);
        env.set(1, 5, 9);
        env.set(3, 6, 9);
        assert_eq!(env.occupied_cells(), vec![(1, 5, 9), (3, 6, 9)]);
    }

    #[test]
    fn cell_at_reflects_last_write() {
        let mut env = VecEnvironmentView::new(2);
        env.set(0, 1, 1);
        env.set(0, 2, 1);
        assert_eq!(env.cell_at(0), (2, 1));
    }
}
