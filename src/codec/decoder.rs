//! Reconstructs full tick state from a chunk's snapshot plus its deltas.
//!
//! `MutableCellState` plays the role the teacher's mutable scratch buffers
//! play during decode: a single owned, reusable map that absorbs one
//! snapshot and then each delta's changes in turn, so reconstructing every
//! sampled tick in a chunk costs one pass rather than one replay per tick.

use ahash::AHashMap;

use crate::cell::{CellColumns, Molecule, OwnerId};
use crate::error::{DeltaError, DeltaResult};
use crate::ids::{OrganismRecord, ProcessStateRecord};
use crate::model::{TickData, TickDataChunk, TickDelta};

/// Owned, mutable reconstruction of a cell grid at one point in a chunk's
/// tick range. Cells at value `0` are dropped rather than stored, matching
/// `EnvironmentView`'s "0 means empty" convention.
#[derive(Debug, Clone, Default)]
pub struct MutableCellState {
    cells: AHashMap<u64, (Molecule, OwnerId)>,
}

impl MutableCellState {
    pub fn from_snapshot(snapshot: &TickData) -> Self {
        let mut state = Self {
            cells: AHashMap::with_capacity(snapshot.cell_columns.len()),
        };
        for (index, molecule, owner) in snapshot.cell_columns.iter() {
            if molecule != 0 {
                state.cells.insert(index, (molecule, owner));
            }
        }
        state
    }

    /// Applies one delta's changed cells. An incremental delta's changes are
    /// relative to the previous sampled tick; an accumulated delta's are
    /// relative to the snapshot — either way, each row is simply the cell's
    /// new value, so applying both kinds is the same operation.
    pub fn apply_delta(&mut self, delta: &TickDelta) {
        for (index, molecule, owner) in delta.changed_cells.iter() {
            if molecule == 0 {
                self.cells.remove(&index);
            } else {
                self.cells.insert(index, (molecule, owner));
            }
        }
    }

    pub fn get(&self, index: u64) -> (Molecule, OwnerId) {
        self.cells.get(&index).copied().unwrap_or((0, 0))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Snapshots the current state into sorted `CellColumns`, for a
    /// deterministic on-disk or wire shape.
    pub fn to_cell_columns(&self) -> CellColumns {
        let mut rows: Vec<(u64, Molecule, OwnerId)> = self
            .cells
            .iter()
            .map(|(&index, &(molecule, owner))| (index, molecule, owner))
            .collect();
        rows.sort_unstable_by_key(|(index, _, _)| *index);

        let mut columns = CellColumns::with_capacity(rows.len());
        for (index, molecule, owner) in rows {
            columns.push(index, molecule, owner);
        }
        columns
    }
}

struct ReplayState {
    cells: MutableCellState,
    organisms: Vec<OrganismRecord>,
    total_organisms_created: u64,
    rng_state: Vec<u8>,
    process_states: Vec<ProcessStateRecord>,
}

/// Replays `chunk` up to and including `target_tick`, which must be one of
/// the chunk's sampled ticks. Shared by `decompress_tick` (which wants the
/// full `TickData`) and `reconstruct_environment` (which wants only cells).
fn replay_to(chunk: &TickDataChunk, target_tick: u64) -> DeltaResult<ReplayState> {
    chunk.validate_for_decode()?;

    if target_tick < chunk.first_tick || target_tick > chunk.last_tick {
        return Err(DeltaError::ChunkCorrupted {
            reason: format!(
                "target tick {target_tick} outside chunk range [{}, {}]",
                chunk.first_tick, chunk.last_tick
            ),
        });
    }

    let mut state = ReplayState {
        cells: MutableCellState::from_snapshot(&chunk.snapshot),
        organisms: chunk.snapshot.organisms.clone(),
        total_organisms_created: chunk.snapshot.total_organisms_created,
        rng_state: chunk.snapshot.rng_state.clone(),
        process_states: chunk.snapshot.process_states.clone(),
    };

    if target_tick == chunk.first_tick {
        return Ok(state);
    }

    let mut reached = false;
    for delta in &chunk.deltas {
        if delta.tick_number > target_tick {
            break;
        }
        state.cells.apply_delta(delta);
        state.organisms = delta.organisms.clone();
        state.total_organisms_created = delta.total_organisms_created;
        if delta.is_accumulated() {
            state.rng_state = delta.rng_state.clone();
            state.process_states = delta.process_states.clone();
        }
        if delta.tick_number == target_tick {
            reached = true;
            break;
        }
    }

    if !reached {
        return Err(DeltaError::ChunkCorrupted {
            reason: format!("target tick {target_tick} is not a sampled tick in this chunk"),
        });
    }
    Ok(state)
}

/// Reconstructs the full cell grid at `target_tick`, discarding
/// organism/rng/process state. Used by the restore path, which only ever
/// needs cells.
pub fn reconstruct_environment(
    chunk: &TickDataChunk,
    target_tick: u64,
) -> DeltaResult<MutableCellState> {
    replay_to(chunk, target_tick).map(|state| state.cells)
}

/// Reconstructs the full `TickData` record at `target_tick`.
pub fn decompress_tick(chunk: &TickDataChunk, target_tick: u64) -> DeltaResult<TickData> {
    let state = replay_to(chunk, target_tick)?;
    Ok(TickData {
        tick_number: target_tick,
        cell_columns: state.cells.to_cell_columns(),
        organisms: state.organisms,
        total_organisms_created: state.total_organisms_created,
        rng_state: state.rng_state,
        process_states: state.process_states,
    })
}

/// Reconstructs `TickData` for every sampled tick in `chunk`, in order.
pub fn decompress_chunk(chunk: &TickDataChunk) -> DeltaResult<Vec<TickData>> {
    chunk
        .sampled_ticks()
        .into_iter()
        .map(|tick| decompress_tick(chunk, tick))
        .collect()
}
