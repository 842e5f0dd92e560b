//! Pure construction of snapshots, deltas, and chunks from already-collected
//! data. Kept free of any `ChangeTracker`/`EnvironmentView` dependency so it
//! can be unit tested against hand-built inputs.

use crate::cell::CellColumns;
use crate::error::DeltaResult;
use crate::ids::{OrganismRecord, ProcessStateRecord, RunId};
use crate::model::{DeltaKind, TickData, TickDataChunk, TickDelta};

/// Builds the snapshot row that opens a chunk.
pub fn build_snapshot(
    tick_number: u64,
    cell_columns: CellColumns,
    organisms: Vec<OrganismRecord>,
    total_organisms_created: u64,
    rng_state: Vec<u8>,
    process_states: Vec<ProcessStateRecord>,
) -> TickData {
    TickData {
        tick_number,
        cell_columns,
        organisms,
        total_organisms_created,
        rng_state,
        process_states,
    }
}

/// Builds an incremental delta: changes since the previous sampled tick
/// only, with no rng/process state attached.
pub fn build_incremental_delta(
    tick_number: u64,
    changed_cells: CellColumns,
    organisms: Vec<OrganismRecord>,
    total_organisms_created: u64,
) -> TickDelta {
    TickDelta {
        tick_number,
        delta_type: DeltaKind::Incremental,
        changed_cells,
        organisms,
        total_organisms_created,
        rng_state: Vec::new(),
        process_states: Vec::new(),
    }
}

/// Builds an accumulated delta: the union of changes since the chunk's
/// snapshot, plus a full rng/process-state checkpoint.
pub fn build_accumulated_delta(
    tick_number: u64,
    changed_cells: CellColumns,
    organisms: Vec<OrganismRecord>,
    total_organisms_created: u64,
    rng_state: Vec<u8>,
    process_states: Vec<ProcessStateRecord>,
) -> TickDelta {
    TickDelta {
        tick_number,
        delta_type: DeltaKind::Accumulated,
        changed_cells,
        organisms,
        total_organisms_created,
        rng_state,
        process_states,
    }
}

/// Assembles a chunk from its snapshot and ordered deltas, deriving
/// `first_tick`/`last_tick`/`tick_count` and validating every invariant
/// before returning it. Returns `InvalidChunk` rather than ever handing out
/// a chunk that wouldn't also pass decode-side validation.
pub fn build_chunk(
    run_id: RunId,
    snapshot: TickData,
    deltas: Vec<TickDelta>,
) -> DeltaResult<TickDataChunk> {
    let first_tick = snapshot.tick_number;
    let last_tick = deltas.last().map_or(first_tick, |d| d.tick_number);
    let tick_count = 1 + deltas.len() as u32;

    let chunk = TickDataChunk {
        run_id,
        first_tick,
        last_tick,
        tick_count,
        snapshot,
        deltas,
    };
    chunk.validate_for_encode()?;
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_chunk_derives_range_and_count() {
        let snapshot = build_snapshot(10, CellColumns::default(), Vec::new(), 0, vec![0], Vec::new());
        let deltas = vec![
            build_incremental_delta(11, CellColumns::default(), Vec::new(), 0),
            build_accumulated_delta(12, CellColumns::default(), Vec::new(), 0, vec![1], Vec::new()),
        ];
        let chunk = build_chunk(RunId::from("run-a"), snapshot, deltas).unwrap();
        assert_eq!(chunk.first_tick, 10);
        assert_eq!(chunk.last_tick, 12);
        assert_eq!(chunk.tick_count, 3);
    }

    #[test]
    fn build_chunk_rejects_invalid_delta_sequence() {
        let snapshot = build_snapshot(0, CellColumns::default(), Vec::new(), 0, vec![0], Vec::new());
        let deltas = vec![build_incremental_delta(
            0,
            CellColumns::default(),
            Vec::new(),
            0,
        )];
        assert!(build_chunk(RunId::from("run-a"), snapshot, deltas).is_err());
    }
}
