//! Assembles chunks tick by tick: owns the current chunk's snapshot and
//! deltas as a single-owner, truncated-not-reallocated scratch state, the
//! way the teacher's consuming builders own their column buffers.

use std::sync::Arc;

use ahash::AHashMap;

use crate::cell::{CellColumns, Molecule, OwnerId};
use crate::change_tracker::{ChangeTracker, ThreadHandle};
use crate::codec::encoder::{build_accumulated_delta, build_chunk, build_incremental_delta, build_snapshot};
use crate::config::ChunkBuilderConfig;
use crate::env::EnvironmentView;
use crate::error::DeltaResult;
use crate::ids::{OrganismRecord, ProcessStateRecord, RunId};
use crate::model::{DeltaKind, TickDataChunk, TickDelta};

fn build_cell_columns_from_occupied(rows: Vec<(u64, Molecule, OwnerId)>) -> CellColumns {
    let mut columns = CellColumns::with_capacity(rows.len());
    for (index, molecule, owner) in rows {
        columns.push(index, molecule, owner);
    }
    columns
}

fn cumulative_cell_columns(since_snapshot: &AHashMap<u64, (Molecule, OwnerId)>) -> CellColumns {
    let mut rows: Vec<(u64, Molecule, OwnerId)> = since_snapshot
        .iter()
        .map(|(&index, &(molecule, owner))| (index, molecule, owner))
        .collect();
    rows.sort_unstable_by_key(|(index, _, _)| *index);
    build_cell_columns_from_occupied(rows)
}

/// Rough byte estimate used only to decide when to close a chunk early.
/// Deliberately coarse: correctness never depends on this number, only the
/// frequency of early snapshots does.
fn estimate_cell_columns_bytes(columns: &CellColumns) -> u64 {
    columns.len() as u64 * 20
}

fn estimate_side_channel_bytes(
    organisms: &[OrganismRecord],
    rng_state: &[u8],
    process_states: &[ProcessStateRecord],
) -> u64 {
    organisms.iter().map(|o| o.0.len() as u64 + 16).sum::<u64>()
        + rng_state.len() as u64
        + process_states.iter().map(|p| p.0.len() as u64 + 16).sum::<u64>()
}

struct OpenChunk {
    snapshot: crate::model::TickData,
    deltas: Vec<TickDelta>,
    since_snapshot: AHashMap<u64, (Molecule, OwnerId)>,
    sampled_count: u32,
    estimated_bytes: u64,
}

/// Builds one [`TickDataChunk`] at a time from a stream of ticks.
///
/// Call [`ChunkBuilder::capture_tick`] once per sampled tick (non-sampled
/// ticks are the caller's concern — this builder only ever sees ticks it
/// should sample). When it returns `Some`, the chunk is closed and ready to
/// hand to storage; a fresh chunk starts automatically on the next call.
pub struct ChunkBuilder {
    run_id: RunId,
    config: ChunkBuilderConfig,
    samples_per_chunk: u32,
    tracker: Arc<ChangeTracker>,
    open: Option<OpenChunk>,
}

impl ChunkBuilder {
    pub fn new(run_id: RunId, config: ChunkBuilderConfig, cell_count: u64) -> DeltaResult<Self> {
        config.validate()?;
        let samples_per_chunk = config.samples_per_chunk()?;
        Ok(Self {
            run_id,
            config,
            samples_per_chunk,
            tracker: Arc::new(ChangeTracker::new(cell_count as usize)),
            open: None,
        })
    }

    /// Registers a new writer thread against this builder's change tracker.
    /// Call once per writer thread at simulation startup.
    pub fn register_thread(&self) -> ThreadHandle {
        self.tracker.register_thread()
    }

    /// Whether a chunk is currently open (has taken a snapshot but not yet
    /// been closed).
    pub fn has_open_chunk(&self) -> bool {
        self.open.is_some()
    }

    /// Processes one sampled tick. Ticks that don't land on the configured
    /// sampling interval are ignored — callers may call this every tick and
    /// rely on the builder to only act on sampled ones.
    ///
    /// `rng_state`/`process_states` are lazy: they're only evaluated when
    /// this tick turns out to need them (the chunk's opening snapshot, or an
    /// accumulated delta).
    pub fn capture_tick(
        &mut self,
        tick_number: u64,
        env: &dyn EnvironmentView,
        organisms: Vec<OrganismRecord>,
        total_organisms_created: u64,
        rng_state: impl FnOnce() -> Vec<u8>,
        process_states: impl FnOnce() -> Vec<ProcessStateRecord>,
    ) -> DeltaResult<Option<TickDataChunk>> {
        if tick_number % u64::from(self.config.sampling_interval) != 0 {
            return Ok(None);
        }

        let mut open = match self.open.take() {
            Some(open) => open,
            None => {
                // Discard any marks accumulated before this chunk's
                // snapshot — the snapshot already captures their net
                // effect.
                let (mut discard_addr, mut discard_data, mut discard_owner) =
                    (Vec::new(), Vec::new(), Vec::new());
                self.tracker.drain_into(
                    env,
                    &mut discard_addr,
                    &mut discard_data,
                    &mut discard_owner,
                );

                let cell_columns = build_cell_columns_from_occupied(env.occupied_cells());
                let rng = rng_state();
                let processes = process_states();
                let estimated_bytes = estimate_cell_columns_bytes(&cell_columns)
                    + estimate_side_channel_bytes(&organisms, &rng, &processes);
                let snapshot = build_snapshot(
                    tick_number,
                    cell_columns,
                    organisms,
                    total_organisms_created,
                    rng,
                    processes,
                );

                // A chunk with `samples_per_chunk == 1` closes on its own
                // snapshot alone — the next sampled tick never arrives for
                // this chunk, so nothing downstream of this branch would
                // ever force it closed.
                if self.samples_per_chunk <= 1 {
                    return build_chunk(self.run_id.clone(), snapshot, Vec::new()).map(Some);
                }

                self.open = Some(OpenChunk {
                    snapshot,
                    deltas: Vec::new(),
                    since_snapshot: AHashMap::new(),
                    sampled_count: 1,
                    estimated_bytes,
                });
                return Ok(None);
            }
        };

        let (mut addr, mut data, mut owner) = (Vec::new(), Vec::new(), Vec::new());
        self.tracker.drain_into(env, &mut addr, &mut data, &mut owner);

        let mut incremental_columns = CellColumns::with_capacity(addr.len());
        for (index, molecule, owner_id) in itertools::izip!(addr, data, owner) {
            incremental_columns.push(index, molecule, owner_id);
            if molecule == 0 {
                open.since_snapshot.remove(&index);
            } else {
                open.since_snapshot.insert(index, (molecule, owner_id));
            }
        }

        // Classification happens on the count as it stands before this
        // tick's own sample is folded in — "counting from the sample right
        // after the snapshot" per the builder's step 4.
        let samples_in_chunk = open.sampled_count;
        let is_snapshot_boundary = samples_in_chunk >= self.samples_per_chunk;
        // `samples_per_chunk` is a multiple of `accumulated_delta_interval`
        // by construction, so a boundary tick is always a natural
        // accumulated tick too; the `||` only matters for readability.
        let is_accumulated = is_snapshot_boundary || samples_in_chunk % self.config.accumulated_delta_interval == 0;
        open.sampled_count += 1;

        let delta = if is_accumulated {
            let changed_cells = cumulative_cell_columns(&open.since_snapshot);
            open.estimated_bytes += estimate_cell_columns_bytes(&changed_cells);
            let rng = rng_state();
            let processes = process_states();
            open.estimated_bytes += estimate_side_channel_bytes(&organisms, &rng, &processes);
            build_accumulated_delta(
                tick_number,
                changed_cells,
                organisms,
                total_organisms_created,
                rng,
                processes,
            )
        } else {
            open.estimated_bytes += estimate_cell_columns_bytes(&incremental_columns);
            build_incremental_delta(tick_number, incremental_columns, organisms, total_organisms_created)
        };
        open.deltas.push(delta);

        let force_close_by_bytes = is_accumulated && open.estimated_bytes >= self.config.max_accumulated_bytes;

        if is_snapshot_boundary || force_close_by_bytes {
            return build_chunk(self.run_id.clone(), open.snapshot, open.deltas).map(Some);
        }
        self.open = Some(open);
        Ok(None)
    }

    /// Closes the current chunk, if any, promoting its final delta to
    /// accumulated first if it isn't already one — a chunk must always end
    /// on an accumulated tick so resume-from-storage never needs to look
    /// past it for rng/process state. A chunk with only a snapshot (no
    /// deltas yet) closes as-is.
    pub fn flush_partial_chunk(
        &mut self,
        rng_state: impl FnOnce() -> Vec<u8>,
        process_states: impl FnOnce() -> Vec<ProcessStateRecord>,
    ) -> DeltaResult<Option<TickDataChunk>> {
        let Some(mut open) = self.open.take() else {
            return Ok(None);
        };

        let last_is_incremental = open
            .deltas
            .last()
            .is_some_and(|delta| delta.delta_type != DeltaKind::Accumulated);
        if last_is_incremental {
            if let Some(last) = open.deltas.pop() {
                let changed_cells = cumulative_cell_columns(&open.since_snapshot);
                let promoted = build_accumulated_delta(
                    last.tick_number,
                    changed_cells,
                    last.organisms,
                    last.total_organisms_created,
                    rng_state(),
                    process_states(),
                );
                open.deltas.push(promoted);
            }
        }

        build_chunk(self.run_id.clone(), open.snapshot, open.deltas).map(Some)
    }
}
