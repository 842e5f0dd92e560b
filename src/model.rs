//! Snapshot, delta, and chunk record types — the wire-compatible shapes
//! described in spec §6, implemented as plain `serde`-derived structs (see
//! `DESIGN.md` for why this stands in for a literal protobuf toolchain).

use serde::{Deserialize, Serialize};

use crate::cell::CellColumns;
use crate::error::{DeltaError, DeltaResult};
use crate::ids::{OrganismRecord, ProcessStateRecord, RunId};

/// Whether a [`TickDelta`] carries only the changes since the previous
/// sampled tick, or the union of all changes since the chunk's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaKind {
    Incremental = 1,
    Accumulated = 2,
}

/// A complete dump of all occupied cells plus organism/RNG/process state at
/// one tick. Always the first entry of a [`TickDataChunk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickData {
    pub tick_number: u64,
    pub cell_columns: CellColumns,
    pub organisms: Vec<OrganismRecord>,
    pub total_organisms_created: u64,
    pub rng_state: Vec<u8>,
    pub process_states: Vec<ProcessStateRecord>,
}

/// Changes recorded at one sampled tick, relative to either the previous
/// sampled tick (`Incremental`) or the chunk's snapshot (`Accumulated`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickDelta {
    pub tick_number: u64,
    pub delta_type: DeltaKind,
    pub changed_cells: CellColumns,
    pub organisms: Vec<OrganismRecord>,
    pub total_organisms_created: u64,
    /// Non-empty iff `delta_type == Accumulated`.
    pub rng_state: Vec<u8>,
    /// Non-empty iff `delta_type == Accumulated`.
    pub process_states: Vec<ProcessStateRecord>,
}

impl TickDelta {
    #[inline]
    pub fn is_accumulated(&self) -> bool {
        matches!(self.delta_type, DeltaKind::Accumulated)
    }
}

/// Self-contained unit of transmission and storage: one snapshot plus an
/// ordered sequence of deltas, spanning a contiguous range of sampled ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickDataChunk {
    pub run_id: RunId,
    pub first_tick: u64,
    pub last_tick: u64,
    pub tick_count: u32,
    pub snapshot: TickData,
    pub deltas: Vec<TickDelta>,
}

impl TickDataChunk {
    /// Checks every invariant from spec §3. Shared between the encoder
    /// (`build_chunk`, surfaces `InvalidChunk`) and every decode entry point
    /// (surfaces `ChunkCorrupted`) via the two thin wrappers below.
    fn sanity_check(&self) -> Result<(), String> {
        if self.snapshot.tick_number != self.first_tick {
            return Err(format!(
                "snapshot tick {} does not match chunk first_tick {}",
                self.snapshot.tick_number, self.first_tick
            ));
        }

        if self.tick_count as usize != 1 + self.deltas.len() {
            return Err(format!(
                "tick_count {} does not match 1 + {} deltas",
                self.tick_count,
                self.deltas.len()
            ));
        }

        self.snapshot
            .cell_columns
            .sanity_check()
            .map_err(|reason| format!("snapshot: {reason}"))?;

        let mut previous_tick = self.first_tick;
        for delta in &self.deltas {
            if delta.tick_number <= previous_tick {
                return Err(format!(
                    "delta ticks are not strictly ascending: {} follows {}",
                    delta.tick_number, previous_tick
                ));
            }
            if delta.tick_number > self.last_tick {
                return Err(format!(
                    "delta tick {} exceeds chunk last_tick {}",
                    delta.tick_number, self.last_tick
                ));
            }

            delta
                .changed_cells
                .sanity_check()
                .map_err(|reason| format!("delta@{}: {reason}", delta.tick_number))?;

            let rng_and_process_present =
                !delta.rng_state.is_empty() || !delta.process_states.is_empty();
            match delta.delta_type {
                DeltaKind::Incremental => {
                    if rng_and_process_present {
                        return Err(format!(
                            "incremental delta@{} carries rng/process state",
                            delta.tick_number
                        ));
                    }
                }
                DeltaKind::Accumulated => {
                    if delta.rng_state.is_empty() || delta.process_states.is_empty() {
                        return Err(format!(
                            "accumulated delta@{} is missing rng/process state",
                            delta.tick_number
                        ));
                    }
                }
            }

            previous_tick = delta.tick_number;
        }

        let last_sampled_tick = self.deltas.last().map_or(self.first_tick, |d| d.tick_number);
        if last_sampled_tick != self.last_tick {
            return Err(format!(
                "chunk last_tick {} does not match last sampled tick {last_sampled_tick}",
                self.last_tick
            ));
        }

        Ok(())
    }

    pub fn validate_for_encode(&self) -> DeltaResult<()> {
        self.sanity_check()
            .map_err(|reason| DeltaError::InvalidChunk { reason })
    }

    pub fn validate_for_decode(&self) -> DeltaResult<()> {
        self.sanity_check()
            .map_err(|reason| DeltaError::ChunkCorrupted { reason })
    }

    /// All sampled ticks covered by this chunk, in order.
    pub fn sampled_ticks(&self) -> Vec<u64> {
        let mut ticks = Vec::with_capacity(self.tick_count as usize);
        ticks.push(self.first_tick);
        ticks.extend(self.deltas.iter().map(|d| d.tick_number));
        ticks
    }

    /// The latest accumulated delta at or before `target_tick`, if any.
    pub fn latest_accumulated_at_or_before(&self, target_tick: u64) -> Option<&TickDelta> {
        self.deltas
            .iter()
            .filter(|d| d.is_accumulated() && d.tick_number <= target_tick)
            .last()
    }
}

impl std::fmt::Display for TickDataChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TickDataChunk(run={}, ticks=[{}..={}], {} deltas)",
            self.run_id,
            self.first_tick,
            self.last_tick,
            self.deltas.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_tick_data(tick: u64) -> TickData {
        TickData {
            tick_number: tick,
            cell_columns: CellColumns::default(),
            organisms: Vec::new(),
            total_organisms_created: 0,
            rng_state: vec![0],
            process_states: Vec::new(),
        }
    }

    #[test]
    fn rejects_snapshot_tick_mismatch() {
        let chunk = TickDataChunk {
            run_id: RunId::from("run"),
            first_tick: 0,
            last_tick: 0,
            tick_count: 1,
            snapshot: empty_tick_data(1),
            deltas: Vec::new(),
        };
        assert!(chunk.validate_for_encode().is_err());
    }

    #[test]
    fn rejects_non_monotonic_deltas() {
        let chunk = TickDataChunk {
            run_id: RunId::from("run"),
            first_tick: 0,
            last_tick: 2,
            tick_count: 3,
            snapshot: empty_tick_data(0),
            deltas: vec![
                TickDelta {
                    tick_number: 2,
                    delta_type: DeltaKind::Incremental,
                    changed_cells: CellColumns::default(),
                    organisms: Vec::new(),
                    total_organisms_created: 0,
                    rng_state: Vec::new(),
                    process_states: Vec::new(),
                },
                TickDelta {
                    tick_number: 1,
                    delta_type: DeltaKind::Incremental,
                    changed_cells: CellColumns::default(),
                    organisms: Vec::new(),
                    total_organisms_created: 0,
                    rng_state: Vec::new(),
                    process_states: Vec::new(),
                },
            ],
        };
        assert!(chunk.validate_for_encode().is_err());
    }

    #[test]
    fn display_format_is_stable() {
        let chunk = TickDataChunk {
            run_id: RunId::from("run-a"),
            first_tick: 10,
            last_tick: 12,
            tick_count: 2,
            snapshot: empty_tick_data(10),
            deltas: vec![TickDelta {
                tick_number: 12,
                delta_type: DeltaKind::Accumulated,
                changed_cells: CellColumns::default(),
                organisms: Vec::new(),
                total_organisms_created: 0,
                rng_state: vec![1],
                process_states: Vec::new(),
            }],
        };
        insta::assert_snapshot!(chunk.to_string(), @"TickDataChunk(run=run-a, ticks=[10..=12], 1 deltas)");
    }

    #[test]
    fn rejects_incremental_delta_with_rng_state() {
        let chunk = TickDataChunk {
            run_id: RunId::from("run"),
            first_tick: 0,
            last_tick: 1,
            tick_count: 2,
            snapshot: empty_tick_data(0),
            deltas: vec![TickDelta {
                tick_number: 1,
                delta_type: DeltaKind::Incremental,
                changed_cells: CellColumns::default(),
                organisms: Vec::new(),
                total_organisms_created: 0,
                rng_state: vec![1, 2, 3],
                process_states: Vec::new(),
            }],
        };
        assert!(chunk.validate_for_encode().is_err());
    }
}
