//! Maps a requested tick onto a loaded chunk and reconstructs state there.

use crate::codec::decoder::{self, MutableCellState};
use crate::error::{DeltaError, DeltaResult};
use crate::model::{TickData, TickDataChunk};
use crate::resume::ResumeCheckpoint;

/// Reconstructs the exact state a resumed simulation should continue from: a
/// cell grid plus organisms/total-created/RNG/process-state, selected from
/// `checkpoint`'s chunk per the rule "if the checkpoint is an accumulated
/// delta, every field comes from it; otherwise everything comes from the
/// snapshot" — which is exactly what replaying the chunk up to
/// `checkpoint_tick` already does.
pub fn restore_from_checkpoint(checkpoint: &ResumeCheckpoint) -> DeltaResult<RestorePoint> {
    RestoreMapper::new(std::slice::from_ref(&checkpoint.chunk)).restore_at(checkpoint.checkpoint_tick)
}

/// The outcome of resolving a requested tick to an actual sampled tick plus
/// its reconstructed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePoint {
    /// The sampled tick state was actually reconstructed at. Equal to the
    /// requested tick only if that tick was itself sampled.
    pub tick_number: u64,
    pub tick_data: TickData,
}

/// Resolves restore requests against a run's loaded chunks, in `first_tick`
/// order (as returned by [`crate::resume::ResumeLoader::load`]).
pub struct RestoreMapper<'a> {
    chunks: &'a [TickDataChunk],
}

impl<'a> RestoreMapper<'a> {
    pub fn new(chunks: &'a [TickDataChunk]) -> Self {
        Self { chunks }
    }

    /// The highest sampled tick covered by any loaded chunk.
    pub fn latest_available_tick(&self) -> Option<u64> {
        self.chunks.last().map(|chunk| chunk.last_tick)
    }

    fn covering_chunk(&self, tick: u64) -> Option<&TickDataChunk> {
        self.chunks
            .iter()
            .find(|chunk| chunk.first_tick <= tick && tick <= chunk.last_tick)
    }

    /// The resolved sampled tick a restore at `requested_tick` would land
    /// on: the requested tick itself if it was sampled, otherwise the
    /// nearest earlier sampled tick in the covering chunk — state can only
    /// ever be reconstructed as of the last sample taken at or before the
    /// point a reader asks for, never interpolated or extrapolated forward.
    pub fn resolve_tick(&self, requested_tick: u64) -> DeltaResult<u64> {
        let chunk = self
            .covering_chunk(requested_tick)
            .ok_or(DeltaError::TickNotFound { tick: requested_tick })?;

        chunk
            .sampled_ticks()
            .into_iter()
            .filter(|&tick| tick <= requested_tick)
            .next_back()
            .ok_or(DeltaError::TickNotFound { tick: requested_tick })
    }

    /// Reconstructs the full tick record nearest at-or-before
    /// `requested_tick`.
    pub fn restore_at(&self, requested_tick: u64) -> DeltaResult<RestorePoint> {
        let tick_number = self.resolve_tick(requested_tick)?;
        let chunk = self
            .covering_chunk(tick_number)
            .expect("resolve_tick only returns ticks covered by some chunk");
        let tick_data = decoder::decompress_tick(chunk, tick_number)?;
        Ok(RestorePoint { tick_number, tick_data })
    }

    /// Reconstructs only the cell grid at `requested_tick`'s resolved tick,
    /// skipping organism/rng/process state for callers that don't need it.
    pub fn reconstruct_cells(&self, requested_tick: u64) -> DeltaResult<MutableCellState> {
        let tick_number = self.resolve_tick(requested_tick)?;
        let chunk = self
            .covering_chunk(tick_number)
            .expect("resolve_tick only returns ticks covered by some chunk");
        decoder::reconstruct_environment(chunk, tick_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellColumns;
    use crate::codec::encoder::{build_accumulated_delta, build_chunk, build_incremental_delta, build_snapshot};
    use crate::ids::RunId;

    fn two_chunks() -> Vec<TickDataChunk> {
        let snapshot_a = build_snapshot(0, CellColumns::default(), Vec::new(), 0, vec![0], Vec::new());
        let delta_a = build_accumulated_delta(5, CellColumns::default(), Vec::new(), 0, vec![1], Vec::new());
        let chunk_a = build_chunk(RunId::from("run-a"), snapshot_a, vec![delta_a]).unwrap();

        let snapshot_b = build_snapshot(10, CellColumns::default(), Vec::new(), 0, vec![2], Vec::new());
        let delta_b = build_incremental_delta(12, CellColumns::default(), Vec::new(), 0);
        let chunk_b = build_chunk(RunId::from("run-a"), snapshot_b, vec![delta_b]).unwrap();

        vec![chunk_a, chunk_b]
    }

    #[test]
    fn resolve_tick_snaps_back_to_nearest_sample() {
        let chunks = two_chunks();
        let mapper = RestoreMapper::new(&chunks);
        assert_eq!(mapper.resolve_tick(3).unwrap(), 0);
        assert_eq!(mapper.resolve_tick(11).unwrap(), 10);
    }

    #[test]
    fn restore_at_beyond_every_chunk_errors() {
        let chunks = two_chunks();
        let mapper = RestoreMapper::new(&chunks);
        assert!(mapper.restore_at(100).is_err());
    }

    #[test]
    fn restore_from_checkpoint_uses_the_accumulated_delta() {
        let snapshot = build_snapshot(0, CellColumns::default(), Vec::new(), 0, vec![0], Vec::new());
        let delta = build_accumulated_delta(5, CellColumns::default(), Vec::new(), 7, vec![9], Vec::new());
        let chunk = build_chunk(RunId::from("run-a"), snapshot, vec![delta]).unwrap();
        let checkpoint = ResumeCheckpoint {
            checkpoint_tick: 5,
            resume_from_tick: 6,
            chunk,
        };

        let point = restore_from_checkpoint(&checkpoint).unwrap();
        assert_eq!(point.tick_number, 5);
        assert_eq!(point.tick_data.total_organisms_created, 7);
        assert_eq!(point.tick_data.rng_state, vec![9]);
    }

    #[test]
    fn latest_available_tick_is_last_chunks_last_tick() {
        let chunks = two_chunks();
        let mapper = RestoreMapper::new(&chunks);
        assert_eq!(mapper.latest_available_tick(), Some(12));
    }
}
