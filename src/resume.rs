//! Crash-safe chunk commit and the resume-time load path.
//!
//! A chunk is committed by staging it and then committing the stage — the
//! same two-phase discipline `StorageStrategy` exposes for a database-backed
//! implementation. [`ResumeLoader::resume`] implements the recovery
//! algorithm: find the newest chunk, fall back to its last accumulated
//! checkpoint if it carries unconfirmed trailing deltas, and persist the
//! truncated replacement before retiring the original. [`ResumeLoader::load`]
//! is the simpler "read the whole history back" path used by callers that
//! just want every chunk a run has produced (diagnostics, full replay).

use crate::error::DeltaResult;
use crate::ids::RunId;
use crate::model::TickDataChunk;
use crate::storage::{wire, ChunkRow, StorageStrategy};

/// Encodes and stages `chunk`, then commits the stage. On either failure the
/// stage is rolled back via `reset_streaming_state` before the error
/// propagates, so a half-written batch never lingers into the next commit.
pub fn commit_chunk(storage: &dyn StorageStrategy, run_id: &RunId, chunk: &TickDataChunk) -> DeltaResult<()> {
    let encoded = wire::encode_chunk(chunk)?;

    if let Err(err) = storage.write_raw_chunk(run_id, chunk.first_tick, chunk.last_tick, encoded) {
        storage.reset_streaming_state(run_id)?;
        return Err(err);
    }
    if let Err(err) = storage.commit_raw_chunks(run_id) {
        storage.reset_streaming_state(run_id)?;
        return Err(err);
    }
    Ok(())
}

/// A contiguity gap between two active chunks: `after` is the last sampled
/// tick of one chunk, `before` is the first sampled tick of the next, and
/// `before > after + 1` (in sampled-tick space; see `sampling_interval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGap {
    pub after: u64,
    pub before: u64,
}

/// The outcome of a resume-time load: every active chunk in order, plus any
/// gaps detected between them.
#[derive(Debug, Default)]
pub struct ResumeReport {
    pub chunks: Vec<TickDataChunk>,
    pub gaps: Vec<ChunkGap>,
}

impl ResumeReport {
    /// The highest sampled tick covered by any loaded chunk, if any.
    pub fn latest_tick(&self) -> Option<u64> {
        self.chunks.last().map(|chunk| chunk.last_tick)
    }
}

/// The checkpoint a resumed simulation should continue from: the possibly
/// truncated last chunk of a run, plus the tick identities spec'd by the
/// resume algorithm.
#[derive(Debug, Clone)]
pub struct ResumeCheckpoint {
    /// The tick of the chosen checkpoint: the last accumulated delta in the
    /// run's newest chunk, or that chunk's snapshot tick if it holds none.
    pub checkpoint_tick: u64,
    /// `checkpoint_tick + 1` — where simulation execution should continue.
    pub resume_from_tick: u64,
    /// The run's newest chunk, truncated to `checkpoint_tick` if it held
    /// deltas beyond it.
    pub chunk: TickDataChunk,
}

/// Loads and validates a run's chunks.
pub struct ResumeLoader<'storage> {
    storage: &'storage dyn StorageStrategy,
    run_id: RunId,
}

impl<'storage> ResumeLoader<'storage> {
    pub fn new(storage: &'storage dyn StorageStrategy, run_id: RunId) -> Self {
        Self { storage, run_id }
    }

    /// Loads every active chunk for this run, in `first_tick` order,
    /// skipping any that fail decode and recording any gap between
    /// consecutive chunks.
    pub fn load(&self) -> DeltaResult<ResumeReport> {
        let mut rows: Vec<ChunkRow> = self.storage.list_chunk_rows(&self.run_id)?;
        rows.sort_unstable_by_key(|row| row.first_tick);

        let mut report = ResumeReport::default();
        let mut previous_last_tick: Option<u64> = None;

        for row in rows {
            let bytes = self.storage.load_chunk_bytes(&self.run_id, row.first_tick)?;
            let chunk = match wire::decode_chunk(&bytes) {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(
                        run = %self.run_id,
                        first_tick = row.first_tick,
                        error = %crate::error::format_chain(&err),
                        "skipping corrupted chunk during resume"
                    );
                    continue;
                }
            };

            if let Some(previous) = previous_last_tick {
                if chunk.first_tick > previous + 1 {
                    tracing::warn!(
                        run = %self.run_id,
                        after = previous,
                        before = chunk.first_tick,
                        "gap between chunks detected during resume"
                    );
                    report.gaps.push(ChunkGap {
                        after: previous,
                        before: chunk.first_tick,
                    });
                }
            }

            previous_last_tick = Some(chunk.last_tick);
            report.chunks.push(chunk);
        }

        Ok(report)
    }

    /// Implements the resume algorithm: select the run's newest chunk,
    /// identify its last accumulated checkpoint, and — if the chunk holds
    /// deltas strictly after that checkpoint — persist a truncated
    /// replacement under the same `first_tick` before superseding the
    /// original. Returns `None` if the run has no chunks at all.
    ///
    /// A chunk produced by [`crate::builder::ChunkBuilder`] always already
    /// ends on an accumulated delta, so in practice truncation only matters
    /// for a chunk written by some other, less disciplined producer; the
    /// algorithm still runs unconditionally since storage can't tell the two
    /// apart.
    pub fn resume(&self) -> DeltaResult<Option<ResumeCheckpoint>> {
        let mut rows = self.storage.list_chunk_rows(&self.run_id)?;
        rows.sort_unstable_by_key(|row| row.first_tick);
        let Some(newest_row) = rows.last().copied() else {
            return Ok(None);
        };

        let bytes = self.storage.load_chunk_bytes(&self.run_id, newest_row.first_tick)?;
        let chunk = wire::decode_chunk(&bytes)?;

        let checkpoint_tick = chunk
            .deltas
            .iter()
            .rev()
            .find(|delta| delta.is_accumulated())
            .map_or(chunk.first_tick, |delta| delta.tick_number);

        if checkpoint_tick >= chunk.last_tick {
            return Ok(Some(ResumeCheckpoint {
                checkpoint_tick,
                resume_from_tick: checkpoint_tick + 1,
                chunk,
            }));
        }

        let mut truncated = chunk;
        truncated.deltas.retain(|delta| delta.tick_number <= checkpoint_tick);
        truncated.last_tick = checkpoint_tick;
        truncated.tick_count = 1 + truncated.deltas.len() as u32;

        commit_chunk(self.storage, &self.run_id, &truncated)?;
        self.storage
            .supersede(&self.run_id, newest_row.first_tick, newest_row.last_tick)?;

        tracing::warn!(
            run = %self.run_id,
            original_last_tick = newest_row.last_tick,
            truncated_last_tick = checkpoint_tick,
            "truncated trailing deltas past last checkpoint during resume"
        );

        Ok(Some(ResumeCheckpoint {
            checkpoint_tick,
            resume_from_tick: checkpoint_tick + 1,
            chunk: truncated,
        }))
    }
}
