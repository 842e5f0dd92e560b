//! Storage-as-BLOB: chunks are opaque encoded byte ranges keyed by
//! `(run_id, first_tick)`. [`StorageStrategy`] is the seam a real deployment
//! swaps out for an object store or a local file tree; [`InMemoryStorageStrategy`]
//! is the reference implementation and the one used in tests.
//!
//! Two records may legitimately share a `first_tick`: a resume that truncates
//! a chunk writes the truncated replacement under the same `first_tick`
//! before superseding the original, and a crash between those two steps
//! leaves both on disk. Rather than prevent this, the strategy tolerates it
//! and resolves it at read time: [`StorageStrategy::list_chunk_rows`] and
//! [`StorageStrategy::read_chunk_containing`] apply the dedup rule (keep the
//! smaller, safer `last_tick`) themselves, so every reader sees the same
//! view without any writer having to coordinate.

pub mod wire;

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{DeltaError, DeltaResult};
use crate::ids::RunId;

/// Metadata about one stored chunk, without its payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRow {
    pub first_tick: u64,
    pub last_tick: u64,
    pub byte_len: usize,
}

/// A storage backend for encoded chunks, mirroring a staged-write /
/// committed-transaction database wrapper: the strategy never commits on its
/// own, the containing resource does, and a failed commit is cleaned up with
/// `reset_streaming_state` rather than left half-written.
pub trait StorageStrategy: Send + Sync {
    /// Idempotent; safe under concurrent callers.
    fn create_tables(&self, run_id: &RunId, dimensions: u64) -> DeltaResult<()>;

    /// Stages one row keyed by `first_tick`, pending `commit_raw_chunks`.
    fn write_raw_chunk(&self, run_id: &RunId, first_tick: u64, last_tick: u64, bytes: Vec<u8>) -> DeltaResult<()>;

    /// Executes the staged batch for `run_id` within one transaction.
    fn commit_raw_chunks(&self, run_id: &RunId) -> DeltaResult<()>;

    /// Discards any staged rows for `run_id` without committing.
    fn reset_streaming_state(&self, run_id: &RunId) -> DeltaResult<()>;

    /// Lists every active chunk row for `run_id`, ordered by `first_tick`
    /// ascending, with the dedup rule already applied.
    fn list_chunk_rows(&self, run_id: &RunId) -> DeltaResult<Vec<ChunkRow>>;

    /// Loads the encoded bytes of the active row starting at `first_tick`
    /// (post-dedup, if more than one committed row shares it).
    fn load_chunk_bytes(&self, run_id: &RunId, first_tick: u64) -> DeltaResult<Vec<u8>>;

    /// Returns the bytes of the single active row whose `[first_tick,
    /// last_tick]` range contains `tick`, post-dedup. Fails with
    /// `TickNotFound` if no row covers it.
    fn read_chunk_containing(&self, run_id: &RunId, tick: u64) -> DeltaResult<Vec<u8>>;

    /// Moves the specific `(first_tick, last_tick)` row out of the active set
    /// into a superseded namespace `list_chunk_rows` never returns, rather
    /// than deleting it outright — resume diagnostics can still recover it.
    fn supersede(&self, run_id: &RunId, first_tick: u64, last_tick: u64) -> DeltaResult<()>;
}

#[derive(Clone)]
struct StoredRow {
    first_tick: u64,
    last_tick: u64,
    bytes: Vec<u8>,
}

/// Collapses same-`first_tick` rows down to the one with the smallest
/// `last_tick`, logging a warning per collapsed pair. Rows that lose are not
/// removed from `rows` — only excluded from the returned view.
fn dedup_by_first_tick(run_id: &RunId, rows: &[StoredRow]) -> Vec<StoredRow> {
    let mut by_first_tick: HashMap<u64, &StoredRow> = HashMap::new();
    for row in rows {
        match by_first_tick.get(&row.first_tick) {
            None => {
                by_first_tick.insert(row.first_tick, row);
            }
            Some(kept) if row.last_tick < kept.last_tick => {
                tracing::warn!(
                    run = %run_id,
                    first_tick = row.first_tick,
                    kept_last_tick = row.last_tick,
                    discarded_last_tick = kept.last_tick,
                    "dropping longer duplicate row for first_tick at list time"
                );
                by_first_tick.insert(row.first_tick, row);
            }
            Some(kept) if row.last_tick > kept.last_tick => {
                tracing::warn!(
                    run = %run_id,
                    first_tick = row.first_tick,
                    kept_last_tick = kept.last_tick,
                    discarded_last_tick = row.last_tick,
                    "dropping longer duplicate row for first_tick at list time"
                );
            }
            Some(_) => {}
        }
    }
    let mut deduped: Vec<StoredRow> = by_first_tick.into_values().cloned().collect();
    deduped.sort_unstable_by_key(|row| row.first_tick);
    deduped
}

/// In-process storage backend, keyed by run then by `first_tick`. Suitable
/// as the reference implementation and for single-process embeddings; not
/// durable across restarts.
#[derive(Default)]
pub struct InMemoryStorageStrategy {
    active: Mutex<HashMap<RunId, Vec<StoredRow>>>,
    staged: Mutex<HashMap<RunId, Vec<StoredRow>>>,
    superseded: Mutex<HashMap<RunId, Vec<StoredRow>>>,
}

impl InMemoryStorageStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageStrategy for InMemoryStorageStrategy {
    fn create_tables(&self, _run_id: &RunId, dimensions: u64) -> DeltaResult<()> {
        if dimensions == 0 {
            return Err(DeltaError::StorageError("dimensions must be >= 1".to_owned()));
        }
        Ok(())
    }

    fn write_raw_chunk(&self, run_id: &RunId, first_tick: u64, last_tick: u64, bytes: Vec<u8>) -> DeltaResult<()> {
        self.staged
            .lock()
            .entry(run_id.clone())
            .or_default()
            .push(StoredRow { first_tick, last_tick, bytes });
        Ok(())
    }

    fn commit_raw_chunks(&self, run_id: &RunId) -> DeltaResult<()> {
        let staged = self.staged.lock().remove(run_id).unwrap_or_default();
        if staged.is_empty() {
            return Ok(());
        }
        self.active.lock().entry(run_id.clone()).or_default().extend(staged);
        Ok(())
    }

    fn reset_streaming_state(&self, run_id: &RunId) -> DeltaResult<()> {
        self.staged.lock().remove(run_id);
        Ok(())
    }

    fn list_chunk_rows(&self, run_id: &RunId) -> DeltaResult<Vec<ChunkRow>> {
        let active = self.active.lock();
        let Some(rows) = active.get(run_id) else {
            return Ok(Vec::new());
        };
        Ok(dedup_by_first_tick(run_id, rows)
            .into_iter()
            .map(|row| ChunkRow {
                first_tick: row.first_tick,
                last_tick: row.last_tick,
                byte_len: row.bytes.len(),
            })
            .collect())
    }

    fn load_chunk_bytes(&self, run_id: &RunId, first_tick: u64) -> DeltaResult<Vec<u8>> {
        let active = self.active.lock();
        let rows = active
            .get(run_id)
            .ok_or_else(|| DeltaError::StorageError(format!("no chunks for run {run_id}")))?;
        dedup_by_first_tick(run_id, rows)
            .into_iter()
            .find(|row| row.first_tick == first_tick)
            .map(|row| row.bytes)
            .ok_or_else(|| {
                DeltaError::StorageError(format!("no active chunk for run {run_id} at first_tick {first_tick}"))
            })
    }

    fn read_chunk_containing(&self, run_id: &RunId, tick: u64) -> DeltaResult<Vec<u8>> {
        let active = self.active.lock();
        let rows = active
            .get(run_id)
            .map(|rows| dedup_by_first_tick(run_id, rows))
            .unwrap_or_default();
        rows.into_iter()
            .find(|row| row.first_tick <= tick && tick <= row.last_tick)
            .map(|row| row.bytes)
            .ok_or(DeltaError::TickNotFound { tick })
    }

    fn supersede(&self, run_id: &RunId, first_tick: u64, last_tick: u64) -> DeltaResult<()> {
        let removed = {
            let mut active = self.active.lock();
            let rows = active.get_mut(run_id);
            match rows {
                None => None,
                Some(rows) => {
                    let position = rows
                        .iter()
                        .position(|row| row.first_tick == first_tick && row.last_tick == last_tick);
                    position.map(|index| rows.remove(index))
                }
            }
        };
        let Some(row) = removed else {
            return Err(DeltaError::StorageError(format!(
                "no active chunk for run {run_id} at [{first_tick}..={last_tick}] to supersede"
            )));
        };
        self.superseded.lock().entry(run_id.clone()).or_default().push(row);
        Ok(())
    }
}
