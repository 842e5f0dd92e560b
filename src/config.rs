//! Builder configuration: sampling cadence and chunk-sizing thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{DeltaError, DeltaResult};

/// Controls how often ticks are sampled into deltas, how often a sampled
/// tick is promoted to an accumulated delta, and when a chunk is closed —
/// named after the recognized config keys, each independently settable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkBuilderConfig {
    /// Sample every `sampling_interval`-th tick. Must be >= 1.
    pub sampling_interval: u32,
    /// Every `accumulated_delta_interval`-th *sampled* tick becomes an
    /// accumulated delta instead of incremental. Must be >= 1.
    pub accumulated_delta_interval: u32,
    /// After this many accumulated deltas, the chunk closes and a new one
    /// starts with a snapshot. Must be >= 1.
    pub snapshot_interval: u32,
    /// Multiplier on the snapshot boundary; kept for generality, usually 1.
    /// Must be >= 1.
    pub chunk_interval: u32,
    /// Hint for memory sizing only (0.0-1.0); correctness never depends on
    /// it.
    pub estimated_delta_ratio: f64,
    /// A chunk is closed early, on the next accumulated-eligible tick, once
    /// its estimated serialized size would exceed this many bytes.
    pub max_accumulated_bytes: u64,
}

impl Default for ChunkBuilderConfig {
    fn default() -> Self {
        Self {
            sampling_interval: 1,
            accumulated_delta_interval: 100,
            snapshot_interval: 10,
            chunk_interval: 1,
            estimated_delta_ratio: 0.1,
            max_accumulated_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ChunkBuilderConfig {
    /// The number of sampled ticks a chunk holds before it force-closes:
    /// `snapshot_interval * chunk_interval` accumulated deltas, each
    /// `accumulated_delta_interval` samples apart.
    pub fn samples_per_chunk(&self) -> DeltaResult<u32> {
        self.snapshot_interval
            .checked_mul(self.chunk_interval)
            .and_then(|accumulated_deltas_per_chunk| {
                accumulated_deltas_per_chunk.checked_mul(self.accumulated_delta_interval)
            })
            .ok_or_else(|| DeltaError::InvalidConfig {
                reason: "snapshot_interval * chunk_interval * accumulated_delta_interval overflows u32".to_owned(),
            })
    }

    pub fn validate(&self) -> DeltaResult<()> {
        if self.sampling_interval == 0 {
            return Err(DeltaError::InvalidConfig {
                reason: "sampling_interval must be >= 1".to_owned(),
            });
        }
        if self.accumulated_delta_interval == 0 {
            return Err(DeltaError::InvalidConfig {
                reason: "accumulated_delta_interval must be >= 1".to_owned(),
            });
        }
        if self.snapshot_interval == 0 {
            return Err(DeltaError::InvalidConfig {
                reason: "snapshot_interval must be >= 1".to_owned(),
            });
        }
        if self.chunk_interval == 0 {
            return Err(DeltaError::InvalidConfig {
                reason: "chunk_interval must be >= 1".to_owned(),
            });
        }
        if !(0.0..=1.0).contains(&self.estimated_delta_ratio) {
            return Err(DeltaError::InvalidConfig {
                reason: "estimated_delta_ratio must be between 0.0 and 1.0".to_owned(),
            });
        }
        self.samples_per_chunk()?;
        Ok(())
    }
}
