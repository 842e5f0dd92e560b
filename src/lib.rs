//! Delta-compressed, chunked state projection engine for a digital-evolution
//! simulator.
//!
//! A simulation's cell grid is captured one sampled tick at a time through
//! [`builder::ChunkBuilder`], which turns a stream of ticks into closed
//! [`model::TickDataChunk`] values: a full snapshot followed by an ordered
//! run of incremental and periodic accumulated deltas. [`resume::commit_chunk`]
//! writes those chunks to a [`storage::StorageStrategy`] with crash-safe
//! dedup; [`resume::ResumeLoader`] reads them back at startup; and
//! [`restore::RestoreMapper`] turns a requested tick into reconstructed
//! state via [`codec::decoder`].

pub mod builder;
pub mod cell;
pub mod change_tracker;
pub mod codec;
pub mod config;
pub mod env;
pub mod error;
pub mod ids;
pub mod model;
pub mod restore;
pub mod resume;
pub mod storage;

pub use builder::ChunkBuilder;
pub use cell::{CellColumns, Molecule, OwnerId};
pub use change_tracker::{ChangeTracker, ThreadHandle};
pub use config::ChunkBuilderConfig;
pub use env::EnvironmentView;
pub use error::{DeltaError, DeltaResult};
pub use ids::{OrganismRecord, ProcessStateRecord, RunId};
pub use model::{DeltaKind, TickData, TickDataChunk, TickDelta};
pub use restore::{restore_from_checkpoint, RestoreMapper, RestorePoint};
pub use resume::{commit_chunk, ChunkGap, ResumeCheckpoint, ResumeLoader, ResumeReport};
pub use storage::{wire, ChunkRow, InMemoryStorageStrategy, StorageStrategy};
