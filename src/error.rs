//! Error taxonomy shared by every fallible operation in this crate.
//!
//! Mirrors the seven kinds the surrounding system distinguishes: two are
//! fatal-at-construction/encode (`InvalidConfig`, `InvalidChunk`), two are
//! recoverable-at-call-site (`ChunkCorrupted`, `TickNotFound`), and three are
//! transient transport/storage failures the caller may retry or DLQ
//! (`EncodeError`, `DecodeError`, `StorageError`).

/// Result alias used throughout this crate.
pub type DeltaResult<T> = Result<T, DeltaError>;

#[derive(thiserror::Error, Debug)]
pub enum DeltaError {
    /// Fatal at construction: a `ChunkBuilderConfig` interval is below 1, or
    /// the snapshot/accumulated intervals would skip a checkpoint boundary.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Fatal at encode: the chunk being assembled violates one of the
    /// invariants in `TickDataChunk::sanity_check`. The chunk is discarded.
    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    /// Recoverable at decode: the requested reconstruction can't be
    /// performed because the chunk (or the request against it) is
    /// malformed. Callers should log a warning, skip the chunk, and
    /// continue.
    #[error("chunk corrupted: {reason}")]
    ChunkCorrupted { reason: String },

    /// Recoverable at read: no stored chunk covers the requested tick.
    #[error("no chunk covers tick {tick}")]
    TickNotFound { tick: u64 },

    /// Transient: the wire encoder failed (e.g. a size limit was exceeded
    /// mid-assembly). The builder is left in a consistent state.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Transient: the wire decoder failed on otherwise well-formed bytes
    /// (e.g. a codec version mismatch).
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Transient: the underlying storage resource failed. The wrapper rolls
    /// back and resets streaming state; the caller decides whether to retry.
    #[error("storage error: {0}")]
    StorageError(String),
}

/// Format an error together with its full `source()` chain.
///
/// Always prefer this over `Display` for errors destined for an operator-facing
/// log line, since `Display` alone drops everything but the outermost layer.
pub fn format_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut string = error.to_string();
    for source in std::iter::successors(error.source(), |error| error.source()) {
        string.push_str(" -> ");
        string.push_str(&source.to_string());
    }
    string
}
