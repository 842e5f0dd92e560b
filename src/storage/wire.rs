//! On-disk/on-wire chunk encoding: MessagePack plus LZ4, standing in for a
//! literal protobuf toolchain (see `DESIGN.md`).

use lz4_flex::block::{compress_prepend_size, decompress_size_prepended};

use crate::error::{DeltaError, DeltaResult};
use crate::model::TickDataChunk;

/// Serializes and compresses `chunk`. Validates first so a malformed chunk
/// never reaches storage.
pub fn encode_chunk(chunk: &TickDataChunk) -> DeltaResult<Vec<u8>> {
    chunk.validate_for_encode()?;
    let packed =
        rmp_serde::to_vec_named(chunk).map_err(|err| DeltaError::EncodeError(err.to_string()))?;
    Ok(compress_prepend_size(&packed))
}

/// Decompresses and deserializes a chunk previously produced by
/// [`encode_chunk`], then validates it before returning.
pub fn decode_chunk(bytes: &[u8]) -> DeltaResult<TickDataChunk> {
    let packed = decompress_size_prepended(bytes)
        .map_err(|err| DeltaError::DecodeError(err.to_string()))?;
    let chunk: TickDataChunk =
        rmp_serde::from_slice(&packed).map_err(|err| DeltaError::DecodeError(err.to_string()))?;
    chunk.validate_for_decode()?;
    Ok(chunk)
}
