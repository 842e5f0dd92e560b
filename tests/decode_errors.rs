use evo_deltastore::storage::wire;
use evo_deltastore::{CellColumns, DeltaError, DeltaKind, RunId, TickData, TickDataChunk, TickDelta};

fn valid_chunk() -> TickDataChunk {
    let snapshot = TickData {
        tick_number: 0,
        cell_columns: CellColumns::default(),
        organisms: Vec::new(),
        total_organisms_created: 0,
        rng_state: vec![0],
        process_states: Vec::new(),
    };
    let delta = TickDelta {
        tick_number: 1,
        delta_type: DeltaKind::Accumulated,
        changed_cells: CellColumns::default(),
        organisms: Vec::new(),
        total_organisms_created: 0,
        rng_state: vec![1],
        process_states: Vec::new(),
    };
    TickDataChunk {
        run_id: RunId::from("run-a"),
        first_tick: 0,
        last_tick: 1,
        tick_count: 2,
        snapshot,
        deltas: vec![delta],
    }
}

#[test]
fn decode_rejects_truncated_bytes() {
    let encoded = wire::encode_chunk(&valid_chunk()).unwrap();
    let truncated = &encoded[..encoded.len() / 2];
    assert!(matches!(
        wire::decode_chunk(truncated),
        Err(DeltaError::DecodeError(_))
    ));
}

#[test]
fn decode_rejects_chunk_failing_sanity_check_after_tamper() {
    let mut chunk = valid_chunk();
    // Corrupt the chunk after it's built, bypassing `validate_for_encode`,
    // to exercise the decode-side check independently.
    chunk.last_tick = 99;
    let encoded_without_revalidation = {
        let packed = rmp_serde::to_vec_named(&chunk).unwrap();
        lz4_flex::block::compress_prepend_size(&packed)
    };
    assert!(matches!(
        wire::decode_chunk(&encoded_without_revalidation),
        Err(DeltaError::ChunkCorrupted { .. })
    ));
}

#[test]
fn encode_rejects_invalid_chunk_before_touching_storage() {
    let mut chunk = valid_chunk();
    chunk.tick_count = 5;
    assert!(matches!(
        wire::encode_chunk(&chunk),
        Err(DeltaError::InvalidChunk { .. })
    ));
}
