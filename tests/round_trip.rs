use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use evo_deltastore::storage::InMemoryStorageStrategy;
use evo_deltastore::{
    commit_chunk, ChunkBuilder, ChunkBuilderConfig, EnvironmentView, ResumeLoader, RestoreMapper,
    RunId,
};

struct GridEnv {
    cells: Vec<(i32, i32)>,
}

impl GridEnv {
    fn new(cell_count: usize) -> Self {
        Self {
            cells: vec![(0, 0); cell_count],
        }
    }
}

impl EnvironmentView for GridEnv {
    fn cell_count(&self) -> u64 {
        self.cells.len() as u64
    }

    fn cell_at(&self, index: u64) -> (i32, i32) {
        self.cells[index as usize]
    }

    fn occupied_cells(&self) -> Vec<(u64, i32, i32)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, (molecule, _))| *molecule != 0)
            .map(|(index, &(molecule, owner))| (index as u64, molecule, owner))
            .collect()
    }
}

/// Drives `ticks` sampled ticks of pseudo-random cell mutation through a
/// `ChunkBuilder`, committing every closed chunk and returning the grid's
/// state at the end alongside the chunks produced.
fn run_simulation(cell_count: usize, ticks: u64, config: ChunkBuilderConfig) -> (GridEnv, Vec<(u64, u64)>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let storage = InMemoryStorageStrategy::new();
    let run_id = RunId::from("round-trip-run");
    let mut env = GridEnv::new(cell_count);
    let mut builder = ChunkBuilder::new(run_id.clone(), config, cell_count as u64).unwrap();
    let writer = builder.register_thread();
    let mut rng = SmallRng::seed_from_u64(42);
    let mut committed_ranges = Vec::new();

    for tick in 0..ticks {
        for _ in 0..10 {
            let index = rng.gen_range(0..cell_count as u64);
            let molecule = rng.gen_range(0..100);
            env.cells[index as usize] = (molecule, 1);
            writer.mark(index);
        }

        if let Some(chunk) = builder
            .capture_tick(tick, &env, Vec::new(), 0, || vec![tick as u8], Vec::new)
            .unwrap()
        {
            committed_ranges.push((chunk.first_tick, chunk.last_tick));
            commit_chunk(&storage, &run_id, &chunk).unwrap();
        }
    }

    if let Some(chunk) = builder.flush_partial_chunk(|| vec![255], Vec::new).unwrap() {
        committed_ranges.push((chunk.first_tick, chunk.last_tick));
        commit_chunk(&storage, &run_id, &chunk).unwrap();
    }

    let report = ResumeLoader::new(&storage, run_id).load().unwrap();
    assert!(report.gaps.is_empty(), "no gaps expected in a continuous run");

    let mapper = RestoreMapper::new(&report.chunks);
    let latest = mapper.latest_available_tick().unwrap();
    let restored = mapper.restore_at(latest).unwrap();

    let mut expected = evo_deltastore::CellColumns::default();
    for (index, &(molecule, owner)) in env.cells.iter().enumerate() {
        if molecule != 0 {
            expected.push(index as u64, molecule, owner);
        }
    }
    similar_asserts::assert_eq!(restored.tick_data.cell_columns, expected);

    (env, committed_ranges)
}

#[test]
fn restored_state_at_end_of_run_matches_live_environment() {
    let config = ChunkBuilderConfig {
        sampling_interval: 1,
        accumulated_delta_interval: 5,
        snapshot_interval: 4,
        chunk_interval: 1,
        estimated_delta_ratio: 0.1,
        max_accumulated_bytes: u64::MAX,
    };
    let (_, ranges) = run_simulation(64, 37, config);
    assert!(!ranges.is_empty());
    assert_eq!(ranges.first().unwrap().0, 0);
}

#[test]
fn restore_at_intermediate_tick_reflects_state_at_that_point() {
    let storage = InMemoryStorageStrategy::new();
    let run_id = RunId::from("intermediate-run");
    let mut env = GridEnv::new(8);
    let config = ChunkBuilderConfig {
        sampling_interval: 1,
        accumulated_delta_interval: 3,
        snapshot_interval: 3,
        chunk_interval: 1,
        estimated_delta_ratio: 0.1,
        max_accumulated_bytes: u64::MAX,
    };
    let mut builder = ChunkBuilder::new(run_id.clone(), config, 8).unwrap();
    let writer = builder.register_thread();

    builder
        .capture_tick(0, &env, Vec::new(), 0, || vec![0], Vec::new)
        .unwrap();

    env.cells[1] = (11, 1);
    writer.mark(1);
    builder
        .capture_tick(1, &env, Vec::new(), 0, Vec::new, Vec::new)
        .unwrap();

    env.cells[2] = (22, 1);
    writer.mark(2);
    builder
        .capture_tick(2, &env, Vec::new(), 0, || vec![1], Vec::new)
        .unwrap();

    env.cells[3] = (33, 1);
    writer.mark(3);
    let chunk = builder
        .flush_partial_chunk(|| vec![2], Vec::new)
        .unwrap()
        .unwrap();
    commit_chunk(&storage, &run_id, &chunk).unwrap();

    let report = ResumeLoader::new(&storage, run_id).load().unwrap();
    let mapper = RestoreMapper::new(&report.chunks);

    let at_tick_1 = mapper.restore_at(1).unwrap();
    assert_eq!(at_tick_1.tick_data.cell_columns.len(), 2);

    let at_tick_3 = mapper.restore_at(3).unwrap();
    assert_eq!(at_tick_3.tick_data.cell_columns.len(), 3);
}
