use criterion::{criterion_group, criterion_main, Criterion};

use evo_deltastore::{ChunkBuilder, ChunkBuilderConfig, EnvironmentView, RunId};

struct DenseEnv {
    cells: Vec<(i32, i32)>,
}

impl EnvironmentView for DenseEnv {
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
            .filter(|(_, (m, _))| *m != 0)
            .map(|(i, (m, o))| (i as u64, *m, *o))
            .collect()
    }
}

fn capture_tick_with_sparse_changes(c: &mut Criterion) {
    const CELL_COUNT: usize = 1_000_000;
    const CHANGED_PER_TICK: usize = 2_000;

    c.bench_function("capture_tick_sparse_1m_cells", |b| {
        b.iter(|| {
            let mut env = DenseEnv {
                cells: vec![(0, 0); CELL_COUNT],
            };
            for i in 0..CHANGED_PER_TICK {
                env.cells[i * 37 % CELL_COUNT] = (i as i32 + 1, 1);
            }

            let mut builder = ChunkBuilder::new(
                RunId::from("bench-run"),
                ChunkBuilderConfig::default(),
                CELL_COUNT as u64,
            )
            .unwrap();
            let writer = builder.register_thread();

            builder
                .capture_tick(0, &env, Vec::new(), 0, || vec![0u8; 32], Vec::new)
                .unwrap();

            for i in 0..CHANGED_PER_TICK {
                writer.mark((i * 37 % CELL_COUNT) as u64);
            }
            builder
                .capture_tick(1, &env, Vec::new(), 0, || vec![0u8; 32], Vec::new)
                .unwrap();
        });
    });
}

criterion_group!(benches, capture_tick_with_sparse_changes);
criterion_main!(benches);
