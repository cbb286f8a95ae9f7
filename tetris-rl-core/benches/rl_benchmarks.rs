//! Benchmarks for core RL types

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{arr1, Array2};
use tetris_rl_core::{argmax, BoardObservation, Observation, TetrisAction};

fn bench_observation_to_tensor(c: &mut Criterion) {
    let board = Array2::zeros((BoardObservation::ROWS, BoardObservation::COLS));
    let obs = BoardObservation::new(board, arr1(&[0.1, 0.2, 0.3])).unwrap();

    c.bench_function("observation_to_tensor", |b| {
        b.iter(|| black_box(&obs).to_tensor())
    });
}

fn bench_argmax(c: &mut Criterion) {
    let values: Vec<f32> = (0..256).map(|i| ((i * 37) % 101) as f32).collect();

    c.bench_function("argmax_256", |b| b.iter(|| argmax(black_box(&values))));
}

fn bench_action_round_trip(c: &mut Criterion) {
    c.bench_function("action_round_trip", |b| {
        b.iter(|| {
            for i in 0..4 {
                let action = TetrisAction::from_index(black_box(i)).unwrap();
                black_box(action.index());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_observation_to_tensor,
    bench_argmax,
    bench_action_round_trip
);
criterion_main!(benches);
