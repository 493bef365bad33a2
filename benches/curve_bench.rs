//! Benchmarks for curve evaluation.
//!
//! Run with: cargo bench
//!
//! Curve sampling sits on the playback hot path: every sounding note
//! streams up to three curves at the configured step rate, so a single
//! `evaluate` call must stay comfortably cheap.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use cueflow::curve::{evaluate, CurvePoint};

/// Keyframe counts from a sparse hand-drawn curve up to a dense
/// recorded gesture.
const CURVE_SIZES: &[usize] = &[2, 8, 64, 512];

fn make_curve(points: usize) -> Vec<CurvePoint> {
    (0..points)
        .map(|i| {
            let t = i as f64 / (points - 1) as f64;
            CurvePoint::with_handles(t * 8.0, (t * std::f64::consts::TAU).sin(), 0.42, 0.0, 0.58, 1.0)
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("curve/evaluate");

    for &size in CURVE_SIZES {
        let curve = make_curve(size);

        group.bench_with_input(BenchmarkId::new("mid_segment", size), &size, |b, _| {
            b.iter(|| evaluate(black_box(3.7), black_box(&curve)))
        });

        group.bench_with_input(BenchmarkId::new("sweep", size), &size, |b, _| {
            b.iter(|| {
                let mut acc = 0.0;
                for i in 0..32 {
                    acc += evaluate(black_box(i as f64 * 0.25), black_box(&curve));
                }
                acc
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
