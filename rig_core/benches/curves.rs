use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rig_core::CurveThresholdTracker;
use rig_core::session::Curve;

fn full_curve_set() -> Vec<Curve> {
    (0..20)
        .map(|i| Curve {
            label: format!("curve-{i}"),
            distance_mm: 25.0 * f64::from(i + 1),
        })
        .collect()
}

// One insertion stroke sampled every 2.5 mm.
fn stroke() -> Vec<f64> {
    (0..=200).map(|i| f64::from(i) * 2.5).collect()
}

pub fn bench_curve_evaluation(c: &mut Criterion) {
    let curves = full_curve_set();
    let path = stroke();
    c.bench_function("curves/evaluate_full_stroke", |b| {
        b.iter_batched(
            || CurveThresholdTracker::new(&curves),
            |mut t| {
                for (i, d) in path.iter().enumerate() {
                    black_box(t.evaluate(*d, i as u64));
                }
                t
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_curve_evaluation);
criterion_main!(benches);
