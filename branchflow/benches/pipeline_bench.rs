//! Benchmarks for stage tree execution.

use branchflow::prelude::*;
use branchflow::testing::{Increment, Parity, ToText};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn frozen_tree() -> Stage {
    let mut stage = Stage::init(Increment::default())
        .and_then(|root| {
            root.attach([
                Stage::init(ToText::default())?,
                Stage::init(Parity)?,
                Stage::duplicate(),
            ])
        })
        .expect("benchmark tree is well formed");
    stage.freeze().expect("benchmark tree freezes");
    stage
}

fn pipeline_benchmark(c: &mut Criterion) {
    let stage = frozen_tree();
    let input = [ArgumentValue::new(7_i32)];

    c.bench_function("run_fanout", |b| {
        b.iter(|| black_box(stage.run(black_box(&input))))
    });

    c.bench_function("attach_and_freeze", |b| {
        b.iter(|| black_box(frozen_tree()))
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
