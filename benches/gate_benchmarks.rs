use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spikegate::{Gate, GateConfig};

fn benchmark_record(c: &mut Criterion) {
    let gate = Gate::new(GateConfig::default()).expect("Failed to create gate");

    c.bench_function("gate_record", |b| {
        b.iter(|| gate.record(black_box("/api/users")))
    });
}

fn benchmark_is_allowed(c: &mut Criterion) {
    let gate = Gate::new(GateConfig::default()).expect("Failed to create gate");

    // warm the current bucket so the detector has something to scan
    for _ in 0..50 {
        gate.record("/api/users");
    }

    c.bench_function("gate_is_allowed", |b| {
        b.iter(|| black_box(gate.is_allowed(black_box("/api/users"))))
    });
}

fn benchmark_record_and_check(c: &mut Criterion) {
    let gate = Gate::new(GateConfig::default()).expect("Failed to create gate");

    c.bench_function("gate_record_and_check", |b| {
        b.iter(|| {
            gate.record(black_box("/api/users"));
            black_box(gate.is_allowed(black_box("/api/users")))
        })
    });
}

criterion_group!(
    benches,
    benchmark_record,
    benchmark_is_allowed,
    benchmark_record_and_check
);
criterion_main!(benches);
