//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use labmon_core::core::monitor::{assess_stability, mean_std};
use labmon_core::{BroadcastHub, DeviceSession, InstrumentSimulator, Sample, SimulatorConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn simulator_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulator");
    group.throughput(Throughput::Elements(1));

    group.bench_function("temp_query", |b| {
        let mut sim = InstrumentSimulator::with_rng(&SimulatorConfig::default(), StdRng::seed_from_u64(1));
        b.iter(|| black_box(sim.handle_text(black_box("TEMP?"))))
    });

    group.bench_function("temp_set", |b| {
        let mut sim = InstrumentSimulator::with_rng(&SimulatorConfig::default(), StdRng::seed_from_u64(1));
        b.iter(|| black_box(sim.handle_text(black_box("TEMP:22.5"))))
    });

    group.finish();
}

fn session_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let session = DeviceSession::simulated("bench", &SimulatorConfig::default());
    rt.block_on(session.connect()).unwrap();

    c.bench_function("session_round_trip", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(session.get_temperature().await.unwrap()) })
    });
}

fn stability_benchmark(c: &mut Criterion) {
    let values: Vec<f64> = (0..1000).map(|i| 20.0 + (i % 7) as f64 * 0.1).collect();

    let mut group = c.benchmark_group("stability");
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("mean_std", |b| b.iter(|| black_box(mean_std(black_box(&values)))));

    group.bench_function("assess", |b| {
        b.iter(|| black_box(assess_stability(black_box(&values), 0.5)))
    });

    group.finish();
}

fn broadcast_benchmark(c: &mut Criterion) {
    let hub = BroadcastHub::new();
    let receivers: Vec<_> = (0..16)
        .map(|_| {
            let (tx, rx) = tokio::sync::mpsc::channel(1024);
            hub.subscribe("dev1", tx);
            rx
        })
        .collect();
    let sample = Sample::now(21.0);

    let mut group = c.benchmark_group("broadcast");
    group.throughput(Throughput::Elements(receivers.len() as u64));
    group.bench_function("publish_16", |b| {
        b.iter(|| black_box(hub.publish("dev1", black_box(&sample))))
    });
    group.finish();
}

criterion_group!(
    benches,
    simulator_benchmark,
    session_benchmark,
    stability_benchmark,
    broadcast_benchmark
);
criterion_main!(benches);
