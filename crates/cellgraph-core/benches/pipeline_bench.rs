//! # Pipeline Benchmarks
//!
//! Graph building, propagation, segmentation and training on simulated
//! networks.
//!
//! Run with: `cargo bench -p cellgraph-core`

use cellgraph_core::primitives::KPI_DIM;
use cellgraph_core::{
    ClassifierTrainer, CongestionLabeler, ConnectivityEdge, EntitySnapshot, GraphBuilder,
    HeteroGraph, HeteroPropagator, RelationKind, Segmenter, Simulator, WeightInit,
};
use chrono::{NaiveDate, NaiveDateTime};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date")
}

/// Snapshots of a simulated ring network with `size / 4` chords.
fn simulated(size: u64) -> (Vec<EntitySnapshot>, Vec<ConnectivityEdge>) {
    let simulator = Simulator::new(size, 42).expect("simulator");
    let snapshots = simulator
        .rows(epoch())
        .into_iter()
        .map(|row| row.into_record().to_snapshot())
        .collect();
    (snapshots, simulator.edges((size / 4) as usize))
}

fn simulated_graph(size: u64) -> (Vec<EntitySnapshot>, HeteroGraph) {
    let (snapshots, edges) = simulated(size);
    let (graph, _) = GraphBuilder::default()
        .build(&snapshots, &edges)
        .expect("build");
    (snapshots, graph)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");

    for size in [100u64, 1000, 10000].iter() {
        let (snapshots, edges) = simulated(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(GraphBuilder::default().build(&snapshots, &edges)));
        });
    }

    group.finish();
}

fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate");

    for size in [100u64, 1000, 10000].iter() {
        let (_, graph) = simulated_graph(*size);
        let propagator = HeteroPropagator::new(KPI_DIM, KPI_DIM, &WeightInit::default());

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(propagator.propagate(&graph)));
        });
    }

    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    for size in [100u64, 1000, 10000].iter() {
        let (_, graph) = simulated_graph(*size);
        let embeddings = HeteroPropagator::new(KPI_DIM, KPI_DIM, &WeightInit::default())
            .propagate(&graph)
            .expect("propagate")
            .device;
        let segmenter = Segmenter::default();

        group.bench_with_input(BenchmarkId::new("partition", size), size, |b, _| {
            b.iter(|| {
                black_box(segmenter.partition(graph.len(), graph.edges(RelationKind::ConnectedTo)))
            });
        });

        group.bench_with_input(BenchmarkId::new("segment", size), size, |b, _| {
            b.iter(|| black_box(segmenter.segment(&graph, &embeddings)));
        });
    }

    group.finish();
}

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.sample_size(10);

    for size in [100u64, 1000].iter() {
        let (snapshots, graph) = simulated_graph(*size);
        let labels = CongestionLabeler::default().label_all(&snapshots);
        let embeddings = HeteroPropagator::new(KPI_DIM, KPI_DIM, &WeightInit::default())
            .propagate(&graph)
            .expect("propagate")
            .device;
        let trainer = ClassifierTrainer::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(trainer.train(&embeddings, &labels)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_propagate,
    bench_segment,
    bench_train
);
criterion_main!(benches);
