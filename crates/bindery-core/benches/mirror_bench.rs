//! # Mirror Benchmarks
//!
//! Performance benchmarks for network mirroring and parameter derivation.
//!
//! Run with: `cargo bench -p bindery-core`

use bindery_core::connector::SyncContext;
use bindery_core::geometry::build::add_box;
use bindery_core::{
    ExchangeConfig, FsAssetImporter, GeometryModel, ManualScheduler, ModelId, NetworkGraph,
    NetworkMirror, PlanarMeasurements, SemanticGraph, Vec3, WarningLog,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const PIPING: ModelId = ModelId(2);

/// Create a `side` x `side` grid of nodes joined to their right and upper
/// neighbours.
fn create_grid_network(side: usize) -> NetworkGraph {
    let mut network = NetworkGraph::new("grid");
    let root = network.root();
    let mut nodes = Vec::with_capacity(side * side);

    for row in 0..side {
        for column in 0..side {
            let position = Vec3::new(column as f64, row as f64, 0.0);
            let node = network
                .add_node(root, format!("n{row}-{column}"), position)
                .expect("node");
            nodes.push(node);
        }
    }
    for row in 0..side {
        for column in 0..side {
            let here = nodes[row * side + column];
            if column + 1 < side {
                network
                    .add_edge(root, "h", here, nodes[row * side + column + 1])
                    .expect("edge");
            }
            if row + 1 < side {
                network
                    .add_edge(root, "v", here, nodes[(row + 1) * side + column])
                    .expect("edge");
            }
        }
    }
    network
}

struct Fixture {
    semantic: SemanticGraph,
    model: GeometryModel,
    config: ExchangeConfig,
    scheduler: ManualScheduler,
    warnings: WarningLog,
    importer: FsAssetImporter,
}

impl Fixture {
    fn new() -> Self {
        Self {
            semantic: SemanticGraph::new(),
            model: GeometryModel::new(PIPING, "piping"),
            config: ExchangeConfig::default(),
            scheduler: ManualScheduler::new(),
            warnings: WarningLog::new(),
            importer: FsAssetImporter::new(None, &[]),
        }
    }

    fn cx(&mut self) -> SyncContext<'_> {
        SyncContext {
            semantic: &mut self.semantic,
            model: &mut self.model,
            measurements: &PlanarMeasurements,
            importer: &self.importer,
            config: &self.config,
            scheduler: &mut self.scheduler,
            warnings: &mut self.warnings,
        }
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_first_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("mirror_first_update");

    for side in [5, 10, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(side), side, |b, &side| {
            b.iter(|| {
                let mut fixture = Fixture::new();
                let mut mirror = NetworkMirror::new(PIPING, create_grid_network(side));
                mirror.update(&mut fixture.cx()).expect("update");
                black_box(mirror)
            });
        });
    }

    group.finish();
}

fn bench_steady_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("mirror_steady_update");

    for side in [5, 10, 20].iter() {
        let mut fixture = Fixture::new();
        let mut mirror = NetworkMirror::new(PIPING, create_grid_network(*side));
        mirror.update(&mut fixture.cx()).expect("update");

        group.bench_with_input(BenchmarkId::from_parameter(side), side, |b, _| {
            b.iter(|| {
                mirror.update(&mut fixture.cx()).expect("update");
                black_box(mirror.passes())
            });
        });
    }

    group.finish();
}

fn bench_volume_measurements(c: &mut Criterion) {
    use bindery_core::Measurements;

    let mut model = GeometryModel::new(ModelId(1), "rooms");
    let volume = add_box(&mut model, "room", Vec3::ZERO, Vec3::new(4.0, 5.0, 3.0)).expect("box");

    c.bench_function("box_volume_measurements", |b| {
        b.iter(|| black_box(PlanarMeasurements.volume(&model, volume)))
    });
}

criterion_group!(
    benches,
    bench_first_update,
    bench_steady_update,
    bench_volume_measurements
);
criterion_main!(benches);
