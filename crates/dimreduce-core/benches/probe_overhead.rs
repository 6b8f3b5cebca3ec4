//! Per-call overhead of locating, probing and selecting a backend.
//!
//! Every call re-runs the filesystem search and the loader, so these numbers
//! bound the fixed cost added to each decomposition.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dimreduce_core::{
    buffers::{effective_rank, DecompositionBuffers},
    config::SearchConfig,
    locator::describe_with,
    params::{DecompositionParams, MarshalledParams},
    probe::{CapabilityState, Prober},
    select::select,
    types::{BackendRequest, DecompositionKind, NativeLibrary},
};
use std::time::Duration;

fn bench_locate(c: &mut Criterion) {
    let tmp = tempfile::tempdir().unwrap();
    let config = SearchConfig::builder(tmp.path().join("pkg")).build();

    let mut group = c.benchmark_group("locate");
    group.measurement_time(Duration::from_secs(5));
    for library in [NativeLibrary::Gpu, NativeLibrary::Cpu] {
        group.bench_with_input(
            BenchmarkId::new("missing", library.stem()),
            &library,
            |b, &library| b.iter(|| black_box(describe_with(library, &config))),
        );
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let gpu = CapabilityState::built_only("no CUDA devices detected");
    let cpu = CapabilityState::runnable(0);

    c.bench_function("select_pure", |b| {
        b.iter(|| select(black_box(BackendRequest::Auto), &gpu, &cpu))
    });

    let tmp = tempfile::tempdir().unwrap();
    let prober = Prober::new(
        SearchConfig::builder(tmp.path().join("pkg")).build(),
        dimreduce_core::probe::CudaDriver,
    );
    c.bench_function("select_backend_auto_nothing_built", |b| {
        b.iter(|| prober.select_backend(black_box(BackendRequest::Auto)))
    });
}

fn bench_marshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshal");
    for &(rows, cols) in &[(100usize, 10usize), (10_000, 100), (100_000, 512)] {
        let params = DecompositionParams::builder(DecompositionKind::Pca)
            .n_components(16)
            .random_state(0)
            .build();
        let k = effective_rank(params.n_components, rows, cols);
        group.bench_with_input(
            BenchmarkId::new("params_and_buffers", format!("{rows}x{cols}")),
            &(rows, cols),
            |b, &(rows, cols)| {
                b.iter(|| {
                    let raw = MarshalledParams::new(&params, rows, cols, k).unwrap();
                    let buffers = DecompositionBuffers::zeroed(DecompositionKind::Pca, rows, cols, k);
                    black_box((raw, buffers))
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_locate, bench_select, bench_marshal);
criterion_main!(benches);
