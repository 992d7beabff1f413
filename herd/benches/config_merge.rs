//! Benchmarks for configuration resolution and in-memory bootstrap using criterion.
//!
//! These benchmarks measure:
//! - Resolving the merged service map for clusters of growing size
//! - Resolving one role section per node group, as done for every instance
//! - A full bootstrap against in-memory collaborators

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use herd::*;
use herd_testkit::{full_cluster, with_new_workers, Harness};

fn cluster_with_workers(extra: usize) -> Cluster {
    with_new_workers(&full_cluster(), extra).0
}

/// Benchmark: cluster-scope resolution.
///
/// Cluster-computed values look up the manager and name node, so cost grows
/// with the number of node groups rather than the number of instances.
fn bench_resolve_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_cluster");
    let resolver = ConfigResolver::default();

    for extra in [0usize, 50, 500] {
        let cluster = cluster_with_workers(extra);
        group.throughput(Throughput::Elements(cluster.instances().count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(extra), &cluster, |b, cluster| {
            b.iter(|| {
                let merged = resolver
                    .resolve(Some(black_box(cluster)), None)
                    .expect("resolve should succeed");
                black_box(merged);
            });
        });
    }

    group.finish();
}

/// Benchmark: role sections for every node group of the full fixture.
fn bench_role_configs(c: &mut Criterion) {
    let mut group = c.benchmark_group("role_configs");
    let resolver = ConfigResolver::default();
    let cluster = full_cluster();

    group.bench_function("every_group", |b| {
        b.iter(|| {
            for node_group in &cluster.node_groups {
                for role in &node_group.roles {
                    let configs = resolver
                        .get_configs(role.as_str(), None, Some(black_box(node_group)))
                        .expect("get_configs should succeed");
                    black_box(configs);
                }
            }
        });
    });

    group.finish();
}

/// Benchmark: bootstrap end to end with mocked control plane and hosts.
fn bench_bootstrap_in_memory(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime should build");
    let cluster = full_cluster();
    let harness = runtime
        .block_on(Harness::new(&cluster))
        .expect("harness should build");

    let harness = &harness;
    let cluster = &cluster;

    let mut group = c.benchmark_group("bootstrap_in_memory");
    group.sample_size(20);
    group.bench_function("full_cluster", |b| {
        b.to_async(&runtime).iter(|| async move {
            harness.control_plane.clear();
            harness
                .deployer
                .configure_cluster(cluster)
                .await
                .expect("bootstrap should succeed");
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_cluster,
    bench_role_configs,
    bench_bootstrap_in_memory
);
criterion_main!(benches);
