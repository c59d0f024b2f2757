use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use distkmeans_rs::assign::assign_local;
use distkmeans_rs::{generate_dataset, DistributedKMeans, KMeansConfig};
use std::time::Duration;

fn benchmark_kmeans_varying_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_workers");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let n_samples = 200_000;
    let (data, init) = generate_dataset(n_samples, 16, 42).unwrap();

    for n_workers in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(n_samples as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(n_workers),
            n_workers,
            |b, &n_workers| {
                let config = KMeansConfig::new(n_workers)
                    .with_max_iters(10)
                    .with_tol(-1.0)
                    .with_collect_labels(false);

                b.iter(|| {
                    let mut kmeans = DistributedKMeans::with_config(config.clone());
                    kmeans
                        .fit(black_box(&data.view()), black_box(&init.view()))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn benchmark_kmeans_varying_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_clusters");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let n_samples = 100_000;
    let cluster_counts = [4, 16, 64];

    for k in cluster_counts.iter() {
        group.throughput(Throughput::Elements(*k as u64));
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, &k| {
            let (data, init) = generate_dataset(n_samples, k, 42).unwrap();
            let config = KMeansConfig::new(4)
                .with_max_iters(5)
                .with_tol(-1.0)
                .with_collect_labels(false);

            b.iter(|| {
                let mut kmeans = DistributedKMeans::with_config(config.clone());
                kmeans.fit(black_box(&data.view()), &init.view()).unwrap()
            });
        });
    }
    group.finish();
}

fn benchmark_local_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("assign_local");
    group.sample_size(20);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let sizes = [10_000, 100_000];

    for n in sizes.iter() {
        group.throughput(Throughput::Elements(*n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let (data, init) = generate_dataset(n, 16, 7).unwrap();
            let mut labels = vec![0; n];

            b.iter(|| assign_local(black_box(&data.view()), &init.view(), &mut labels));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_kmeans_varying_workers,
    benchmark_kmeans_varying_clusters,
    benchmark_local_assignment,
);

criterion_main!(benches);
