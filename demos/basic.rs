//! Basic example demonstrating distkmeans-rs usage
//!
//! Run with: cargo run --example basic --release

use distkmeans_rs::{generate_dataset, DistributedKMeans, KMeansConfig};

fn main() {
    println!("=== distkmeans-rs example ===\n");

    let n_samples = 100_000;
    let n_clusters = 5;
    let n_workers = 4;

    println!("Generating {} samples around {} centers...", n_samples, n_clusters);
    let (data, init) = generate_dataset(n_samples, n_clusters, 42).expect("Generation failed");

    println!("Initial centroids:");
    for (i, c) in init.iter().enumerate() {
        println!("  Cluster {}: {:.4}", i, c);
    }
    println!();

    let config = KMeansConfig::new(n_workers)
        .with_max_iters(100)
        .with_tol(1e-6);

    println!("Running k-means with {} workers...\n", n_workers);

    let mut kmeans = DistributedKMeans::with_config(config);
    let result = kmeans
        .fit(&data.view(), &init.view())
        .expect("Clustering failed");

    println!(
        "Finished after {} iterations ({:?}), SSE = {:.4}",
        result.n_iterations, result.state, result.sse
    );
    println!("\nLearned centroids:");
    for (i, c) in result.centroids.iter().enumerate() {
        println!("  Centroid {}: {:.4}", i, c);
    }
    println!();

    let labels = result.labels.expect("labels were collected");
    let mut cluster_counts = vec![0usize; n_clusters];
    for &label in &labels {
        cluster_counts[label] += 1;
    }

    println!("Cluster distribution:");
    for (i, count) in cluster_counts.iter().enumerate() {
        println!(
            "  Cluster {}: {} samples ({:.1}%)",
            i,
            count,
            (*count as f64 / n_samples as f64) * 100.0
        );
    }
    println!();

    println!("First 10 sample assignments:");
    for i in 0..10 {
        println!("  Sample {} at {:.3} -> Cluster {}", i, data[i], labels[i]);
    }

    println!("\n=== Done! ===");
}
