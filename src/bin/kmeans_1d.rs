//! Command-line driver for distributed 1-D k-means
//!
//! Usage:
//!   `kmeans-1d run <data> <centroids> [--max-iters N] [--eps E] [--workers P]
//!                  [--out-assign PATH] [--out-centroids PATH] [--verbose]`
//!   `kmeans-1d generate [--n N] [--k K] [--seed S] [--output-dir DIR]`

use clap::{Parser, Subcommand};
use distkmeans_rs::io::{read_column, write_column, write_labels, Report};
use distkmeans_rs::{generate_dataset, DistributedKMeans, KMeansConfig};
use std::path::PathBuf;
use std::thread;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kmeans-1d")]
#[command(about = "1-D k-means across a fixed set of lockstep workers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a dataset starting from the given centroids
    Run {
        /// One value per line (or .npy)
        data: PathBuf,

        /// Initial centroids, one per line (or .npy); k is their count
        centroids: PathBuf,

        /// Maximum number of iterations
        #[arg(long, default_value_t = 50)]
        max_iters: usize,

        /// Relative squared-error change below which the run stops
        #[arg(long, default_value_t = 1e-4)]
        eps: f64,

        /// Number of workers (defaults to the available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write per-point cluster assignments here
        #[arg(long)]
        out_assign: Option<PathBuf>,

        /// Write final centroids here
        #[arg(long)]
        out_centroids: Option<PathBuf>,

        /// Log every iteration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a synthetic dataset and initial centroids
    Generate {
        /// Number of points
        #[arg(short, long, default_value_t = 1_000_000)]
        n: usize,

        /// Number of clusters
        #[arg(short, long, default_value_t = 16)]
        k: usize,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Directory receiving data.csv and initial_centroids.csv
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            centroids,
            max_iters,
            eps,
            workers,
            out_assign,
            out_centroids,
            verbose,
        } => {
            init_logging(verbose);

            let n_workers = match workers {
                Some(p) => p,
                None => thread::available_parallelism().map(|p| p.get()).unwrap_or(1),
            };

            let data = read_column(&data)?;
            let init = read_column(&centroids)?;

            let config = KMeansConfig::new(n_workers)
                .with_max_iters(max_iters)
                .with_tol(eps)
                .with_collect_labels(out_assign.is_some())
                .with_verbose(verbose);

            let mut kmeans = DistributedKMeans::with_config(config.clone());
            let result = kmeans.fit(&data.view(), &init.view())?;

            print!("{}", Report::new(&result, data.len(), &config));

            if let Some(path) = out_centroids {
                write_column(&path, &result.centroids.view())?;
                eprintln!("Saved centroids to {}", path.display());
            }
            if let (Some(path), Some(labels)) = (out_assign, result.labels.as_deref()) {
                write_labels(&path, labels)?;
                eprintln!("Saved assignments to {}", path.display());
            }
        }

        Commands::Generate {
            n,
            k,
            seed,
            output_dir,
        } => {
            init_logging(false);

            eprintln!("Generating N={} points and K={} centroids...", n, k);
            let (data, centroids) = generate_dataset(n, k, seed)?;

            let centroids_path = output_dir.join("initial_centroids.csv");
            write_column(&centroids_path, &centroids.view())?;
            eprintln!("Saved centroids to {}", centroids_path.display());

            let data_path = output_dir.join("data.csv");
            write_column(&data_path, &data.view())?;
            eprintln!("Saved data to {}", data_path.display());
        }
    }

    Ok(())
}
