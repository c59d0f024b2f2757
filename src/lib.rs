//! # distkmeans-rs
//!
//! Iterative 1-D k-means over a dataset partitioned across a fixed set of
//! cooperating workers, kept in lockstep by collective reductions.
//!
//! ## How a run works
//!
//! - **Partitioning**: the `n` points are split into `n_workers` contiguous
//!   chunks whose sizes differ by at most one
//! - **Local assignment**: each worker assigns its own points to the nearest
//!   centroid (ties go to the lowest index) and accumulates per-cluster sums,
//!   counts and squared error
//! - **All-reduce**: the partial sums are combined in rank order on every
//!   worker, so every replica sees the same bits
//! - **Update and convergence**: every worker recomputes the centroids and
//!   evaluates the relative change of the squared error itself; empty
//!   clusters keep their previous centroid
//!
//! Each worker is one OS thread and holds a private centroid replica. No state
//! is shared between workers outside the collectives.
//!
//! ## Example
//!
//! ```rust
//! use distkmeans_rs::{DistributedKMeans, KMeansConfig};
//! use ndarray::array;
//!
//! let data = array![1.0, 1.1, 5.0, 5.2, 9.0];
//! let init = array![0.0, 4.0, 8.0];
//!
//! let config = KMeansConfig::new(2).with_max_iters(20).with_tol(1e-6);
//! let mut kmeans = DistributedKMeans::with_config(config);
//! let result = kmeans.fit(&data.view(), &init.view()).unwrap();
//!
//! assert!(result.converged());
//! assert_eq!(result.sse_history.len(), result.n_iterations);
//! ```
//!
//! ## Synthetic data
//!
//! ```rust
//! use distkmeans_rs::{generate_dataset, DistributedKMeans};
//!
//! let (data, init) = generate_dataset(10_000, 8, 42).unwrap();
//! let mut kmeans = DistributedKMeans::new(4);
//! let result = kmeans.fit(&data.view(), &init.view()).unwrap();
//! assert_eq!(result.labels.map(|l| l.len()), Some(10_000));
//! ```

pub mod assign;
pub mod collective;
mod config;
pub mod convergence;
mod error;
mod generate;
pub mod io;
mod kmeans;
pub mod partition;
pub mod worker;

pub use config::KMeansConfig;
pub use convergence::RunState;
pub use error::KMeansError;
pub use generate::generate_dataset;
pub use kmeans::{DistributedKMeans, KMeansResult};
