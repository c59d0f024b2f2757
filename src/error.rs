use thiserror::Error;

/// Error types for the distkmeans library
#[derive(Error, Debug)]
pub enum KMeansError {
    /// The dataset or centroid source is empty, missing, or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A run parameter is out of range (worker count, k, max_iters, tol)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker failed mid-run; the whole worker set is torn down
    #[error("Worker {rank} failed: {reason}")]
    WorkerFailed { rank: usize, reason: String },

    /// Centroid replicas disagree after the run
    #[error("Worker replicas diverged: {0}")]
    Desynchronized(String),

    /// Model has not been fitted yet
    #[error("Model has not been fitted. Call fit() first.")]
    NotFitted,

    /// Filesystem failure while reading or writing a column file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `.npy` encode/decode failure
    #[error("npy error: {0}")]
    Npy(String),
}
