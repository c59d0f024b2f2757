use crate::error::KMeansError;

/// Configuration for a distributed k-means run
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Maximum number of iterations
    pub max_iters: usize,

    /// Convergence tolerance on the relative change of the global squared error.
    /// The run stops once `|sse - prev_sse| / prev_sse < tol` (never on the first
    /// iteration). Set to a negative value to disable early stopping.
    pub tol: f64,

    /// Number of workers the dataset is partitioned across. Fixed for the whole run.
    pub n_workers: usize,

    /// Gather per-point cluster assignments back in original point order
    /// once the run terminates.
    pub collect_labels: bool,

    /// Log every iteration at info level instead of debug
    pub verbose: bool,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iters: 50,
            tol: 1e-4,
            n_workers: 1,
            collect_labels: true,
            verbose: false,
        }
    }
}

impl KMeansConfig {
    /// Create a new configuration with the specified number of workers
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers,
            ..Default::default()
        }
    }

    /// Set the maximum number of iterations
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the number of workers
    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// Enable or disable the final collection of per-point assignments
    pub fn with_collect_labels(mut self, collect_labels: bool) -> Self {
        self.collect_labels = collect_labels;
        self
    }

    /// Set verbose mode
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check the run parameters against the number of clusters `k`.
    ///
    /// Every worker must agree on these before the first collective, so a
    /// rejected configuration aborts the run before any worker starts.
    pub fn validate(&self, k: usize) -> Result<(), KMeansError> {
        if self.n_workers == 0 {
            return Err(KMeansError::InvalidConfig(
                "n_workers must be greater than 0".to_string(),
            ));
        }
        if k == 0 {
            return Err(KMeansError::InvalidConfig(
                "k must be greater than 0".to_string(),
            ));
        }
        if self.max_iters == 0 {
            return Err(KMeansError::InvalidConfig(
                "max_iters must be greater than 0".to_string(),
            ));
        }
        if self.tol.is_nan() {
            return Err(KMeansError::InvalidConfig("tol must not be NaN".to_string()));
        }
        Ok(())
    }
}
