use crate::assign::predict_labels;
use crate::collective::{AbortOnPanic, Communicator, LocalCommunicator};
use crate::config::KMeansConfig;
use crate::convergence::RunState;
use crate::error::KMeansError;
use crate::worker::{run_worker, WorkerOutcome, ROOT};
use ndarray::{Array1, ArrayView1};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Result of a distributed k-means run
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Final centroids (k,), identical on every worker
    pub centroids: Array1<f64>,
    /// Final global squared error
    pub sse: f64,
    /// Completed iterations, including the converging one
    pub n_iterations: usize,
    /// Global squared error after each iteration (length `n_iterations`)
    pub sse_history: Vec<f64>,
    /// Per-point assignments in original order, if collected
    pub labels: Option<Vec<usize>>,
    /// `Converged` or `Exhausted`
    pub state: RunState,
    pub n_workers: usize,
    /// Time the root worker spent inside collectives
    pub comm_time: Duration,
    /// Wall-clock time of the whole run, worker start-up included
    pub elapsed: Duration,
}

impl KMeansResult {
    pub fn converged(&self) -> bool {
        self.state == RunState::Converged
    }
}

/// 1-D k-means run by a fixed set of lockstep workers.
///
/// The dataset is split into `n_workers` contiguous chunks. Each iteration,
/// every worker assigns its own points, the partial sums are all-reduced, and
/// each worker recomputes the centroids from the same global sums. The
/// replicas therefore stay bit-identical without any shared mutable state.
///
/// # Example
///
/// ```
/// use distkmeans_rs::DistributedKMeans;
/// use ndarray::array;
///
/// let data = array![1.0, 1.1, 5.0, 5.2, 9.0];
/// let init = array![0.0, 4.0, 8.0];
///
/// let mut kmeans = DistributedKMeans::new(2);
/// let result = kmeans.fit(&data.view(), &init.view()).unwrap();
///
/// assert_eq!(result.labels, Some(vec![0, 0, 1, 1, 2]));
/// assert!((result.centroids[0] - 1.05).abs() < 1e-12);
/// ```
pub struct DistributedKMeans {
    /// Run configuration
    config: KMeansConfig,

    /// Centroids from the last successful fit
    centroids: Option<Array1<f64>>,
}

impl DistributedKMeans {
    /// Create a new instance with `n_workers` workers and default settings.
    pub fn new(n_workers: usize) -> Self {
        Self {
            config: KMeansConfig::new(n_workers),
            centroids: None,
        }
    }

    /// Create a new instance with a custom configuration.
    pub fn with_config(config: KMeansConfig) -> Self {
        Self {
            config,
            centroids: None,
        }
    }

    /// Run k-means on `data` starting from `init_centroids`.
    ///
    /// The number of clusters is `init_centroids.len()`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `data` or `init_centroids` is empty or holds a non-finite value
    /// - the configuration is invalid (zero workers, zero iterations, NaN tolerance)
    /// - a worker fails mid-run, or the replicas disagree at the end
    pub fn fit(
        &mut self,
        data: &ArrayView1<f64>,
        init_centroids: &ArrayView1<f64>,
    ) -> Result<KMeansResult, KMeansError> {
        check_values(data, "dataset")?;
        check_values(init_centroids, "initial centroids")?;
        self.config.validate(init_centroids.len())?;

        let start = Instant::now();
        let outcomes = spawn_workers(
            &self.config,
            Arc::new(data.to_owned()),
            init_centroids.to_owned(),
        )?;
        let elapsed = start.elapsed();

        check_replicas(&outcomes)?;

        let root = outcomes
            .into_iter()
            .find(|o| o.rank == ROOT)
            .ok_or_else(|| KMeansError::Desynchronized("no outcome from root".to_string()))?;

        info!(
            n_workers = self.config.n_workers,
            iterations = root.n_iterations,
            sse = root.sse,
            state = ?root.state,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "run finished"
        );

        self.centroids = Some(root.centroids.clone());

        Ok(KMeansResult {
            centroids: root.centroids,
            sse: root.sse,
            n_iterations: root.n_iterations,
            sse_history: root.sse_history,
            labels: root.labels,
            state: root.state,
            n_workers: self.config.n_workers,
            comm_time: root.comm_time,
            elapsed,
        })
    }

    /// Assign points to the centroids of the last fit.
    pub fn predict(&self, data: &ArrayView1<f64>) -> Result<Vec<usize>, KMeansError> {
        let centroids = self.centroids.as_ref().ok_or(KMeansError::NotFitted)?;
        Ok(predict_labels(data, &centroids.view()))
    }

    /// Get the centroids of the last fit, `None` before the first fit.
    pub fn centroids(&self) -> Option<&Array1<f64>> {
        self.centroids.as_ref()
    }

    /// Get the number of clusters of the fitted model.
    pub fn k(&self) -> Option<usize> {
        self.centroids.as_ref().map(|c| c.len())
    }

    /// Get the configuration.
    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }
}

fn check_values(values: &ArrayView1<f64>, what: &str) -> Result<(), KMeansError> {
    if values.is_empty() {
        return Err(KMeansError::InvalidInput(format!("{} is empty", what)));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(KMeansError::InvalidInput(format!(
            "{} holds a non-finite value at index {}",
            what, i
        )));
    }
    Ok(())
}

/// Run one worker per OS thread and wait for all of them.
fn spawn_workers(
    config: &KMeansConfig,
    dataset: Arc<Array1<f64>>,
    init_centroids: Array1<f64>,
) -> Result<Vec<WorkerOutcome>, KMeansError> {
    let comms = LocalCommunicator::new_group(config.n_workers);
    let mut init_centroids = Some(init_centroids);

    let results: Vec<Result<WorkerOutcome, KMeansError>> = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(comms.len());

        for comm in &comms {
            let rank = comm.rank();
            let (dataset, init) = if rank == ROOT {
                (Some(dataset.clone()), init_centroids.take())
            } else {
                (None, None)
            };

            let spawned = thread::Builder::new()
                .name(format!("kmeans-worker-{}", rank))
                .spawn_scoped(scope, move || {
                    let _guard = AbortOnPanic(comm);
                    run_worker(comm, dataset, init, config)
                });

            match spawned {
                Ok(handle) => handles.push((rank, handle)),
                Err(e) => {
                    comm.abort("failed to spawn worker thread");
                    return vec![Err(KMeansError::Io(e))];
                }
            }
        }

        handles
            .into_iter()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(KMeansError::WorkerFailed {
                        rank,
                        reason: "worker panicked".to_string(),
                    })
                })
            })
            .collect()
    });

    let mut outcomes = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        return Ok(outcomes);
    }

    // Peers of a failed worker only report that the group was aborted;
    // surface the original failure instead.
    let root_cause = errors
        .iter()
        .position(|e| !matches!(e, KMeansError::WorkerFailed { .. }))
        .unwrap_or(0);
    Err(errors.swap_remove(root_cause))
}

fn same_bits(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Every replica must end the run with the same bits.
fn check_replicas(outcomes: &[WorkerOutcome]) -> Result<(), KMeansError> {
    let Some(first) = outcomes.first() else {
        return Err(KMeansError::Desynchronized("no worker outcomes".to_string()));
    };

    for other in &outcomes[1..] {
        let same_centroids = same_bits(&first.centroids.to_vec(), &other.centroids.to_vec());

        if !same_centroids
            || first.sse.to_bits() != other.sse.to_bits()
            || first.n_iterations != other.n_iterations
            || first.state != other.state
            || !same_bits(&first.sse_history, &other.sse_history)
        {
            return Err(KMeansError::Desynchronized(format!(
                "rank {} and rank {} disagree after {} / {} iterations",
                first.rank, other.rank, first.n_iterations, other.n_iterations
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    #[test]
    fn test_distributed_kmeans_new() {
        let kmeans = DistributedKMeans::new(4);
        assert_eq!(kmeans.config().n_workers, 4);
        assert!(kmeans.centroids().is_none());
        assert!(kmeans.k().is_none());
    }

    #[test]
    fn test_fit_reference_scenario() {
        let data = array![1.0, 1.1, 5.0, 5.2, 9.0];
        let init = array![0.0, 4.0, 8.0];
        let mut kmeans = DistributedKMeans::new(2);

        let result = kmeans.fit(&data.view(), &init.view()).unwrap();

        assert_relative_eq!(result.centroids[0], 1.05, epsilon = 1e-12);
        assert_relative_eq!(result.centroids[1], 5.1, epsilon = 1e-12);
        assert_relative_eq!(result.centroids[2], 9.0, epsilon = 1e-12);
        assert!(result.converged());
        assert_eq!(result.sse_history.len(), result.n_iterations);
        assert_eq!(kmeans.k(), Some(3));
    }

    #[test]
    fn test_fit_rejects_empty_inputs() {
        let mut kmeans = DistributedKMeans::new(2);
        let empty = Array1::<f64>::zeros(0);
        let init = array![0.0];

        assert!(matches!(
            kmeans.fit(&empty.view(), &init.view()),
            Err(KMeansError::InvalidInput(_))
        ));
        assert!(matches!(
            kmeans.fit(&init.view(), &empty.view()),
            Err(KMeansError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_rejects_non_finite() {
        let mut kmeans = DistributedKMeans::new(2);
        let data = array![1.0, f64::NAN];
        let init = array![0.0];
        assert!(matches!(
            kmeans.fit(&data.view(), &init.view()),
            Err(KMeansError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_rejects_zero_workers() {
        let mut kmeans = DistributedKMeans::new(0);
        let data = array![1.0, 2.0];
        let init = array![0.0];
        assert!(matches!(
            kmeans.fit(&data.view(), &init.view()),
            Err(KMeansError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let kmeans = DistributedKMeans::new(2);
        let data = array![1.0];
        assert!(matches!(kmeans.predict(&data.view()), Err(KMeansError::NotFitted)));
    }

    #[test]
    fn test_predict_after_fit() {
        let data = Array1::random(400, Uniform::new(0.0, 10.0));
        let init = array![2.0, 8.0];
        let mut kmeans = DistributedKMeans::new(3);
        let result = kmeans.fit(&data.view(), &init.view()).unwrap();

        let labels = kmeans.predict(&data.view()).unwrap();
        assert_eq!(labels.len(), 400);
        assert!(labels.iter().all(|&l| l < 2));
        assert!(result.labels.is_some());
    }

    #[test]
    fn test_check_replicas_detects_divergence() {
        let outcome = WorkerOutcome {
            rank: 0,
            centroids: array![1.0, 2.0],
            sse: 1.0,
            n_iterations: 3,
            sse_history: vec![3.0, 2.0, 1.0],
            state: RunState::Converged,
            n_local: 2,
            labels: None,
            comm_time: Duration::ZERO,
        };
        let mut drifted = outcome.clone();
        drifted.rank = 1;
        drifted.centroids[1] = 2.0 + f64::EPSILON * 2.0;

        // Same final state, but the trajectories differed along the way
        let mut rejoined = outcome.clone();
        rejoined.rank = 1;
        rejoined.sse_history[1] = 2.5;

        assert!(check_replicas(&[outcome.clone(), outcome.clone()]).is_ok());
        assert!(matches!(
            check_replicas(&[outcome.clone(), drifted]),
            Err(KMeansError::Desynchronized(_))
        ));
        assert!(matches!(
            check_replicas(&[outcome, rejoined]),
            Err(KMeansError::Desynchronized(_))
        ));
    }
}
