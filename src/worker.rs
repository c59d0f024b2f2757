//! The program every worker runs.
//!
//! Rank 0 is the ingestion point: it alone is handed the dataset and the
//! initial centroids. Everything else is symmetric. All workers make the same
//! sequence of collective calls because the only value steering the loop, the
//! global squared error, comes out of an all-reduce.

use crate::assign::{assign_local, PartialStats};
use crate::collective::Communicator;
use crate::config::KMeansConfig;
use crate::convergence::{update_centroids, ConvergenceController, RunState};
use crate::error::KMeansError;
use crate::partition::partition;
use ndarray::Array1;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Rank that owns the dataset and initial centroids before distribution
pub const ROOT: usize = 0;

/// Run parameters fixed by the root before the first iteration
#[derive(Debug, Clone, Copy)]
struct RunHeader {
    n: usize,
    k: usize,
    max_iters: usize,
    tol: f64,
    collect_labels: bool,
}

/// What one worker holds when the run terminates
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub rank: usize,
    /// This worker's centroid replica
    pub centroids: Array1<f64>,
    /// Final global squared error
    pub sse: f64,
    /// Completed iterations, including a converging one
    pub n_iterations: usize,
    /// Global squared error after each iteration
    pub sse_history: Vec<f64>,
    pub state: RunState,
    /// Size of this worker's chunk
    pub n_local: usize,
    /// All assignments in original point order (root only, when collected)
    pub labels: Option<Vec<usize>>,
    pub comm_time: Duration,
}

/// Execute one worker's share of a run.
///
/// Only [`ROOT`] passes `Some` for `dataset` and `init_centroids`. Any error
/// aborts the group so no peer is left waiting in a collective.
pub fn run_worker<C: Communicator>(
    comm: &C,
    dataset: Option<Arc<Array1<f64>>>,
    init_centroids: Option<Array1<f64>>,
    config: &KMeansConfig,
) -> Result<WorkerOutcome, KMeansError> {
    let result = worker_loop(comm, dataset, init_centroids, config);
    if let Err(e) = &result {
        comm.abort(&e.to_string());
    }
    result
}

fn worker_loop<C: Communicator>(
    comm: &C,
    dataset: Option<Arc<Array1<f64>>>,
    init_centroids: Option<Array1<f64>>,
    config: &KMeansConfig,
) -> Result<WorkerOutcome, KMeansError> {
    let rank = comm.rank();

    let header = match (&dataset, &init_centroids) {
        (Some(data), Some(centroids)) if rank == ROOT => Some(RunHeader {
            n: data.len(),
            k: centroids.len(),
            max_iters: config.max_iters,
            tol: config.tol,
            collect_labels: config.collect_labels,
        }),
        _ => None,
    };
    let header = comm.broadcast(ROOT, header)?;
    let mut centroids = comm.broadcast(ROOT, init_centroids)?;

    let chunks = partition(header.n, comm.world_size())?;
    let local = comm.scatter(ROOT, dataset, &chunks)?;
    let n_local = local.len();

    debug!(
        rank,
        n_local,
        offset = chunks[rank].offset,
        k = header.k,
        "worker initialised"
    );

    let mut labels = vec![0usize; n_local];
    let mut controller = ConvergenceController::new(header.max_iters, header.tol);
    let mut sse_history = Vec::with_capacity(header.max_iters.min(1024));
    let mut global = PartialStats::zeros(header.k);

    while !controller.state().is_terminal() {
        let local_stats = assign_local(&local.view(), &centroids.view(), &mut labels);
        trace!(rank, local_sse = local_stats.sse, "local assignment done");

        global = comm.all_reduce(local_stats)?;
        debug_assert_eq!(global.n_points(), header.n as u64);

        let empty_clusters = update_centroids(&global, &mut centroids);
        sse_history.push(global.sse);
        let state = controller.observe(global.sse);

        if rank == ROOT {
            let iteration = controller.iteration();
            let rel_change = controller.last_change();
            if config.verbose {
                info!(iteration, sse = global.sse, ?rel_change, empty_clusters, "iteration");
                match state {
                    RunState::Converged => {
                        info!(iterations = iteration, sse = global.sse, "converged");
                    }
                    RunState::Exhausted => {
                        info!(iterations = iteration, sse = global.sse, "iteration budget exhausted");
                    }
                    RunState::Running => {}
                }
            } else {
                debug!(iteration, sse = global.sse, ?rel_change, empty_clusters, "iteration");
            }
        }
    }

    let labels = if header.collect_labels {
        let gathered = comm.all_gather(Arc::new(labels))?;
        (rank == ROOT).then(|| {
            gathered
                .iter()
                .flat_map(|l| l.iter().copied())
                .collect::<Vec<usize>>()
        })
    } else {
        None
    };

    Ok(WorkerOutcome {
        rank,
        centroids,
        sse: global.sse,
        n_iterations: controller.iteration(),
        sse_history,
        state: controller.state(),
        n_local,
        labels,
        comm_time: comm.comm_time(),
    })
}
