use crate::assign::PartialStats;
use ndarray::Array1;

/// Lifecycle of a run. `Converged` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Relative change of the squared error fell below the tolerance
    Converged,
    /// The iteration budget ran out without convergence (not an error)
    Exhausted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

/// Recompute centroids from global statistics.
///
/// Clusters that received no points keep their previous centroid; they are
/// never reseeded. Returns the number of such empty clusters.
pub fn update_centroids(global: &PartialStats, centroids: &mut Array1<f64>) -> usize {
    debug_assert_eq!(global.k(), centroids.len());
    let mut empty = 0;

    for (c, centroid) in centroids.iter_mut().enumerate() {
        let count = global.counts[c];
        if count > 0 {
            *centroid = global.sums[c] / count as f64;
        } else {
            empty += 1;
        }
    }

    empty
}

/// `|sse - prev| / prev`, with the denominator replaced by 1 when `prev <= 0`
#[inline]
pub fn relative_change(sse: f64, prev: f64) -> f64 {
    let denom = if prev > 0.0 { prev } else { 1.0 };
    (sse - prev).abs() / denom
}

/// Decides when to stop, from the global squared error alone.
///
/// Every worker feeds it the same all-reduced value, so every worker reaches
/// the same decision on the same iteration.
#[derive(Debug, Clone)]
pub struct ConvergenceController {
    max_iters: usize,
    tol: f64,
    iteration: usize,
    prev_sse: Option<f64>,
    last_change: Option<f64>,
    state: RunState,
}

impl ConvergenceController {
    pub fn new(max_iters: usize, tol: f64) -> Self {
        Self {
            max_iters,
            tol,
            iteration: 0,
            prev_sse: None,
            last_change: None,
            state: RunState::Running,
        }
    }

    /// Record the squared error of the iteration that just completed and
    /// return the resulting state.
    ///
    /// The completed iteration is always counted, including the one that
    /// converges. The first iteration never converges.
    pub fn observe(&mut self, sse: f64) -> RunState {
        if self.state.is_terminal() {
            return self.state;
        }

        let change = self.prev_sse.map(|prev| relative_change(sse, prev));
        self.iteration += 1;
        self.prev_sse = Some(sse);
        self.last_change = change;

        self.state = match change {
            Some(rel) if rel < self.tol => RunState::Converged,
            _ if self.iteration >= self.max_iters => RunState::Exhausted,
            _ => RunState::Running,
        };
        self.state
    }

    /// Number of completed iterations
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Relative change computed by the last `observe`, `None` on the first iteration
    pub fn last_change(&self) -> Option<f64> {
        self.last_change
    }

    pub fn state(&self) -> RunState {
        self.state
    }
}
