use crate::collective::Reduce;
use ndarray::{Array1, ArrayView1};

/// Per-worker partial sums for one iteration
///
/// Built fresh by [`assign_local`], combined across workers by an all-reduce,
/// then dropped. The element-wise sum over every worker is the global state
/// the centroid update is computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialStats {
    /// Sum of the values assigned to each cluster (k,)
    pub sums: Array1<f64>,
    /// Number of points assigned to each cluster (k,)
    pub counts: Array1<u64>,
    /// Sum of squared distances from each point to its assigned centroid
    pub sse: f64,
}

impl PartialStats {
    /// All-zero statistics for `k` clusters, the contribution of an empty chunk
    pub fn zeros(k: usize) -> Self {
        Self {
            sums: Array1::zeros(k),
            counts: Array1::zeros(k),
            sse: 0.0,
        }
    }

    pub fn k(&self) -> usize {
        self.sums.len()
    }

    /// Total number of points accounted for
    pub fn n_points(&self) -> u64 {
        self.counts.sum()
    }
}

impl Reduce for PartialStats {
    fn combine(&mut self, other: &Self) {
        debug_assert_eq!(self.k(), other.k());
        self.sums += &other.sums;
        self.counts += &other.counts;
        self.sse += other.sse;
    }
}

/// Find the nearest centroid to `x` by squared distance.
///
/// Linear scan keeping the first strictly smaller distance, so ties go to
/// the lowest index.
#[inline]
pub fn nearest_centroid(x: f64, centroids: &ArrayView1<f64>) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;

    for (j, &c) in centroids.iter().enumerate() {
        let diff = x - c;
        let dist = diff * diff;
        if dist < best_dist {
            best_dist = dist;
            best_idx = j;
        }
    }

    (best_idx, best_dist)
}

/// Assign every local point to its nearest centroid and accumulate partial sums.
///
/// # Arguments
/// * `points` - The worker's slice of the dataset (n_local,), possibly empty
/// * `centroids` - Current centroid replica (k,)
/// * `labels` - Output buffer for the assignments (n_local,)
///
/// # Returns
/// * Per-cluster sums and counts plus the local squared error
pub fn assign_local(
    points: &ArrayView1<f64>,
    centroids: &ArrayView1<f64>,
    labels: &mut [usize],
) -> PartialStats {
    assert_eq!(
        points.len(),
        labels.len(),
        "label buffer must match the number of local points"
    );

    let mut stats = PartialStats::zeros(centroids.len());

    for (&x, label) in points.iter().zip(labels.iter_mut()) {
        let (best, dist) = nearest_centroid(x, centroids);
        *label = best;
        stats.sse += dist;
        stats.sums[best] += x;
        stats.counts[best] += 1;
    }

    stats
}

/// Assign points to fitted centroids without accumulating statistics
pub fn predict_labels(points: &ArrayView1<f64>, centroids: &ArrayView1<f64>) -> Vec<usize> {
    points
        .iter()
        .map(|&x| nearest_centroid(x, centroids).0)
        .collect()
}
