use crate::error::KMeansError;
use ndarray::Array1;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Spread of each synthetic cluster
const CLUSTER_STD: f64 = 2.0;

/// Generate a shuffled 1-D Gaussian mixture and matching initial centroids.
///
/// Centroid `i` sits near `10 * i + 5` (jittered by up to ±1); `n / k` points
/// are drawn around each centroid and any remainder around the first one.
/// The output depends only on `(n, k, seed)`.
///
/// # Returns
/// * `(data, initial_centroids)` with shapes `(n,)` and `(k,)`
pub fn generate_dataset(
    n: usize,
    k: usize,
    seed: u64,
) -> Result<(Array1<f64>, Array1<f64>), KMeansError> {
    if k == 0 {
        return Err(KMeansError::InvalidConfig(
            "k must be greater than 0".to_string(),
        ));
    }
    if n == 0 {
        return Err(KMeansError::InvalidConfig(
            "n must be greater than 0".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let jitter = Array1::random_using(k, Uniform::new(-1.0, 1.0), &mut rng);
    let centroids = Array1::linspace(5.0, (k * 10) as f64 - 5.0, k) + jitter;

    let points_per_cluster = n / k;
    let remaining = n - points_per_cluster * k;

    let mut points = Vec::with_capacity(n);
    for &center in centroids.iter() {
        let sample = sample_around(center, points_per_cluster, &mut rng)?;
        points.extend(sample.iter().copied());
    }
    if remaining > 0 {
        let sample = sample_around(centroids[0], remaining, &mut rng)?;
        points.extend(sample.iter().copied());
    }

    points.shuffle(&mut rng);

    Ok((Array1::from(points), centroids))
}

fn sample_around(
    center: f64,
    count: usize,
    rng: &mut ChaCha8Rng,
) -> Result<Array1<f64>, KMeansError> {
    let normal = Normal::new(center, CLUSTER_STD)
        .map_err(|e| KMeansError::InvalidConfig(format!("bad cluster center {}: {}", center, e)))?;
    Ok(Array1::random_using(count, normal, rng))
}
