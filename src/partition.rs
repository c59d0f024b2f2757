use crate::error::KMeansError;
use std::ops::Range;

/// A worker's contiguous share of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Number of points in the chunk (may be zero when n < p)
    pub size: usize,
    /// Index of the chunk's first point in the global ordering
    pub offset: usize,
}

impl Chunk {
    /// Half-open index range covered by this chunk
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Split `n` ordered points into `p` contiguous chunks.
///
/// Sizes differ by at most one: the first `n % p` chunks take one extra point.
/// Offsets follow the original order with no gaps or overlaps.
pub fn partition(n: usize, p: usize) -> Result<Vec<Chunk>, KMeansError> {
    if p == 0 {
        return Err(KMeansError::InvalidConfig(
            "worker count must be greater than 0".to_string(),
        ));
    }

    let base = n / p;
    let remainder = n % p;

    let mut chunks = Vec::with_capacity(p);
    let mut offset = 0;
    for rank in 0..p {
        let size = base + usize::from(rank < remainder);
        chunks.push(Chunk { size, offset });
        offset += size;
    }

    Ok(chunks)
}
