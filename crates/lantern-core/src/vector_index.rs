//! Exact nearest-neighbor index over fixed-dimension f32 vectors.
//!
//! Vectors live in one flat row-major buffer. Search is a single-threaded linear
//! scan by squared Euclidean distance, so results reproduce bit for bit.

/// Flat L2 index. Identity of a vector is its insertion position.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
}

/// One search hit: identity and squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub identity: usize,
    pub distance: f32,
}

impl VectorIndex {
    /// Empty index for vectors of `dim` components.
    pub fn new(dim: usize) -> Result<Self, IndexError> {
        if dim == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dim,
            data: Vec::new(),
        })
    }

    /// Rebuild from a flat buffer. `data.len()` must be a multiple of `dim`.
    pub(crate) fn from_flat(dim: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        let mut index = Self::new(dim)?;
        if data.len() % dim != 0 {
            return Err(IndexError::RaggedBuffer {
                dim,
                len: data.len(),
            });
        }
        index.data = data;
        Ok(index)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major view of every stored component.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Stored vector for `identity`, if any.
    pub fn vector(&self, identity: usize) -> Option<&[f32]> {
        let start = identity.checked_mul(self.dim)?;
        let end = start.checked_add(self.dim)?;
        self.data.get(start..end)
    }

    /// Append a batch. The batch is checked first; on error nothing is added.
    pub fn add<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<(), IndexError> {
        for v in vectors {
            self.check_vector(v.as_ref())?;
        }
        self.data.reserve(vectors.len() * self.dim);
        for v in vectors {
            self.data.extend_from_slice(v.as_ref());
        }
        Ok(())
    }

    /// Up to `top_k` nearest vectors, closest first. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_vector(query)?;
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(identity, row)| Neighbor {
                identity,
                distance: rank_distance(squared_l2(query, row)),
            })
            .collect();
        // Stable sort keeps lower identities first among ties.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn check_vector(&self, v: &[f32]) -> Result<(), IndexError> {
        if v.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: v.len(),
            });
        }
        if let Some(component) = v.iter().position(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite { component });
        }
        Ok(())
    }
}

/// NaN can still come from rows restored from disk; it ranks last.
fn rank_distance(d: f32) -> f32 {
    if d.is_nan() {
        f32::INFINITY
    } else {
        d
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("index dimension must be greater than zero")]
    ZeroDimension,
    #[error("vector has {actual} components, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("flat buffer of {len} values is not a multiple of dimension {dim}")]
    RaggedBuffer { dim: usize, len: usize },
    #[error("vector component {component} is not a finite number")]
    NonFinite { component: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(rows: &[[f32; 2]]) -> VectorIndex {
        let mut index = VectorIndex::new(2).unwrap();
        index.add(rows).unwrap();
        index
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = VectorIndex::new(3).unwrap();
        assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert_eq!(VectorIndex::new(0), Err(IndexError::ZeroDimension));
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut index = VectorIndex::new(2).unwrap();
        index.add::<Vec<f32>>(&[]).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn results_are_ordered_by_squared_distance() {
        let index = index_with(&[[3.0, 0.0], [1.0, 0.0], [0.0, 2.0]]);
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.identity).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].distance, 4.0);
        assert_eq!(hits[2].distance, 9.0);
    }

    #[test]
    fn ties_break_by_lower_identity() {
        let index = index_with(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.identity).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn top_k_bounds_result_count() {
        let index = index_with(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        for k in 0..=4 {
            let hits = index.search(&[0.5, 0.5], k).unwrap();
            assert_eq!(hits.len(), k);
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
        assert_eq!(index.search(&[0.5, 0.5], 10).unwrap().len(), 4);
    }

    #[test]
    fn mismatched_batch_adds_nothing() {
        let mut index = index_with(&[[0.0, 0.0]]);
        let batch = vec![vec![1.0, 1.0], vec![1.0, 1.0, 1.0]];
        assert_eq!(
            index.add(&batch),
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn wrong_query_length_is_rejected() {
        let index = index_with(&[[0.0, 0.0]]);
        assert!(index.search(&[0.0], 1).is_err());
    }

    #[test]
    fn non_finite_vectors_are_rejected() {
        let mut index = index_with(&[[0.0, 0.0]]);
        let batch = vec![vec![1.0, 1.0], vec![1.0, f32::NAN]];
        assert_eq!(index.add(&batch), Err(IndexError::NonFinite { component: 1 }));
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.add(&[[f32::INFINITY, 0.0]]),
            Err(IndexError::NonFinite { component: 0 })
        );
        assert_eq!(
            index.search(&[-f32::NAN, 0.0], 1),
            Err(IndexError::NonFinite { component: 0 })
        );
    }

    #[test]
    fn nan_rows_from_disk_rank_last() {
        let index = VectorIndex::from_flat(2, vec![5.0, 5.0, -f32::NAN, 0.0, 1.0, 0.0]).unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.identity).collect();
        assert_eq!(ids, vec![2, 0, 1]);
        assert_eq!(hits[2].distance, f32::INFINITY);
    }

    #[test]
    fn vector_lookup_by_identity() {
        let index = index_with(&[[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(index.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.vector(2), None);
    }
}
