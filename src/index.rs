use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Fixed encoding dimension, system-wide.
pub const DIMENSION: usize = 128;

/// Fixed-length face signature. Unit L2 norm once stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceVector(Vec<f32>);

impl FaceVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Truncate or zero-pad to exactly [`DIMENSION`] elements.
    pub fn fitted(mut self) -> Self {
        self.0.resize(DIMENSION, 0.0);
        self
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Scale to unit L2 norm. Idempotent on already-unit vectors.
    pub fn into_unit(mut self) -> Result<Self, IndexError> {
        let norm = self.norm();
        if norm <= f32::EPSILON {
            return Err(IndexError::ZeroNorm);
        }
        if (norm - 1.0).abs() > 1e-6 {
            for v in &mut self.0 {
                *v /= norm;
            }
        }
        Ok(self)
    }
}

/// Squared Euclidean distance. Simple zipped loop so LLVM can
/// auto-vectorize it.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// In-memory flat vector store with exact brute-force search.
/// Append-only: position == 0-based insertion order.
#[derive(Debug, Default, Clone)]
pub struct FlatIndex {
    vectors: Vec<FaceVector>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted vectors. The caller is responsible for
    /// having validated their dimension.
    pub fn with_vectors(vectors: Vec<FaceVector>) -> Self {
        Self { vectors }
    }

    /// Normalize and append, returning the assigned position.
    pub fn add(&mut self, vector: FaceVector) -> Result<usize, IndexError> {
        if vector.dimension() != DIMENSION {
            return Err(IndexError::DimensionMismatch {
                expected: DIMENSION,
                actual: vector.dimension(),
            });
        }
        let unit = vector.into_unit()?;
        self.vectors.push(unit);
        Ok(self.vectors.len() - 1)
    }

    /// k-nearest neighbors by squared L2, ascending. At most
    /// `min(k, len)` entries; equal distances resolve to the earliest
    /// insertion (stable sort over position order). Empty index yields
    /// an empty result, not an error.
    pub fn search(&self, query: &FaceVector, k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.dimension() != DIMENSION {
            return Err(IndexError::DimensionMismatch {
                expected: DIMENSION,
                actual: query.dimension(),
            });
        }
        let unit = query.clone().into_unit()?;
        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, v)| (pos, squared_l2(unit.as_slice(), v.as_slice())))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k.min(self.vectors.len()));
        Ok(hits)
    }

    pub fn get(&self, position: usize) -> Option<&FaceVector> {
        self.vectors.get(position)
    }

    pub fn vectors(&self) -> &[FaceVector] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(axis: usize) -> FaceVector {
        let mut v = vec![0.0; DIMENSION];
        v[axis] = 1.0;
        FaceVector::new(v)
    }

    #[test]
    fn add_assigns_sequential_positions() {
        let mut index = FlatIndex::new();
        assert_eq!(index.add(basis(0)).unwrap(), 0);
        assert_eq!(index.add(basis(1)).unwrap(), 1);
        assert_eq!(index.add(basis(2)).unwrap(), 2);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new();
        let err = index.add(FaceVector::new(vec![1.0; 64])).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: DIMENSION,
                actual: 64
            }
        );
    }

    #[test]
    fn add_rejects_zero_norm() {
        let mut index = FlatIndex::new();
        let err = index.add(FaceVector::new(vec![0.0; DIMENSION])).unwrap_err();
        assert_eq!(err, IndexError::ZeroNorm);
    }

    #[test]
    fn add_normalizes_to_unit() {
        let mut index = FlatIndex::new();
        let mut raw = vec![0.0; DIMENSION];
        raw[0] = 3.0;
        raw[1] = 4.0;
        index.add(FaceVector::new(raw)).unwrap();
        let stored = index.get(0).unwrap();
        assert!((stored.norm() - 1.0).abs() < 1e-6);
        assert!((stored.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((stored.as_slice()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalization_is_idempotent() {
        let unit = basis(5).into_unit().unwrap();
        let again = unit.clone().into_unit().unwrap();
        for (a, b) in unit.as_slice().iter().zip(again.as_slice()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn search_empty_index_returns_empty() {
        let index = FlatIndex::new();
        assert!(index.search(&basis(0), 5).unwrap().is_empty());
    }

    #[test]
    fn search_orders_by_distance_and_caps_k() {
        let mut index = FlatIndex::new();
        index.add(basis(1)).unwrap();
        index.add(basis(0)).unwrap();
        index.add(basis(2)).unwrap();

        let hits = index.search(&basis(0), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
        assert!(hits[0].1 < 1e-6);
        assert!(hits[0].1 <= hits[1].1);

        // k beyond the stored count returns everything
        let all = index.search(&basis(0), 10).unwrap();
        assert_eq!(all.len(), 3);
        for pair in all.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn search_ties_break_by_earliest_position() {
        let mut index = FlatIndex::new();
        index.add(basis(0)).unwrap();
        index.add(basis(0)).unwrap();
        index.add(basis(0)).unwrap();

        let hits = index.search(&basis(0), 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn search_does_not_mutate_stored_vectors() {
        let mut index = FlatIndex::new();
        index.add(basis(3)).unwrap();
        let before = index.get(0).unwrap().clone();
        index.search(&basis(7), 1).unwrap();
        assert_eq!(index.get(0).unwrap(), &before);
    }

    #[test]
    fn fitted_pads_and_truncates() {
        let short = FaceVector::new(vec![1.0; 10]).fitted();
        assert_eq!(short.dimension(), DIMENSION);
        assert_eq!(short.as_slice()[9], 1.0);
        assert_eq!(short.as_slice()[10], 0.0);

        let long = FaceVector::new(vec![1.0; 600]).fitted();
        assert_eq!(long.dimension(), DIMENSION);
    }
}
