//! Exact flat inner-product index.
//!
//! Vectors are stored as rows of an `N x D` matrix. A query is scored against
//! every row, so results are identical to a brute-force scan. Callers insert
//! unit-norm vectors, which makes the inner product a cosine similarity.

use memoria_common::{MemoriaError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Flat similarity index
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    vectors: Option<Array2<f32>>,
}

impl SimilarityIndex {
    /// Create an index with no contents; `search` fails until `build`
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing `N x D` matrix
    pub fn from_matrix(matrix: Array2<f32>) -> Result<Self> {
        if matrix.nrows() == 0 {
            return Err(MemoriaError::EmptyInput);
        }
        if matrix.ncols() == 0 {
            return Err(MemoriaError::invalid_input("Vectors must have at least one component"));
        }
        Ok(Self {
            vectors: Some(matrix),
        })
    }

    /// Replace the index contents.
    ///
    /// Every vector must share the first vector's dimension. On error the
    /// previous contents are kept.
    pub fn build(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let first = vectors.first().ok_or(MemoriaError::EmptyInput)?;
        let dimension = first.len();

        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(MemoriaError::dimension_mismatch(dimension, bad.len()));
        }

        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let matrix = Array2::from_shape_vec((vectors.len(), dimension), flat)
            .map_err(|e| MemoriaError::invalid_input(format!("Invalid vector matrix: {}", e)))?;

        *self = Self::from_matrix(matrix)?;
        Ok(())
    }

    /// Whether `build` (or `from_matrix`) has succeeded
    pub fn is_built(&self) -> bool {
        self.vectors.is_some()
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.vectors.as_ref().map_or(0, |m| m.nrows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension, once built
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.as_ref().map(|m| m.ncols())
    }

    /// Row-major view of all stored vectors
    pub fn matrix(&self) -> Option<ArrayView2<'_, f32>> {
        self.vectors.as_ref().map(|m| m.view())
    }

    /// Stored vector at `position`
    pub fn vector(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        self.vectors
            .as_ref()
            .filter(|m| position < m.nrows())
            .map(|m| m.row(position))
    }

    /// Top-k positions by descending inner product.
    ///
    /// Returns at most `min(k, len)` `(position, score)` pairs. Equal scores are
    /// ordered by ascending position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let matrix = self.vectors.as_ref().ok_or(MemoriaError::IndexNotBuilt)?;
        if query.len() != matrix.ncols() {
            return Err(MemoriaError::dimension_mismatch(matrix.ncols(), query.len()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = ArrayView1::from(query);
        let mut scored: Vec<(usize, f32)> = matrix
            .rows()
            .into_iter()
            .map(|row| row.dot(&query))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}
