//! Output buffers handed to the native entry points.
//!
//! All buffers are zero-filled, contiguous and row-major, sized from the
//! input shape and the effective rank before the call. The native library
//! writes into them in place and never allocates.

use crate::types::DecompositionKind;

/// Effective rank: `min(requested, rows, cols)`.
pub fn effective_rank(requested: usize, rows: usize, cols: usize) -> usize {
    requested.min(rows).min(cols)
}

/// Caller-owned outputs of one decomposition call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecompositionBuffers {
    rows: usize,
    cols: usize,
    k: usize,
    /// Right singular vectors / principal axes, `k × cols`.
    pub components: Vec<f32>,
    /// Singular values, `k`.
    pub singular_values: Vec<f32>,
    /// Left singular vectors, `rows × k`.
    pub left_factors: Vec<f32>,
    /// Projection of the input, `rows × k`.
    pub transformed: Vec<f32>,
    /// Explained variance per component, `k`.
    pub explained_variance: Vec<f32>,
    /// Explained variance ratio per component, `k`.
    pub explained_variance_ratio: Vec<f32>,
    /// Feature means, `cols` (PCA only).
    pub mean: Option<Vec<f32>>,
}

impl DecompositionBuffers {
    /// Zero-filled buffers for `kind` on a `rows × cols` input with effective rank `k`.
    pub fn zeroed(kind: DecompositionKind, rows: usize, cols: usize, k: usize) -> Self {
        Self {
            rows,
            cols,
            k,
            components: vec![0.0; k * cols],
            singular_values: vec![0.0; k],
            left_factors: vec![0.0; rows * k],
            transformed: vec![0.0; rows * k],
            explained_variance: vec![0.0; k],
            explained_variance_ratio: vec![0.0; k],
            mean: match kind {
                DecompositionKind::Pca => Some(vec![0.0; cols]),
                DecompositionKind::TruncatedSvd => None,
            },
        }
    }

    /// Rows of the input the buffers were sized for.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns of the input the buffers were sized for.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Effective rank the buffers were sized for.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Total bytes held across all buffers.
    pub fn memory_usage(&self) -> usize {
        let floats = self.components.len()
            + self.singular_values.len()
            + self.left_factors.len()
            + self.transformed.len()
            + self.explained_variance.len()
            + self.explained_variance_ratio.len()
            + self.mean.as_ref().map_or(0, Vec::len);
        floats * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rank_is_clamped_to_shape() {
        assert_eq!(effective_rank(10, 4, 3), 3);
        assert_eq!(effective_rank(2, 4, 3), 2);
        assert_eq!(effective_rank(5, 2, 9), 2);
        assert_eq!(effective_rank(0, 4, 3), 0);
    }

    #[test]
    fn test_pca_buffers_sized_from_clamped_rank() {
        let k = effective_rank(10, 4, 3);
        let buffers = DecompositionBuffers::zeroed(DecompositionKind::Pca, 4, 3, k);
        assert_eq!(buffers.k(), 3);
        assert_eq!(buffers.components.len(), 3 * 3);
        assert_eq!(buffers.singular_values.len(), 3);
        assert_eq!(buffers.left_factors.len(), 4 * 3);
        assert_eq!(buffers.transformed.len(), 4 * 3);
        assert_eq!(buffers.explained_variance.len(), 3);
        assert_eq!(buffers.explained_variance_ratio.len(), 3);
        assert_eq!(buffers.mean.as_ref().map(Vec::len), Some(3));
        assert!(buffers.components.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_truncated_svd_has_no_mean() {
        let buffers = DecompositionBuffers::zeroed(DecompositionKind::TruncatedSvd, 5, 4, 2);
        assert!(buffers.mean.is_none());
        assert_eq!(buffers.memory_usage(), (2 * 4 + 2 + 5 * 2 + 5 * 2 + 2 + 2) * 4);
    }

    proptest! {
        #[test]
        fn prop_effective_rank_never_exceeds_shape(
            requested in 0usize..64,
            rows in 1usize..32,
            cols in 1usize..32,
        ) {
            let k = effective_rank(requested, rows, cols);
            prop_assert!(k <= requested && k <= rows && k <= cols);
            prop_assert!(k == requested || k == rows || k == cols);
        }
    }
}
