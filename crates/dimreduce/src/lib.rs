//! PCA and truncated SVD backed by native GPU or CPU libraries.
//!
//! This crate re-exports [`dimreduce_core`] and ships the
//! `dimreduce-diagnose` binary. See the core crate for the locator, probe,
//! selection and marshalling layers.
//!
//! # Example
//!
//! ```no_run
//! use dimreduce::prelude::*;
//!
//! let x = MatrixView::from_rows(&[[1.0_f32, 0.5], [0.2, 3.0], [4.0, 1.0]])?;
//! let params = DecompositionParams::builder(DecompositionKind::TruncatedSvd)
//!     .n_components(1)
//!     .build();
//! let fitted = decompose(BackendRequest::Cpu, DecompositionKind::TruncatedSvd, &x, &params)?;
//! assert_eq!(fitted.k(), 1);
//! # Ok::<(), dimreduce::NativeError>(())
//! ```

pub use dimreduce_core::*;

/// Matrix types returned by [`FittedDecomposition`](marshal::FittedDecomposition).
pub use nalgebra;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use dimreduce_core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::nalgebra::DMatrix;
    use super::prelude::*;

    #[test]
    fn test_reexported_nalgebra_feeds_matrix_view() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0_f32, 2.0, 3.0, 4.0]);
        let view = MatrixView::from(&m);
        assert_eq!(view.shape(), (2, 2));
        assert_eq!(view.to_dmatrix(), m);
    }
}
