//! Row-major `f32` input accepted at the native boundary.

use std::borrow::Cow;

use nalgebra::DMatrix;

use crate::error::{NativeError, Result};

/// Dense, contiguous, row-major single-precision matrix.
///
/// Construction validates the shape: exactly two dimensions, both non-zero,
/// and a buffer whose length is their product. Sparse input must be
/// densified before it reaches this type.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixView<'a> {
    data: Cow<'a, [f32]>,
    rows: usize,
    cols: usize,
}

impl<'a> MatrixView<'a> {
    /// Borrow `data` with the given shape.
    pub fn new(data: &'a [f32], shape: &[usize]) -> Result<Self> {
        let (rows, cols) = check_shape(data.len(), shape)?;
        Ok(Self {
            data: Cow::Borrowed(data),
            rows,
            cols,
        })
    }

    /// Borrow `data` as a `rows × cols` matrix.
    pub fn from_slice(data: &'a [f32], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, &[rows, cols])
    }

    /// Build from nested rows; every row must have the same length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<MatrixView<'static>> {
        let n = rows.len();
        let m = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(n * m);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != m {
                return Err(NativeError::invalid_input(format!(
                    "ragged input: row {i} has {} columns, expected {m}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        let (rows, cols) = check_shape(data.len(), &[n, m])?;
        Ok(MatrixView {
            data: Cow::Owned(data),
            rows,
            cols,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major elements.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copy into a (column-major) nalgebra matrix.
    pub fn to_dmatrix(&self) -> DMatrix<f32> {
        DMatrix::from_row_slice(self.rows, self.cols, &self.data)
    }
}

impl From<&DMatrix<f32>> for MatrixView<'static> {
    /// nalgebra stores column-major, so the elements are reordered.
    fn from(matrix: &DMatrix<f32>) -> Self {
        let (rows, cols) = matrix.shape();
        let data: Vec<f32> = matrix.transpose().as_slice().to_vec();
        Self {
            data: Cow::Owned(data),
            rows,
            cols,
        }
    }
}

fn check_shape(len: usize, shape: &[usize]) -> Result<(usize, usize)> {
    let &[rows, cols] = shape else {
        return Err(NativeError::invalid_input(format!(
            "expected a 2D matrix, got {} dimension(s)",
            shape.len()
        )));
    };
    if rows == 0 || cols == 0 {
        return Err(NativeError::invalid_input(format!(
            "matrix must be non-empty, got shape ({rows}, {cols})"
        )));
    }
    if rows.checked_mul(cols) != Some(len) {
        return Err(NativeError::invalid_input(format!(
            "buffer of {len} elements does not match shape ({rows}, {cols})"
        )));
    }
    Ok((rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_2d_shapes() {
        let data = [0.0_f32; 8];
        assert!(MatrixView::new(&data, &[8]).is_err());
        assert!(MatrixView::new(&data, &[2, 2, 2]).is_err());
        assert!(MatrixView::new(&data, &[]).is_err());
        assert!(MatrixView::new(&data, &[2, 4]).is_ok());
    }

    #[test]
    fn test_rejects_length_mismatch_and_empty() {
        let data = [0.0_f32; 6];
        assert!(MatrixView::from_slice(&data, 4, 2).is_err());
        assert!(MatrixView::from_slice(&[], 0, 3).is_err());
    }

    #[test]
    fn test_from_rows_is_row_major() {
        let view = MatrixView::from_rows(&[[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(view.shape(), (2, 3));
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let rows: Vec<Vec<f32>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(MatrixView::from_rows(&rows).is_err());
    }

    #[test]
    fn test_dmatrix_conversion_preserves_elements() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let view = MatrixView::from(&m);
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(view.to_dmatrix(), m);
    }
}
