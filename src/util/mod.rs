use nalgebra::{DVector, Dim, Dyn, Matrix, RawStorageMut};
use std::ops::Mul;

mod weights;
pub use weights::Weights;

/// A square diagonal matrix with dynamic dimension. Off-diagonal entries are assumed zero.
/// This internally stores only the diagonal elements.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagMatrix {
    diagonal: DVector<f64>,
}

impl DiagMatrix {
    /// the size (i.e. number of rows == number of cols) of this square matrix
    pub fn size(&self) -> usize {
        self.diagonal.len()
    }
}

/// Generate a square diagonal matrix from the given diagonal vector.
impl From<DVector<f64>> for DiagMatrix {
    fn from(diagonal: DVector<f64>) -> Self {
        Self { diagonal }
    }
}

/// Multiply this diagonal matrix from the left to a dynamically sized matrix,
/// which scales every row of the matrix by the corresponding diagonal element.
/// # Panics
/// Panics if the dimensions of the matrices do not fit for matrix multiplication
impl<C, S> Mul<Matrix<f64, Dyn, C, S>> for &DiagMatrix
where
    C: Dim,
    S: RawStorageMut<f64, Dyn, C>,
{
    type Output = Matrix<f64, Dyn, C, S>;

    fn mul(self, mut rhs: Matrix<f64, Dyn, C, S>) -> Self::Output {
        assert_eq!(
            self.size(),
            rhs.nrows(),
            "Matrix dimensions incorrect for diagonal matrix multiplication."
        );
        rhs.column_iter_mut()
            .for_each(|mut col| col.component_mul_assign(&self.diagonal));
        rhs
    }
}
