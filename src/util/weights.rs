use crate::util::DiagMatrix;
use nalgebra::{DVector, Dim, Dyn, Matrix, RawStorageMut};
use std::ops::Mul;

/// The row weights of a group's linear subproblem. Datasets without a weight
/// matrix contribute unit weights, so a group is only weighted if at least one
/// of its datasets carries weights.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Weights {
    /// unit weights, which means the rows are unweighted
    #[default]
    Unit,
    /// the weights are represented by a diagonal matrix
    Diagonal(DiagMatrix),
}

impl Weights {
    /// create diagonal weights with the given diagonal elements of a matrix.
    pub fn diagonal(diagonal: DVector<f64>) -> Self {
        Self::Diagonal(DiagMatrix::from(diagonal))
    }

    /// check that the weights are appropriately sized for the given data vector, so that
    /// they can be applied without panic. For unit weights this is always true.
    pub fn is_size_correct_for_data_length(&self, data_len: usize) -> bool {
        match self {
            Weights::Unit => true,
            Weights::Diagonal(diag) => diag.size() == data_len,
        }
    }
}

/// Multiply the weights to a matrix (or vector) from the left. This is a no-op
/// for unit weights and a row scaling for diagonal weights.
/// # Panics
/// If the dimensions do not match (unit weights never panic).
#[allow(non_snake_case)]
impl<C, S> Mul<Matrix<f64, Dyn, C, S>> for &Weights
where
    C: Dim,
    S: RawStorageMut<f64, Dyn, C>,
{
    type Output = Matrix<f64, Dyn, C, S>;

    fn mul(self, rhs: Matrix<f64, Dyn, C, S>) -> Self::Output {
        match self {
            Weights::Unit => rhs,
            Weights::Diagonal(W) => W * rhs,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Weights;
    use nalgebra::{DMatrix, DVector};

    #[test]
    #[allow(non_snake_case)]
    fn unit_weights_leave_matrix_and_vector_unchanged() {
        let W = Weights::default();
        let v = DVector::from(vec![1., 3., 3., 7.]);
        let A = DMatrix::from_element(4, 4, 2.0);

        assert_eq!(&W * v.clone(), v);
        assert_eq!(&W * A.clone(), A);
        assert!(W.is_size_correct_for_data_length(17));
    }

    #[test]
    #[allow(non_snake_case)]
    fn diagonal_weights_scale_the_rows() {
        let diagonal = DVector::from(vec![3., 78., 6., 5.]);
        let D = DMatrix::from_diagonal(&diagonal);
        let W = Weights::diagonal(diagonal);

        let v = DVector::from(vec![1., 3., 3., 7.]);
        let mut A = DMatrix::from_element(4, 2, 0.);
        A.set_column(0, &DVector::from(vec![32., 5., 86., 51.]));
        A.set_column(1, &DVector::from(vec![65., 46., 8., 85.]));

        assert_eq!(&D * &v, &W * v);
        assert_eq!(&D * &A, &W * A);
        assert!(W.is_size_correct_for_data_length(4));
        assert!(!W.is_size_correct_for_data_length(3));
    }
}
