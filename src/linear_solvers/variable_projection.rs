use super::{LinearSolution, LinearSolver};
use nalgebra::{DMatrix, DVector};

/// Solves the linear subproblem by a singular value decomposition of the
/// design matrix. Singular values below the cutoff are treated as zero, which
/// yields the minimum norm solution for rank deficient matrices. This solver
/// never fails.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VariableProjection {
    /// the singular value cutoff. If not given, the cutoff is
    /// `max(m,n) * f64::EPSILON * σ_max`, the same heuristic that
    /// Octave's `rank` uses.
    epsilon: Option<f64>,
}

impl VariableProjection {
    /// use a fixed singular value cutoff. Negative values are treated as zero.
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon: Some(epsilon.max(0.)),
        }
    }

    /// the fixed singular value cutoff, if any
    pub fn epsilon(&self) -> Option<f64> {
        self.epsilon
    }
}

impl LinearSolver for VariableProjection {
    #[allow(non_snake_case)]
    fn solve(&self, M: &DMatrix<f64>, d: &DVector<f64>) -> LinearSolution {
        if M.ncols() == 0 {
            return LinearSolution::degenerate(d);
        }
        let max_dim = M.nrows().max(M.ncols());
        let svd = M.clone().svd(true, true);
        let epsilon = self
            .epsilon
            .unwrap_or_else(|| svd.singular_values.max() * max_dim as f64 * f64::EPSILON);
        // both U and V^T were computed and the cutoff is non-negative,
        // which are the only failure conditions of the solve
        let clp = svd
            .solve(d, epsilon)
            .unwrap_or_else(|_| DVector::zeros(M.ncols()));
        let residual = d - M * &clp;
        LinearSolution {
            clp,
            residual,
            converged: true,
            iterations: 0,
        }
    }
}
