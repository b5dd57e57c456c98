//! Solvers for the linear subproblem of a group.
//!
//! For fixed nonlinear parameters, every group poses the linear least squares
//! problem
//!
//! ```math
//! \min_{\vec{c}} \lVert \vec{d} - \boldsymbol{M} \vec{c} \rVert_2^2,
//! ```
//!
//! where `$\boldsymbol M$` is the (weighted) design matrix of the group and
//! `$\vec{d}$` the (weighted) data. The solution `$\vec{c}$` are the
//! conditionally linear parameters (CLPs) of the group. The residual of the
//! subproblem is `$\vec{r} = \vec{d} - \boldsymbol{M}\vec{c}$`.
use nalgebra::{DMatrix, DVector};

mod nnls;
mod variable_projection;

pub use nnls::NonNegativeLeastSquares;
pub use variable_projection::VariableProjection;

/// The solution of one linear subproblem.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSolution {
    /// the conditionally linear parameters, one per column of the design matrix
    pub clp: DVector<f64>,
    /// the residual `d - M*c`, one entry per row of the design matrix
    pub residual: DVector<f64>,
    /// false if an iterative solver ran out of iterations. The solution is then
    /// the last iterate, which is still feasible.
    pub converged: bool,
    /// the number of iterations an iterative solver needed. Zero for direct solvers.
    pub iterations: usize,
}

impl LinearSolution {
    /// the solution of a problem without columns, where the residual is the data
    pub(crate) fn degenerate(data: &DVector<f64>) -> Self {
        Self {
            clp: DVector::zeros(0),
            residual: data.clone(),
            converged: true,
            iterations: 0,
        }
    }
}

/// A strategy to solve the linear subproblem of a group.
///
/// Implementations must be deterministic: the same input must produce the same
/// solution, regardless of the thread on which they run.
pub trait LinearSolver: Send + Sync {
    /// Solve `min ||data - matrix * c||` for `c`.
    ///
    /// # Panics
    ///
    /// May panic if `matrix.nrows() != data.len()` or if the inputs are not finite.
    fn solve(&self, matrix: &DMatrix<f64>, data: &DVector<f64>) -> LinearSolution;
}

/// Which linear solver to use for all groups of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearSolverKind {
    /// unconstrained least squares by variable projection
    #[default]
    VariableProjection,
    /// non-negative least squares
    NonNegative,
}

/// The linear solver selected for a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum ClpSolver {
    /// unconstrained least squares, see [`VariableProjection`]
    VariableProjection(VariableProjection),
    /// non-negative least squares, see [`NonNegativeLeastSquares`]
    NonNegative(NonNegativeLeastSquares),
}

impl ClpSolver {
    /// Create the solver of the given kind.
    ///
    /// # Arguments
    ///
    /// * `svd_epsilon`: the singular value cutoff for variable projection, see
    ///   [`VariableProjection::with_epsilon`]
    /// * `nnls_max_iterations`: the iteration bound of the NNLS solver, see
    ///   [`NonNegativeLeastSquares::with_max_iterations`]
    pub fn new(
        kind: LinearSolverKind,
        svd_epsilon: Option<f64>,
        nnls_max_iterations: Option<usize>,
    ) -> Self {
        match kind {
            LinearSolverKind::VariableProjection => Self::VariableProjection(match svd_epsilon {
                Some(epsilon) => VariableProjection::with_epsilon(epsilon),
                None => VariableProjection::default(),
            }),
            LinearSolverKind::NonNegative => Self::NonNegative(match nnls_max_iterations {
                Some(max_iterations) => NonNegativeLeastSquares::with_max_iterations(max_iterations),
                None => NonNegativeLeastSquares::default(),
            }),
        }
    }

    /// the kind of this solver
    pub fn kind(&self) -> LinearSolverKind {
        match self {
            ClpSolver::VariableProjection(_) => LinearSolverKind::VariableProjection,
            ClpSolver::NonNegative(_) => LinearSolverKind::NonNegative,
        }
    }
}

impl Default for ClpSolver {
    fn default() -> Self {
        Self::VariableProjection(VariableProjection::default())
    }
}

impl LinearSolver for ClpSolver {
    fn solve(&self, matrix: &DMatrix<f64>, data: &DVector<f64>) -> LinearSolution {
        match self {
            ClpSolver::VariableProjection(solver) => solver.solve(matrix, data),
            ClpSolver::NonNegative(solver) => solver.solve(matrix, data),
        }
    }
}
