use crate::linear_solvers::LinearSolverKind;

/// The configuration of a fit. All fields have defaults, so that
/// `FitConfig::default()` describes an unbounded variable projection fit with
/// exact grouping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    /// Absolute tolerance within which coordinates of the estimated axes of
    /// different datasets are grouped together. Must be finite and non-negative.
    pub group_tolerance: f64,
    /// the solver for the linear subproblems
    pub linear_solver: LinearSolverKind,
    /// Upper bound for the number of objective evaluations of the optimizer.
    /// Unbounded if `None`.
    pub max_evaluations: Option<usize>,
    /// singular value cutoff of the variable projection solver
    pub svd_epsilon: Option<f64>,
    /// iteration bound of the NNLS solver
    pub nnls_max_iterations: Option<usize>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            group_tolerance: 0.,
            linear_solver: LinearSolverKind::default(),
            max_evaluations: None,
            svd_epsilon: None,
            nnls_max_iterations: None,
        }
    }
}
