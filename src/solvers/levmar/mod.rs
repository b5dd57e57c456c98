use crate::fit::{finalize_datasets, FitResult};
use crate::problem::{EvaluationError, GlobalProblem};
use crate::statistics::{FitStatistics, StatisticsError};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, MinimizationReport};
use nalgebra::storage::Owned;
use nalgebra::{Dyn, Matrix, Vector};
use thiserror::Error as ThisError;


/// Errors that make a fit fail. The termination status of the optimizer is no
/// error, it is reported in the [`FitResult`].
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum FitError {
    /// an evaluation of the objective failed during the fit
    #[error("Fatal error during the fit: {0}")]
    Evaluation(#[from] EvaluationError),

    /// the statistics could not be calculated
    #[error(transparent)]
    Statistics(#[from] StatisticsError),

    /// the problem holds no evaluation at the best parameters
    #[error("The objective was not evaluated at the best parameters.")]
    NotEvaluated,
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for GlobalProblem {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    /// Set the nonlinear parameters `$\vec{\alpha}$`, solve the linear
    /// subproblems of all groups and update the CLPs and residuals. The
    /// parameters are expected in the order in which the parameter names were
    /// given to the model.
    ///
    /// This is an implementation of the [`LeastSquaresProblem::set_params`] method.
    fn set_params(&mut self, params: &Vector<f64, Dyn, Self::ParameterStorage>) {
        self.update(params.clone_owned());
    }

    /// Retrieve the nonlinear parameters `$\vec{\alpha}$` in the order of the
    /// parameter names of the model.
    fn params(&self) -> Vector<f64, Dyn, Self::ParameterStorage> {
        self.parameters.clone()
    }

    /// The residual vector of *weighted* residuals of all groups in group
    /// order, followed by the additional residual of the model. `None` if the
    /// last evaluation failed.
    fn residuals(&self) -> Option<Vector<f64, Dyn, Self::ResidualStorage>> {
        self.residual().cloned()
    }

    /// The Jacobian of the residuals with respect to the nonlinear parameters,
    /// calculated by forward differences.
    fn jacobian(&self) -> Option<Matrix<f64, Dyn, Dyn, Self::JacobianStorage>> {
        self.numerical_jacobian()
    }
}

/// A thin wrapper around the
/// [`LevenbergMarquardt`](https://docs.rs/levenberg-marquardt/latest/levenberg_marquardt/struct.LevenbergMarquardt.html)
/// solver from the `levenberg_marquardt` crate. The core benefit of this
/// wrapper is that it turns the final state of a [`GlobalProblem`] into
/// results per dataset and statistics.
#[derive(Debug, Clone)]
pub struct GlobalFitSolver {
    solver: LevenbergMarquardt<f64>,
}

impl Default for GlobalFitSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalFitSolver {
    /// create a solver with the default settings of the underlying solver
    pub fn new() -> Self {
        Self {
            solver: LevenbergMarquardt::new(),
        }
    }

    /// creata a new solver using the given underlying solver. This allows
    /// us to configure the underlying solver with non-default parameters.
    /// A maximum number of evaluations of the problem overrides the patience
    /// of the given solver.
    pub fn with_solver(solver: LevenbergMarquardt<f64>) -> Self {
        Self { solver }
    }

    /// Fit the given problem. The parameters of the problem when this function
    /// is called are used as the initial guess.
    ///
    /// # Returns
    ///
    /// On success, returns the results per dataset at the best parameters, the
    /// statistics and the minimization report. Note that the minimization might
    /// still have terminated unsuccessfully, e.g. because the maximum number of
    /// evaluations was reached. Query [`FitResult::was_successful`] for that.
    ///
    /// # Errors
    ///
    /// If an evaluation of the objective failed at any point during the fit.
    pub fn fit(&self, problem: GlobalProblem) -> Result<FitResult, FitError> {
        let solver = match problem.max_evaluations() {
            Some(max_evaluations) => self
                .solver
                .clone()
                .with_patience(patience(max_evaluations, problem.parameters().len())),
            None => self.solver.clone(),
        };
        tracing::info!(
            parameters = problem.parameters().len(),
            groups = problem.grouping().len(),
            max_evaluations = ?problem.max_evaluations(),
            "starting fit"
        );

        let (mut problem, report) = solver.minimize(problem);
        if let Some(error) = problem.fatal_error() {
            return Err(FitError::Evaluation(error));
        }
        let best_parameters = problem.params();
        problem.update(best_parameters);

        let result = finish(problem, Some(report))?;
        tracing::info!(
            termination = ?result.minimization_report.as_ref().map(|r| &r.termination),
            evaluations = result.statistics.n_evaluations(),
            chi_square = result.statistics.chi2(),
            "finished fit"
        );
        Ok(result)
    }

    /// Calculate the results of the problem at its current parameters
    /// without any optimization.
    ///
    /// # Errors
    ///
    /// If an evaluation of the objective fails.
    pub fn evaluate(&self, problem: GlobalProblem) -> Result<FitResult, FitError> {
        finish(problem, None)
    }
}

/// The patience of the solver for a maximum number of evaluations. The solver
/// evaluates the problem at most `patience*(n+1)` times for `n` parameters.
fn patience(max_evaluations: usize, parameter_count: usize) -> usize {
    max_evaluations.div_ceil(parameter_count + 1).max(1)
}

/// statistics and results per dataset at the current parameters of the problem
fn finish(
    problem: GlobalProblem,
    minimization_report: Option<MinimizationReport<f64>>,
) -> Result<FitResult, FitError> {
    if let Some(error) = problem.fatal_error() {
        return Err(FitError::Evaluation(error));
    }
    let residual = problem.residual().ok_or(FitError::NotEvaluated)?;
    let Some(jacobian) = problem.numerical_jacobian() else {
        return Err(problem
            .fatal_error()
            .map_or(FitError::NotEvaluated, FitError::Evaluation));
    };
    // the optimizer's count if there was an optimization
    let n_evaluations = minimization_report
        .as_ref()
        .map_or(problem.evaluations(), |report| report.number_of_evaluations);
    let statistics = FitStatistics::try_calculate(
        residual,
        &jacobian,
        problem.parameters().clone(),
        problem.model().parameters().to_vec(),
        n_evaluations,
    )?;

    Ok(FitResult {
        datasets: finalize_datasets(&problem),
        statistics,
        minimization_report,
        unconverged_last: problem.unconverged_last(),
        unconverged_total: problem.unconverged_total(),
    })
}
