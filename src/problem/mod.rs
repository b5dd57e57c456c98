use crate::dataset::PreparedDataset;
use crate::grouping::Grouping;
use crate::linear_solvers::{ClpSolver, LinearSolution, LinearSolver};
use crate::matrix::{assemble_group_matrix, dataset_matrix};
use crate::model::Model;
use layout::GroupLayout;
use nalgebra::{DMatrix, DVector, DVectorView};
use rayon::prelude::*;
use std::cell::RefCell;

mod builder;
mod config;
mod layout;

pub use crate::matrix::EvaluationError;
pub use builder::{GlobalProblemBuilder, SetupError};
pub use config::FitConfig;

/// A callback that is invoked after every successful evaluation of the
/// objective with the running evaluation number (starting at 1), the
/// parameters and the chi-square of the evaluation.
pub type EvaluationCallback = Box<dyn FnMut(usize, &DVector<f64>, f64) + Send>;

/// The CLPs and residuals per dataset that belong to an evaluation.
///
/// The matrices are allocated once during setup and overwritten by every
/// evaluation. Every (dataset, estimated index) pair belongs to exactly one
/// group, so each evaluation writes every row exactly once.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FitState {
    /// per dataset: estimated axis × CLP labels of the dataset
    pub(crate) clp: Vec<DMatrix<f64>>,
    /// per dataset: estimated axis × calculated axis. This is the weighted
    /// residual for weighted datasets.
    pub(crate) residual: Vec<DMatrix<f64>>,
}

/// Read access to the CLPs of an evaluation by dataset and CLP label.
#[derive(Debug, Clone, Copy)]
pub struct ClpLookup<'a> {
    datasets: &'a [PreparedDataset],
    clp_labels: &'a [Vec<String>],
    clp: &'a [DMatrix<f64>],
}

impl<'a> ClpLookup<'a> {
    fn position(&self, dataset: &str) -> Option<usize> {
        self.datasets.iter().position(|d| d.label == dataset)
    }

    /// the labels of all datasets
    pub fn datasets(&self) -> impl Iterator<Item = &'a str> {
        self.datasets.iter().map(|d| d.label.as_str())
    }

    /// the CLP labels of a dataset, which are the columns of [`dataset_clp`](Self::dataset_clp)
    pub fn clp_labels(&self, dataset: &str) -> Option<&'a [String]> {
        self.position(dataset).map(|idx| self.clp_labels[idx].as_slice())
    }

    /// the CLP matrix of a dataset with one row per point of the estimated axis
    pub fn dataset_clp(&self, dataset: &str) -> Option<&'a DMatrix<f64>> {
        self.position(dataset).map(|idx| &self.clp[idx])
    }

    /// the CLP with the given label along the estimated axis of a dataset
    pub fn clp(&self, dataset: &str, label: &str) -> Option<DVectorView<'a, f64>> {
        let idx = self.position(dataset)?;
        let column = self.clp_labels[idx].iter().position(|l| l == label)?;
        Some(self.clp[idx].column(column))
    }
}

/// The outcome of one evaluation of the objective
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluation {
    /// the concatenated group residuals followed by the additional residual
    pub(crate) residual: DVector<f64>,
    /// the number of linear solves that did not converge
    pub(crate) unconverged: usize,
}

/// The parts of the problem that do not change during a fit. Evaluating the
/// objective only reads them.
pub(crate) struct Objective {
    pub(crate) model: Model,
    pub(crate) datasets: Vec<PreparedDataset>,
    /// per dataset: index of its dataset model inside the model
    pub(crate) dataset_models: Vec<usize>,
    /// per dataset: the CLP labels fixed at setup
    pub(crate) clp_labels: Vec<Vec<String>>,
    pub(crate) grouping: Grouping,
    pub(crate) layouts: Vec<GroupLayout>,
    pub(crate) solver: ClpSolver,
    /// the length of the additional residual fixed at setup
    pub(crate) additional_residual_len: Option<usize>,
}

impl Objective {
    /// the dataset matrices of all datasets that do not depend on the index
    /// of the estimated axis
    fn index_invariant_matrices(
        &self,
        parameters: &DVector<f64>,
    ) -> Result<Vec<Option<DMatrix<f64>>>, EvaluationError> {
        let matrices: Vec<_> = (0..self.datasets.len())
            .into_par_iter()
            .map(|idx| {
                let dataset_model = &self.model.datasets[self.dataset_models[idx]];
                if self.model.index_dependent(dataset_model) {
                    return Ok(None);
                }
                dataset_matrix(
                    &self.model,
                    dataset_model,
                    &self.datasets[idx],
                    &self.clp_labels[idx],
                    parameters,
                    0,
                )
                .map(Some)
            })
            .collect();
        matrices.into_iter().collect()
    }

    /// assemble the weighted group matrix and solve the linear subproblem
    fn solve_group(
        &self,
        group: usize,
        layout: &GroupLayout,
        invariant: &[Option<DMatrix<f64>>],
        parameters: &DVector<f64>,
    ) -> Result<LinearSolution, EvaluationError> {
        let dependent = layout
            .items
            .iter()
            .map(|item| {
                if invariant[item.dataset].is_some() {
                    return Ok(None);
                }
                let dataset_model = &self.model.datasets[self.dataset_models[item.dataset]];
                dataset_matrix(
                    &self.model,
                    dataset_model,
                    &self.datasets[item.dataset],
                    &self.clp_labels[item.dataset],
                    parameters,
                    item.index,
                )
                .map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let item_matrices: Vec<(&DMatrix<f64>, &[usize])> = layout
            .items
            .iter()
            .zip(dependent.iter())
            .filter_map(|(item, own)| {
                own.as_ref()
                    .or(invariant[item.dataset].as_ref())
                    .map(|matrix| (matrix, item.column_map.as_slice()))
            })
            .collect();

        let matrix = &layout.weights * assemble_group_matrix(item_matrices, layout.clp_labels.len());
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(EvaluationError::NonFiniteMatrix { group });
        }
        Ok(self.solver.solve(&matrix, &layout.data))
    }

    /// Evaluate the objective at the given parameters and write the CLPs and
    /// residuals into the given state.
    pub(crate) fn evaluate(
        &self,
        parameters: &DVector<f64>,
        state: &mut FitState,
    ) -> Result<Evaluation, EvaluationError> {
        let invariant = self.index_invariant_matrices(parameters)?;

        let solutions: Vec<Result<LinearSolution, EvaluationError>> = self
            .layouts
            .par_iter()
            .enumerate()
            .map(|(group, layout)| self.solve_group(group, layout, &invariant, parameters))
            .collect();
        let solutions = solutions.into_iter().collect::<Result<Vec<_>, _>>()?;

        let group_rows: usize = self.layouts.iter().map(GroupLayout::nrows).sum();
        let mut residual = Vec::with_capacity(group_rows + self.additional_residual_len.unwrap_or(0));
        let mut unconverged = 0;
        for (layout, solution) in self.layouts.iter().zip(solutions.iter()) {
            scatter(layout, solution, state);
            residual.extend(solution.residual.iter());
            if !solution.converged {
                unconverged += 1;
            }
        }

        if let Some(additional_residual) = self.model.additional_residual.as_ref() {
            let lookup = self.clp_lookup(state);
            let additional = additional_residual(parameters, &lookup);
            if let Some(expected) = self.additional_residual_len {
                if additional.len() != expected {
                    return Err(EvaluationError::AdditionalResidualLengthChanged {
                        expected,
                        actual: additional.len(),
                    });
                }
            }
            residual.extend(additional.iter());
        }

        Ok(Evaluation {
            residual: DVector::from_vec(residual),
            unconverged,
        })
    }

    pub(crate) fn clp_lookup<'a>(&'a self, state: &'a FitState) -> ClpLookup<'a> {
        ClpLookup {
            datasets: &self.datasets,
            clp_labels: &self.clp_labels,
            clp: &state.clp,
        }
    }

    /// a state with correctly sized zero matrices
    pub(crate) fn empty_state(&self) -> FitState {
        FitState {
            clp: self
                .datasets
                .iter()
                .zip(self.clp_labels.iter())
                .map(|(dataset, labels)| DMatrix::zeros(dataset.estimated_axis.len(), labels.len()))
                .collect(),
            residual: self
                .datasets
                .iter()
                .map(|dataset| DMatrix::zeros(dataset.estimated_axis.len(), dataset.calculated_axis.len()))
                .collect(),
        }
    }
}

/// Write the solution of a group into the per dataset CLP and residual matrices.
fn scatter(layout: &GroupLayout, solution: &LinearSolution, state: &mut FitState) {
    for item in &layout.items {
        let mut clp_row = state.clp[item.dataset].row_mut(item.index);
        for (local, &group_column) in item.column_map.iter().enumerate() {
            clp_row[local] = solution.clp[group_column];
        }
        state.residual[item.dataset]
            .row_mut(item.index)
            .tr_copy_from(&solution.residual.rows(item.row_offset, item.nrows));
    }
}

/// The latest successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CachedEvaluation {
    pub(crate) residual: DVector<f64>,
    pub(crate) unconverged: usize,
}

/// The global analysis problem: a model, the datasets, and their grouping,
/// together with the current nonlinear parameters and the CLPs and residuals
/// that belong to them.
///
/// # Construction
///
/// Use the [`GlobalProblemBuilder`] to create a problem. Setting up the problem
/// evaluates the objective once at the initial parameters.
///
/// # Usage
///
/// The problem implements the [`LeastSquaresProblem`](levenberg_marquardt::LeastSquaresProblem)
/// trait of the [levenberg_marquardt](https://crates.io/crates/levenberg-marquardt)
/// crate. Use the [`GlobalFitSolver`](crate::solvers::levmar::GlobalFitSolver) to fit it.
///
/// # Errors during the fit
///
/// The optimizer has no way to receive errors. If an evaluation fails, the
/// problem keeps the first error and reports no residuals, which terminates the
/// optimizer. The solver then returns the kept error.
pub struct GlobalProblem {
    pub(crate) objective: Objective,
    pub(crate) state: FitState,
    pub(crate) parameters: DVector<f64>,
    pub(crate) cached: Option<CachedEvaluation>,
    pub(crate) fatal_error: RefCell<Option<EvaluationError>>,
    pub(crate) max_evaluations: Option<usize>,
    pub(crate) evaluations: usize,
    pub(crate) unconverged_total: usize,
    pub(crate) on_evaluation: Option<EvaluationCallback>,
}

impl std::fmt::Debug for GlobalProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalProblem")
            .field("model", &self.objective.model)
            .field("datasets", &self.objective.datasets.len())
            .field("groups", &self.objective.layouts.len())
            .field("solver", &self.objective.solver)
            .field("parameters", &self.parameters)
            .field("cached", &self.cached)
            .field("fatal_error", &self.fatal_error)
            .field("evaluations", &self.evaluations)
            .field("on_evaluation", &self.on_evaluation.as_ref().map(|_| "/* omitted */"))
            .finish()
    }
}

impl GlobalProblem {
    /// the model of the problem
    pub fn model(&self) -> &Model {
        &self.objective.model
    }

    /// the grouping of the estimated axes of the datasets
    pub fn grouping(&self) -> &Grouping {
        &self.objective.grouping
    }

    /// the current nonlinear parameters
    pub fn parameters(&self) -> &DVector<f64> {
        &self.parameters
    }

    /// the linear solver used for all groups
    pub fn solver(&self) -> &ClpSolver {
        &self.objective.solver
    }

    /// the bound for the number of objective evaluations of the optimizer
    pub fn max_evaluations(&self) -> Option<usize> {
        self.max_evaluations
    }

    /// the CLP labels of every group in group order
    pub fn group_clp_labels(&self) -> impl Iterator<Item = &[String]> {
        self.objective.layouts.iter().map(|l| l.clp_labels.as_slice())
    }

    /// The residual vector at the current parameters, or `None` if the last
    /// evaluation failed.
    pub fn residual(&self) -> Option<&DVector<f64>> {
        self.cached.as_ref().map(|cached| &cached.residual)
    }

    /// the chi-square `||r||²` at the current parameters
    pub fn chi_square(&self) -> Option<f64> {
        self.residual().map(|r| r.norm_squared())
    }

    /// the CLPs at the current parameters
    pub fn clp(&self) -> ClpLookup<'_> {
        self.objective.clp_lookup(&self.state)
    }

    /// the number of successful objective evaluations so far, including the
    /// evaluation during setup
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// the number of linear solves that did not converge in the last evaluation
    pub fn unconverged_last(&self) -> usize {
        self.cached.as_ref().map_or(0, |cached| cached.unconverged)
    }

    /// the number of linear solves that did not converge in all evaluations
    pub fn unconverged_total(&self) -> usize {
        self.unconverged_total
    }

    /// the first fatal error that occurred during an evaluation, if any
    pub fn fatal_error(&self) -> Option<EvaluationError> {
        self.fatal_error.borrow().clone()
    }

    /// keep the first fatal error
    fn record_error(&self, error: EvaluationError) {
        tracing::error!(%error, "evaluation of the objective failed");
        let mut fatal_error = self.fatal_error.borrow_mut();
        if fatal_error.is_none() {
            *fatal_error = Some(error);
        }
    }

    /// Set the parameters, evaluate the objective and update the CLPs and
    /// residuals. On failure the cached evaluation is cleared and the error is
    /// kept.
    pub(crate) fn update(&mut self, parameters: DVector<f64>) {
        self.parameters = parameters;
        match self.objective.evaluate(&self.parameters, &mut self.state) {
            Ok(Evaluation {
                residual,
                unconverged,
            }) => {
                self.evaluations += 1;
                self.unconverged_total += unconverged;
                let chi_square = residual.norm_squared();
                tracing::debug!(
                    evaluation = self.evaluations,
                    chi_square,
                    "evaluated objective"
                );
                if unconverged > 0 {
                    tracing::warn!(
                        evaluation = self.evaluations,
                        unconverged,
                        "non-negative least squares did not converge for some groups"
                    );
                }
                if let Some(callback) = self.on_evaluation.as_mut() {
                    callback(self.evaluations, &self.parameters, chi_square);
                }
                self.cached = Some(CachedEvaluation {
                    residual,
                    unconverged,
                });
            }
            Err(error) => {
                self.cached = None;
                self.record_error(error);
            }
        }
    }

    /// The Jacobian of the residual with respect to the parameters by forward
    /// differences. Uses the step `sqrt(ε)*max(|p|, 1)` for parameter `p`.
    /// Returns `None` and keeps the error if an evaluation fails.
    pub(crate) fn numerical_jacobian(&self) -> Option<DMatrix<f64>> {
        let residual = self.residual()?;
        let mut scratch = self.state.clone();
        let mut jacobian = DMatrix::zeros(residual.len(), self.parameters.len());
        for (j, mut column) in jacobian.column_iter_mut().enumerate() {
            let step = f64::EPSILON.sqrt() * self.parameters[j].abs().max(1.);
            let mut shifted = self.parameters.clone();
            shifted[j] += step;
            match self.objective.evaluate(&shifted, &mut scratch) {
                Ok(evaluation) => column.copy_from(&((evaluation.residual - residual) / step)),
                Err(error) => {
                    self.record_error(error);
                    return None;
                }
            }
        }
        Some(jacobian)
    }
}
