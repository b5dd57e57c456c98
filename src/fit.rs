use crate::problem::GlobalProblem;
use crate::statistics::FitStatistics;
use levenberg_marquardt::MinimizationReport;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// The result of the fit for one dataset.
///
/// All matrices are oriented with one row per point of the estimated axis.
/// The data like matrices have one column per point of the calculated axis
/// and the CLP matrix has one column per CLP label.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetResult {
    /// the label of the dataset
    pub label: String,
    /// the coordinates of the estimated axis
    pub estimated_axis: DVector<f64>,
    /// the coordinates of the calculated axis
    pub calculated_axis: DVector<f64>,
    /// the CLP labels, i.e. the column labels of [`clp`](Self::clp)
    pub clp_labels: Vec<String>,
    /// the data that was fitted
    pub data: DMatrix<f64>,
    /// the residual `data - fitted_data`
    pub residual: DMatrix<f64>,
    /// the residual multiplied element wise with the weight, if the dataset was weighted
    pub weighted_residual: Option<DMatrix<f64>>,
    /// the conditionally linear parameters per point of the estimated axis
    pub clp: DMatrix<f64>,
    /// the model evaluated at the best parameters and CLPs
    pub fitted_data: DMatrix<f64>,
    /// additional arrays added by the megacomplexes of the dataset
    pub extra: BTreeMap<String, DMatrix<f64>>,
}

impl DatasetResult {
    /// The CLP with the given label along the estimated axis, or `None` if the
    /// dataset has no such CLP.
    pub fn clp_column(&self, label: &str) -> Option<DVector<f64>> {
        self.clp_labels
            .iter()
            .position(|l| l == label)
            .map(|idx| self.clp.column(idx).into_owned())
    }

    /// the root mean square of the (unweighted) residual
    pub fn root_mean_square_error(&self) -> f64 {
        if self.residual.is_empty() {
            return 0.;
        }
        (self.residual.norm_squared() / self.residual.len() as f64).sqrt()
    }
}

/// A helper type that contains the results of a fit per dataset together
/// with the statistics and the report of the optimizer.
///
/// This structure is returned by the [`GlobalFitSolver::fit`](crate::solvers::levmar::GlobalFitSolver::fit)
/// and [`GlobalFitSolver::evaluate`](crate::solvers::levmar::GlobalFitSolver::evaluate) methods.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// the results per dataset in the order in which the datasets were given
    pub datasets: Vec<DatasetResult>,
    /// statistics of the fit at the best parameters
    pub statistics: FitStatistics,
    /// The minimization report of the optimizer. It should be queried to see
    /// whether the minimization was considered successful. `None` if the
    /// result was calculated without optimization.
    pub minimization_report: Option<MinimizationReport<f64>>,
    /// number of linear solves that did not converge in the final evaluation
    pub unconverged_last: usize,
    /// number of linear solves that did not converge in all evaluations
    pub unconverged_total: usize,
}

impl FitResult {
    /// Whether the minimization terminated successfully. The fit might still
    /// be not optimal for numerical reasons. Results that were calculated
    /// without optimization count as successful.
    pub fn was_successful(&self) -> bool {
        self.minimization_report
            .as_ref()
            .map_or(true, |report| report.termination.was_successful())
    }

    /// convenience function to get the nonlinear parameters after the fit
    pub fn best_parameters(&self) -> &DVector<f64> {
        self.statistics.best_parameters()
    }

    /// the result of the dataset with the given label
    pub fn dataset(&self, label: &str) -> Option<&DatasetResult> {
        self.datasets.iter().find(|result| result.label == label)
    }
}

/// Create the results of all datasets from the current state of the problem.
///
/// For weighted datasets the state holds the weighted residual, which is
/// divided by the weight to get the residual. The fitted data is `data - residual`.
/// Finally the megacomplexes of every dataset may add to the result.
pub(crate) fn finalize_datasets(problem: &GlobalProblem) -> Vec<DatasetResult> {
    let objective = &problem.objective;
    objective
        .datasets
        .iter()
        .enumerate()
        .map(|(idx, dataset)| {
            let state_residual = problem.state.residual[idx].clone();
            let (residual, weighted_residual) = match dataset.weight.as_ref() {
                Some(weight) => (state_residual.component_div(weight), Some(state_residual)),
                None => (state_residual, None),
            };
            let mut result = DatasetResult {
                label: dataset.label.clone(),
                estimated_axis: dataset.estimated_axis.clone(),
                calculated_axis: dataset.calculated_axis.clone(),
                clp_labels: objective.clp_labels[idx].clone(),
                fitted_data: &dataset.data - &residual,
                data: dataset.data.clone(),
                residual,
                weighted_residual,
                clp: problem.state.clp[idx].clone(),
                extra: BTreeMap::new(),
            };
            objective.model.finalize(&problem.parameters, &mut result);
            result
        })
        .collect()
}
