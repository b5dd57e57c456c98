use super::layout::GroupLayout;
use super::{EvaluationCallback, EvaluationError, FitConfig, GlobalProblem, Objective};
use crate::dataset::{Dataset, DatasetError, PreparedDataset};
use crate::grouping::{group_datasets, GroupingError};
use crate::linear_solvers::{ClpSolver, LinearSolverKind};
use crate::matrix::discover_clp_labels;
use crate::model::Model;
use nalgebra::DVector;
use std::cell::RefCell;
use std::collections::HashSet;
use thiserror::Error as ThisError;

/// Errors that are detected while setting up a [`GlobalProblem`], before the
/// optimizer is invoked.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum SetupError {
    /// the group tolerance must be finite and non-negative
    #[error("Group tolerance must be finite and non-negative, but is {}.", tolerance)]
    InvalidGroupTolerance {
        /// the given tolerance
        tolerance: f64,
    },

    /// no initial guess for the nonlinear parameters was given
    #[error("Initial guess for the parameters not provided.")]
    MissingInitialParameters,

    /// the model has a different number of parameters than the provided initial guesses
    #[error(
        "Initial guess vector must have same length as parameters. Model has {} parameters and {} initial guesses were provided.",
        model_count,
        provided_count
    )]
    InvalidParameterCount {
        /// number of model parameters
        model_count: usize,
        /// number of initial guesses
        provided_count: usize,
    },

    /// one or more datasets are invalid, with one error per offending dataset
    #[error("Invalid datasets: {:?}", .0)]
    InvalidDatasets(Vec<DatasetError>),

    /// the estimated axes could not be grouped
    #[error(transparent)]
    Grouping(#[from] GroupingError),

    /// the evaluation at the initial parameters failed
    #[error("Evaluation at the initial parameters failed: {0}")]
    Evaluation(#[from] EvaluationError),
}

/// A builder to create a [`GlobalProblem`] from a model and datasets.
///
/// # Example
///
/// ```rust
/// use globalfit::prelude::*;
/// use nalgebra::{DMatrix, DVector};
///
/// let model = ModelBuilder::new(&["k"])
///     .estimated_axis("spectral")
///     .calculated_axis("time")
///     .megacomplex("decay", "decay", &["k"], &["species"])
///     .dataset("dataset1", &["decay"])
///     .build()
///     .unwrap();
/// let time = vec![0., 1., 2., 3.];
/// let data = DMatrix::from_fn(4, 2, |t, s| (s as f64 + 1.) * (-0.5 * time[t]).exp());
/// let dataset = Dataset::new(
///     "dataset1",
///     Axis::new("time", time.clone()),
///     Axis::new("spectral", vec![400., 500.]),
///     data,
/// )
/// .unwrap();
///
/// let problem = GlobalProblemBuilder::new(model)
///     .dataset(dataset)
///     .initial_parameters(DVector::from_vec(vec![0.4]))
///     .build()
///     .unwrap();
/// assert_eq!(problem.grouping().len(), 2);
/// ```
///
/// # Building a Problem
///
/// The model and at least one dataset per dataset model and the initial
/// parameters are mandatory. Everything else is optional and can also be
/// given at once as a [`FitConfig`]. The [`build`](GlobalProblemBuilder::build)
/// method validates all inputs, groups the datasets and evaluates the
/// objective once at the initial parameters.
#[must_use = "The builder should be transformed into a problem using the build() method"]
pub struct GlobalProblemBuilder {
    /// Required: the model
    model: Model,
    /// Required: the datasets, one per dataset model
    datasets: Vec<Dataset>,
    /// Required: the initial guess for the nonlinear parameters
    initial_parameters: Option<DVector<f64>>,
    /// Optional: the configuration of the fit
    config: FitConfig,
    /// Optional: invoked after every evaluation
    on_evaluation: Option<EvaluationCallback>,
}

impl GlobalProblemBuilder {
    /// Create a new builder for the given model.
    pub fn new(model: Model) -> Self {
        Self {
            model,
            datasets: Vec::new(),
            initial_parameters: None,
            config: FitConfig::default(),
            on_evaluation: None,
        }
    }

    /// **Mandatory**: add a dataset. Every dataset model of the model needs
    /// exactly one dataset with the same label. The order in which the datasets
    /// are added is the order in which they are grouped.
    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    /// **Mandatory**: add several datasets, see [`dataset`](Self::dataset).
    pub fn datasets(mut self, datasets: impl IntoIterator<Item = Dataset>) -> Self {
        self.datasets.extend(datasets);
        self
    }

    /// **Mandatory**: the initial guess for the nonlinear parameters, in the
    /// order in which the parameter names were given to the model.
    pub fn initial_parameters(self, parameters: DVector<f64>) -> Self {
        Self {
            initial_parameters: Some(parameters),
            ..self
        }
    }

    /// **Optional**: set the whole configuration at once. This overrides all
    /// configuration that was given before.
    pub fn config(self, config: FitConfig) -> Self {
        Self { config, ..self }
    }

    /// **Optional**: the absolute tolerance within which coordinates of the
    /// estimated axes are grouped together. Defaults to zero, which means that
    /// only identical coordinates are grouped.
    pub fn group_tolerance(mut self, tolerance: f64) -> Self {
        self.config.group_tolerance = tolerance;
        self
    }

    /// **Optional**: solve the linear subproblems with non-negative least
    /// squares instead of variable projection.
    pub fn nnls(mut self, nnls: bool) -> Self {
        self.config.linear_solver = if nnls {
            LinearSolverKind::NonNegative
        } else {
            LinearSolverKind::VariableProjection
        };
        self
    }

    /// **Optional** This value is relevant for the variable projection solver, because it
    /// uses singular value decomposition internally. This method sets a value `\epsilon`
    /// for which smaller (i.e. absolute - wise) singular values are considered zero. In
    /// essence this gives a truncation of the SVD. This might be helpful if two columns of
    /// the design matrix become linear dependent when the nonlinear model parameters
    /// align in an unfortunate way.
    ///
    /// If this value is not given, it is derived from the largest singular value.
    ///
    /// The given epsilon is automatically converted to a non-negative number.
    pub fn epsilon(mut self, eps: f64) -> Self {
        self.config.svd_epsilon = Some(eps.abs());
        self
    }

    /// **Optional**: the iteration bound of the NNLS solver per linear
    /// subproblem. Defaults to three times the number of CLPs of the group.
    pub fn nnls_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.nnls_max_iterations = Some(max_iterations);
        self
    }

    /// **Optional**: the maximum number of objective evaluations of the optimizer.
    pub fn max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.config.max_evaluations = Some(max_evaluations);
        self
    }

    /// **Optional**: a callback that is invoked after every successful
    /// evaluation of the objective with the evaluation number, the parameters
    /// and the chi-square.
    pub fn on_evaluation<F>(self, callback: F) -> Self
    where
        F: FnMut(usize, &DVector<f64>, f64) + Send + 'static,
    {
        Self {
            on_evaluation: Some(Box::new(callback)),
            ..self
        }
    }

    /// Build the problem.
    ///
    /// # Errors
    ///
    /// See [`SetupError`]. All datasets are checked and the errors of all
    /// offending datasets are reported together.
    pub fn build(self) -> Result<GlobalProblem, SetupError> {
        let Self {
            model,
            datasets,
            initial_parameters,
            config,
            on_evaluation,
        } = self;

        if !config.group_tolerance.is_finite() || config.group_tolerance < 0. {
            return Err(SetupError::InvalidGroupTolerance {
                tolerance: config.group_tolerance,
            });
        }

        let parameters = initial_parameters.ok_or(SetupError::MissingInitialParameters)?;
        if parameters.len() != model.parameter_count() {
            return Err(SetupError::InvalidParameterCount {
                model_count: model.parameter_count(),
                provided_count: parameters.len(),
            });
        }

        let (prepared, dataset_models) = prepare_datasets(&model, datasets)?;

        let grouping = group_datasets(
            prepared
                .iter()
                .map(|dataset| (dataset.label.as_str(), dataset.estimated_axis.as_slice())),
            config.group_tolerance,
        )?;

        let clp_labels = prepared
            .iter()
            .zip(dataset_models.iter())
            .map(|(dataset, &model_idx)| {
                discover_clp_labels(&model, &model.datasets[model_idx], dataset, &parameters)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let layouts = grouping
            .groups()
            .iter()
            .map(|group| GroupLayout::new(group, &prepared, &clp_labels))
            .collect();

        let objective = Objective {
            model,
            datasets: prepared,
            dataset_models,
            clp_labels,
            grouping,
            layouts,
            solver: ClpSolver::new(
                config.linear_solver,
                config.svd_epsilon,
                config.nnls_max_iterations,
            ),
            additional_residual_len: None,
        };

        let mut problem = GlobalProblem {
            state: objective.empty_state(),
            objective,
            parameters: parameters.clone(),
            cached: None,
            fatal_error: RefCell::new(None),
            max_evaluations: config.max_evaluations,
            evaluations: 0,
            unconverged_total: 0,
            on_evaluation,
        };
        problem.update(parameters);
        if let Some(error) = problem.fatal_error.take() {
            return Err(SetupError::Evaluation(error));
        }

        let group_rows: usize = problem.objective.layouts.iter().map(GroupLayout::nrows).sum();
        let residual_len = problem.residual().map_or(group_rows, |r| r.len());
        if problem.objective.model.additional_residual.is_some() {
            problem.objective.additional_residual_len = Some(residual_len - group_rows);
        }

        tracing::info!(
            datasets = problem.objective.datasets.len(),
            groups = problem.objective.layouts.len(),
            parameters = problem.parameters.len(),
            residuals = residual_len,
            solver = ?problem.objective.solver.kind(),
            "set up global problem"
        );
        Ok(problem)
    }
}

/// Check the datasets against the model and resolve their axes. Returns the
/// prepared datasets in the given order and the index of the dataset model
/// of each of them.
fn prepare_datasets(
    model: &Model,
    datasets: Vec<Dataset>,
) -> Result<(Vec<PreparedDataset>, Vec<usize>), SetupError> {
    let mut errors = Vec::new();
    let mut prepared = Vec::with_capacity(datasets.len());
    let mut dataset_models = Vec::with_capacity(datasets.len());
    let mut seen = HashSet::new();

    for dataset in datasets {
        if !seen.insert(dataset.label().to_string()) {
            errors.push(DatasetError::DuplicateLabel {
                dataset: dataset.label().to_string(),
            });
            continue;
        }
        let Some(model_idx) = model
            .datasets
            .iter()
            .position(|dataset_model| dataset_model.label == dataset.label())
        else {
            errors.push(DatasetError::NoDatasetModel {
                dataset: dataset.label().to_string(),
            });
            continue;
        };
        match PreparedDataset::prepare(dataset, &model.estimated_axis, &model.calculated_axis) {
            Ok(dataset) => {
                prepared.push(dataset);
                dataset_models.push(model_idx);
            }
            Err(error) => errors.push(error),
        }
    }

    for dataset_model in &model.datasets {
        if !seen.contains(&dataset_model.label) {
            errors.push(DatasetError::MissingData {
                dataset: dataset_model.label.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok((prepared, dataset_models))
    } else {
        Err(SetupError::InvalidDatasets(errors))
    }
}
