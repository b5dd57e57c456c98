use crate::fit::DatasetResult;
use crate::problem::ClpLookup;
use nalgebra::{DMatrix, DVector};
use thiserror::Error as ThisError;

pub mod builder;
pub mod builtin;
pub mod registry;

pub use builder::{ModelBuildError, ModelBuilder};
pub use registry::{MegacomplexConstructor, MegacomplexRegistry, MegacomplexSpec};

/// The matrix a megacomplex contributes to the design matrix of a dataset.
/// The matrix has one row per point on the calculated axis and one column per
/// conditionally linear parameter (CLP) label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClpMatrix {
    /// the labels of the conditionally linear parameters, one per column
    pub clp_labels: Vec<String>,
    /// the matrix of model responses
    pub matrix: DMatrix<f64>,
}

/// Errors a megacomplex can report when it calculates its matrix.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum MegacomplexError {
    /// the megacomplex refers to a parameter that is not in the parameter vector
    #[error(
        "Parameter index {} is out of bounds for a parameter vector of length {}.",
        index,
        len
    )]
    ParameterOutOfBounds {
        /// the requested index
        index: usize,
        /// the length of the parameter vector
        len: usize,
    },

    /// a parameter has a value that the megacomplex cannot work with
    #[error("Parameter at index {} has invalid value {}: {}", index, value, reason)]
    InvalidParameterValue {
        /// index of the parameter
        index: usize,
        /// the value of the parameter
        value: f64,
        /// why the value is invalid
        reason: &'static str,
    },
}

/// A model component that contributes one additive term, and the labels of its
/// conditionally linear parameters, to the design matrix of a dataset.
///
/// Implementations are looked up by type tag in the [`MegacomplexRegistry`] or
/// added directly to a model with [`ModelBuilder::megacomplex_instance`].
pub trait Megacomplex: Send + Sync {
    /// Calculate the matrix of this megacomplex for one point of the estimated axis.
    ///
    /// # Arguments
    ///
    /// * `parameters`: the current nonlinear parameters of the model, in the order
    ///   in which the parameter names were given to the model
    /// * `calculated_axis`: the calculated (model) axis of the dataset
    /// * `estimated_axis`: the estimated (global) axis of the dataset
    /// * `global_index`: the index into the estimated axis. Megacomplexes that are
    ///   not [index dependent](Megacomplex::index_dependent) must return the same
    ///   matrix for every index.
    ///
    /// # Result
    ///
    /// A matrix with `calculated_axis.len()` rows and one column per CLP label.
    /// The labels must not change between calls.
    fn calculate_matrix(
        &self,
        parameters: &DVector<f64>,
        calculated_axis: &DVector<f64>,
        estimated_axis: &DVector<f64>,
        global_index: usize,
    ) -> Result<ClpMatrix, MegacomplexError>;

    /// whether the matrix depends on the index into the estimated axis
    fn index_dependent(&self) -> bool {
        false
    }

    /// Hook that is invoked once after the fit is finalized for every dataset
    /// that uses this megacomplex. It can add derived quantities to the result.
    fn finalize_data(
        &self,
        _megacomplex_label: &str,
        _parameters: &DVector<f64>,
        _result: &mut DatasetResult,
    ) {
    }
}

/// Signature of the optional model level residual that is appended to the
/// residual of the linear subproblems, e.g. a penalty on the CLPs.
pub type AdditionalResidual =
    Box<dyn Fn(&DVector<f64>, &ClpLookup<'_>) -> DVector<f64> + Send + Sync>;

/// The model of one dataset: the megacomplexes that make up its design matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetModel {
    pub(crate) label: String,
    /// indices into the megacomplexes of the model
    pub(crate) megacomplexes: Vec<usize>,
}

impl DatasetModel {
    /// the label of the dataset this model describes
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A labeled megacomplex instance inside a model
pub(crate) struct ModelMegacomplex {
    pub(crate) label: String,
    pub(crate) megacomplex: Box<dyn Megacomplex>,
}

/// The model for a global analysis.
///
/// A model holds the names of the nonlinear parameters, the names of the
/// estimated and calculated axes, the megacomplexes, and one [`DatasetModel`]
/// per dataset. Use the [`ModelBuilder`] to create one.
pub struct Model {
    pub(crate) parameter_names: Vec<String>,
    pub(crate) estimated_axis: String,
    pub(crate) calculated_axis: String,
    pub(crate) megacomplexes: Vec<ModelMegacomplex>,
    pub(crate) datasets: Vec<DatasetModel>,
    pub(crate) additional_residual: Option<AdditionalResidual>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let megacomplexes: Vec<&str> = self
            .megacomplexes
            .iter()
            .map(|m| m.label.as_str())
            .collect();
        f.debug_struct("Model")
            .field("parameter_names", &self.parameter_names)
            .field("estimated_axis", &self.estimated_axis)
            .field("calculated_axis", &self.calculated_axis)
            .field("megacomplexes", &megacomplexes)
            .field("datasets", &self.datasets)
            .field(
                "additional_residual",
                &self.additional_residual.as_ref().map(|_| "/* omitted */"),
            )
            .finish()
    }
}

impl Model {
    /// the names of the nonlinear parameters
    pub fn parameters(&self) -> &[String] {
        &self.parameter_names
    }

    /// the number of nonlinear parameters
    pub fn parameter_count(&self) -> usize {
        self.parameter_names.len()
    }

    /// the name of the estimated (global) axis
    pub fn estimated_axis(&self) -> &str {
        &self.estimated_axis
    }

    /// the name of the calculated (model) axis
    pub fn calculated_axis(&self) -> &str {
        &self.calculated_axis
    }

    /// the dataset models
    pub fn datasets(&self) -> &[DatasetModel] {
        &self.datasets
    }

    /// the dataset model for the given label
    pub fn dataset_model(&self, label: &str) -> Option<&DatasetModel> {
        self.datasets.iter().find(|dataset| dataset.label == label)
    }

    /// the labels of the megacomplexes of a dataset model
    pub fn megacomplex_labels<'a>(
        &'a self,
        dataset_model: &'a DatasetModel,
    ) -> impl Iterator<Item = &'a str> {
        dataset_model
            .megacomplexes
            .iter()
            .map(|&idx| self.megacomplexes[idx].label.as_str())
    }

    /// a dataset model is index dependent if any of its megacomplexes is
    pub fn index_dependent(&self, dataset_model: &DatasetModel) -> bool {
        dataset_model
            .megacomplexes
            .iter()
            .any(|&idx| self.megacomplexes[idx].megacomplex.index_dependent())
    }

    /// iterate the labeled megacomplexes of a dataset model
    pub(crate) fn megacomplexes_of<'a>(
        &'a self,
        dataset_model: &'a DatasetModel,
    ) -> impl Iterator<Item = &'a ModelMegacomplex> {
        dataset_model
            .megacomplexes
            .iter()
            .map(|&idx| &self.megacomplexes[idx])
    }

    /// Invoke the finalize hook of every megacomplex of the dataset model
    /// belonging to the given result.
    pub(crate) fn finalize(&self, parameters: &DVector<f64>, result: &mut DatasetResult) {
        let Some(dataset_model) = self.dataset_model(&result.label) else {
            return;
        };
        for entry in self.megacomplexes_of(dataset_model) {
            entry
                .megacomplex
                .finalize_data(&entry.label, parameters, result);
        }
    }
}
