use super::{
    AdditionalResidual, DatasetModel, Megacomplex, MegacomplexRegistry, MegacomplexSpec, Model,
    ModelMegacomplex,
};
use crate::problem::ClpLookup;
use nalgebra::DVector;
use std::collections::HashSet;

mod error;

pub use error::ModelBuildError;

/// the default name of the estimated (global) axis
pub const DEFAULT_ESTIMATED_AXIS: &str = "global";
/// the default name of the calculated (model) axis
pub const DEFAULT_CALCULATED_AXIS: &str = "model";

/// A megacomplex that was added to the builder but not yet created
enum PendingMegacomplex {
    ByTag { tag: String, spec: MegacomplexSpec },
    Instance { label: String, megacomplex: Box<dyn Megacomplex> },
}

impl PendingMegacomplex {
    fn label(&self) -> &str {
        match self {
            PendingMegacomplex::ByTag { spec, .. } => &spec.label,
            PendingMegacomplex::Instance { label, .. } => label,
        }
    }
}

/// The state of a model under construction
struct UnfinishedModel {
    parameter_names: Vec<String>,
    estimated_axis: String,
    calculated_axis: String,
    registry: MegacomplexRegistry,
    megacomplexes: Vec<PendingMegacomplex>,
    datasets: Vec<(String, Vec<String>)>,
    additional_residual: Option<AdditionalResidual>,
}

/// A builder that allows us to construct a valid [`Model`].
///
/// The builder keeps the first error that occurs and reports it when
/// [`build`](ModelBuilder::build) is called, so that the calls can be chained.
///
/// # Example
///
/// ```rust
/// use globalfit::prelude::*;
///
/// let model = ModelBuilder::new(&["k1", "k2"])
///     .estimated_axis("spectral")
///     .calculated_axis("time")
///     .megacomplex("decays", "decay", &["k1", "k2"], &["species1", "species2"])
///     .dataset("dataset1", &["decays"])
///     .build()
///     .unwrap();
/// assert_eq!(model.parameter_count(), 2);
/// ```
#[must_use = "The builder should be transformed into a model using the build() method"]
pub struct ModelBuilder {
    model_result: Result<UnfinishedModel, ModelBuildError>,
}

impl ModelBuilder {
    /// Create a builder for a model with the given nonlinear parameters. The
    /// order of the names is the order of the parameter vector.
    pub fn new<StrType>(parameter_names: &[StrType]) -> Self
    where
        StrType: Into<String> + Clone,
    {
        let parameter_names: Vec<String> = parameter_names
            .iter()
            .cloned()
            .map(Into::into)
            .collect();
        let model_result = check_parameter_names(&parameter_names).map(|_| UnfinishedModel {
            parameter_names,
            estimated_axis: DEFAULT_ESTIMATED_AXIS.to_string(),
            calculated_axis: DEFAULT_CALCULATED_AXIS.to_string(),
            registry: MegacomplexRegistry::default(),
            megacomplexes: Vec::new(),
            datasets: Vec::new(),
            additional_residual: None,
        });
        Self { model_result }
    }

    /// the name of the estimated (global) axis, defaults to `"global"`
    pub fn estimated_axis(mut self, name: impl Into<String>) -> Self {
        if let Ok(model) = self.model_result.as_mut() {
            model.estimated_axis = name.into();
        }
        self
    }

    /// the name of the calculated (model) axis, defaults to `"model"`
    pub fn calculated_axis(mut self, name: impl Into<String>) -> Self {
        if let Ok(model) = self.model_result.as_mut() {
            model.calculated_axis = name.into();
        }
        self
    }

    /// Use the given registry to resolve megacomplex type tags. Defaults to
    /// [`MegacomplexRegistry::default`].
    pub fn registry(mut self, registry: MegacomplexRegistry) -> Self {
        if let Ok(model) = self.model_result.as_mut() {
            model.registry = registry;
        }
        self
    }

    /// Add a megacomplex of a registered type.
    ///
    /// # Arguments
    ///
    /// * `label`: the label under which dataset models refer to the megacomplex
    /// * `tag`: the registered type of the megacomplex
    /// * `parameters`: names of model parameters that are handed to the constructor
    ///   as indices into the parameter vector
    /// * `labels`: the labels the megacomplex uses to name its CLPs
    pub fn megacomplex<StrType>(
        mut self,
        label: impl Into<String>,
        tag: impl Into<String>,
        parameters: &[StrType],
        labels: &[StrType],
    ) -> Self
    where
        StrType: AsRef<str>,
    {
        let label = label.into();
        if let Ok(model) = self.model_result.as_mut() {
            let indices: Result<Vec<usize>, ModelBuildError> = parameters
                .iter()
                .map(|name| {
                    model
                        .parameter_names
                        .iter()
                        .position(|p| p == name.as_ref())
                        .ok_or_else(|| ModelBuildError::ParameterNotInModel {
                            megacomplex: label.clone(),
                            parameter: name.as_ref().to_string(),
                        })
                })
                .collect();
            match indices {
                Ok(parameters) => model.megacomplexes.push(PendingMegacomplex::ByTag {
                    tag: tag.into(),
                    spec: MegacomplexSpec {
                        label,
                        labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
                        parameters,
                    },
                }),
                Err(err) => self.model_result = Err(err),
            }
        }
        self
    }

    /// Add a megacomplex instance directly, bypassing the registry.
    pub fn megacomplex_instance(
        mut self,
        label: impl Into<String>,
        megacomplex: Box<dyn Megacomplex>,
    ) -> Self {
        if let Ok(model) = self.model_result.as_mut() {
            model.megacomplexes.push(PendingMegacomplex::Instance {
                label: label.into(),
                megacomplex,
            });
        }
        self
    }

    /// Add a dataset model that uses the given megacomplexes. The design matrix
    /// of the dataset is the sum of the matrices of its megacomplexes.
    pub fn dataset<StrType>(mut self, label: impl Into<String>, megacomplexes: &[StrType]) -> Self
    where
        StrType: AsRef<str>,
    {
        if let Ok(model) = self.model_result.as_mut() {
            model.datasets.push((
                label.into(),
                megacomplexes
                    .iter()
                    .map(|m| m.as_ref().to_string())
                    .collect(),
            ));
        }
        self
    }

    /// Add a model level residual that is appended to the residual vector of
    /// every evaluation. It receives the current parameters and the CLPs of
    /// the evaluation.
    pub fn additional_residual<F>(mut self, residual: F) -> Self
    where
        F: Fn(&DVector<f64>, &ClpLookup<'_>) -> DVector<f64> + Send + Sync + 'static,
    {
        if let Ok(model) = self.model_result.as_mut() {
            model.additional_residual = Some(Box::new(residual));
        }
        self
    }

    /// Build the model. Creates all megacomplexes and resolves the
    /// megacomplexes of the dataset models.
    pub fn build(self) -> Result<Model, ModelBuildError> {
        let UnfinishedModel {
            parameter_names,
            estimated_axis,
            calculated_axis,
            registry,
            megacomplexes: pending,
            datasets: pending_datasets,
            additional_residual,
        } = self.model_result?;

        if estimated_axis == calculated_axis {
            return Err(ModelBuildError::IdenticalAxisNames {
                name: estimated_axis,
            });
        }

        let mut labels = HashSet::new();
        if let Some(duplicate) = pending.iter().find(|m| !labels.insert(m.label())) {
            return Err(ModelBuildError::DuplicateMegacomplexLabel {
                label: duplicate.label().to_string(),
            });
        }

        let megacomplexes = pending
            .into_iter()
            .map(|pending| match pending {
                PendingMegacomplex::ByTag { tag, spec } => {
                    registry
                        .create(&tag, &spec)
                        .map(|megacomplex| ModelMegacomplex {
                            label: spec.label,
                            megacomplex,
                        })
                }
                PendingMegacomplex::Instance { label, megacomplex } => {
                    Ok(ModelMegacomplex { label, megacomplex })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if pending_datasets.is_empty() {
            return Err(ModelBuildError::EmptyModel);
        }
        let mut dataset_labels = HashSet::new();
        let mut datasets = Vec::with_capacity(pending_datasets.len());
        for (label, megacomplex_labels) in pending_datasets {
            if !dataset_labels.insert(label.clone()) {
                return Err(ModelBuildError::DuplicateDatasetLabel { label });
            }
            if megacomplex_labels.is_empty() {
                return Err(ModelBuildError::EmptyDataset { label });
            }
            let indices = megacomplex_labels
                .into_iter()
                .map(|megacomplex| {
                    megacomplexes
                        .iter()
                        .position(|m| m.label == megacomplex)
                        .ok_or_else(|| ModelBuildError::UnknownMegacomplex {
                            dataset: label.clone(),
                            megacomplex,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            datasets.push(DatasetModel {
                label,
                megacomplexes: indices,
            });
        }

        Ok(Model {
            parameter_names,
            estimated_axis,
            calculated_axis,
            megacomplexes,
            datasets,
            additional_residual,
        })
    }
}

/// check that the parameter names are not empty, unique and do not contain commas
fn check_parameter_names(parameter_names: &[String]) -> Result<(), ModelBuildError> {
    if parameter_names.is_empty() {
        return Err(ModelBuildError::EmptyParameters);
    }
    if let Some(param_name) = parameter_names.iter().find(|name| name.contains(',')) {
        return Err(ModelBuildError::CommaInParameterNameNotAllowed {
            param_name: param_name.clone(),
        });
    }
    let unique: HashSet<&String> = parameter_names.iter().collect();
    if unique.len() != parameter_names.len() {
        return Err(ModelBuildError::DuplicateParameterNames {
            parameters: parameter_names.to_vec(),
        });
    }
    Ok(())
}
