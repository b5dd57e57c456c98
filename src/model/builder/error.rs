use thiserror::Error as ThisError;

/// An error structure that contains error variants that occur when building a model.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ModelBuildError {
    /// Model parameters contain duplicates
    #[error("Parameter list {:?} contains duplicates! Parameter lists must comprise only unique elements.", parameters)]
    DuplicateParameterNames {
        /// the given parameter list containing duplicates
        parameters: Vec<String>,
    },

    /// Model parameter list is empty.
    #[error("The model parameter list is empty! It must at least contain one parameter.")]
    EmptyParameters,

    /// Parameter names may not contain a comma separator, because this is most likely caused by a typo, i.e.
    /// `["tau,phi"]`, instead of actually `["tau","phi"]`. So this is forbidden in order to help spotting these
    /// hard to find errors.
    #[error("Parameter names may not contain comma separator: '{}'. Did you want to give two parameters?", param_name)]
    CommaInParameterNameNotAllowed {
        /// the parameter name
        param_name: String,
    },

    /// A megacomplex was added that depends on a parameter which is not in the model
    #[error(
        "Parameter '{}' of megacomplex '{}' is not part of the model parameters.",
        parameter,
        megacomplex
    )]
    ParameterNotInModel {
        /// the megacomplex label
        megacomplex: String,
        /// the name of the parameter not in the set
        parameter: String,
    },

    /// The type tag of a megacomplex is not in the registry
    #[error("Unknown megacomplex type '{}' for megacomplex '{}'.", tag, megacomplex)]
    UnknownMegacomplexType {
        /// the megacomplex label
        megacomplex: String,
        /// the unknown type tag
        tag: String,
    },

    /// A constructor was registered twice for the same type tag
    #[error("Megacomplex type '{}' is already registered.", tag)]
    DuplicateMegacomplexType {
        /// the type tag
        tag: String,
    },

    /// Two megacomplexes share a label
    #[error("Megacomplex label '{}' is used more than once.", label)]
    DuplicateMegacomplexLabel {
        /// the duplicate label
        label: String,
    },

    /// A dataset model refers to a megacomplex that was not added to the model
    #[error("Dataset '{}' refers to unknown megacomplex '{}'.", dataset, megacomplex)]
    UnknownMegacomplex {
        /// the dataset label
        dataset: String,
        /// the megacomplex label
        megacomplex: String,
    },

    /// Two dataset models share a label
    #[error("Dataset label '{}' is used more than once.", label)]
    DuplicateDatasetLabel {
        /// the duplicate label
        label: String,
    },

    /// A dataset model without megacomplexes
    #[error("Dataset '{}' has no megacomplexes. A dataset model must contain at least one megacomplex.", label)]
    EmptyDataset {
        /// the dataset label
        label: String,
    },

    /// A constructor rejected the specification of a megacomplex
    #[error("Invalid specification for megacomplex '{}': {}", label, reason)]
    InvalidMegacomplexSpec {
        /// the megacomplex label
        label: String,
        /// what is wrong with it
        reason: String,
    },

    /// The estimated and the calculated axis have the same name
    #[error("The estimated and the calculated axis must have different names, but both are '{}'.", name)]
    IdenticalAxisNames {
        /// the axis name
        name: String,
    },

    /// Tried to construct a model without dataset models
    #[error("Tried to construct model with no datasets. A model must describe at least one dataset.")]
    EmptyModel,
}
