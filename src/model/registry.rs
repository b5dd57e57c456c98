use super::builtin::{DampedOscillationMegacomplex, DecayMegacomplex};
use super::{Megacomplex, ModelBuildError};
use std::collections::BTreeMap;

/// Everything a constructor needs to know to create a megacomplex from its
/// type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MegacomplexSpec {
    /// the label of the megacomplex inside the model
    pub label: String,
    /// the labels the megacomplex uses to name its CLPs
    pub labels: Vec<String>,
    /// indices of the megacomplex parameters into the parameter vector of the
    /// model, in the order in which they were given to the builder
    pub parameters: Vec<usize>,
}

/// Creates a megacomplex from its specification.
pub type MegacomplexConstructor = fn(&MegacomplexSpec) -> Result<Box<dyn Megacomplex>, ModelBuildError>;

/// A registry that maps megacomplex type tags to constructors.
///
/// The registry is an explicit value that is handed to the [`ModelBuilder`](super::ModelBuilder),
/// there is no process wide registry. The default registry knows the builtin
/// types `"decay"` and `"damped-oscillation"`.
#[derive(Debug, Clone)]
pub struct MegacomplexRegistry {
    constructors: BTreeMap<String, MegacomplexConstructor>,
}

impl MegacomplexRegistry {
    /// a registry that does not know any megacomplex types
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register a constructor for the given type tag.
    ///
    /// # Errors
    ///
    /// If the tag is already registered.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        constructor: MegacomplexConstructor,
    ) -> Result<(), ModelBuildError> {
        let tag = tag.into();
        if self.constructors.contains_key(&tag) {
            return Err(ModelBuildError::DuplicateMegacomplexType { tag });
        }
        self.constructors.insert(tag, constructor);
        Ok(())
    }

    /// whether a constructor for the tag is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// the registered type tags in lexicographic order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// create a megacomplex of the given type
    pub fn create(
        &self,
        tag: &str,
        spec: &MegacomplexSpec,
    ) -> Result<Box<dyn Megacomplex>, ModelBuildError> {
        let constructor =
            self.constructors
                .get(tag)
                .ok_or_else(|| ModelBuildError::UnknownMegacomplexType {
                    megacomplex: spec.label.clone(),
                    tag: tag.to_string(),
                })?;
        constructor(spec)
    }
}

impl Default for MegacomplexRegistry {
    fn default() -> Self {
        let mut constructors: BTreeMap<String, MegacomplexConstructor> = BTreeMap::new();
        constructors.insert(DecayMegacomplex::TAG.to_string(), DecayMegacomplex::from_spec);
        constructors.insert(
            DampedOscillationMegacomplex::TAG.to_string(),
            DampedOscillationMegacomplex::from_spec,
        );
        Self { constructors }
    }
}
