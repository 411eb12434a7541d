use super::{db, Builder, Model, ModelId, Namespace, PropId, Property};
use crate::{Error, ErrorCode, Result};

use indexmap::IndexMap;

/// The compiled schema: models, their properties and the namespace tree.
///
/// Built once and shared behind an `Arc`; properties reference models and
/// each other through [`ModelId`] and [`PropId`] indices.
#[derive(Debug)]
pub struct Manifest {
    pub(super) models: Vec<Model>,
    pub(super) names: IndexMap<String, ModelId>,
    pub(super) namespaces: IndexMap<String, Namespace>,

    /// Tables backing the models
    pub db: db::Schema,
}

impl Manifest {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn model(&self, id: ModelId) -> &Model {
        &self.models[id.0]
    }

    pub fn prop(&self, id: PropId) -> &Property {
        self.model(id.model).prop(id)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> + '_ {
        self.models.iter()
    }

    pub fn find_model(&self, name: &str) -> Option<&Model> {
        self.names.get(name).map(|id| self.model(*id))
    }

    /// Looks up a model or fails with `ModelNotFound`.
    pub fn get_model(&self, name: &str) -> Result<&Model> {
        self.find_model(name)
            .ok_or_else(|| Error::new(ErrorCode::ModelNotFound).with("model", name))
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> + '_ {
        self.namespaces.values()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.namespaces.is_empty()
    }

    /// Models declared in `ns` or any namespace below it.
    pub fn models_under<'a>(&'a self, ns: &'a str) -> impl Iterator<Item = &'a Model> + 'a {
        self.models.iter().filter(move |model| {
            ns.is_empty()
                || model.ns == ns
                || model
                    .ns
                    .strip_prefix(ns)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}
