use super::{PropId, Property};
use crate::stmt::Direction;

use indexmap::IndexMap;

/// A typed record kind.
#[derive(Debug)]
pub struct Model {
    pub id: ModelId,

    /// Full name including the namespace, e.g. `datasets/gov/City`
    pub name: String,

    /// Namespace the model belongs to; `""` for the root
    pub ns: String,

    pub title: String,

    /// Storage table
    pub table: String,

    /// Every property of the model, nested ones included
    pub props: Vec<Property>,

    /// Top-level properties by name, in declaration order
    pub properties: IndexMap<String, PropId>,

    /// Every addressable property by its dotted place
    pub flatprops: IndexMap<String, PropId>,

    /// External primary key. Defaults to `[_id]`.
    pub pkeys: Vec<PropId>,

    /// Single-inheritance parent
    pub base: Option<ModelId>,

    /// Keyset used for pagination
    pub page: Vec<PageKey>,

    /// Sets of properties whose combined values must be unique
    pub unique: Vec<Vec<PropId>>,
}

/// Index of a model in the manifest arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageKey {
    pub prop: PropId,
    pub direction: Direction,
}

impl Model {
    pub fn prop(&self, id: PropId) -> &Property {
        debug_assert_eq!(id.model, self.id);
        &self.props[id.index]
    }

    /// Looks up a property by its dotted place.
    pub fn flatprop(&self, place: &str) -> Option<&Property> {
        self.flatprops.get(place).map(|id| self.prop(*id))
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name).map(|id| self.prop(*id))
    }

    /// The `_id` property.
    pub fn id_prop(&self) -> &Property {
        &self.props[0]
    }

    /// The `_revision` property.
    pub fn revision_prop(&self) -> &Property {
        &self.props[1]
    }

    /// Last path segment of the model name.
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Top-level properties that are not reserved.
    pub fn user_properties(&self) -> impl Iterator<Item = &Property> + '_ {
        self.properties
            .values()
            .map(|id| self.prop(*id))
            .filter(|prop| !prop.is_reserved())
    }
}
