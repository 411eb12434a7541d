mod builder;
pub use builder::{Builder, ModelDef, PropDef};

mod data_type;
pub use data_type::{Array, BackRef, DataType, Denorm, Geometry, Object, Ref, Text};

pub mod db;

mod manifest;
pub use manifest::Manifest;

mod model;
pub use model::{Model, ModelId, PageKey};

mod namespace;
pub use namespace::Namespace;

mod property;
pub use property::{Access, EnumItem, PropId, Property};

mod tabular;

/// Name of the reserved primary key property.
pub const ID: &str = "_id";

/// Name of the reserved revision property.
pub const REVISION: &str = "_revision";
