use super::{
    data_type::{Array, BackRef, Denorm, Geometry, Object, Ref, Text},
    db, Access, DataType, EnumItem, Manifest, Model, ModelId, Namespace, PageKey, PropId,
    Property, ID, REVISION,
};
use crate::{
    stmt::{Direction, Type, Value},
    Error, ErrorCode, Result,
};

use indexmap::IndexMap;

/// Programmatic manifest construction.
///
/// Models and properties are declared by name; [`Builder::build`] assigns
/// arena ids, links refs, backrefs and denorms, and derives the storage
/// schema.
#[derive(Debug, Default)]
pub struct Builder {
    models: Vec<ModelDef>,
    namespaces: IndexMap<String, (String, String)>,
}

#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub title: String,
    pub access: Option<Access>,
    pub pkeys: Vec<String>,
    pub base: Option<String>,

    /// Page keys; a leading `-` means descending
    pub page: Vec<String>,

    pub unique: Vec<Vec<String>>,
    pub props: Vec<PropDef>,
}

#[derive(Debug, Clone)]
pub struct PropDef {
    pub name: String,
    pub ty: String,

    /// Target model of a `ref` or `backref`
    pub model: Option<String>,

    pub refprops: Vec<String>,
    pub access: Option<Access>,
    pub hidden: bool,
    pub required: bool,
    pub unique: bool,
    pub default: Value,
    pub enum_items: Vec<EnumItem>,
    pub langs: Vec<String>,
    pub items: Option<Box<PropDef>>,
    pub props: Vec<PropDef>,
    pub srid: Option<u32>,
    pub title: String,
}

/// Links that can only be resolved once every model has its properties.
enum Pending {
    Ref { prop: PropId, def: PropDef },
    BackRef { prop: PropId, def: PropDef },
    Denorm { prop: PropId, parent: PropId },
}

impl Builder {
    pub fn model(mut self, model: ModelDef) -> Builder {
        self.models.push(model);
        self
    }

    pub fn namespace(
        mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Builder {
        self.namespaces
            .insert(name.into(), (title.into(), description.into()));
        self
    }

    pub fn build(self) -> Result<Manifest> {
        let mut names = IndexMap::new();
        for (index, def) in self.models.iter().enumerate() {
            check_model_name(&def.name)?;
            if names.insert(def.name.clone(), ModelId(index)).is_some() {
                return Err(invalid(format!("model {:?} is declared twice", def.name)));
            }
        }

        let mut models = vec![];
        let mut pending = vec![];

        for (index, def) in self.models.iter().enumerate() {
            let id = ModelId(index);
            let ns = match def.name.rfind('/') {
                Some(pos) => def.name[..pos].to_string(),
                None => String::new(),
            };
            let base = match &def.base {
                Some(base) => Some(resolve_model(&names, &ns, base)?),
                None => None,
            };

            let mut model = Model {
                id,
                name: def.name.clone(),
                ns,
                title: def.title.clone(),
                table: def.name.clone(),
                props: vec![],
                properties: IndexMap::new(),
                flatprops: IndexMap::new(),
                pkeys: vec![],
                base,
                page: vec![],
                unique: vec![],
            };

            let access = def.access.unwrap_or_default();
            add_reserved(&mut model, ID, DataType::PrimaryKey, access);
            add_reserved(&mut model, REVISION, DataType::String, access);

            for prop in &def.props {
                add_prop(&mut model, prop, None, access, &mut pending)?;
            }

            model.pkeys = if def.pkeys.is_empty() {
                vec![model.props[0].id]
            } else {
                def.pkeys
                    .iter()
                    .map(|name| lookup_prop(&model, name))
                    .collect::<Result<_>>()?
            };

            model.page = if def.page.is_empty() {
                vec![PageKey {
                    prop: model.props[0].id,
                    direction: Direction::Asc,
                }]
            } else {
                def.page
                    .iter()
                    .map(|key| {
                        let (name, direction) = match key.strip_prefix('-') {
                            Some(name) => (name, Direction::Desc),
                            None => (key.as_str(), Direction::Asc),
                        };
                        Ok(PageKey {
                            prop: lookup_prop(&model, name)?,
                            direction,
                        })
                    })
                    .collect::<Result<_>>()?
            };

            let mut unique: Vec<Vec<PropId>> = model
                .props
                .iter()
                .filter(|prop| prop.unique)
                .map(|prop| vec![prop.id])
                .collect();
            for set in &def.unique {
                unique.push(
                    set.iter()
                        .map(|name| lookup_prop(&model, name))
                        .collect::<Result<_>>()?,
                );
            }
            if model.pkeys != [model.props[0].id] && !unique.contains(&model.pkeys) {
                unique.push(model.pkeys.clone());
            }
            model.unique = unique;

            models.push(model);
        }

        // refs first: denorms and backrefs look at the linked ref
        pending.sort_by_key(|link| match link {
            Pending::Ref { .. } => 0,
            Pending::Denorm { .. } => 1,
            Pending::BackRef { .. } => 2,
        });
        for link in pending {
            link_pending(&mut models, &names, link)?;
        }

        let namespaces = build_namespaces(&models, self.namespaces);
        let db = build_db(&models);

        Ok(Manifest {
            models,
            names,
            namespaces,
            db,
        })
    }
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> ModelDef {
        ModelDef {
            name: name.into(),
            title: String::new(),
            access: None,
            pkeys: vec![],
            base: None,
            page: vec![],
            unique: vec![],
            props: vec![],
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> ModelDef {
        self.title = title.into();
        self
    }

    pub fn access(mut self, access: Access) -> ModelDef {
        self.access = Some(access);
        self
    }

    pub fn pkeys<I: IntoIterator<Item = S>, S: Into<String>>(mut self, pkeys: I) -> ModelDef {
        self.pkeys = pkeys.into_iter().map(Into::into).collect();
        self
    }

    pub fn base(mut self, base: impl Into<String>) -> ModelDef {
        self.base = Some(base.into());
        self
    }

    pub fn page<I: IntoIterator<Item = S>, S: Into<String>>(mut self, keys: I) -> ModelDef {
        self.page = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn unique<I: IntoIterator<Item = S>, S: Into<String>>(mut self, props: I) -> ModelDef {
        self.unique.push(props.into_iter().map(Into::into).collect());
        self
    }

    pub fn prop(mut self, prop: PropDef) -> ModelDef {
        self.props.push(prop);
        self
    }
}

impl PropDef {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> PropDef {
        PropDef {
            name: name.into(),
            ty: ty.into(),
            model: None,
            refprops: vec![],
            access: None,
            hidden: false,
            required: false,
            unique: false,
            default: Value::Null,
            enum_items: vec![],
            langs: vec![],
            items: None,
            props: vec![],
            srid: None,
            title: String::new(),
        }
    }

    /// A `ref` to `model`.
    pub fn reference(name: impl Into<String>, model: impl Into<String>) -> PropDef {
        PropDef::new(name, "ref").to(model)
    }

    pub fn to(mut self, model: impl Into<String>) -> PropDef {
        self.model = Some(model.into());
        self
    }

    pub fn refprops<I: IntoIterator<Item = S>, S: Into<String>>(mut self, props: I) -> PropDef {
        self.refprops = props.into_iter().map(Into::into).collect();
        self
    }

    pub fn access(mut self, access: Access) -> PropDef {
        self.access = Some(access);
        self
    }

    pub fn hidden(mut self) -> PropDef {
        self.hidden = true;
        self
    }

    pub fn required(mut self) -> PropDef {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> PropDef {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> PropDef {
        self.default = value.into();
        self
    }

    pub fn enum_item(mut self, source: impl Into<Value>, prepare: impl Into<Value>) -> PropDef {
        self.enum_items.push(EnumItem {
            source: source.into(),
            prepare: prepare.into(),
        });
        self
    }

    pub fn langs<I: IntoIterator<Item = S>, S: Into<String>>(mut self, langs: I) -> PropDef {
        self.langs = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn items(mut self, items: PropDef) -> PropDef {
        self.items = Some(Box::new(items));
        self
    }

    pub fn prop(mut self, prop: PropDef) -> PropDef {
        self.props.push(prop);
        self
    }

    pub fn srid(mut self, srid: u32) -> PropDef {
        self.srid = Some(srid);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> PropDef {
        self.title = title.into();
        self
    }
}

fn add_reserved(model: &mut Model, name: &str, dtype: DataType, access: Access) {
    let id = PropId {
        model: model.id,
        index: model.props.len(),
    };
    model.props.push(Property {
        id,
        name: name.to_string(),
        place: name.to_string(),
        parent: None,
        dtype,
        access,
        hidden: false,
        required: false,
        unique: name == ID,
        default: Value::Null,
        columns: vec![name.to_string()],
        enum_items: vec![],
        title: String::new(),
    });
    model.properties.insert(name.to_string(), id);
    model.flatprops.insert(name.to_string(), id);
}

fn add_prop(
    model: &mut Model,
    def: &PropDef,
    parent: Option<PropId>,
    inherited: Access,
    pending: &mut Vec<Pending>,
) -> Result<PropId> {
    let is_item = parent.is_some_and(|parent| matches!(model.prop(parent).dtype, DataType::Array(_)));
    if !is_item {
        check_prop_name(&def.name)?;
    }

    let place = match parent {
        Some(parent) if is_item => format!("{}[]", model.prop(parent).place),
        Some(parent) => format!("{}.{}", model.prop(parent).place, def.name),
        None => def.name.clone(),
    };

    if model.flatprops.contains_key(&place) {
        return Err(invalid(format!(
            "property {place:?} of model {:?} is declared twice",
            model.name
        )));
    }

    let parent_is_ref = parent.is_some_and(|parent| model.prop(parent).dtype.is_ref());
    let ty = if parent_is_ref && def.ty.is_empty() {
        "denorm"
    } else {
        def.ty.as_str()
    };

    let placeholder = ModelId(usize::MAX);
    let (dtype, columns) = match ty {
        "integer" => (DataType::Integer, vec![place.clone()]),
        "number" => (DataType::Number, vec![place.clone()]),
        "string" => (DataType::String, vec![place.clone()]),
        "boolean" => (DataType::Boolean, vec![place.clone()]),
        "date" => (DataType::Date, vec![place.clone()]),
        "datetime" => (DataType::DateTime, vec![place.clone()]),
        "time" => (DataType::Time, vec![place.clone()]),
        "binary" => (DataType::Binary, vec![place.clone()]),
        "pk" => (DataType::PrimaryKey, vec![place.clone()]),
        "geometry" => (
            DataType::Geometry(Geometry { srid: def.srid }),
            vec![place.clone()],
        ),
        "text" => (
            DataType::Text(Text {
                langs: def.langs.clone(),
            }),
            vec![place.clone()],
        ),
        "file" => (
            DataType::File,
            vec![format!("{place}._id"), format!("{place}._content")],
        ),
        "object" => (
            DataType::Object(Object {
                props: IndexMap::new(),
            }),
            vec![],
        ),
        "array" => (
            DataType::Array(Array {
                items: PropId {
                    model: placeholder,
                    index: 0,
                },
            }),
            vec![place.clone()],
        ),
        "ref" => (
            DataType::Ref(Ref {
                model: placeholder,
                refprops: vec![],
            }),
            vec![],
        ),
        "backref" => (
            DataType::BackRef(BackRef {
                model: placeholder,
                refprop: PropId {
                    model: placeholder,
                    index: 0,
                },
            }),
            vec![],
        ),
        "denorm" if parent_is_ref => (
            DataType::Denorm(Denorm {
                target: PropId {
                    model: placeholder,
                    index: 0,
                },
            }),
            vec![],
        ),
        _ => {
            return Err(invalid(format!(
                "unknown type {:?} of property {place:?}",
                def.ty
            )))
        }
    };

    let id = PropId {
        model: model.id,
        index: model.props.len(),
    };
    let access = def.access.unwrap_or(inherited);

    model.props.push(Property {
        id,
        name: def.name.clone(),
        place: place.clone(),
        parent,
        dtype,
        access,
        hidden: def.hidden,
        required: def.required,
        unique: def.unique,
        default: def.default.clone(),
        columns,
        enum_items: def.enum_items.clone(),
        title: def.title.clone(),
    });

    if !is_item {
        model.flatprops.insert(place, id);
    }
    if parent.is_none() {
        model.properties.insert(def.name.clone(), id);
    }

    match ty {
        "object" => {
            let mut children = IndexMap::new();
            for child in &def.props {
                let child_id = add_prop(model, child, Some(id), access, pending)?;
                children.insert(child.name.clone(), child_id);
            }
            model.props[id.index].dtype = DataType::Object(Object { props: children });
        }
        "array" => {
            let items = match &def.items {
                Some(items) => (**items).clone(),
                None => PropDef::new("", "string"),
            };
            let items = add_prop(model, &items, Some(id), access, pending)?;
            model.props[id.index].dtype = DataType::Array(Array { items });
        }
        "ref" => {
            pending.push(Pending::Ref {
                prop: id,
                def: def.clone(),
            });
            for child in &def.props {
                add_prop(model, child, Some(id), access, pending)?;
            }
        }
        "backref" => pending.push(Pending::BackRef {
            prop: id,
            def: def.clone(),
        }),
        "denorm" => pending.push(Pending::Denorm {
            prop: id,
            parent: parent.unwrap_or(id),
        }),
        _ => {}
    }

    Ok(id)
}

fn link_pending(
    models: &mut [Model],
    names: &IndexMap<String, ModelId>,
    link: Pending,
) -> Result<()> {
    match link {
        Pending::Ref { prop, def } => {
            let ns = models[prop.model.0].ns.clone();
            let target_name = def
                .model
                .as_deref()
                .ok_or_else(|| invalid(format!("ref {:?} has no target model", def.name)))?;
            let target = resolve_model(names, &ns, target_name)?;

            let refprops = if def.refprops.is_empty() {
                vec![models[target.0].props[0].id]
            } else {
                def.refprops
                    .iter()
                    .map(|name| lookup_prop(&models[target.0], name))
                    .collect::<Result<_>>()?
            };

            let place = models[prop.model.0].prop(prop).place.clone();
            let columns = refprops
                .iter()
                .map(|refprop| format!("{place}.{}", models[target.0].prop(*refprop).place))
                .collect();

            let property = &mut models[prop.model.0].props[prop.index];
            property.dtype = DataType::Ref(Ref {
                model: target,
                refprops,
            });
            property.columns = columns;
        }
        Pending::BackRef { prop, def } => {
            let ns = models[prop.model.0].ns.clone();
            let source_name = def
                .model
                .as_deref()
                .ok_or_else(|| invalid(format!("backref {:?} has no model", def.name)))?;
            let source = resolve_model(names, &ns, source_name)?;

            let refprop = match def.refprops.first() {
                Some(name) => lookup_prop(&models[source.0], name)?,
                None => models[source.0]
                    .props
                    .iter()
                    .find(|candidate| {
                        candidate.parent.is_none()
                            && candidate
                                .dtype
                                .as_ref()
                                .is_some_and(|dtype| dtype.model == prop.model)
                    })
                    .map(|candidate| candidate.id)
                    .ok_or_else(|| {
                        invalid(format!(
                            "backref {:?}: no ref in {source_name:?} points back",
                            def.name
                        ))
                    })?,
            };

            models[prop.model.0].props[prop.index].dtype = DataType::BackRef(BackRef {
                model: source,
                refprop,
            });
        }
        Pending::Denorm { prop, parent } => {
            let target = match &models[parent.model.0].prop(parent).dtype {
                DataType::Ref(dtype) => dtype.model,
                _ => return Err(invalid("denorm property outside of a ref")),
            };
            let name = models[prop.model.0].prop(prop).name.clone();
            let target_prop = lookup_prop(&models[target.0], &name)?;
            models[prop.model.0].props[prop.index].dtype =
                DataType::Denorm(Denorm { target: target_prop });
        }
    }
    Ok(())
}

fn build_namespaces(
    models: &[Model],
    declared: IndexMap<String, (String, String)>,
) -> IndexMap<String, Namespace> {
    let mut namespaces: IndexMap<String, Namespace> = IndexMap::new();

    fn ensure(namespaces: &mut IndexMap<String, Namespace>, name: &str) {
        if namespaces.contains_key(name) {
            return;
        }
        let parent = if name.is_empty() {
            None
        } else {
            let parent = name.rfind('/').map(|pos| &name[..pos]).unwrap_or("");
            ensure(namespaces, parent);
            if let Some(parent_ns) = namespaces.get_mut(parent) {
                parent_ns.children.push(name.to_string());
            }
            Some(parent.to_string())
        };
        namespaces.insert(
            name.to_string(),
            Namespace {
                name: name.to_string(),
                parent,
                ..Namespace::default()
            },
        );
    }

    for (name, (title, description)) in declared {
        ensure(&mut namespaces, &name);
        if let Some(ns) = namespaces.get_mut(&name) {
            ns.title = title;
            ns.description = description;
        }
    }

    for model in models {
        ensure(&mut namespaces, &model.ns);
        if let Some(ns) = namespaces.get_mut(&model.ns) {
            ns.models.push(model.id);
        }
    }

    namespaces
}

fn build_db(models: &[Model]) -> db::Schema {
    let mut tables = vec![];
    let mut referenced: Vec<(usize, Vec<String>)> = vec![];

    for model in models {
        let mut columns = vec![];
        let mut foreign_keys = vec![];

        for prop in &model.props {
            match &prop.dtype {
                DataType::Ref(dtype) => {
                    let target = &models[dtype.model.0];
                    let references: Vec<String> = dtype
                        .refprops
                        .iter()
                        .map(|refprop| target.prop(*refprop).columns.clone())
                        .flat_map(|columns| columns.into_iter())
                        .collect();
                    for (column, refprop) in prop.columns.iter().zip(&dtype.refprops) {
                        let ty = target
                            .prop(*refprop)
                            .dtype
                            .storage()
                            .unwrap_or(Type::String);
                        columns.push(db::Column::new(column, ty));
                    }
                    if dtype.refprops != [target.props[0].id] {
                        referenced.push((target.id.0, references.clone()));
                    }
                    foreign_keys.push(db::ForeignKey {
                        columns: prop.columns.clone(),
                        table: target.table.clone(),
                        references,
                    });
                }
                DataType::File => {
                    columns.push(db::Column::new(&prop.columns[0], Type::String));
                    columns.push(db::Column::new(&prop.columns[1], Type::Bytes));
                }
                dtype => {
                    let is_item = prop
                        .parent
                        .is_some_and(|parent| matches!(model.prop(parent).dtype, DataType::Array(_)));
                    if let (Some(ty), Some(column), false) = (dtype.storage(), prop.column(), is_item) {
                        let mut column = db::Column::new(column, ty);
                        column.nullable = prop.name != ID;
                        columns.push(column);
                    }
                }
            }
        }

        let unique = model
            .unique
            .iter()
            .filter(|set| **set != [model.props[0].id])
            .map(|set| {
                set.iter()
                    .flat_map(|id| model.prop(*id).columns.iter().cloned())
                    .collect()
            })
            .collect();

        tables.push(db::Table {
            name: model.table.clone(),
            columns,
            primary_key: vec![ID.to_string()],
            foreign_keys,
            unique,
        });
    }

    for (index, columns) in referenced {
        let table = &mut tables[index];
        if !table.unique.contains(&columns) {
            table.unique.push(columns);
        }
    }

    for model in models {
        tables.push(db::changelog(&model.table));
        tables.push(db::redirect(&model.table));
    }

    db::Schema { tables }
}

/// Resolves a model name relative to `ns`, falling back to the absolute name.
fn resolve_model(names: &IndexMap<String, ModelId>, ns: &str, name: &str) -> Result<ModelId> {
    if !ns.is_empty() {
        if let Some(id) = names.get(&format!("{ns}/{name}")) {
            return Ok(*id);
        }
    }
    names
        .get(name)
        .copied()
        .ok_or_else(|| Error::new(ErrorCode::ModelNotFound).with("model", name))
}

fn lookup_prop(model: &Model, place: &str) -> Result<PropId> {
    model.flatprops.get(place).copied().ok_or_else(|| {
        Error::new(ErrorCode::PropertyNotFound)
            .with("model", &model.name)
            .with("property", place)
    })
}

fn check_model_name(name: &str) -> Result<()> {
    let basename = name.rsplit('/').next().unwrap_or(name);
    let valid = basename.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && basename.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name
            .split('/')
            .all(|part| !part.is_empty() && !part.starts_with(':'));
    if valid {
        Ok(())
    } else {
        Err(Error::new(ErrorCode::InvalidName).with("name", name))
    }
}

fn check_prop_name(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name != ID
        && name != REVISION;
    if valid {
        Ok(())
    } else {
        Err(Error::new(ErrorCode::InvalidName).with("name", name))
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::new(ErrorCode::InvalidManifestFile).with("reason", reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std_util::assert_err;

    fn cities() -> Manifest {
        Manifest::builder()
            .model(
                ModelDef::new("geo/Country")
                    .pkeys(["code"])
                    .prop(PropDef::new("code", "string"))
                    .prop(PropDef::new("name", "string"))
                    .prop(PropDef::new("cities", "backref").to("City")),
            )
            .model(
                ModelDef::new("geo/City")
                    .prop(PropDef::new("name", "string").required())
                    .prop(PropDef::reference("country", "Country").prop(PropDef::new("name", "")))
                    .prop(
                        PropDef::new("address", "object")
                            .prop(PropDef::new("street", "string"))
                            .prop(PropDef::new("zip", "integer")),
                    )
                    .prop(PropDef::new("tags", "array").items(PropDef::new("", "string"))),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn reserved_properties_come_first() {
        let manifest = cities();
        let city = manifest.get_model("geo/City").unwrap();
        let names: Vec<_> = city.properties.keys().cloned().collect();
        assert_eq!(names, ["_id", "_revision", "name", "country", "address", "tags"]);
        assert_eq!(city.basename(), "City");
        assert_eq!(city.ns, "geo");
    }

    #[test]
    fn refs_link_to_target_primary_key() {
        let manifest = cities();
        let city = manifest.get_model("geo/City").unwrap();
        let country = city.flatprop("country").unwrap();

        let DataType::Ref(dtype) = &country.dtype else {
            panic!("expected ref")
        };
        assert_eq!(manifest.model(dtype.model).name, "geo/Country");
        assert_eq!(country.columns, ["country._id"]);

        let denorm = city.flatprop("country.name").unwrap();
        assert!(matches!(denorm.dtype, DataType::Denorm(_)));
    }

    #[test]
    fn backref_finds_pointing_ref() {
        let manifest = cities();
        let country = manifest.get_model("geo/Country").unwrap();
        let DataType::BackRef(dtype) = &country.flatprop("cities").unwrap().dtype else {
            panic!("expected backref")
        };
        assert_eq!(manifest.prop(dtype.refprop).name, "country");
    }

    #[test]
    fn storage_schema() {
        let manifest = cities();
        let table = manifest.db.table("geo/City").unwrap();
        let columns: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            columns,
            ["_id", "_revision", "name", "country._id", "address.street", "address.zip", "tags"]
        );
        assert_eq!(table.foreign_keys[0].table, "geo/Country");
        assert_eq!(table.foreign_keys[0].references, ["_id"]);

        // pkeys other than `_id` are unique
        let country = manifest.db.table("geo/Country").unwrap();
        assert_eq!(country.unique, [vec!["code".to_string()]]);

        assert!(manifest.db.table("geo/City/:changelog").is_some());
        assert!(manifest.db.table("geo/City/:redirect").is_some());
    }

    #[test]
    fn namespaces_form_a_tree() {
        let manifest = cities();
        let root = manifest.namespace("").unwrap();
        assert_eq!(root.children, ["geo"]);
        assert_eq!(manifest.namespace("geo").unwrap().models.len(), 2);
        assert_eq!(manifest.models_under("geo").count(), 2);
        assert_eq!(manifest.models_under("ge").count(), 0);
    }

    #[test]
    fn empty_manifest_has_no_root() {
        let manifest = Manifest::builder().build().unwrap();
        assert!(manifest.namespace("").is_none());
        assert!(manifest.is_empty());
    }

    #[test]
    fn invalid_definitions() {
        assert_err!(Manifest::builder()
            .model(ModelDef::new("city"))
            .build());

        let err = Manifest::builder()
            .model(ModelDef::new("City").prop(PropDef::new("name", "varchar")))
            .build()
            .unwrap_err();
        assert!(err.is(ErrorCode::InvalidManifestFile));

        let err = Manifest::builder()
            .model(ModelDef::new("City").prop(PropDef::reference("country", "Country")))
            .build()
            .unwrap_err();
        assert!(err.is(ErrorCode::ModelNotFound));
    }
}
