use super::{stage, DataItem, ItemStream, State, WriteContext};
use crate::Action;

use datagate_core::{
    driver::IdFormat,
    schema::{DataType, Model, Property},
    stmt::Value,
    Error, ErrorCode, Result,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Computes what changes: the given values that differ from the saved row,
/// plus defaults, a fresh id and a fresh revision for new rows.
pub(super) fn patch(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    stage!(items, State::Patched, |item| patch_item(&wcx, &mut item))
}

fn patch_item(wcx: &WriteContext, item: &mut DataItem) -> Result<()> {
    let manifest = &wcx.cx.manifest;
    let model = manifest.model(item.model_id()?);
    let saved = item.saved.as_ref();

    let mut patch = IndexMap::new();
    match item.action {
        Action::Insert => {
            for prop in writable(model) {
                let value = match item.given.get(&prop.place) {
                    Some(value) => value.clone(),
                    None if !prop.default.is_null() => prop.default.clone(),
                    None => continue,
                };
                patch.insert(prop.place.clone(), value);
            }
            check_required(model, writable(model), &patch)?;
        }
        Action::Update => {
            // Properties left out of a full update are cleared.
            for prop in writable(model) {
                let value = item.given.get(&prop.place).cloned().unwrap_or_default();
                if !same(&value, saved_value(saved, &prop.place)) {
                    patch.insert(prop.place.clone(), value);
                }
            }
            let full: IndexMap<String, Value> = writable(model)
                .map(|prop| {
                    let value = item.given.get(&prop.place).cloned().unwrap_or_default();
                    (prop.place.clone(), value)
                })
                .collect();
            check_required(model, writable(model), &full)?;
        }
        Action::Patch => {
            for (place, value) in &item.given {
                if !same(value, saved_value(saved, place)) {
                    patch.insert(place.clone(), value.clone());
                }
            }
            let touched = writable(model).filter(|prop| item.given.contains_key(&prop.place));
            check_required(model, touched, &item.given)?;
        }
        _ => {}
    }

    if item.action == Action::Insert && item.id.is_none() {
        item.id = Some(wcx.cx.capability.id_format.generate());
    }

    item.noop = patch.is_empty() && matches!(item.action, Action::Update | Action::Patch);
    item.revision = match item.saved_revision() {
        Some(revision) if item.noop => Some(revision.to_string()),
        _ => Some(IdFormat::Uuid.generate()),
    };
    item.patch = patch;

    debug!(
        index = item.index,
        model = %model.name,
        action = %item.action,
        changed = item.patch.len(),
        noop = item.noop,
        "patch built"
    );
    Ok(())
}

/// Properties a payload can set: stored properties reachable from the model
/// root through objects only.
pub(super) fn writable(model: &Model) -> impl Iterator<Item = &Property> + '_ {
    model
        .flatprops
        .values()
        .map(|id| model.prop(*id))
        .filter(|prop| {
            !prop.is_reserved()
                && !matches!(
                    prop.dtype,
                    DataType::Object(_) | DataType::BackRef(_) | DataType::Denorm(_)
                )
                && parents_are_objects(model, prop)
        })
}

fn parents_are_objects(model: &Model, prop: &Property) -> bool {
    let mut parent = prop.parent;
    while let Some(id) = parent {
        let prop = model.prop(id);
        if !matches!(prop.dtype, DataType::Object(_)) {
            return false;
        }
        parent = prop.parent;
    }
    true
}

fn check_required<'a>(
    model: &Model,
    props: impl Iterator<Item = &'a Property>,
    values: &IndexMap<String, Value>,
) -> Result<()> {
    for prop in props.filter(|prop| prop.required) {
        if values.get(&prop.place).map_or(true, Value::is_null) {
            return Err(Error::new(ErrorCode::MissingRequiredProperty)
                .with("property", &prop.place)
                .with("model", &model.name));
        }
    }
    Ok(())
}

fn saved_value<'a>(saved: Option<&'a Value>, place: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    saved.and_then(|saved| saved.get_path(place)).unwrap_or(&NULL)
}

/// Equality of a given and a saved value; numbers compare by value.
fn same(given: &Value, saved: &Value) -> bool {
    match (given, saved) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Object(lhs), Value::Object(rhs)) => {
            lhs.len() == rhs.len()
                && lhs
                    .iter()
                    .all(|(key, value)| rhs.get(key).is_some_and(|other| same(value, other)))
        }
        (Value::List(lhs), Value::List(rhs)) => {
            lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(lhs, rhs)| same(lhs, rhs))
        }
        (lhs, rhs) => lhs.sql_eq(rhs) || lhs == rhs,
    }
}
