use super::{stage, DataItem, ItemStream, State, WriteContext};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use datagate_core::{
    schema::{DataType, Manifest, Model, Property},
    stmt::Value,
    Error, ErrorCode, Result,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Type checks payload values against the property graph and flattens them
/// into `given`, keyed by property place.
pub(super) fn validate(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    stage!(items, State::Validated, |item| validate_item(&wcx.cx.manifest, &mut item))
}

fn validate_item(manifest: &Manifest, item: &mut DataItem) -> Result<()> {
    let model = manifest.model(item.model_id()?);
    let mut given = IndexMap::new();

    for (key, value) in &item.payload {
        if key.starts_with('_') {
            continue;
        }
        let prop = model.property(key).ok_or_else(|| {
            Error::new(ErrorCode::FieldNotInResource)
                .with("property", key)
                .with("model", &model.name)
        })?;
        flatten(manifest, model, prop, value.clone(), &mut given)?;
    }

    item.given = given;
    Ok(())
}

/// Adds the value of `prop` to `given`. Objects contribute one entry per
/// nested property; everything else is stored whole under its place.
fn flatten(
    manifest: &Manifest,
    model: &Model,
    prop: &Property,
    value: Value,
    given: &mut IndexMap<String, Value>,
) -> Result<()> {
    let DataType::Object(object) = &prop.dtype else {
        let value = normalize(manifest, model, prop, value)?;
        given.insert(prop.place.clone(), value);
        return Ok(());
    };

    let fields = match value {
        Value::Null => IndexMap::new(),
        Value::Object(fields) => fields,
        other => return Err(invalid(model, prop, format!("expected an object, got {}", other.type_name()))),
    };
    for (name, value) in fields {
        let child = object.props.get(&name).ok_or_else(|| {
            Error::new(ErrorCode::FieldNotInResource)
                .with("property", format!("{}.{name}", prop.place))
                .with("model", &model.name)
        })?;
        flatten(manifest, model, model.prop(*child), value, given)?;
    }
    Ok(())
}

/// Checks a single value against the type of its property and brings it to
/// the form clients read back.
pub(super) fn normalize(manifest: &Manifest, model: &Model, prop: &Property, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if prop.is_enum() {
        // Clients write the enum's source; the stored value carries the type.
        let Some(prepared) = prop.enum_prepare(&value) else {
            return Err(invalid(
                model,
                prop,
                format!("{value} is not one of the allowed values"),
            ));
        };
        check_type(manifest, model, prop, prepared.clone())?;
        return Ok(value);
    }
    check_type(manifest, model, prop, value)
}

fn check_type(manifest: &Manifest, model: &Model, prop: &Property, value: Value) -> Result<Value> {
    let mismatch = |value: &Value| {
        invalid(model, prop, format!("{} is not a valid {}", value, prop.dtype.name()))
    };

    let value = match (&prop.dtype, value) {
        (DataType::Integer, Value::Integer(value)) => Value::Integer(value),
        (DataType::Integer, Value::Number(value)) if value.fract() == 0.0 => Value::Integer(value as i64),
        (DataType::Number, value @ (Value::Integer(_) | Value::Number(_))) => {
            Value::Number(value.as_f64().unwrap_or_default())
        }
        (DataType::Boolean, value @ Value::Bool(_)) => value,
        (DataType::String | DataType::PrimaryKey, value @ Value::String(_)) => value,
        (DataType::Date, Value::String(text)) if NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok() => {
            Value::String(text)
        }
        (DataType::DateTime, Value::String(text)) if is_datetime(&text) => Value::String(text),
        (DataType::Time, Value::String(text)) if NaiveTime::parse_from_str(&text, "%H:%M:%S%.f").is_ok() => {
            Value::String(text)
        }
        (DataType::Binary, Value::String(text)) => match BASE64.decode(&text) {
            Ok(bytes) => Value::Bytes(bytes),
            Err(_) => return Err(Error::new(ErrorCode::InvalidBase64String)),
        },
        (DataType::Binary, value @ Value::Bytes(_)) => value,
        (DataType::Geometry(_), Value::String(text)) if is_wkt(&text) => Value::String(text),
        (DataType::Text(text), Value::Object(langs)) => {
            for (lang, value) in &langs {
                if !text.langs.contains(lang) {
                    return Err(invalid(model, prop, format!("language {lang:?} is not declared")));
                }
                if !matches!(value, Value::String(_) | Value::Null) {
                    return Err(mismatch(value));
                }
            }
            Value::Object(langs)
        }
        (DataType::Array(array), Value::List(items)) => {
            let item_prop = model.prop(array.items);
            let items = items
                .into_iter()
                .map(|value| normalize(manifest, model, item_prop, value))
                .collect::<Result<Vec<_>>>()?;
            Value::List(items)
        }
        (DataType::Ref(reference), Value::Object(fields)) => {
            let target = manifest.model(reference.model);
            let mut key = IndexMap::new();
            for refprop in &reference.refprops {
                let refprop = target.prop(*refprop);
                let value = fields.get(&refprop.name).cloned().unwrap_or_default();
                key.insert(refprop.name.clone(), normalize(manifest, target, refprop, value)?);
            }
            if let Some(extra) = fields.keys().find(|name| !key.contains_key(*name)) {
                return Err(Error::new(ErrorCode::FieldNotInResource)
                    .with("property", format!("{}.{extra}", prop.place))
                    .with("model", &model.name));
            }
            if key.values().all(Value::is_null) {
                Value::Null
            } else {
                Value::Object(key)
            }
        }
        (DataType::File, Value::Object(mut fields)) => {
            let id = fields.shift_remove("_id").unwrap_or_default();
            let content = match fields.shift_remove("_content") {
                Some(Value::String(text)) => match BASE64.decode(&text) {
                    Ok(bytes) => Value::Bytes(bytes),
                    Err(_) => return Err(Error::new(ErrorCode::InvalidBase64String)),
                },
                Some(value @ (Value::Bytes(_) | Value::Null)) => value,
                Some(other) => return Err(mismatch(&other)),
                None => Value::Null,
            };
            if !fields.is_empty() || !matches!(id, Value::String(_) | Value::Null) {
                return Err(invalid(model, prop, "a file is {\"_id\": name, \"_content\": base64}"));
            }
            datagate_core::object! { "_id" => id, "_content" => content }
        }
        (DataType::BackRef(_) | DataType::Denorm(_), _) => {
            return Err(invalid(model, prop, "the property is read only"));
        }
        (_, value) => return Err(mismatch(&value)),
    };

    Ok(value)
}

fn is_datetime(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

/// A well-known-text geometry, optionally prefixed with `SRID=<n>;`.
fn is_wkt(text: &str) -> bool {
    let text = match text.split_once(';') {
        Some((srid, rest)) if srid.starts_with("SRID=") => rest,
        _ => text,
    };
    let Some((kind, rest)) = text.split_once('(') else {
        return false;
    };
    !kind.trim().is_empty()
        && kind.trim().chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
        && rest.trim_end().ends_with(')')
}

fn invalid(model: &Model, prop: &Property, reason: impl std::fmt::Display) -> Error {
    Error::new(ErrorCode::InvalidValue)
        .with("reason", reason)
        .with("property", &prop.place)
        .with("model", &model.name)
}
