//! Shaping fetched rows into output objects.
//!
//! The query plan describes every output key as a [`Selected`]: a row
//! position, a constant, a nested object or a call of a result function.
//! The [`ResultBuilder`] evaluates those against one row, casting column
//! values by their property's type.

use crate::query::{Prep, Selected};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use datagate_core::{
    expr::Node,
    schema::{DataType, PropId},
    stmt::{Type, Value},
    ufunc::{Args, Env, Registry, TypeTag},
    Error, ErrorCode, Manifest, Result,
};
use indexmap::IndexMap;
use sha1::{Digest, Sha1};
use std::sync::{Arc, LazyLock};

static REGISTRY: LazyLock<Registry<ResultBuilder>> = LazyLock::new(|| {
    let mut registry: Registry<ResultBuilder> = Registry::new();

    registry.define("cast", &[TypeTag::Value], |env: &mut ResultBuilder, args| {
        let [value] = take(args)?;
        env.cast(value)
    });

    registry.define("base64", &[TypeTag::String], |_, args| {
        let [value] = take(args)?;
        let encoded = value.as_str().unwrap_or_default();
        let bytes = STANDARD.decode(encoded).map_err(|_| {
            Error::new(ErrorCode::InvalidBase64String).with("value", encoded)
        })?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        })
    });
    registry.define("base64", &[TypeTag::Bytes], |_, args| {
        let [value] = take(args)?;
        match value {
            Value::Bytes(bytes) => Ok(Value::String(STANDARD.encode(bytes))),
            value => Ok(value),
        }
    });

    registry.define("flip", &[TypeTag::String], |_, args| {
        let [value] = take(args)?;
        Ok(Value::String(flip(value.as_str().unwrap_or_default())))
    });

    registry.define("swap", &[TypeTag::Value, TypeTag::Value, TypeTag::Value], |_, args| {
        let [value, old, new] = take(args)?;
        Ok(if value == old || value.sql_eq(&old) { new } else { value })
    });

    registry.define("point", &[TypeTag::Value, TypeTag::Value], |_, args| {
        let [x, y] = take(args)?;
        match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::String(format!("POINT ({x} {y})"))),
            _ if x.is_null() || y.is_null() => Ok(Value::Null),
            _ => Err(unable_to_cast(&x, "geometry")),
        }
    });

    registry.define("file", &[TypeTag::Value, TypeTag::Value], |_, args| {
        let [id, content] = take(args)?;
        if id.is_null() {
            return Ok(Value::Null);
        }
        Ok(datagate_core::object! {
            "_id" => id,
            "_content" => content,
        })
    });

    registry.define("checksum", &[TypeTag::Object], |_, args| {
        let [value] = take(args)?;
        checksum(&value)
    });

    // Functions of null are null.
    for name in ["base64", "flip"] {
        registry.define(name, &[TypeTag::Null], |_, _| Ok(Value::Null));
    }

    registry
});

/// Builds output objects from rows of one query.
#[derive(Debug)]
pub(crate) struct ResultBuilder {
    manifest: Arc<Manifest>,

    /// Property of the first argument of the function being evaluated
    prop: Option<PropId>,
}

impl Env for ResultBuilder {
    type Term = Value;

    fn registry(&self) -> &'static Registry<Self> {
        &REGISTRY
    }

    fn type_tag(&self, term: &Value) -> TypeTag {
        TypeTag::of_value(term)
    }

    fn lift(&mut self, node: &Node) -> Result<Value> {
        match node {
            Node::Value(value) => Ok(value.clone()),
            node => Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", format!("can't evaluate {} in a result", node.kind()))),
        }
    }
}

impl ResultBuilder {
    pub(crate) fn new(manifest: Arc<Manifest>) -> ResultBuilder {
        ResultBuilder {
            manifest,
            prop: None,
        }
    }

    /// Builds the output object of one row.
    pub(crate) fn row(&mut self, output: &IndexMap<String, Selected>, row: &[Value]) -> Result<Value> {
        let mut object = IndexMap::with_capacity(output.len());
        for (key, selected) in output {
            object.insert(key.clone(), self.build(selected, row)?);
        }
        Ok(Value::Object(object))
    }

    fn build(&mut self, selected: &Selected, row: &[Value]) -> Result<Value> {
        match &selected.prep {
            Prep::Column => {
                let value = selected
                    .item
                    .and_then(|item| row.get(item))
                    .cloned()
                    .unwrap_or_default();
                Ok(match selected.prop {
                    Some(prop) => self.column_value(prop, value),
                    None => value,
                })
            }
            Prep::Const(value) => Ok(value.clone()),
            Prep::Object(map) => self.row(map, row),
            Prep::Ref(map) => {
                let object = self.row(map, row)?;
                let is_null = object
                    .as_object()
                    .and_then(|object| object.values().next())
                    .map_or(true, Value::is_null);
                Ok(if is_null { Value::Null } else { object })
            }
            Prep::Call { name, args, params } => {
                let mut values = Vec::with_capacity(args.len() + params.len());
                for arg in args {
                    values.push(self.build(arg, row)?);
                }
                values.extend(params.iter().cloned());
                self.prop = args.first().and_then(|arg| arg.prop);
                self.dispatch(name, Args::new(values))
            }
        }
    }

    /// Converts a stored value to the client-facing value of a property.
    fn column_value(&self, prop: PropId, value: Value) -> Value {
        let property = self.manifest.prop(prop);
        let value = match (&property.dtype, value) {
            (DataType::Boolean, Value::Integer(value)) => Value::Bool(value != 0),
            (DataType::Number, Value::Integer(value)) => Value::Number(value as f64),
            (dtype, Value::String(text)) if dtype.storage() == Some(Type::Json) => {
                match serde_json::from_str(&text) {
                    Ok(json) => Value::from_json(json),
                    Err(_) => Value::String(text),
                }
            }
            (_, value) => value,
        };
        match property.enum_source(&value) {
            Some(source) if property.is_enum() => source.clone(),
            _ => value,
        }
    }

    /// `cast()`: converts a value to the type of its property.
    fn cast(&self, value: Value) -> Result<Value> {
        let Some(prop) = self.prop else {
            return Ok(value);
        };
        let dtype = &self.manifest.prop(prop).dtype;
        Ok(match (dtype, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Integer, Value::String(text)) => match text.trim().parse::<i64>() {
                Ok(parsed) => Value::Integer(parsed),
                Err(_) => return Err(unable_to_cast(&Value::String(text), "integer")),
            },
            (DataType::Integer, Value::Number(number)) if number.fract() == 0.0 => {
                Value::Integer(number as i64)
            }
            (DataType::Number, Value::String(text)) => match text.trim().parse::<f64>() {
                Ok(parsed) => Value::Number(parsed),
                Err(_) => return Err(unable_to_cast(&Value::String(text), "number")),
            },
            (DataType::Number, Value::Integer(number)) => Value::Number(number as f64),
            (DataType::String, Value::Integer(number)) => Value::String(number.to_string()),
            (DataType::String, Value::Number(number)) => Value::String(number.to_string()),
            (DataType::Boolean, Value::Integer(number)) => Value::Bool(number != 0),
            (DataType::Boolean, Value::String(text)) => match text.as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(unable_to_cast(&Value::String(text), "boolean")),
            },
            (_, value) => value,
        })
    }
}

fn take<const N: usize>(args: Args<Value>) -> Result<[Value; N]> {
    args.take()
        .ok_or_else(|| datagate_core::err!("expected {N} argument(s)"))
}

fn unable_to_cast(value: &Value, ty: &str) -> Error {
    Error::new(ErrorCode::UnableToCast)
        .with("value", value.to_json())
        .with("type", ty)
}

/// Swaps the coordinates of every point in a WKT string.
fn flip(wkt: &str) -> String {
    let mut out = String::with_capacity(wkt.len());
    let mut pair = String::new();
    for c in wkt.chars() {
        if matches!(c, '(' | ')' | ',') {
            flip_pair(&mut pair, &mut out);
            out.push(c);
        } else {
            pair.push(c);
        }
    }
    flip_pair(&mut pair, &mut out);
    out
}

fn flip_pair(pair: &mut String, out: &mut String) {
    let parts: Vec<&str> = pair.split_whitespace().collect();
    let numeric = parts.len() == 2 && parts.iter().all(|part| part.parse::<f64>().is_ok());
    if numeric {
        out.push_str(&pair[..pair.len() - pair.trim_start().len()]);
        out.push_str(parts[1]);
        out.push(' ');
        out.push_str(parts[0]);
    } else {
        out.push_str(pair);
    }
    pair.clear();
}

/// SHA-1 over the MessagePack encoding of the flattened, key-sorted values.
fn checksum(value: &Value) -> Result<Value> {
    let mut pairs = vec![];
    flatten("", value, &mut pairs);
    pairs.sort_by(|(a, _), (b, _)| a.cmp(b));

    let encoded = rmp_serde::to_vec(&pairs).map_err(|err| datagate_core::err!("checksum: {err}"))?;
    let digest = Sha1::digest(&encoded);
    Ok(Value::String(
        digest.iter().map(|byte| format!("{byte:02x}")).collect(),
    ))
}

fn flatten(prefix: &str, value: &Value, pairs: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(object) => {
            for (key, value) in object {
                if key.starts_with('_') {
                    continue;
                }
                let place = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&place, value, pairs);
            }
        }
        value => pairs.push((prefix.to_string(), value.clone())),
    }
}
