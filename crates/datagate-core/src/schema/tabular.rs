use super::{Access, EnumItem, Manifest, ModelDef, PropDef};
use crate::{stmt::Value, Error, ErrorCode, Result};

/// Reads a manifest from an ASCII table.
///
/// The first non-empty line is the header naming the columns. Recognized
/// columns: `d` (namespace), `m` (model), `property`, `type`, `ref`,
/// `source`, `prepare`, `access`, `title`, `description`. Other columns are
/// ignored.
///
/// ```text
/// m       | property | type            | ref     | access
/// Country |          |                 | code    | open
///         | code     | string unique   |         |
///         | name     | string          |         |
/// City    |          |                 |         | open
///         | name     | string required |         |
///         | country  | ref             | Country |
/// ```
///
/// Type modifiers `required`, `unique` and `hidden` follow the type name.
/// Nested properties use dotted names (`address.city`), array items use
/// `tags[]`, text languages use `title@en`. A row with an empty property
/// under an enum-typed property adds an enum item from its `source` and
/// `prepare` cells.
impl Manifest {
    pub fn from_tabular(text: &str) -> Result<Manifest> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));

        let Some((_, header)) = lines.next() else {
            return Manifest::builder().build();
        };
        let framed = header.trim().starts_with('|');
        let header: Vec<String> = split_row(header, framed).map(str::to_lowercase).collect();
        let column = |name: &str| header.iter().position(|h| h == name);

        let col_ns = column("d");
        let col_model = column("m").or_else(|| column("model"));
        let col_prop = column("property");
        let col_type = column("type");
        let col_ref = column("ref");
        let col_source = column("source");
        let col_prepare = column("prepare");
        let col_access = column("access");
        let col_title = column("title");
        let col_description = column("description");

        if col_model.is_none() || col_prop.is_none() {
            return Err(invalid(0, "header needs `m` and `property` columns"));
        }

        let mut builder = Manifest::builder();
        let mut models: Vec<ModelDef> = vec![];
        let mut ns = String::new();
        let mut last_prop: Option<String> = None;

        for (lineno, line) in lines {
            let cells: Vec<&str> = split_row(line, framed).collect();
            let cell = |index: Option<usize>| {
                index
                    .and_then(|index| cells.get(index))
                    .copied()
                    .unwrap_or("")
            };

            let title = cell(col_title);

            if !cell(col_ns).is_empty() {
                ns = cell(col_ns).trim_matches('/').to_string();
                builder = builder.namespace(&ns, title, cell(col_description));
                continue;
            }

            if !cell(col_model).is_empty() {
                let name = cell(col_model);
                let name = if ns.is_empty() || name.contains('/') {
                    name.to_string()
                } else {
                    format!("{ns}/{name}")
                };
                let mut model = ModelDef::new(name).title(title);
                if !cell(col_ref).is_empty() {
                    model = model.pkeys(cell(col_ref).split(',').map(str::trim));
                }
                if let Some(access) = parse_access(lineno, cell(col_access))? {
                    model = model.access(access);
                }
                models.push(model);
                last_prop = None;
                continue;
            }

            let Some(model) = models.last_mut() else {
                return Err(invalid(lineno, "property declared before any model"));
            };

            let name = cell(col_prop);
            if name.is_empty() {
                // enum item of the last property
                let Some(prop) = last_prop
                    .as_deref()
                    .and_then(|place| find_prop(&mut model.props, place))
                else {
                    return Err(invalid(lineno, "enum item without a property"));
                };
                let prepare = parse_literal(cell(col_prepare));
                let source = match cell(col_source) {
                    "" => prepare.clone(),
                    source => parse_literal(source),
                };
                if !(source.is_null() && prepare.is_null()) {
                    prop.enum_items.push(EnumItem { source, prepare });
                }
                continue;
            }

            let mut words = cell(col_type).split_whitespace();
            let ty = words.next().unwrap_or("");
            let (ty, srid) = parse_type(lineno, ty)?;

            if let Some((text, lang)) = name.split_once('@') {
                let Some(prop) = find_prop(&mut model.props, text) else {
                    return Err(invalid(lineno, format!("unknown text property {text:?}")));
                };
                prop.langs.push(lang.to_string());
                continue;
            }

            let (parent, leaf) = match name.strip_suffix("[]") {
                Some(array) => (Some(array), ""),
                None => match name.rsplit_once('.') {
                    Some((parent, leaf)) => (Some(parent), leaf),
                    None => (None, name),
                },
            };

            let mut prop = PropDef::new(leaf, ty);
            prop.srid = srid;
            prop.title = title.to_string();
            for word in words {
                match word {
                    "required" => prop.required = true,
                    "unique" => prop.unique = true,
                    "hidden" => prop.hidden = true,
                    _ => {
                        return Err(invalid(lineno, format!("unknown type modifier {word:?}")));
                    }
                }
            }
            if let Some(access) = parse_access(lineno, cell(col_access))? {
                prop.access = Some(access);
            }
            let reference = cell(col_ref);
            if !reference.is_empty() {
                match reference.split_once('[') {
                    Some((target, refprops)) => {
                        prop.model = Some(target.trim().to_string());
                        prop.refprops = refprops
                            .trim_end_matches(']')
                            .split(',')
                            .map(|name| name.trim().to_string())
                            .collect();
                    }
                    None => prop.model = Some(reference.to_string()),
                }
            }

            match parent {
                None => model.props.push(prop),
                Some(parent_place) => {
                    let Some(parent) = find_prop(&mut model.props, parent_place) else {
                        return Err(invalid(
                            lineno,
                            format!("unknown parent property {parent_place:?}"),
                        ));
                    };
                    if name.ends_with("[]") {
                        parent.items = Some(Box::new(prop));
                    } else {
                        parent.props.push(prop);
                    }
                }
            }
            last_prop = Some(name.to_string());
        }

        for model in models {
            builder = builder.model(model);
        }
        builder.build()
    }
}

/// Splits a row into cells. Outer pipes are stripped only when the table
/// is framed by them; otherwise a leading pipe closes an empty first cell.
fn split_row(line: &str, framed: bool) -> impl Iterator<Item = &str> {
    let mut line = line.trim();
    if framed {
        line = line.strip_prefix('|').unwrap_or(line);
        line = line.strip_suffix('|').unwrap_or(line);
    }
    line.split('|').map(str::trim)
}

/// Finds a property definition by its dotted place; `tags[]` finds items.
fn find_prop<'a>(props: &'a mut [PropDef], place: &str) -> Option<&'a mut PropDef> {
    if let Some(array) = place.strip_suffix("[]") {
        return find_prop(props, array)?.items.as_deref_mut();
    }
    let (head, rest) = match place.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (place, None),
    };
    let prop = props.iter_mut().find(|prop| prop.name == head)?;
    match rest {
        Some(rest) => find_prop(&mut prop.props, rest),
        None => Some(prop),
    }
}

fn parse_type(lineno: usize, ty: &str) -> Result<(&str, Option<u32>)> {
    let Some((name, args)) = ty.split_once('(') else {
        return Ok((ty, None));
    };
    let srid = args
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter_map(|arg| arg.parse::<u32>().ok())
        .last();
    if name != "geometry" {
        return Err(invalid(lineno, format!("type {name:?} takes no arguments")));
    }
    Ok((name, srid))
}

fn parse_access(lineno: usize, access: &str) -> Result<Option<Access>> {
    if access.is_empty() {
        return Ok(None);
    }
    Access::parse(access)
        .map(Some)
        .ok_or_else(|| invalid(lineno, format!("unknown access {access:?}")))
}

fn parse_literal(text: &str) -> Value {
    match text {
        "" | "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            let quoted = text.len() >= 2
                && ((text.starts_with('"') && text.ends_with('"'))
                    || (text.starts_with('\'') && text.ends_with('\'')));
            if quoted {
                Value::String(text[1..text.len() - 1].to_string())
            } else if let Ok(value) = text.parse::<i64>() {
                Value::Integer(value)
            } else if let Ok(value) = text.parse::<f64>() {
                Value::Number(value)
            } else {
                Value::String(text.to_string())
            }
        }
    }
}

fn invalid(lineno: usize, reason: impl std::fmt::Display) -> Error {
    Error::new(ErrorCode::InvalidManifestFile).with("reason", format!("line {}: {reason}", lineno + 1))
}
