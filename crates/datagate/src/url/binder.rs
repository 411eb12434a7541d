use super::{lang::accept_language, Action, Format, Method, PageParams, Request, UrlParams};
use crate::{spyna, Config};

use datagate_core::{
    driver::IdFormat,
    expr::{Expr, Node},
    schema::Manifest,
    stmt::Value,
    Error, ErrorCode, Result,
};

/// Top-level names that are filters rather than request parameters.
const FILTERS: &[&str] = &[
    "eq",
    "ne",
    "lt",
    "le",
    "gt",
    "ge",
    "contains",
    "startswith",
    "and",
    "or",
    "group",
];

/// Binds a request to the manifest.
pub(crate) fn bind(
    manifest: &Manifest,
    id_format: IdFormat,
    config: &Config,
    request: &Request,
) -> Result<UrlParams> {
    let nodes = spyna::parse(&request.path, &request.query)?;
    let (path, rest) = nodes
        .split_first()
        .ok_or_else(|| datagate_core::err!("parser returned no path node"))?;

    let segments: Vec<String> = path
        .args
        .iter()
        .filter_map(|arg| match arg {
            datagate_core::expr::Arg::Value(Value::String(segment)) => Some(segment.clone()),
            _ => None,
        })
        .collect();

    let mut params = UrlParams {
        method: request.method,
        path: String::new(),
        ns: None,
        model: None,
        pk: None,
        prop: None,
        propref: false,
        action: Action::GetAll,
        select: None,
        sort: vec![],
        limit: None,
        offset: None,
        count: false,
        query: vec![],
        page: PageParams::default(),
        format: Format::named(&config.default_format)?,
        lang: vec![],
        bbox: None,
        expand: None,
        changes: None,
        fault_tolerant: false,
        all: false,
    };

    bind_path(manifest, id_format, &segments, &mut params)?;

    let mut flags = Flags::default();
    let mut format = None;
    for ast in rest {
        let node = Node::from_ast(ast)?;
        let expr = match node {
            Node::Expr(expr) => expr,
            Node::Bind(bind) => Expr::new(bind.name, vec![]),
            node => {
                return Err(Error::new(ErrorCode::UnknownRequestParameter)
                    .with("name", spyna::unparse_arg(&node.to_ast())))
            }
        };
        bind_param(expr, &mut params, &mut flags, &mut format)?;
    }

    params.format = match format {
        Some(format) => format,
        None => Format::negotiate(request.header_value("accept"), &config.default_format)?,
    };
    if let Some(header) = request.header_value("accept-language") {
        params.lang = accept_language(header, config.accept_language_limit);
    }

    params.action = derive_action(&params, &flags);

    tracing::debug!(
        path = %params.path,
        action = %params.action,
        pk = ?params.pk,
        format = %params.format.name,
        "bound request"
    );

    Ok(params)
}

/// Flags set by path operators and bare parameters.
#[derive(Default)]
struct Flags {
    wipe: bool,
    check: bool,
    summary: bool,
}

fn bind_path(
    manifest: &Manifest,
    id_format: IdFormat,
    segments: &[String],
    params: &mut UrlParams,
) -> Result<()> {
    let full = segments.join("/");

    // longest prefix naming a model or a namespace
    let mut found = None;
    for len in (0..=segments.len()).rev() {
        let name = segments[..len].join("/");
        if let Some(model) = manifest.find_model(&name) {
            found = Some((len, Some(model.id), name));
            break;
        }
        if manifest.namespace(&name).is_some() || (len == 0 && segments.is_empty()) {
            found = Some((len, None, name));
            break;
        }
    }

    let Some((len, model, name)) = found else {
        return Err(Error::new(ErrorCode::ModelNotFound).with("model", &full));
    };
    params.path = name.clone();

    let Some(model_id) = model else {
        if len < segments.len() {
            return Err(Error::new(ErrorCode::ModelNotFound).with("model", &full));
        }
        params.ns = Some(name);
        return Ok(());
    };
    params.model = Some(model_id);
    let model = manifest.model(model_id);

    match &segments[len..] {
        [] => {}
        [pk, rest @ ..] if rest.len() <= 1 => {
            if !id_format.is_valid(pk) {
                return Err(Error::new(ErrorCode::ModelNotFound).with("model", &full));
            }
            params.pk = Some(pk.clone());

            if let Some(segment) = rest.first() {
                let (place, propref) = match segment.strip_suffix(":ref") {
                    Some(place) => (place, true),
                    None => (segment.as_str(), false),
                };
                let prop = model.flatprop(place).ok_or_else(|| {
                    Error::new(ErrorCode::PropertyNotFound)
                        .with("property", place)
                        .with("model", &model.name)
                })?;
                params.prop = Some(prop.id);
                params.propref = propref;
            }
        }
        _ => return Err(Error::new(ErrorCode::ModelNotFound).with("model", &full)),
    }

    Ok(())
}

fn bind_param(
    expr: Expr,
    params: &mut UrlParams,
    flags: &mut Flags,
    format: &mut Option<Format>,
) -> Result<()> {
    match expr.name.as_str() {
        "select" => params.select.get_or_insert_with(Vec::new).extend(expr.args),
        "sort" => params.sort.extend(expr.args),
        "limit" => {
            if params.limit.is_some() {
                return Err(invalid_value("limit() is given more than once"));
            }
            let limit = single_integer(&expr)?;
            if limit <= 0 {
                return Err(invalid_value(format!(
                    "limit() must be a positive integer, got {limit}"
                )));
            }
            params.limit = Some(limit as u64);
        }
        "offset" => {
            if params.offset.is_some() {
                return Err(invalid_value("offset() is given more than once"));
            }
            let offset = single_integer(&expr)?;
            if offset < 0 {
                return Err(invalid_value(format!(
                    "offset() must not be negative, got {offset}"
                )));
            }
            params.offset = Some(offset as u64);
        }
        "count" => params.count = true,
        "format" => *format = Some(bind_format(&expr)?),
        "changes" => {
            params.changes = Some(match expr.args.as_slice() {
                [] => 0,
                _ => single_integer(&expr)?,
            })
        }
        "page" => bind_page(&expr, &mut params.page)?,
        "bbox" => {
            let coords: Vec<f64> = expr
                .args
                .iter()
                .filter_map(|arg| arg.as_value().and_then(Value::as_f64))
                .collect();
            let bbox: [f64; 4] = coords
                .try_into()
                .map_err(|_| invalid_value("bbox() takes four numbers"))?;
            params.bbox = Some(bbox);
        }
        "expand" => params.expand.get_or_insert_with(Vec::new).extend(expr.args),
        "summary" => flags.summary = true,
        "wipe" => flags.wipe = true,
        "check" => flags.check = true,
        "fault-tolerant" => params.fault_tolerant = true,
        "ns" => {
            if params.ns.is_none() {
                return Err(Error::new(ErrorCode::NamespaceNotFound).with("namespace", &params.path));
            }
        }
        "all" => params.all = true,
        name if FILTERS.contains(&name) => params.query.push(Node::Expr(expr)),
        name => return Err(Error::new(ErrorCode::UnknownRequestParameter).with("name", name)),
    }
    Ok(())
}

fn bind_format(expr: &Expr) -> Result<Format> {
    let Some((kind, options)) = expr.args.split_first() else {
        return Err(invalid_value("format() needs a format name"));
    };
    let name = kind
        .as_name()
        .ok_or_else(|| invalid_value("format() needs a format name"))?;
    let mut format = Format::named(name)?;

    for option in options {
        match option {
            Node::Expr(option) => {
                let value = match option.args.as_slice() {
                    [Node::Value(value)] => value.clone(),
                    [node] => Value::from(node.as_name().unwrap_or_default()),
                    _ => Value::Null,
                };
                format.params.insert(option.name.clone(), value);
            }
            Node::Bind(bind) => {
                format.params.insert(bind.name.clone(), Value::Bool(true));
            }
            _ => return Err(invalid_value("format() options are name(value) calls")),
        }
    }
    for (key, value) in &expr.kwargs {
        let value = value.as_value().cloned().unwrap_or(Value::Null);
        format.params.insert(key.clone(), value);
    }
    Ok(format)
}

fn bind_page(expr: &Expr, page: &mut PageParams) -> Result<()> {
    let mut set_size = |node: &Node| -> Result<()> {
        match node.as_value().and_then(Value::as_i64) {
            Some(size) if size > 0 => {
                page.size = Some(size as u64);
                Ok(())
            }
            _ => Err(invalid_value("page size must be a positive integer")),
        }
    };

    let mut cursor = None;
    let mut disabled = false;
    for arg in &expr.args {
        match arg {
            Node::Value(Value::String(value)) => cursor = Some(value.clone()),
            Node::Expr(option) if option.name == "size" => match option.args.as_slice() {
                [size] => set_size(size)?,
                _ => return Err(invalid_value("size() takes one argument")),
            },
            Node::Expr(option) if option.name == "disable" => disabled = true,
            Node::Bind(bind) if bind.name == "disable" => disabled = true,
            _ => return Err(invalid_value("page() takes a cursor, size() and disable()")),
        }
    }
    for (key, value) in &expr.kwargs {
        match key.as_str() {
            "size" => set_size(value)?,
            "disable" => disabled = value.as_value() != Some(&Value::Bool(false)),
            _ => return Err(invalid_value(format!("unknown page() option {key:?}"))),
        }
    }

    page.cursor = cursor;
    page.disabled = disabled;
    Ok(())
}

fn derive_action(params: &UrlParams, flags: &Flags) -> Action {
    match params.method {
        Method::Get | Method::Head => {
            if params.ns.is_some() {
                Action::GetAll
            } else if params.changes.is_some() {
                Action::Changes
            } else if flags.summary {
                Action::Summary
            } else if params.pk.is_some() {
                Action::GetOne
            } else if params.is_search() {
                Action::Search
            } else {
                Action::GetAll
            }
        }
        Method::Post if flags.check => Action::Check,
        Method::Post => Action::Insert,
        Method::Put => Action::Update,
        Method::Patch => Action::Patch,
        Method::Delete if flags.wipe => Action::Wipe,
        Method::Delete => Action::Delete,
    }
}

fn single_integer(expr: &Expr) -> Result<i64> {
    match expr.args.as_slice() {
        [Node::Value(Value::Integer(value))] => Ok(*value),
        _ => Err(invalid_value(format!(
            "{}() takes a single integer argument",
            expr.name
        ))),
    }
}

fn invalid_value(reason: impl std::fmt::Display) -> Error {
    Error::new(ErrorCode::InvalidValue).with("reason", reason)
}
