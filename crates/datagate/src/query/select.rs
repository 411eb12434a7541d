use super::{names_of, unparse, Place, QueryBuilder, Term};

use datagate_core::{
    expr::{Expr, Node},
    schema::{DataType, Model, PropId, ID, REVISION},
    stmt::{ColumnRef, SelectColumn, Type, Value},
    ufunc::{Env, Registry},
    Error, ErrorCode, Result,
};
use indexmap::IndexMap;

/// How one output value of a result row is built.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Selected {
    /// Position of the value in the row, when it is read from one
    pub(crate) item: Option<usize>,

    /// Property the value is cast by
    pub(crate) prop: Option<PropId>,

    pub(crate) prep: Prep,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Prep {
    /// The row value at `item`
    Column,

    Const(Value),

    Object(IndexMap<String, Selected>),

    /// Like `Object`, but the whole value is null when the first key is.
    Ref(IndexMap<String, Selected>),

    /// A result function applied to the built `args` followed by `params`.
    Call {
        name: &'static str,
        args: Vec<Selected>,
        params: Vec<Value>,
    },
}

impl Selected {
    pub(crate) fn column(item: usize, prop: Option<PropId>) -> Selected {
        Selected {
            item: Some(item),
            prop,
            prep: Prep::Column,
        }
    }

    pub(crate) fn constant(value: impl Into<Value>) -> Selected {
        Selected {
            item: None,
            prop: None,
            prep: Prep::Const(value.into()),
        }
    }

    fn object(map: IndexMap<String, Selected>) -> Selected {
        Selected {
            item: None,
            prop: None,
            prep: Prep::Object(map),
        }
    }

    fn call(name: &'static str, args: Vec<Selected>, params: Vec<Value>) -> Selected {
        Selected {
            item: None,
            prop: None,
            prep: Prep::Call { name, args, params },
        }
    }
}

pub(super) fn define(registry: &mut Registry<QueryBuilder>) {
    registry.define_raw("select", select);
    registry.define_raw("count", count);
    registry.define_raw("checksum", checksum);

    registry.define_raw("base64", |env, expr| env.unary("base64", expr));
    registry.define_raw("flip", |env, expr| env.unary("flip", expr));
    registry.define_raw("cast", |env, expr| env.unary("cast", expr));

    registry.define_raw("point", |env, expr| env.binary("point", expr));
    registry.define_raw("file", |env, expr| env.binary("file", expr));

    registry.define_raw("swap", swap);
}

fn select(env: &mut QueryBuilder, expr: &Expr) -> Result<Term> {
    if expr.args.is_empty() {
        env.select_default()?;
    } else {
        for node in &expr.args {
            env.select_node(node)?;
        }
    }

    if let Some(prop) = env.text_whole.iter().find(|prop| env.text_lang.contains(prop)) {
        return Err(Error::new(ErrorCode::CannotSelectTextAndSpecifiedLang)
            .with("property", &env.manifest.prop(*prop).place));
    }
    if env.count && env.output.len() > 1 {
        return Err(Error::new(ErrorCode::NotImplementedFeature)
            .with("feature", "Selecting count() together with other values"));
    }
    Ok(Term::Value(Value::Null))
}

fn count(env: &mut QueryBuilder, expr: &Expr) -> Result<Term> {
    if let Some(arg) = expr.args.first() {
        return Err(invalid_argument(arg, expr));
    }
    env.count = true;
    let item = env.select.push_column(SelectColumn::Count);
    Ok(Term::Selected(Selected::column(item, None)))
}

/// `checksum()` hashes the readable properties of a row.
fn checksum(env: &mut QueryBuilder, expr: &Expr) -> Result<Term> {
    if let Some(arg) = expr.args.first() {
        return Err(invalid_argument(arg, expr));
    }
    let manifest = env.manifest.clone();
    let model = manifest.model(env.model);

    let mut map = IndexMap::new();
    for prop in model.user_properties() {
        if matches!(prop.dtype, DataType::BackRef(_)) || !env.can_read(&[], prop.id) {
            continue;
        }
        let selected = env.select_prop(&[], prop.id)?;
        map.insert(prop.name.clone(), selected);
    }
    Ok(Term::Selected(Selected::call(
        "checksum",
        vec![Selected::object(map)],
        vec![],
    )))
}

/// `swap(prop, old, new)` replaces `old` with `new`.
fn swap(env: &mut QueryBuilder, expr: &Expr) -> Result<Term> {
    let [arg, old, new] = expr.args.as_slice() else {
        return Err(arity(expr, 3));
    };
    let selected = env.select_arg(arg, expr)?;
    let mut params = vec![];
    for node in [old, new] {
        match node {
            Node::Value(value) => params.push(value.clone()),
            node => return Err(invalid_argument(node, expr)),
        }
    }
    Ok(Term::Selected(Selected::call("swap", vec![selected], params)))
}

impl QueryBuilder {
    fn unary(&mut self, name: &'static str, expr: &Expr) -> Result<Term> {
        let [arg] = expr.args.as_slice() else {
            return Err(arity(expr, 1));
        };
        let selected = self.select_arg(arg, expr)?;
        Ok(Term::Selected(Selected::call(name, vec![selected], vec![])))
    }

    fn binary(&mut self, name: &'static str, expr: &Expr) -> Result<Term> {
        let [first, second] = expr.args.as_slice() else {
            return Err(arity(expr, 2));
        };
        let first = self.select_arg(first, expr)?;
        let second = self.select_arg(second, expr)?;
        Ok(Term::Selected(Selected::call(name, vec![first, second], vec![])))
    }

    /// `_type`, `_id`, `_revision` and the readable visible properties.
    fn select_default(&mut self) -> Result<()> {
        let manifest = self.manifest.clone();
        let model = manifest.model(self.model);

        if self.gate.is_some() {
            self.output
                .insert("_type".to_string(), Selected::constant(model.name.clone()));
        }
        for prop in self.default_props(model) {
            let selected = self.select_prop(&[], prop)?;
            self.output.insert(manifest.prop(prop).name.clone(), selected);
        }
        Ok(())
    }

    fn default_props(&self, model: &Model) -> Vec<PropId> {
        let internal = self.gate.is_none();
        model
            .properties
            .values()
            .copied()
            .filter(|id| {
                let prop = model.prop(*id);
                if prop.name == ID || prop.name == REVISION {
                    return true;
                }
                if prop.is_reserved() || (prop.hidden && !internal) {
                    return false;
                }
                if matches!(prop.dtype, DataType::BackRef(_)) && !self.expand.contains(id) {
                    return false;
                }
                self.can_read(&[], *id)
            })
            .collect()
    }

    fn select_node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Bind(_) | Node::GetAttr(_) => {
                let names = names_of(node).unwrap_or_default();
                let term = self.resolve_place(&names)?;
                let Some(Place { chain, prop, lang }) = term.place() else {
                    return Err(Error::new(ErrorCode::InvalidValue)
                        .with("reason", format!("can't select {}", unparse(node))));
                };

                if !self.can_read(chain, prop) {
                    if self.is_strict() {
                        self.authorize(chain, prop)?;
                    }
                    return Ok(());
                }

                if lang.is_some() {
                    self.text_lang.push(prop);
                } else if matches!(self.manifest.prop(prop).dtype, DataType::Text(_)) {
                    self.text_whole.push(prop);
                }

                let selected = self.select_term(&term)?;
                insert_output(&mut self.output, &names, selected);
            }
            Node::Expr(expr) => match self.call(expr)? {
                Term::Selected(selected) => {
                    self.output.insert(unparse(node), selected);
                }
                _ => return Err(invalid_argument(node, &Expr::new("select", vec![]))),
            },
            Node::Value(value) => {
                let item = self.select.push_column(SelectColumn::Const(value.clone()));
                self.output.insert(unparse(node), Selected::column(item, None));
            }
            node => return Err(invalid_argument(node, &Expr::new("select", vec![]))),
        }
        Ok(())
    }

    /// An argument of a select function.
    fn select_arg(&mut self, node: &Node, expr: &Expr) -> Result<Selected> {
        match node {
            Node::Bind(_) | Node::GetAttr(_) => {
                let names = names_of(node).unwrap_or_default();
                let term = self.resolve_place(&names)?;
                let Some(Place { chain, prop, .. }) = term.place() else {
                    return Err(invalid_argument(node, expr));
                };
                self.authorize(chain, prop)?;
                self.select_term(&term)
            }
            Node::Value(value) => Ok(Selected::constant(value.clone())),
            Node::Expr(inner) => match self.call(inner)? {
                Term::Selected(selected) => Ok(selected),
                _ => Err(invalid_argument(node, expr)),
            },
            node => Err(invalid_argument(node, expr)),
        }
    }

    fn select_term(&mut self, term: &Term) -> Result<Selected> {
        let Some(Place { chain, prop, lang }) = term.place() else {
            datagate_core::bail!("{term:?} can't be selected");
        };
        let chain = chain.to_vec();
        match lang {
            Some(lang) => {
                let column = self.column_of(&chain, prop)?.with_key(lang);
                let item = self.push_column(column, Type::String);
                Ok(Selected::column(item, None))
            }
            None => self.select_prop(&chain, prop),
        }
    }

    pub(super) fn select_prop(&mut self, chain: &[PropId], prop: PropId) -> Result<Selected> {
        let manifest = self.manifest.clone();
        let property = manifest.prop(prop);

        match &property.dtype {
            DataType::Ref(reference) => {
                let mut inner = chain.to_vec();
                inner.push(prop);

                let mut map = IndexMap::new();
                if chain.is_empty() && self.expand.contains(&prop) {
                    let target = manifest.model(reference.model);
                    for child in self.default_props(target) {
                        if matches!(manifest.prop(child).dtype, DataType::BackRef(_)) {
                            continue;
                        }
                        let selected = self.select_prop(&inner, child)?;
                        map.insert(manifest.prop(child).name.clone(), selected);
                    }
                } else {
                    for refprop in &reference.refprops {
                        let selected = self.select_prop(&inner, *refprop)?;
                        map.insert(manifest.prop(*refprop).name.clone(), selected);
                    }
                }
                Ok(Selected {
                    item: None,
                    prop: None,
                    prep: Prep::Ref(map),
                })
            }
            DataType::Object(object) => {
                let internal = self.gate.is_none();
                let mut map = IndexMap::new();
                for (name, child) in &object.props {
                    if (manifest.prop(*child).hidden && !internal) || !self.can_read(chain, *child) {
                        continue;
                    }
                    let selected = self.select_prop(chain, *child)?;
                    map.insert(name.clone(), selected);
                }
                Ok(Selected::object(map))
            }
            DataType::File => {
                let alias = self.join_chain(chain)?;
                let [id, content] = property.columns.as_slice() else {
                    datagate_core::bail!("file property {} must have two columns", property.place);
                };
                let id = self.push_column(ColumnRef::new(&alias, id), Type::String);
                let content = self.push_column(ColumnRef::new(&alias, content), Type::Bytes);
                Ok(Selected::call(
                    "file",
                    vec![Selected::column(id, None), Selected::column(content, None)],
                    vec![],
                ))
            }
            DataType::BackRef(_) => {
                if chain.is_empty() {
                    self.backrefs.push((property.name.clone(), prop));
                }
                Ok(Selected::constant(Value::List(vec![])))
            }
            DataType::Denorm(denorm) => {
                let Some(parent) = property.parent else {
                    datagate_core::bail!("denormalized property {} has no parent", property.place);
                };
                let mut inner = chain.to_vec();
                inner.push(parent);
                self.select_prop(&inner, denorm.target)
            }
            dtype => {
                let column = self.column_of(chain, prop)?;
                let ty = dtype.storage().unwrap_or(Type::String);
                let item = self.push_column(column, ty);
                Ok(Selected::column(item, Some(prop)))
            }
        }
    }
}

/// Inserts a value at a dotted output path, creating objects on the way.
fn insert_output(output: &mut IndexMap<String, Selected>, names: &[&str], selected: Selected) {
    match names {
        [] => {}
        [name] => {
            output.insert(name.to_string(), selected);
        }
        [name, rest @ ..] => {
            let entry = output
                .entry(name.to_string())
                .or_insert_with(|| Selected::object(IndexMap::new()));
            if !matches!(entry.prep, Prep::Object(_) | Prep::Ref(_)) {
                *entry = Selected::object(IndexMap::new());
            }
            if let Prep::Object(map) | Prep::Ref(map) = &mut entry.prep {
                insert_output(map, rest, selected);
            }
        }
    }
}

fn invalid_argument(arg: &Node, expr: &Expr) -> Error {
    Error::new(ErrorCode::InvalidArgumentInExpression)
        .with("arg", unparse(arg))
        .with("expr", &expr.name)
}

fn arity(expr: &Expr, expected: usize) -> Error {
    Error::new(ErrorCode::InvalidValue).with(
        "reason",
        format!(
            "{}() takes {expected} argument(s), {} given",
            expr.name,
            expr.args.len()
        ),
    )
}
