use super::{Place, QueryBuilder, Term};

use datagate_core::{
    expr::Expr,
    schema::{DataType, PropId},
    stmt::{BinaryOp, ColumnRef, Filter, Like, Value},
    ufunc::{Args, Env, Registry, TypeTag},
    Error, ErrorCode, Result,
};

/// Comparison operators available in query filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
}

impl Cmp {
    fn name(self) -> &'static str {
        match self {
            Cmp::Eq => "eq",
            Cmp::Ne => "ne",
            Cmp::Lt => "lt",
            Cmp::Le => "le",
            Cmp::Gt => "gt",
            Cmp::Ge => "ge",
            Cmp::Contains => "contains",
            Cmp::StartsWith => "startswith",
        }
    }

    fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            Cmp::Eq => BinaryOp::Eq,
            Cmp::Ne => BinaryOp::Ne,
            Cmp::Lt => BinaryOp::Lt,
            Cmp::Le => BinaryOp::Le,
            Cmp::Gt => BinaryOp::Gt,
            Cmp::Ge => BinaryOp::Ge,
            Cmp::Contains | Cmp::StartsWith => return None,
        })
    }
}

pub(super) fn define(registry: &mut Registry<QueryBuilder>) {
    // Names are resolved first, then the call is dispatched again on the
    // resolved property.
    macro_rules! resolving {
        ($($name:literal),*) => {$(
            registry.define($name, &[TypeTag::Bind, TypeTag::Any], |env, args| env.redispatch($name, args));
            registry.define($name, &[TypeTag::GetAttr, TypeTag::Any], |env, args| env.redispatch($name, args));
        )*};
    }

    macro_rules! comparators {
        ($($name:literal => $cmp:expr),*) => {$(
            registry.define($name, &[TypeTag::Property, TypeTag::Value], |env, args| env.compare($cmp, args));
            registry.define($name, &[TypeTag::ForeignProperty, TypeTag::Value], |env, args| env.compare($cmp, args));
            registry.define($name, &[TypeTag::Lang, TypeTag::Value], |env, args| env.compare($cmp, args));
        )*};
    }

    resolving!("eq", "ne", "lt", "le", "gt", "ge", "contains", "startswith");
    comparators! {
        "eq" => Cmp::Eq,
        "ne" => Cmp::Ne,
        "lt" => Cmp::Lt,
        "le" => Cmp::Le,
        "gt" => Cmp::Gt,
        "ge" => Cmp::Ge,
        "contains" => Cmp::Contains,
        "startswith" => Cmp::StartsWith
    }

    registry.define_raw("and", |env, expr| env.connective(expr, true));
    registry.define_raw("or", |env, expr| env.connective(expr, false));
    registry.define("group", &[TypeTag::Any], |_, args| {
        let [term] = args.take().ok_or_else(|| datagate_core::err!("group takes one argument"))?;
        Ok(term)
    });
    registry.define_variadic("list", &[], TypeTag::Value, |_, args| {
        let values = args
            .args
            .into_iter()
            .filter_map(|term| match term {
                Term::Value(value) => Some(value),
                _ => None,
            })
            .collect();
        Ok(Term::Value(Value::List(values)))
    });
}

fn condition(term: Term) -> Option<Filter> {
    match term {
        Term::Condition(filter) => Some(filter),
        _ => None,
    }
}

impl QueryBuilder {
    /// `and(...)` when `all`, `or(...)` otherwise. Operands are resolved in
    /// order until one decides the outcome.
    fn connective(&mut self, expr: &Expr, all: bool) -> Result<Term> {
        let mut operands = vec![];
        for arg in &expr.args {
            match condition(self.resolve(arg)?) {
                Some(Filter::Const(value)) if value != all => {
                    return Ok(Term::Condition(Filter::Const(value)));
                }
                Some(filter) => operands.push(filter),
                None => {}
            }
        }
        Ok(Term::Condition(if all {
            Filter::and(operands)
        } else {
            Filter::or(operands)
        }))
    }

    fn redispatch(&mut self, name: &str, args: Args<Term>) -> Result<Term> {
        let mut resolved = Vec::with_capacity(args.len());
        for term in args.args {
            resolved.push(match term {
                Term::Node(node) => match super::names_of(&node) {
                    Some(names) => self.resolve_place(&names)?,
                    None => Term::Node(node),
                },
                term => term,
            });
        }
        self.dispatch(name, Args::new(resolved))
    }

    fn compare(&mut self, cmp: Cmp, args: Args<Term>) -> Result<Term> {
        let [target, value] = args
            .take()
            .ok_or_else(|| datagate_core::err!("{} takes two arguments", cmp.name()))?;
        let Term::Value(value) = value else {
            datagate_core::bail!("{} expects a value", cmp.name());
        };
        let Some(Place { chain, prop, lang }) = target.place() else {
            datagate_core::bail!("{} expects a property", cmp.name());
        };
        self.authorize(chain, prop)?;

        let chain = chain.to_vec();
        let filter = match lang {
            Some(lang) => {
                let column = self.column_of(&chain, prop)?.with_key(lang);
                scalar(cmp, column, value)?
            }
            None => self.compare_prop(cmp, &chain, prop, value)?,
        };
        Ok(Term::Condition(filter))
    }

    fn compare_prop(&mut self, cmp: Cmp, chain: &[PropId], prop: PropId, value: Value) -> Result<Filter> {
        let manifest = self.manifest.clone();
        let property = manifest.prop(prop);

        match &property.dtype {
            DataType::Ref(reference) => {
                // A ref compares by its first refprop, given bare or as
                // `{"_id": ...}`.
                let value = match value {
                    Value::Object(mut object) => {
                        let key = &manifest.prop(reference.refprops[0]).name;
                        object.shift_remove(key).unwrap_or_default()
                    }
                    value => value,
                };
                let mut inner = chain.to_vec();
                inner.push(prop);
                let column = self.column_of(&inner, reference.refprops[0])?;
                scalar(cmp, column, value)
            }
            DataType::Text(text) => {
                let column = self.column_of(chain, prop)?;
                let filters = text
                    .langs
                    .iter()
                    .map(|lang| scalar(cmp, column.clone().with_key(lang), value.clone()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(if cmp == Cmp::Ne {
                    Filter::and(filters)
                } else {
                    Filter::or(filters)
                })
            }
            dtype if dtype.is_leaf() && property.column().is_some() => {
                let value = match value {
                    Value::List(values) => {
                        Value::List(values.into_iter().map(|value| prepare_enum(property, value)).collect())
                    }
                    value => prepare_enum(property, value),
                };
                let column = self.column_of(chain, prop)?;
                scalar(cmp, column, value)
            }
            dtype => Err(Error::new(ErrorCode::UnknownMethod)
                .with("name", cmp.name())
                .with("args", format!("({}, value)", dtype.name()))),
        }
    }
}

/// Enum properties are filtered by the stored value of an item.
fn prepare_enum(property: &datagate_core::schema::Property, value: Value) -> Value {
    match property.enum_prepare(&value) {
        Some(prepared) => prepared.clone(),
        None => value,
    }
}

fn scalar(cmp: Cmp, column: ColumnRef, value: Value) -> Result<Filter> {
    match (cmp, value) {
        (Cmp::Eq, Value::List(values)) => Ok(in_list(column, values)),
        (Cmp::Ne, Value::List(values)) => Ok(Filter::not(in_list(column, values))),
        (_, Value::List(_)) => Err(Error::new(ErrorCode::InvalidValue).with(
            "reason",
            format!("{}() doesn't accept a list", cmp.name()),
        )),
        (Cmp::Contains, Value::String(value)) => Ok(Filter::Like {
            column,
            like: Like::Contains,
            value,
        }),
        (Cmp::StartsWith, Value::String(value)) => Ok(Filter::Like {
            column,
            like: Like::StartsWith,
            value,
        }),
        (cmp, value) => match cmp.binary_op() {
            Some(op) => Ok(Filter::compare(column, op, value)),
            None => Err(Error::new(ErrorCode::InvalidValue).with(
                "reason",
                format!("{}() expects a string, got {}", cmp.name(), value.type_name()),
            )),
        },
    }
}

/// `column IN (values)`, also matching nulls when the list has one.
fn in_list(column: ColumnRef, values: Vec<Value>) -> Filter {
    let (nulls, values): (Vec<_>, Vec<_>) = values.into_iter().partition(Value::is_null);
    let list = Filter::InList {
        column: column.clone(),
        values,
    };
    if nulls.is_empty() {
        list
    } else {
        Filter::or([list, Filter::is_null(column)])
    }
}
