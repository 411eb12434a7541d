//! Compiling bound request parameters into a relational [`Select`].
//!
//! The [`QueryBuilder`] is an [`Env`]: `select(...)` arguments and filter
//! expressions are dispatched through its function registry. Names are
//! resolved against the model's flattened properties; following a ref
//! installs a `LEFT JOIN` on the referenced table.
//!
//! ```text
//! /City?select(name, country.name)&country.name="Lithuania"
//!
//! SELECT t0.name, t1.name, t0._id
//! FROM City AS t0
//! LEFT JOIN Country AS t1 ON t0."country._id" = t1._id
//! WHERE t1.name = 'Lithuania'
//! ```

mod filter;

mod select;
pub(crate) use select::{Prep, Selected};

mod sort;
pub(crate) use sort::SortKey;

use crate::{access::AccessGate, context::Context, spyna, Action, UrlParams};

use datagate_core::{
    expr::{Expr, Node},
    schema::{DataType, ModelId, PropId, ID},
    stmt::{ColumnRef, Join, Select, SelectColumn, TableRef, Type, Value},
    ufunc::{Env, Registry, TypeTag},
    Error, ErrorCode, Manifest, Result,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Alias of the queried model's table.
pub(crate) const ROOT: &str = "t0";

static REGISTRY: LazyLock<Registry<QueryBuilder>> = LazyLock::new(|| {
    let mut registry: Registry<QueryBuilder> = Registry::new();
    filter::define(&mut registry);
    select::define(&mut registry);
    registry
});

/// A value flowing through the query builder.
#[derive(Debug, Clone)]
pub(crate) enum Term {
    /// An unevaluated node: a name waiting to be resolved
    Node(Node),
    Value(Value),
    /// A property of the queried model
    Property(PropId),
    /// A property reached through refs
    Foreign(ForeignProperty),
    /// One language of a text property
    Lang(LangProperty),
    Condition(datagate_core::stmt::Filter),
    Selected(Selected),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForeignProperty {
    /// Refs followed from the queried model, outermost first
    pub(crate) chain: Vec<PropId>,
    pub(crate) prop: PropId,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LangProperty {
    pub(crate) chain: Vec<PropId>,
    pub(crate) prop: PropId,
    pub(crate) lang: String,
}

/// Where a resolved property lives: the refs leading to it, the property
/// and an optional language key.
struct Place<'a> {
    chain: &'a [PropId],
    prop: PropId,
    lang: Option<&'a str>,
}

impl Term {
    fn place(&self) -> Option<Place<'_>> {
        match self {
            Term::Property(prop) => Some(Place {
                chain: &[],
                prop: *prop,
                lang: None,
            }),
            Term::Foreign(foreign) => Some(Place {
                chain: &foreign.chain,
                prop: foreign.prop,
                lang: None,
            }),
            Term::Lang(lang) => Some(Place {
                chain: &lang.chain,
                prop: lang.prop,
                lang: Some(&lang.lang),
            }),
            _ => None,
        }
    }
}

/// The compiled query plus what is needed to shape its rows.
#[derive(Debug, Clone)]
pub(crate) struct QueryPlan {
    pub(crate) model: ModelId,
    pub(crate) select: Select,

    /// Output keys of a result row, in order
    pub(crate) output: IndexMap<String, Selected>,

    /// Row position of the `_id` column; `None` for counts
    pub(crate) id_item: Option<usize>,

    pub(crate) sort: Vec<SortKey>,

    pub(crate) count: bool,

    /// Back references to fill with a follow-up query, by output key
    pub(crate) backrefs: Vec<(String, PropId)>,
}

pub(crate) struct QueryBuilder {
    manifest: Arc<Manifest>,
    model: ModelId,

    /// `None` for internal reads: no access checks and hidden properties
    /// are selected by default.
    gate: Option<AccessGate>,

    action: Action,

    select: Select,

    /// Table alias of every installed ref chain
    joins: HashMap<Vec<PropId>, String>,

    output: IndexMap<String, Selected>,

    /// Text properties selected whole and by language
    text_whole: Vec<PropId>,
    text_lang: Vec<PropId>,

    count: bool,
    expand: HashSet<PropId>,
    backrefs: Vec<(String, PropId)>,
    sort: Vec<SortKey>,
}

impl Env for QueryBuilder {
    type Term = Term;

    fn registry(&self) -> &'static Registry<Self> {
        &REGISTRY
    }

    fn type_tag(&self, term: &Term) -> TypeTag {
        match term {
            Term::Node(node) => TypeTag::of_node(node),
            Term::Value(value) => TypeTag::of_value(value),
            Term::Property(prop) => TypeTag::of_dtype(&self.manifest.prop(*prop).dtype),
            Term::Foreign(_) => TypeTag::ForeignProperty,
            Term::Lang(_) => TypeTag::Lang,
            Term::Condition(_) => TypeTag::Condition,
            Term::Selected(_) => TypeTag::Selected,
        }
    }

    fn lift(&mut self, node: &Node) -> Result<Term> {
        Ok(match node {
            Node::Value(value) => Term::Value(value.clone()),
            Node::Negative(inner) => match &**inner {
                Node::Value(Value::Integer(value)) => Term::Value(Value::Integer(-value)),
                Node::Value(Value::Number(value)) => Term::Value(Value::Number(-value)),
                _ => Term::Node(node.clone()),
            },
            node => Term::Node(node.clone()),
        })
    }
}

/// Compiles the query of a read request.
pub(crate) fn plan(cx: &Context, model: ModelId, params: &UrlParams) -> Result<QueryPlan> {
    let mut builder = QueryBuilder::new(
        cx.manifest.clone(),
        model,
        Some(cx.gate.clone()),
        params.action,
    );
    builder.expand(params.expand.as_deref())?;

    let mut select = params.select.clone();
    if params.count {
        select
            .get_or_insert_with(Vec::new)
            .push(Node::Expr(Expr::new("count", vec![])));
    }
    builder.select(select.as_deref())?;
    builder.filter(&params.query)?;
    builder.sort(&params.sort)?;
    builder.build()
}

impl QueryBuilder {
    pub(crate) fn new(
        manifest: Arc<Manifest>,
        model: ModelId,
        gate: Option<AccessGate>,
        action: Action,
    ) -> QueryBuilder {
        let select = Select::new(manifest.model(model).table.clone(), ROOT);
        QueryBuilder {
            manifest,
            model,
            gate,
            action,
            select,
            joins: HashMap::new(),
            output: IndexMap::new(),
            text_whole: vec![],
            text_lang: vec![],
            count: false,
            expand: HashSet::new(),
            backrefs: vec![],
            sort: vec![],
        }
    }

    /// A builder for reads done on behalf of the gateway itself.
    pub(crate) fn internal(manifest: Arc<Manifest>, model: ModelId) -> QueryBuilder {
        QueryBuilder::new(manifest, model, None, Action::GetOne)
    }

    /// Marks refs and back references to expand. An empty list expands all
    /// of them.
    pub(crate) fn expand(&mut self, nodes: Option<&[Node]>) -> Result<()> {
        let Some(nodes) = nodes else {
            return Ok(());
        };
        let manifest = self.manifest.clone();
        let model = manifest.model(self.model);

        if nodes.is_empty() {
            self.expand.extend(
                model
                    .user_properties()
                    .filter(|prop| matches!(prop.dtype, DataType::Ref(_) | DataType::BackRef(_)))
                    .map(|prop| prop.id),
            );
            return Ok(());
        }

        for node in nodes {
            let Some(name) = node.as_name() else {
                return Err(Error::new(ErrorCode::InvalidValue)
                    .with("reason", format!("can't expand {}", unparse(node))));
            };
            let prop = model.property(name).ok_or_else(|| {
                Error::new(ErrorCode::PropertyNotFound)
                    .with("property", name)
                    .with("model", &model.name)
            })?;
            if !matches!(prop.dtype, DataType::Ref(_) | DataType::BackRef(_)) {
                return Err(Error::new(ErrorCode::InvalidValue)
                    .with("reason", format!("{name:?} is not a reference")));
            }
            self.expand.insert(prop.id);
        }
        Ok(())
    }

    /// Selects the given nodes, or the default properties when `None`.
    pub(crate) fn select(&mut self, nodes: Option<&[Node]>) -> Result<()> {
        let args = nodes.map(<[Node]>::to_vec).unwrap_or_default();
        self.call(&Expr::new("select", args))?;
        Ok(())
    }

    /// ANDs every node, each of which must evaluate to a condition.
    pub(crate) fn filter(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match self.resolve(node)? {
                Term::Condition(filter) => self.select.and_filter(filter),
                _ => {
                    return Err(Error::new(ErrorCode::InvalidValue)
                        .with("reason", format!("{} is not a condition", unparse(node))))
                }
            }
        }
        Ok(())
    }

    pub(crate) fn build(mut self) -> Result<QueryPlan> {
        let id_item = if self.count {
            self.select.order_by.clear();
            self.select.limit = None;
            self.select.offset = None;
            None
        } else {
            Some(self.push_column(ColumnRef::new(ROOT, ID), Type::String))
        };

        debug!(
            model = %self.manifest.model(self.model).name,
            columns = self.select.columns.len(),
            joins = self.select.joins.len(),
            "query built"
        );

        Ok(QueryPlan {
            model: self.model,
            select: self.select,
            output: self.output,
            id_item,
            sort: self.sort,
            count: self.count,
            backrefs: self.backrefs,
        })
    }

    /// Resolves a dotted name against the queried model.
    ///
    /// The longest prefix naming a property wins, so `address.city` finds a
    /// nested object property before trying `address`. Refs are followed
    /// into their target model, denormalized properties are read through
    /// their parent ref, and a trailing name after a text property selects
    /// one language.
    fn resolve_place(&self, names: &[&str]) -> Result<Term> {
        let manifest = &self.manifest;
        let not_found = || {
            Error::new(ErrorCode::PropertyNotFound)
                .with("property", names.join("."))
                .with("model", &manifest.model(self.model).name)
        };

        let mut model = manifest.model(self.model);
        let mut chain = vec![];
        let mut rest = names;

        loop {
            let (len, prop) = (1..=rest.len())
                .rev()
                .find_map(|len| model.flatprop(&rest[..len].join(".")).map(|prop| (len, prop)))
                .ok_or_else(not_found)?;
            rest = &rest[len..];

            if let DataType::Denorm(denorm) = &prop.dtype {
                let parent = prop.parent.ok_or_else(not_found)?;
                chain.push(parent);
                if !rest.is_empty() {
                    return Err(not_found());
                }
                return Ok(Term::Foreign(ForeignProperty {
                    chain,
                    prop: denorm.target,
                }));
            }

            if rest.is_empty() {
                return Ok(if chain.is_empty() {
                    Term::Property(prop.id)
                } else {
                    Term::Foreign(ForeignProperty {
                        chain,
                        prop: prop.id,
                    })
                });
            }

            match &prop.dtype {
                DataType::Ref(reference) => {
                    chain.push(prop.id);
                    model = manifest.model(reference.model);
                }
                DataType::Text(text) if rest.len() == 1 && text.langs.iter().any(|lang| lang == rest[0]) => {
                    return Ok(Term::Lang(LangProperty {
                        chain,
                        prop: prop.id,
                        lang: rest[0].to_string(),
                    }));
                }
                _ => return Err(not_found()),
            }
        }
    }

    /// The column holding a leaf property. A refprop of the last ref in the
    /// chain is read from the local ref column without a join.
    fn column_of(&mut self, chain: &[PropId], prop: PropId) -> Result<ColumnRef> {
        let manifest = self.manifest.clone();

        if let Some((last, init)) = chain.split_last() {
            let reference = manifest.prop(*last);
            if let DataType::Ref(dtype) = &reference.dtype {
                if let Some(position) = dtype.refprops.iter().position(|id| *id == prop) {
                    let alias = self.join_chain(init)?;
                    return Ok(ColumnRef::new(alias, &reference.columns[position]));
                }
            }
        }

        let property = manifest.prop(prop);
        let Some(column) = property.column() else {
            return Err(Error::new(ErrorCode::UnknownMethod)
                .with("name", "column")
                .with("args", format!("({})", property.dtype.name())));
        };
        let alias = self.join_chain(chain)?;
        Ok(ColumnRef::new(alias, column))
    }

    /// Installs a `LEFT JOIN` for every prefix of the chain that is not
    /// joined yet and returns the alias of the last one.
    fn join_chain(&mut self, chain: &[PropId]) -> Result<String> {
        let manifest = self.manifest.clone();
        let mut alias = ROOT.to_string();

        for end in 1..=chain.len() {
            let key = chain[..end].to_vec();
            if let Some(existing) = self.joins.get(&key) {
                alias = existing.clone();
                continue;
            }

            let reference = manifest.prop(chain[end - 1]);
            let Some(dtype) = reference.dtype.as_ref() else {
                datagate_core::bail!("{} is not a ref", reference.place);
            };
            let target = manifest.model(dtype.model);
            let right = format!("t{}", self.joins.len() + 1);

            let mut on = vec![];
            for (left, refprop) in reference.columns.iter().zip(&dtype.refprops) {
                let Some(column) = target.prop(*refprop).column() else {
                    datagate_core::bail!("refprop of {} has no single column", reference.place);
                };
                on.push((ColumnRef::new(&alias, left), ColumnRef::new(&right, column)));
            }

            self.select.joins.push(Join {
                table: TableRef {
                    table: target.table.clone(),
                    alias: right.clone(),
                },
                on,
            });
            self.joins.insert(key, right.clone());
            alias = right;
        }

        Ok(alias)
    }

    fn push_column(&mut self, column: ColumnRef, ty: Type) -> usize {
        match self.select.position(&column) {
            Some(index) => index,
            None => self.select.push_column(SelectColumn::Column(column, ty)),
        }
    }

    /// Fails unless the client may use every property along the way.
    fn authorize(&self, chain: &[PropId], prop: PropId) -> Result<()> {
        let Some(gate) = &self.gate else {
            return Ok(());
        };
        for id in chain.iter().chain([&prop]) {
            let model = self.manifest.model(id.model);
            gate.authorize_prop(model, model.prop(*id), self.action)?;
        }
        Ok(())
    }

    fn can_read(&self, chain: &[PropId], prop: PropId) -> bool {
        let Some(gate) = &self.gate else {
            return true;
        };
        chain.iter().chain([&prop]).all(|id| {
            let model = self.manifest.model(id.model);
            gate.can_prop(model, model.prop(*id), self.action)
        })
    }

    fn is_strict(&self) -> bool {
        self.gate.as_ref().is_some_and(AccessGate::is_strict)
    }
}

fn unparse(node: &Node) -> String {
    spyna::unparse_arg(&node.to_ast())
}

/// The names of a `Bind` or `GetAttr` node.
fn names_of(node: &Node) -> Option<Vec<&str>> {
    match node {
        Node::Bind(bind) => Some(vec![bind.name.as_str()]),
        Node::GetAttr(getattr) => Some(getattr.names()),
        _ => None,
    }
}
