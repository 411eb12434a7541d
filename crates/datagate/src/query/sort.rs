use super::{names_of, unparse, Place, QueryBuilder};

use datagate_core::{
    expr::Node,
    schema::{DataType, PropId},
    stmt::{ColumnRef, Direction, OrderBy, Type},
    Error, ErrorCode, Result,
};

/// One key of the requested ordering.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SortKey {
    /// The key as written, e.g. `country.name`
    pub(crate) key: String,

    pub(crate) column: ColumnRef,

    pub(crate) ty: Type,

    pub(crate) direction: Direction,

    /// `None` when sorting by a property of a referenced model or by one
    /// language of a text property
    pub(crate) prop: Option<PropId>,
}

impl QueryBuilder {
    /// Adds `sort(...)` keys; `-name` sorts descending.
    pub(crate) fn sort(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            let (direction, inner) = match node {
                Node::Negative(inner) => (Direction::Desc, &**inner),
                Node::Positive(inner) => (Direction::Asc, &**inner),
                node => (Direction::Asc, node),
            };
            let Some(names) = names_of(inner) else {
                return Err(invalid_sort_key(unparse(node)));
            };
            let key = names.join(".");

            let term = self.resolve_place(&names)?;
            let Some(Place { chain, prop, lang }) = term.place() else {
                return Err(invalid_sort_key(key));
            };
            self.authorize(chain, prop)?;

            let manifest = self.manifest.clone();
            let property = manifest.prop(prop);
            let chain = chain.to_vec();

            let (column, ty) = match lang {
                Some(lang) => (self.column_of(&chain, prop)?.with_key(lang), Type::String),
                None => {
                    let sortable = property.dtype.is_leaf()
                        && property.column().is_some()
                        && !matches!(property.dtype, DataType::Ref(_) | DataType::Geometry(_));
                    if !sortable {
                        return Err(invalid_sort_key(key));
                    }
                    let ty = property.dtype.storage().unwrap_or(Type::String);
                    (self.column_of(&chain, prop)?, ty)
                }
            };

            let local = chain.is_empty() && lang.is_none();
            self.select.order_by.push(OrderBy::new(column.clone(), direction));
            self.sort.push(SortKey {
                key,
                column,
                ty,
                direction,
                prop: local.then_some(prop),
            });
        }
        Ok(())
    }
}

fn invalid_sort_key(key: String) -> Error {
    Error::new(ErrorCode::InvalidSortKey).with("key", key)
}
