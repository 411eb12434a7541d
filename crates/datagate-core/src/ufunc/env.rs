use super::{registry::unknown_method, Args, Function, Registry, TypeTag};
use crate::{
    expr::{Expr, Node},
    Result,
};

use indexmap::IndexMap;
use std::fmt;

/// An evaluation environment: a term type, a way to turn leaf nodes into
/// terms, and the function table used for calls.
///
/// The query builder, the result builder and the write stream are each an
/// environment over the same expression tree.
pub trait Env: Sized + 'static {
    type Term: Clone + fmt::Debug;

    fn registry(&self) -> &'static Registry<Self>;

    /// The runtime type of a term, used for dispatch.
    fn type_tag(&self, term: &Self::Term) -> TypeTag;

    /// Converts a node that is not a call into a term.
    fn lift(&mut self, node: &Node) -> Result<Self::Term>;

    /// Evaluates a node: calls are dispatched, anything else is lifted.
    fn resolve(&mut self, node: &Node) -> Result<Self::Term> {
        match node {
            Node::Expr(expr) => self.call(expr),
            node => self.lift(node),
        }
    }

    /// Evaluates the arguments of `expr` and dispatches on their types.
    /// Raw handlers receive the call as is.
    fn call(&mut self, expr: &Expr) -> Result<Self::Term> {
        match self.registry().get(&expr.name) {
            Some(Function::Raw(handler)) => handler(self, expr),
            Some(Function::Overloads(_)) => {
                let args = expr
                    .args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Result<Vec<_>>>()?;
                let mut kwargs = IndexMap::new();
                for (key, value) in &expr.kwargs {
                    kwargs.insert(key.clone(), self.resolve(value)?);
                }
                self.dispatch(&expr.name, Args { args, kwargs })
            }
            None => {
                let tags: Vec<_> = expr.args.iter().map(TypeTag::of_node).collect();
                Err(unknown_method(&expr.name, &tags))
            }
        }
    }

    /// Calls the overload of `name` that best matches already evaluated
    /// arguments.
    fn dispatch(&mut self, name: &str, args: Args<Self::Term>) -> Result<Self::Term> {
        let tags: Vec<_> = args.args.iter().map(|arg| self.type_tag(arg)).collect();
        let handler = self.registry().lookup(name, &tags)?;
        handler(self, args)
    }
}
