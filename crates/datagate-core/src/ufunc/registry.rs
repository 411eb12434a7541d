use super::{Args, Env, Signature, TypeTag};
use crate::{expr::Expr, Error, ErrorCode, Result};

use indexmap::IndexMap;

/// Handler of an overload: receives evaluated arguments.
pub type Handler<E> = fn(&mut E, Args<<E as Env>::Term>) -> Result<<E as Env>::Term>;

/// Handler that receives the call unevaluated and decides itself what to
/// evaluate.
pub type RawHandler<E> = fn(&mut E, &Expr) -> Result<<E as Env>::Term>;

pub struct Overload<E: Env> {
    pub signature: Signature,
    pub handler: Handler<E>,
}

pub enum Function<E: Env> {
    Raw(RawHandler<E>),
    Overloads(Vec<Overload<E>>),
}

/// Function table of one environment.
///
/// Registries are built once, usually in a `LazyLock` static, and never
/// mutated afterwards.
pub struct Registry<E: Env> {
    functions: IndexMap<&'static str, Function<E>>,
}

impl<E: Env> Registry<E> {
    pub fn new() -> Registry<E> {
        Registry {
            functions: IndexMap::new(),
        }
    }

    /// Adds an overload. Panics on a duplicate or an ambiguous signature;
    /// registries are static, so this is a programming error.
    pub fn define(&mut self, name: &'static str, params: &[TypeTag], handler: Handler<E>) {
        if let Err(err) = self.try_define(name, Signature::new(params), handler) {
            panic!("{err}");
        }
    }

    /// Like [`Registry::define`], accepting any number of `rest` arguments
    /// after `params`.
    pub fn define_variadic(
        &mut self,
        name: &'static str,
        params: &[TypeTag],
        rest: TypeTag,
        handler: Handler<E>,
    ) {
        if let Err(err) = self.try_define(name, Signature::variadic(params, rest), handler) {
            panic!("{err}");
        }
    }

    /// Registers a handler that receives the call unevaluated.
    pub fn define_raw(&mut self, name: &'static str, handler: RawHandler<E>) {
        if self.functions.insert(name, Function::Raw(handler)).is_some() {
            panic!("function {name:?} is already defined");
        }
    }

    /// Adds an overload, rejecting duplicates and signatures that overlap an
    /// existing one without either being more specific.
    pub fn try_define(
        &mut self,
        name: &'static str,
        signature: Signature,
        handler: Handler<E>,
    ) -> Result<()> {
        let function = self
            .functions
            .entry(name)
            .or_insert_with(|| Function::Overloads(vec![]));

        let Function::Overloads(overloads) = function else {
            crate::bail!("function {name:?} is defined as a raw handler");
        };

        for existing in overloads.iter() {
            if existing.signature == signature {
                crate::bail!("function {name}{signature} is already defined");
            }
            let ambiguous = signature.overlaps(&existing.signature)
                && !signature.dominates(&existing.signature)
                && !existing.signature.dominates(&signature);
            if ambiguous {
                crate::bail!(
                    "function {name}{signature} is ambiguous with {name}{}",
                    existing.signature
                );
            }
        }

        overloads.push(Overload { signature, handler });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Function<E>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Picks the most specific overload accepting `tags`.
    pub fn lookup(&self, name: &str, tags: &[TypeTag]) -> Result<Handler<E>> {
        let overloads = match self.functions.get(name) {
            Some(Function::Overloads(overloads)) => overloads.as_slice(),
            _ => &[],
        };

        let candidates: Vec<&Overload<E>> = overloads
            .iter()
            .filter(|overload| overload.signature.matches(tags))
            .collect();

        let best = candidates
            .iter()
            .find(|candidate| {
                candidates
                    .iter()
                    .all(|other| candidate.signature.dominates(&other.signature))
            })
            .or_else(|| {
                candidates
                    .iter()
                    .max_by_key(|candidate| candidate.signature.specificity())
            });

        match best {
            Some(overload) => Ok(overload.handler),
            None => Err(unknown_method(name, tags)),
        }
    }
}

impl<E: Env> Default for Registry<E> {
    fn default() -> Self {
        Registry::new()
    }
}

pub(super) fn unknown_method(name: &str, tags: &[TypeTag]) -> Error {
    let args = tags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorCode::UnknownMethod)
        .with("name", name)
        .with("args", format!("({args})"))
}
