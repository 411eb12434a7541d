use super::{Arg, Ast};
use crate::{stmt::Value, Error, ErrorCode, Result};

use indexmap::IndexMap;
use std::fmt;

/// A node of the expression tree. Nodes are immutable: transforms build new
/// nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A function call
    Expr(Expr),

    /// A literal
    Value(Value),

    /// An unresolved name
    Bind(Bind),

    /// A dotted name, `a.b.c`
    GetAttr(GetAttr),

    /// A keyword argument, `name: value`
    Pair(Pair),

    /// Descending sort marker, `-x`
    Negative(Box<Node>),

    /// Ascending sort marker, `+x`
    Positive(Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub name: String,
    pub args: Vec<Node>,
    pub kwargs: IndexMap<String, Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bind {
    pub name: String,
}

/// `GetAttr("a", GetAttr("b", Bind("c")))` for `a.b.c`.
#[derive(Debug, Clone, PartialEq)]
pub struct GetAttr {
    pub obj: String,
    pub name: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub key: String,
    pub value: Box<Node>,
}

impl Node {
    /// Lowers a raw parse node.
    pub fn from_ast(ast: &Ast) -> Result<Node> {
        match ast.name.as_str() {
            "bind" => match ast.as_bind() {
                Some(name) => Ok(Node::Bind(Bind::new(name))),
                None => Err(invalid_argument(ast)),
            },
            "getattr" => {
                let mut names = vec![];
                collect_attr_names(ast, &mut names)?;
                Ok(GetAttr::from_names(&names)
                    .map(Node::GetAttr)
                    .unwrap_or_else(|| Node::Bind(Bind::new(names.concat()))))
            }
            "negative" | "positive" => {
                let [arg] = ast.args.as_slice() else {
                    return Err(invalid_argument(ast));
                };
                let inner = Box::new(Node::from_arg(arg)?);
                Ok(if ast.name == "negative" {
                    Node::Negative(inner)
                } else {
                    Node::Positive(inner)
                })
            }
            "pair" => {
                let [key, value] = ast.args.as_slice() else {
                    return Err(invalid_argument(ast));
                };
                let key = match key {
                    Arg::Ast(key) => key.as_bind(),
                    Arg::Value(Value::String(key)) => Some(key.as_str()),
                    Arg::Value(_) => None,
                };
                match key {
                    Some(key) => Ok(Node::Pair(Pair {
                        key: key.to_string(),
                        value: Box::new(Node::from_arg(value)?),
                    })),
                    None => Err(invalid_argument(ast)),
                }
            }
            _ => {
                let mut expr = Expr::new(&ast.name, vec![]);
                for arg in &ast.args {
                    match Node::from_arg(arg)? {
                        Node::Pair(pair) => {
                            expr.kwargs.insert(pair.key, *pair.value);
                        }
                        node => expr.args.push(node),
                    }
                }
                Ok(Node::Expr(expr))
            }
        }
    }

    pub fn from_arg(arg: &Arg) -> Result<Node> {
        match arg {
            Arg::Ast(ast) => Node::from_ast(ast),
            Arg::Value(value) => Ok(Node::Value(value.clone())),
        }
    }

    /// Raises the node back to a raw parse node.
    pub fn to_ast(&self) -> Arg {
        match self {
            Node::Expr(expr) => {
                let mut args: Vec<Arg> = expr.args.iter().map(Node::to_ast).collect();
                for (key, value) in &expr.kwargs {
                    args.push(Arg::Ast(Ast::new(
                        "pair",
                        vec![Arg::Ast(Ast::bind(key)), value.to_ast()],
                    )));
                }
                Arg::Ast(Ast::new(&expr.name, args))
            }
            Node::Value(value) => Arg::Value(value.clone()),
            Node::Bind(bind) => Arg::Ast(Ast::bind(&bind.name)),
            Node::GetAttr(getattr) => {
                let names = getattr.names();
                let mut ast = Ast::bind(names[0]);
                for name in &names[1..] {
                    ast = Ast::new("getattr", vec![Arg::Ast(ast), Arg::Ast(Ast::bind(*name))]);
                }
                Arg::Ast(ast)
            }
            Node::Pair(pair) => Arg::Ast(Ast::new(
                "pair",
                vec![Arg::Ast(Ast::bind(&pair.key)), pair.value.to_ast()],
            )),
            Node::Negative(inner) => Arg::Ast(Ast::new("negative", vec![inner.to_ast()])),
            Node::Positive(inner) => Arg::Ast(Ast::new("positive", vec![inner.to_ast()])),
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Node::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The name of a bind, or a bare string literal.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Node::Bind(bind) => Some(&bind.name),
            Node::Value(Value::String(name)) => Some(name),
            _ => None,
        }
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Expr(_) => "Expr",
            Node::Value(_) => "Value",
            Node::Bind(_) => "Bind",
            Node::GetAttr(_) => "GetAttr",
            Node::Pair(_) => "Pair",
            Node::Negative(_) => "Negative",
            Node::Positive(_) => "Positive",
        }
    }
}

impl Expr {
    pub fn new(name: impl Into<String>, args: Vec<Node>) -> Expr {
        Expr {
            name: name.into(),
            args,
            kwargs: IndexMap::new(),
        }
    }
}

impl Bind {
    pub fn new(name: impl Into<String>) -> Bind {
        Bind { name: name.into() }
    }
}

impl GetAttr {
    /// Builds the right-nested chain for `names[0].names[1]...`. Needs at
    /// least two names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Option<GetAttr> {
        let (last, init) = names.split_last()?;
        let (first, middle) = init.split_first()?;
        let mut tail = Node::Bind(Bind::new(last.as_ref()));
        for name in middle.iter().rev() {
            tail = Node::GetAttr(GetAttr {
                obj: name.as_ref().to_string(),
                name: Box::new(tail),
            });
        }
        Some(GetAttr {
            obj: first.as_ref().to_string(),
            name: Box::new(tail),
        })
    }

    /// The chain as a list of names.
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.obj.as_str()];
        let mut node = &*self.name;
        loop {
            match node {
                Node::GetAttr(next) => {
                    names.push(&next.obj);
                    node = &next.name;
                }
                Node::Bind(bind) => {
                    names.push(&bind.name);
                    break;
                }
                _ => break,
            }
        }
        names
    }

    /// The chain joined with dots.
    pub fn place(&self) -> String {
        self.names().join(".")
    }
}

impl From<Expr> for Node {
    fn from(value: Expr) -> Self {
        Node::Expr(value)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Value(value)
    }
}

impl From<Bind> for Node {
    fn from(value: Bind) -> Self {
        Node::Bind(value)
    }
}

impl fmt::Display for GetAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.place())
    }
}

fn collect_attr_names(ast: &Ast, names: &mut Vec<String>) -> Result<()> {
    if let Some(name) = ast.as_bind() {
        names.push(name.to_string());
        return Ok(());
    }
    match (ast.name.as_str(), ast.args.as_slice()) {
        ("getattr", [Arg::Ast(obj), Arg::Ast(name)]) => {
            collect_attr_names(obj, names)?;
            collect_attr_names(name, names)
        }
        _ => Err(invalid_argument(ast)),
    }
}

fn invalid_argument(ast: &Ast) -> Error {
    Error::new(ErrorCode::InvalidArgumentInExpression)
        .with("arg", format!("{:?}", ast.args))
        .with("expr", &ast.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn getattr(obj: Ast, name: &str) -> Ast {
        Ast::new("getattr", vec![obj.into(), Ast::bind(name).into()])
    }

    #[test]
    fn getattr_chain_is_right_nested() {
        let ast = getattr(getattr(Ast::bind("a"), "b"), "c");
        let node = Node::from_ast(&ast).unwrap();

        let expected = Node::GetAttr(GetAttr {
            obj: "a".into(),
            name: Box::new(Node::GetAttr(GetAttr {
                obj: "b".into(),
                name: Box::new(Node::Bind(Bind::new("c"))),
            })),
        });
        assert_eq!(node, expected);

        let Node::GetAttr(getattr) = &node else {
            unreachable!()
        };
        assert_eq!(getattr.place(), "a.b.c");
    }

    #[test]
    fn pairs_become_kwargs() {
        let ast = Ast::new(
            "page",
            vec![
                Arg::Value(Value::from("abc")),
                Ast::new(
                    "pair",
                    vec![Ast::bind("size").into(), Arg::Value(Value::from(10))],
                )
                .into(),
            ],
        );
        let Node::Expr(expr) = Node::from_ast(&ast).unwrap() else {
            panic!("expected expr")
        };
        assert_eq!(expr.args, [Node::Value(Value::from("abc"))]);
        assert_eq!(expr.kwargs["size"], Node::Value(Value::from(10)));
    }

    #[test]
    fn to_ast_round_trips() {
        let ast = Ast::new(
            "sort",
            vec![
                Ast::new("negative", vec![Ast::bind("name").into()]).into(),
                getattr(Ast::bind("country"), "code").into(),
            ],
        );
        let node = Node::from_ast(&ast).unwrap();
        assert_eq!(node.to_ast(), Arg::Ast(ast));
    }

    #[test]
    fn getattr_of_call_is_rejected() {
        let ast = getattr(Ast::new("f", vec![]), "b");
        let err = Node::from_ast(&ast).unwrap_err();
        assert!(err.is(ErrorCode::InvalidArgumentInExpression));
    }
}
