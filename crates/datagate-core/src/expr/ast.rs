use crate::stmt::Value;

/// A raw parse node: a function name and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Ast(Ast),
    Value(Value),
}

impl Ast {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Ast {
        Ast {
            name: name.into(),
            args,
        }
    }

    pub fn bind(name: impl Into<String>) -> Ast {
        Ast::new("bind", vec![Arg::Value(Value::String(name.into()))])
    }

    /// The bound name when this node is `bind(name)`.
    pub fn as_bind(&self) -> Option<&str> {
        match (self.name.as_str(), self.args.as_slice()) {
            ("bind", [Arg::Value(Value::String(name))]) => Some(name),
            _ => None,
        }
    }
}

impl From<Ast> for Arg {
    fn from(value: Ast) -> Self {
        Arg::Ast(value)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}
