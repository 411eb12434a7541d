use datagate_core::{
    expr::{Arg, Ast},
    stmt::Value,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt::Write;

/// Renders a node back into normalized RQL.
///
/// Infix operators are rendered as calls (`a=1` becomes `eq(a, 1)`), so the
/// output parses back to the same tree.
pub fn unparse(ast: &Ast) -> String {
    let mut out = String::new();
    write_ast(&mut out, ast);
    out
}

pub fn unparse_arg(arg: &Arg) -> String {
    let mut out = String::new();
    write_arg(&mut out, arg);
    out
}

/// Renders top-level query expressions joined with `&`.
pub fn unparse_query(nodes: &[Ast]) -> String {
    nodes.iter().map(unparse).collect::<Vec<_>>().join("&")
}

fn write_arg(out: &mut String, arg: &Arg) {
    match arg {
        Arg::Ast(ast) => write_ast(out, ast),
        Arg::Value(value) => write_value(out, value),
    }
}

fn write_ast(out: &mut String, ast: &Ast) {
    if let Some(name) = ast.as_bind() {
        out.push_str(name);
        return;
    }

    match (ast.name.as_str(), ast.args.as_slice()) {
        ("getattr", [obj, name]) => {
            write_arg(out, obj);
            out.push('.');
            write_arg(out, name);
        }
        ("negative", [operand]) => {
            out.push('-');
            write_arg(out, operand);
        }
        ("positive", [operand]) => {
            out.push('+');
            write_arg(out, operand);
        }
        ("pair", [key, value]) => {
            write_arg(out, key);
            out.push_str(": ");
            write_arg(out, value);
        }
        (name, args) => {
            out.push_str(name);
            out.push('(');
            for (index, arg) in args.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_arg(out, arg);
            }
            out.push(')');
        }
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Value::Integer(value) => {
            let _ = write!(out, "{value}");
        }
        Value::Number(value) if value.is_finite() => {
            let _ = write!(out, "{value:?}");
        }
        Value::Number(_) => out.push_str("null"),
        Value::String(value) => write_string(out, value),
        Value::Bytes(value) => write_string(out, &BASE64.encode(value)),
        Value::List(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push_str("object(");
            for (index, (key, value)) in fields.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(key);
                out.push_str(": ");
                write_value(out, value);
            }
            out.push(')');
        }
    }
}

fn write_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
