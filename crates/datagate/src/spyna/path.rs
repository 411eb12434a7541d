use super::parser::parse_query;
use datagate_core::{
    expr::{Arg, Ast},
    stmt::Value,
    Result,
};

use percent_encoding::percent_decode_str;

/// Parses a request path and its query string.
///
/// The path segments become the arguments of a leading `path(...)` node. A
/// segment starting with `:` opens a new node named after it, taking the
/// following segments as arguments: `/City/:changes/5` is
/// `path("City"), changes(5)`. Path segments are percent-decoded; the query
/// is expected to be decoded already.
pub fn parse(path: &str, query: &str) -> Result<Vec<Ast>> {
    let mut nodes = vec![Ast::new("path", vec![])];

    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        let segment = percent_decode_str(segment).decode_utf8_lossy();
        match segment.strip_prefix(':') {
            Some(op) => nodes.push(Ast::new(op, vec![])),
            None => {
                if let Some(last) = nodes.last_mut() {
                    last.args.push(segment_arg(&segment, last.name == "path"));
                }
            }
        }
    }

    parse_query(query, &mut nodes)?;
    Ok(nodes)
}

/// Path segments stay strings; operator arguments that look like integers
/// become integers.
fn segment_arg(segment: &str, in_path: bool) -> Arg {
    if !in_path {
        if let Ok(value) = segment.parse::<i64>() {
            return Arg::Value(Value::Integer(value));
        }
    }
    Arg::Value(Value::String(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn string(value: &str) -> Arg {
        Arg::Value(Value::from(value))
    }

    #[test]
    fn empty_request_is_an_empty_path() {
        assert_eq!(parse("", "").unwrap(), [Ast::new("path", vec![])]);
        assert_eq!(parse("/", "").unwrap(), [Ast::new("path", vec![])]);
    }

    #[test]
    fn path_segments_and_ops() {
        assert_eq!(
            parse("/datasets/gov/City/:changes/-10/:format/csv", "").unwrap(),
            [
                Ast::new(
                    "path",
                    vec![string("datasets"), string("gov"), string("City")]
                ),
                Ast::new("changes", vec![Arg::Value(Value::Integer(-10))]),
                Ast::new("format", vec![string("csv")]),
            ]
        );
    }

    #[test]
    fn segments_are_decoded_and_kept_as_strings() {
        assert_eq!(
            parse("/City/123/country%3Aref", "").unwrap(),
            [Ast::new(
                "path",
                vec![string("City"), string("123"), string("country:ref")]
            )]
        );
    }

    #[test]
    fn query_follows_path() {
        let nodes = parse("/City", "select(name)&sort(-name)").unwrap();
        let names: Vec<_> = nodes.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, ["path", "select", "sort"]);
    }
}
