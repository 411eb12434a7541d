use super::{syntax_error, Lexer, Token, TokenKind};
use datagate_core::{
    expr::{Arg, Ast},
    stmt::Value,
    Result,
};

/// Parses a single RQL expression, e.g. a `_where` filter.
pub fn parse_expr(src: &str) -> Result<Ast> {
    let mut parser = Parser::new(src)?;
    let arg = parser.expr()?;
    parser.expect_eof()?;
    into_ast(arg, 0)
}

/// Parses a query string into its top-level expressions. A top-level
/// conjunction is split into its operands.
pub(super) fn parse_query(src: &str, nodes: &mut Vec<Ast>) -> Result<()> {
    let mut parser = Parser::new(src)?;
    parser.skip_amps();
    if parser.at(&TokenKind::Eof) {
        return Ok(());
    }

    let offset = parser.offset();
    let arg = parser.expr()?;
    parser.expect_eof()?;

    match into_ast(arg, offset)? {
        ast if ast.name == "and" => {
            for arg in ast.args {
                nodes.push(into_ast(arg, offset)?);
            }
        }
        ast => nodes.push(ast),
    }
    Ok(())
}

fn into_ast(arg: Arg, offset: usize) -> Result<Ast> {
    match arg {
        Arg::Ast(ast) => Ok(ast),
        Arg::Value(value) => Err(syntax_error(
            offset,
            format!("expected an expression, found the literal {value}"),
        )),
    }
}

/// Recursive descent over the token list.
///
/// Precedence from loosest to tightest: `|`, `&`, comparisons, unary `-`/`+`,
/// attribute access.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Parser> {
        Ok(Parser {
            tokens: Lexer::new(src).tokenize()?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, ahead: usize) -> &TokenKind {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn offset(&self) -> usize {
        self.peek().offset
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        self.skip_amps();
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn skip_amps(&mut self) {
        while self.eat(&TokenKind::Amp) {}
    }

    fn unexpected(&self, expected: &str) -> datagate_core::Error {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Eof => "end of input".to_string(),
            kind => format!("{kind:?}"),
        };
        syntax_error(token.offset, format!("expected {expected}, found {found}"))
    }

    fn expr(&mut self) -> Result<Arg> {
        self.or()
    }

    fn or(&mut self) -> Result<Arg> {
        let first = self.and()?;
        if !self.at(&TokenKind::Pipe) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::Pipe) {
            operands.push(self.and()?);
        }
        Ok(Ast::new("or", operands).into())
    }

    fn and(&mut self) -> Result<Arg> {
        let first = self.comparison()?;
        let mut operands = vec![first];
        while self.at(&TokenKind::Amp) {
            self.skip_amps();
            // tolerate a trailing `&`
            if matches!(self.peek().kind, TokenKind::Eof | TokenKind::RParen) {
                break;
            }
            operands.push(self.comparison()?);
        }
        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }
        Ok(Ast::new("and", operands).into())
    }

    fn comparison(&mut self) -> Result<Arg> {
        let lhs = self.unary()?;
        let name = match self.peek().kind {
            TokenKind::Eq => "eq",
            TokenKind::Ne => "ne",
            TokenKind::Lt => "lt",
            TokenKind::Le => "le",
            TokenKind::Gt => "gt",
            TokenKind::Ge => "ge",
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.unary()?;
        Ok(Ast::new(name, vec![lhs, rhs]).into())
    }

    fn unary(&mut self) -> Result<Arg> {
        if self.eat(&TokenKind::Minus) {
            return Ok(match self.unary()? {
                Arg::Value(Value::Integer(value)) => Arg::Value(Value::Integer(-value)),
                Arg::Value(Value::Number(value)) => Arg::Value(Value::Number(-value)),
                operand => Ast::new("negative", vec![operand]).into(),
            });
        }
        if self.eat(&TokenKind::Plus) {
            let operand = self.unary()?;
            return Ok(Ast::new("positive", vec![operand]).into());
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Arg> {
        let mut node = self.primary()?;
        while self.at(&TokenKind::Dot) {
            let dot = self.bump();
            let Arg::Ast(obj) = node else {
                return Err(syntax_error(dot.offset, "attribute access on a literal"));
            };
            let name = match self.bump().kind {
                TokenKind::Ident(name) => name,
                _ => return Err(syntax_error(dot.offset + 1, "expected a name after '.'")),
            };
            node = Ast::new("getattr", vec![obj.into(), Ast::bind(name).into()]).into();
        }
        Ok(node)
    }

    fn primary(&mut self) -> Result<Arg> {
        let starts_primary = matches!(
            self.peek().kind,
            TokenKind::Integer(_)
                | TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Ident(_)
                | TokenKind::LBracket
                | TokenKind::LParen
        );
        if !starts_primary {
            return Err(self.unexpected("an expression"));
        }

        match self.bump().kind {
            TokenKind::Integer(value) => Ok(Arg::Value(Value::Integer(value))),
            TokenKind::Number(value) => Ok(Arg::Value(Value::Number(value))),
            TokenKind::String(value) => Ok(Arg::Value(Value::String(value))),
            TokenKind::Ident(name) => match name.as_str() {
                "null" => Ok(Arg::Value(Value::Null)),
                "true" => Ok(Arg::Value(Value::Bool(true))),
                "false" => Ok(Arg::Value(Value::Bool(false))),
                _ if self.eat(&TokenKind::LParen) => {
                    let args = self.args(TokenKind::RParen, ")")?;
                    Ok(Ast::new(name, args).into())
                }
                _ => Ok(Ast::bind(name).into()),
            },
            TokenKind::LBracket => {
                let items = self.args(TokenKind::RBracket, "]")?;
                Ok(Ast::new("list", items).into())
            }
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Ast::new("group", vec![inner]).into())
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Comma separated arguments up to `close`; `name: value` is a keyword
    /// argument. A trailing comma is allowed.
    fn args(&mut self, close: TokenKind, what: &str) -> Result<Vec<Arg>> {
        let mut args = vec![];
        loop {
            if self.eat(&close) {
                return Ok(args);
            }
            args.push(self.arg()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close, &format!("',' or '{what}'"))?;
                return Ok(args);
            }
        }
    }

    fn arg(&mut self) -> Result<Arg> {
        if let (TokenKind::Ident(key), TokenKind::Colon) = (&self.peek().kind, self.peek_kind_at(1)) {
            let key = key.clone();
            self.bump();
            self.bump();
            let value = self.expr()?;
            return Ok(Ast::new("pair", vec![Ast::bind(key).into(), value]).into());
        }
        self.expr()
    }
}
