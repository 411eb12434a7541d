use super::syntax_error;
use datagate_core::Result;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Ident(String),
    Integer(i64),
    Number(f64),
    String(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Amp,
    Pipe,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Minus,
    Plus,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,

    /// Byte offset of the first character
    pub(super) offset: usize,
}

pub(super) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(super) fn new(src: &'a str) -> Lexer<'a> {
        Lexer { src, pos: 0 }
    }

    pub(super) fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = vec![];
        loop {
            let token = self.next_token()?;
            let eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if eof {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn next_token(&mut self) -> Result<Token> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }

        let offset = self.pos;
        let Some(c) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '&' => TokenKind::Amp,
            '|' => TokenKind::Pipe,
            '=' => TokenKind::Eq,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Ne
            }
            '<' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Le
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Ge
            }
            '>' => TokenKind::Gt,
            '"' | '\'' => TokenKind::String(self.string(c, offset)?),
            c if c.is_ascii_digit() => self.number(offset)?,
            c if is_ident_start(c) => TokenKind::Ident(self.ident(offset)),
            c => return Err(syntax_error(offset, format!("unexpected character {c:?}"))),
        };

        Ok(Token { kind, offset })
    }

    fn ident(&mut self, start: usize) -> String {
        // `-` continues a name (`fault-tolerant`) only when a letter follows
        loop {
            match self.peek() {
                Some(c) if is_ident_continue(c) => {
                    self.bump();
                }
                Some('-') if self.peek_second().is_some_and(|c| c.is_ascii_alphabetic()) => {
                    self.bump();
                }
                _ => break,
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn number(&mut self, start: usize) -> Result<TokenKind> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }

        let mut float = false;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(syntax_error(self.pos, "expected exponent digits"));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }

        let text = &self.src[start..self.pos];
        if !float {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(TokenKind::Integer(value));
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|err| syntax_error(start, err))
    }

    fn string(&mut self, quote: char, start: usize) -> Result<String> {
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(syntax_error(start, "unterminated string"));
            };
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let escape_at = self.pos - 1;
                    let Some(escaped) = self.bump() else {
                        return Err(syntax_error(start, "unterminated string"));
                    };
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '"' | '\'' | '/' => out.push(escaped),
                        'u' => out.push(self.unicode_escape(escape_at)?),
                        other => {
                            return Err(syntax_error(
                                escape_at,
                                format!("unknown escape sequence \\{other}"),
                            ))
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self, escape_at: usize) -> Result<char> {
        let end = self.pos + 4;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| syntax_error(escape_at, "truncated \\u escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| syntax_error(escape_at, format!("invalid \\u escape {hex:?}")))?;
        self.pos = end;
        Ok(code)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '@'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '@'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            kinds("a>=1.5&b!='x'"),
            [
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Number(1.5),
                TokenKind::Amp,
                TokenKind::Ident("b".into()),
                TokenKind::Ne,
                TokenKind::String("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dashed_names() {
        assert_eq!(
            kinds("fault-tolerant()"),
            [
                TokenKind::Ident("fault-tolerant".into()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
        // a dash before a digit is a minus
        assert_eq!(
            kinds("a-1"),
            [
                TokenKind::Ident("a".into()),
                TokenKind::Minus,
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"bA\n""#),
            [TokenKind::String("a\"bA\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn errors_carry_offsets() {
        let err = Lexer::new("name = \"open").tokenize().unwrap_err();
        assert_eq!(err.context_map().unwrap()["offset"], "7");

        let err = Lexer::new("a # b").tokenize().unwrap_err();
        assert_eq!(err.context_map().unwrap()["offset"], "2");
    }
}
