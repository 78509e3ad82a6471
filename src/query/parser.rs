use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::core::error::{Error, Result};
use crate::query::ast::{Literal, Node};

/// Compiles query text into a predicate AST.
///
/// Examples:
/// - `energy` -> existence test
/// - `not energy` -> absent-field test
/// - `energy > 1.5` -> comparison
/// - `formula ~= /H2O/` -> regex match
/// - `n_atoms in [2, 4, 8]` -> membership
/// - `energy > 0 and (pbc = true or n_atoms < 10)` -> boolean combination
///
/// Compilation is pure: the same text always yields a structurally equal AST.
pub fn compile(text: &str) -> Result<Node> {
    let tokens = Lexer::new(text).tokenize()?;
    Parser::new(tokens).parse()
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    Regex(String),
    True,
    False,
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Match,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while self.pos < self.bytes.len() {
            let start = self.pos;
            let c = self.bytes[self.pos];
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                    continue;
                }
                b'(' => self.push_symbol(&mut tokens, TokenKind::LParen),
                b')' => self.push_symbol(&mut tokens, TokenKind::RParen),
                b'[' => self.push_symbol(&mut tokens, TokenKind::LBracket),
                b']' => self.push_symbol(&mut tokens, TokenKind::RBracket),
                b',' => self.push_symbol(&mut tokens, TokenKind::Comma),
                b'&' => self.push_symbol(&mut tokens, TokenKind::And),
                b'|' => self.push_symbol(&mut tokens, TokenKind::Or),
                b'=' => self.push_symbol(&mut tokens, TokenKind::Eq),
                b'!' => {
                    if self.peek(1) == Some(b'=') {
                        self.pos += 2;
                        tokens.push(Token {
                            kind: TokenKind::Ne,
                            position: start,
                        });
                    } else {
                        self.push_symbol(&mut tokens, TokenKind::Not);
                    }
                }
                b'>' => {
                    let kind = if self.peek(1) == Some(b'=') {
                        self.pos += 1;
                        TokenKind::Gte
                    } else {
                        TokenKind::Gt
                    };
                    self.push_symbol(&mut tokens, kind);
                }
                b'<' => {
                    let kind = if self.peek(1) == Some(b'=') {
                        self.pos += 1;
                        TokenKind::Lte
                    } else {
                        TokenKind::Lt
                    };
                    self.push_symbol(&mut tokens, kind);
                }
                b'~' => {
                    if self.peek(1) == Some(b'=') {
                        self.pos += 2;
                        tokens.push(Token {
                            kind: TokenKind::Match,
                            position: start,
                        });
                    } else {
                        return Err(Error::syntax(start, "expected '~='"));
                    }
                }
                b'"' => tokens.push(self.lex_string()?),
                b'/' => tokens.push(self.lex_regex()?),
                b'+' | b'-' => tokens.push(self.lex_number()?),
                b'0'..=b'9' => {
                    if let Some(token) = self.try_lex_date()? {
                        tokens.push(token);
                    } else {
                        tokens.push(self.lex_number()?);
                    }
                }
                c if c.is_ascii_alphabetic() || c == b'_' => tokens.push(self.lex_word()),
                other => {
                    return Err(Error::syntax(
                        start,
                        format!("unexpected character '{}'", other as char),
                    ));
                }
            }
        }
        Ok(tokens)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn push_symbol(&mut self, tokens: &mut Vec<Token>, kind: TokenKind) {
        tokens.push(Token {
            kind,
            position: self.pos,
        });
        self.pos += 1;
    }

    fn lex_word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        let word = &self.input[start..self.pos];
        let kind = match word {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "true" | "True" => TokenKind::True,
            "false" | "False" => TokenKind::False,
            _ => TokenKind::Name(word.to_string()),
        };
        Token {
            kind,
            position: start,
        }
    }

    fn lex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut out = String::new();
        while let Some(c) = self.peek(0) {
            match c {
                b'"' => {
                    self.pos += 1;
                    return Ok(Token {
                        kind: TokenKind::Str(out),
                        position: start,
                    });
                }
                b'\\' if self.peek(1) == Some(b'"') => {
                    out.push('"');
                    self.pos += 2;
                }
                _ => {
                    let rest = &self.input[self.pos..];
                    let ch = rest.chars().next().unwrap_or('\u{fffd}');
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
        Err(Error::syntax(start, "unterminated string literal"))
    }

    fn lex_regex(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1; // opening slash
        let mut out = String::new();
        while let Some(c) = self.peek(0) {
            match c {
                b'/' => {
                    self.pos += 1;
                    return Ok(Token {
                        kind: TokenKind::Regex(out),
                        position: start,
                    });
                }
                b'\\' if self.peek(1) == Some(b'/') => {
                    out.push('/');
                    self.pos += 2;
                }
                _ => {
                    let rest = &self.input[self.pos..];
                    let ch = rest.chars().next().unwrap_or('\u{fffd}');
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
        Err(Error::syntax(start, "unterminated regex literal"))
    }

    /// Date literals: `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS` with optional `Z`.
    fn try_lex_date(&mut self) -> Result<Option<Token>> {
        let start = self.pos;
        let rest = &self.bytes[self.pos..];
        let is_digit = |b: &u8| b.is_ascii_digit();
        if rest.len() < 10
            || !rest[..4].iter().all(is_digit)
            || rest[4] != b'-'
            || !rest[5..7].iter().all(is_digit)
            || rest[7] != b'-'
            || !rest[8..10].iter().all(is_digit)
        {
            return Ok(None);
        }

        let mut end = 10;
        if rest.len() >= 19 && rest[10] == b'T' {
            let time = &rest[11..19];
            if time[..2].iter().all(is_digit)
                && time[2] == b':'
                && time[3..5].iter().all(is_digit)
                && time[5] == b':'
                && time[6..8].iter().all(is_digit)
            {
                end = 19;
                if rest.get(19) == Some(&b'Z') {
                    end = 20;
                }
            }
        }

        let text = &self.input[start..start + end];
        let date = parse_date_literal(text)
            .ok_or_else(|| Error::syntax(start, format!("invalid date literal '{text}'")))?;
        self.pos += end;
        Ok(Some(Token {
            kind: TokenKind::Date(date),
            position: start,
        }))
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if matches!(self.peek(0), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let digits_start = self.pos;
        let mut is_float = false;
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return Err(Error::syntax(start, "expected digits"));
        }
        if self.peek(0) == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(0), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            let exp_start = self.pos;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == exp_start {
                return Err(Error::syntax(start, "malformed exponent"));
            }
        }

        let text = &self.input[start..self.pos];
        let kind = if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| Error::syntax(start, format!("invalid number '{text}'")))?;
            TokenKind::Float(value)
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| Error::syntax(start, format!("invalid number '{text}'")))?;
            TokenKind::Int(value)
        };
        Ok(Token {
            kind,
            position: start,
        })
    }
}

fn parse_date_literal(text: &str) -> Option<DateTime<Utc>> {
    if text.len() == 10 {
        let date = text.parse::<NaiveDate>().ok()?;
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    let trimmed = text.strip_suffix('Z').unwrap_or(text);
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").ok()?;
    Some(naive.and_utc())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        let len = tokens.len();
        Parser {
            tokens,
            pos: 0,
            len,
        }
    }

    fn parse(mut self) -> Result<Node> {
        if self.tokens.is_empty() {
            return Err(Error::syntax(0, "empty query"));
        }
        let node = self.or_expr()?;
        if let Some(token) = self.tokens.get(self.pos) {
            return Err(Error::syntax(
                token.position,
                format!("unexpected trailing input: {:?}", token.kind),
            ));
        }
        Ok(node)
    }

    fn end_position(&self) -> usize {
        self.tokens.last().map(|t| t.position).unwrap_or(0)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token> {
        if self.pos >= self.len {
            return Err(Error::syntax(
                self.end_position(),
                format!("expected {what}, found end of input"),
            ));
        }
        let token = self.advance();
        if &token.kind == kind {
            Ok(token)
        } else {
            Err(Error::syntax(
                token.position,
                format!("expected {what}, found {:?}", token.kind),
            ))
        }
    }

    fn or_expr(&mut self) -> Result<Node> {
        let mut children = vec![self.and_expr()?];
        while matches!(self.peek_kind(), Some(TokenKind::Or)) {
            self.advance();
            children.push(self.and_expr()?);
        }
        Ok(if children.len() == 1 {
            children.pop().unwrap()
        } else {
            Node::Or(children)
        })
    }

    fn and_expr(&mut self) -> Result<Node> {
        let mut children = vec![self.unary()?];
        while matches!(self.peek_kind(), Some(TokenKind::And)) {
            self.advance();
            children.push(self.unary()?);
        }
        Ok(if children.len() == 1 {
            children.pop().unwrap()
        } else {
            Node::And(children)
        })
    }

    fn unary(&mut self) -> Result<Node> {
        if matches!(self.peek_kind(), Some(TokenKind::Not)) {
            self.advance();
            return Ok(Node::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        if self.pos >= self.len {
            return Err(Error::syntax(
                self.end_position(),
                "expected field name or '(', found end of input",
            ));
        }
        let token = self.advance();
        match token.kind {
            TokenKind::LParen => {
                let node = self.or_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(node)
            }
            TokenKind::Name(field) => self.tail(field),
            other => Err(Error::syntax(
                token.position,
                format!("expected field name or '(', found {other:?}"),
            )),
        }
    }

    /// Everything a bare field name may be followed by; a lone name is an
    /// existence test.
    fn tail(&mut self, field: String) -> Result<Node> {
        let op = match self.peek_kind() {
            Some(TokenKind::Eq) => TokenKind::Eq,
            Some(TokenKind::Ne) => TokenKind::Ne,
            Some(TokenKind::Gt) => TokenKind::Gt,
            Some(TokenKind::Gte) => TokenKind::Gte,
            Some(TokenKind::Lt) => TokenKind::Lt,
            Some(TokenKind::Lte) => TokenKind::Lte,
            Some(TokenKind::Match) => TokenKind::Match,
            Some(TokenKind::In) => TokenKind::In,
            _ => return Ok(Node::Name(field)),
        };
        self.advance();

        match op {
            TokenKind::Match => {
                if self.pos >= self.len {
                    return Err(Error::syntax(
                        self.end_position(),
                        "expected regex literal, found end of input",
                    ));
                }
                let token = self.advance();
                match token.kind {
                    TokenKind::Regex(pattern) => Ok(Node::Regex(field, pattern)),
                    other => Err(Error::syntax(
                        token.position,
                        format!("expected regex literal, found {other:?}"),
                    )),
                }
            }
            TokenKind::In => {
                self.expect(&TokenKind::LBracket, "'['")?;
                let mut values = vec![self.literal()?];
                loop {
                    match self.peek_kind() {
                        Some(TokenKind::RBracket) => {
                            self.advance();
                            break;
                        }
                        Some(TokenKind::Comma) => {
                            self.advance();
                            values.push(self.literal()?);
                        }
                        // Comma separators are optional, matching the
                        // whitespace-separated list form of legacy queries.
                        Some(_) => values.push(self.literal()?),
                        None => {
                            return Err(Error::syntax(
                                self.end_position(),
                                "expected ']', found end of input",
                            ));
                        }
                    }
                }
                Ok(Node::In(field, values))
            }
            TokenKind::Eq => Ok(Node::Eq(field, self.literal()?)),
            TokenKind::Ne => Ok(Node::Ne(field, self.literal()?)),
            TokenKind::Gt => Ok(Node::Gt(field, self.literal()?)),
            TokenKind::Gte => Ok(Node::Gte(field, self.literal()?)),
            TokenKind::Lt => Ok(Node::Lt(field, self.literal()?)),
            TokenKind::Lte => Ok(Node::Lte(field, self.literal()?)),
            _ => unreachable!(),
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        if self.pos >= self.len {
            return Err(Error::syntax(
                self.end_position(),
                "expected literal value, found end of input",
            ));
        }
        let token = self.advance();
        match token.kind {
            TokenKind::Int(i) => Ok(Literal::Int(i)),
            TokenKind::Float(f) => Ok(Literal::Float(f)),
            TokenKind::Str(s) => Ok(Literal::Str(s)),
            TokenKind::Date(d) => Ok(Literal::Date(d)),
            TokenKind::True => Ok(Literal::Bool(true)),
            TokenKind::False => Ok(Literal::Bool(false)),
            other => Err(Error::syntax(
                token.position,
                format!("expected literal value, found {other:?}"),
            )),
        }
    }
}
