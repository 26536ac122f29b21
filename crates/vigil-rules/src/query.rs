//! Structured-query dialect.
//!
//! A pure subset of JMESPath: field access, sub-expressions, indices,
//! `[*]`/`*`/`[]` projections, `[?cond]` filters, `@`, literals, comparisons,
//! boolean operators, pipes and a handful of functions. Missing fields
//! evaluate to `null`. Bare `true`, `false` and `null` are literals; quote
//! them (`"true"`) to address a field of that name.

use crate::error::{Result, RuleError};
use crate::value::{is_query_truthy, json_eq, resolve_index, type_name};
use serde_json::Value;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    QuotedIdentifier(String),
    Literal(Value),
    Number(i64),
    Dot,
    Star,
    At,
    Comma,
    Pipe,
    Or,
    And,
    Not,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Filter,
    Flatten,
    Cmp(CmpOp),
    Eof,
}

impl Token {
    fn binding_power(&self) -> u8 {
        match self {
            Self::Pipe => 1,
            Self::Or => 2,
            Self::And => 3,
            Self::Cmp(_) => 5,
            Self::Flatten => 9,
            Self::Star => 20,
            Self::Filter => 21,
            Self::Dot => 40,
            Self::Not => 45,
            Self::LBracket => 55,
            Self::LParen => 60,
            _ => 0,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Identifier(name) | Self::QuotedIdentifier(name) => format!("identifier '{name}'"),
            Self::Literal(v) => format!("literal {v}"),
            Self::Number(n) => format!("number {n}"),
            Self::Eof => "end of query".to_string(),
            other => format!("{other:?}"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

fn delimited(chars: &[char], open: usize, delim: char) -> Result<(String, usize)> {
    let mut content = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                content.push('\\');
                content.push(chars[i + 1]);
                i += 2;
            }
            c if c == delim => return Ok((content, i + 1)),
            c => {
                content.push(c);
                i += 1;
            }
        }
    }
    Err(RuleError::syntax(open, format!("unterminated {delim}")))
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        let next = chars.get(i + 1).copied();
        let token = match chars[i] {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((Token::Identifier(chars[start..i].iter().collect()), start));
                continue;
            }
            c if c == '-' || c.is_ascii_digit() => {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| RuleError::syntax(start, format!("invalid number '{text}'")))?;
                tokens.push((Token::Number(n), start));
                continue;
            }
            '"' => {
                let (raw, end) = delimited(&chars, i, '"')?;
                i = end;
                let name: String = serde_json::from_str(&format!("\"{raw}\""))
                    .map_err(|e| RuleError::syntax(start, format!("bad quoted identifier: {e}")))?;
                tokens.push((Token::QuotedIdentifier(name), start));
                continue;
            }
            '\'' => {
                let (raw, end) = delimited(&chars, i, '\'')?;
                i = end;
                tokens.push((Token::Literal(Value::String(raw.replace("\\'", "'"))), start));
                continue;
            }
            '`' => {
                let (raw, end) = delimited(&chars, i, '`')?;
                i = end;
                let value: Value = serde_json::from_str(raw.replace("\\`", "`").trim())
                    .map_err(|e| RuleError::syntax(start, format!("bad JSON literal: {e}")))?;
                tokens.push((Token::Literal(value), start));
                continue;
            }
            '.' => Token::Dot,
            '*' => Token::Star,
            '@' => Token::At,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ']' => Token::RBracket,
            '[' => match next {
                Some('?') => {
                    i += 1;
                    Token::Filter
                }
                Some(']') => {
                    i += 1;
                    Token::Flatten
                }
                _ => Token::LBracket,
            },
            '|' if next == Some('|') => {
                i += 1;
                Token::Or
            }
            '|' => Token::Pipe,
            '&' if next == Some('&') => {
                i += 1;
                Token::And
            }
            '!' if next == Some('=') => {
                i += 1;
                Token::Cmp(CmpOp::Ne)
            }
            '!' => Token::Not,
            '=' if next == Some('=') => {
                i += 1;
                Token::Cmp(CmpOp::Eq)
            }
            '<' if next == Some('=') => {
                i += 1;
                Token::Cmp(CmpOp::Le)
            }
            '<' => Token::Cmp(CmpOp::Lt),
            '>' if next == Some('=') => {
                i += 1;
                Token::Cmp(CmpOp::Ge)
            }
            '>' => Token::Cmp(CmpOp::Gt),
            other => {
                return Err(RuleError::syntax(
                    start,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        i += 1;
        tokens.push((token, start));
    }

    tokens.push((Token::Eof, chars.len()));
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Length,
    Contains,
    StartsWith,
    EndsWith,
    Keys,
    ToNumber,
}

impl Function {
    fn lookup(name: &str) -> Option<(Self, usize)> {
        Some(match name {
            "length" => (Self::Length, 1),
            "contains" => (Self::Contains, 2),
            "starts_with" => (Self::StartsWith, 2),
            "ends_with" => (Self::EndsWith, 2),
            "keys" => (Self::Keys, 1),
            "to_number" => (Self::ToNumber, 1),
            _ => return None,
        })
    }

    fn call(self, args: &[Value]) -> Result<Value> {
        match (self, args) {
            (Self::Length, [Value::String(s)]) => Ok(Value::from(s.chars().count())),
            (Self::Length, [Value::Array(a)]) => Ok(Value::from(a.len())),
            (Self::Length, [Value::Object(o)]) => Ok(Value::from(o.len())),
            (Self::Contains, [Value::Array(items), search]) => {
                Ok(Value::Bool(items.iter().any(|item| json_eq(item, search))))
            }
            (Self::Contains, [Value::String(s), Value::String(search)]) => {
                Ok(Value::Bool(s.contains(search.as_str())))
            }
            (Self::StartsWith, [Value::String(s), Value::String(prefix)]) => {
                Ok(Value::Bool(s.starts_with(prefix.as_str())))
            }
            (Self::EndsWith, [Value::String(s), Value::String(suffix)]) => {
                Ok(Value::Bool(s.ends_with(suffix.as_str())))
            }
            (Self::Keys, [Value::Object(o)]) => {
                Ok(Value::Array(o.keys().cloned().map(Value::String).collect()))
            }
            (Self::ToNumber, [Value::Number(n)]) => Ok(Value::Number(n.clone())),
            (Self::ToNumber, [Value::String(s)]) => Ok(s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| s.trim().parse::<f64>().map(Value::from))
                .unwrap_or(Value::Null)),
            (Self::ToNumber, [_]) => Ok(Value::Null),
            (f, args) => Err(RuleError::eval(format!(
                "invalid argument types for {f:?}: ({})",
                args.iter().map(type_name).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Current,
    Field(String),
    Literal(Value),
    Subexpr(Box<Node>, Box<Node>),
    Pipe(Box<Node>, Box<Node>),
    Index(Box<Node>, i64),
    Projection(Box<Node>, Box<Node>),
    ObjectProjection(Box<Node>, Box<Node>),
    Flatten(Box<Node>),
    Filter {
        base: Box<Node>,
        cond: Box<Node>,
        then: Box<Node>,
    },
    Compare(CmpOp, Box<Node>, Box<Node>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn advance(&mut self) -> (Token, usize) {
        let idx = self.pos.min(self.tokens.len() - 1);
        self.pos += 1;
        self.tokens[idx].clone()
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        let (token, offset) = self.advance();
        if &token == expected {
            Ok(())
        } else {
            Err(RuleError::syntax(
                offset,
                format!("expected {}, found {}", expected.describe(), token.describe()),
            ))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RuleError::syntax(self.offset(), "query nested too deeply"));
        }
        Ok(())
    }

    fn expression(&mut self, rbp: u8) -> Result<Node> {
        self.enter()?;
        let (token, offset) = self.advance();
        let left = self.nud(token, offset)?;
        let node = self.continue_expression(left, rbp)?;
        self.depth -= 1;
        Ok(node)
    }

    fn continue_expression(&mut self, mut left: Node, rbp: u8) -> Result<Node> {
        let mut nested = 0;
        while rbp < self.peek().binding_power() {
            self.enter()?;
            nested += 1;
            let (token, offset) = self.advance();
            left = self.led(token, offset, left)?;
        }
        self.depth -= nested;
        Ok(left)
    }

    fn nud(&mut self, token: Token, offset: usize) -> Result<Node> {
        match token {
            Token::Identifier(name) => Ok(match name.as_str() {
                "true" => Node::Literal(Value::Bool(true)),
                "false" => Node::Literal(Value::Bool(false)),
                "null" => Node::Literal(Value::Null),
                _ => Node::Field(name),
            }),
            Token::QuotedIdentifier(name) => Ok(Node::Field(name)),
            Token::Literal(value) => Ok(Node::Literal(value)),
            Token::Number(n) => Ok(Node::Literal(Value::from(n))),
            Token::At => Ok(Node::Current),
            Token::Star => {
                let rhs = self.projection_rhs(Token::Star.binding_power())?;
                Ok(Node::ObjectProjection(Box::new(Node::Current), Box::new(rhs)))
            }
            Token::Not => Ok(Node::Not(Box::new(
                self.expression(Token::Not.binding_power())?,
            ))),
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Filter => self.filter(Node::Current),
            Token::Flatten => {
                let rhs = self.projection_rhs(Token::Flatten.binding_power())?;
                Ok(Node::Projection(
                    Box::new(Node::Flatten(Box::new(Node::Current))),
                    Box::new(rhs),
                ))
            }
            Token::LBracket => self.bracket(Node::Current),
            other => Err(RuleError::syntax(
                offset,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn led(&mut self, token: Token, offset: usize, left: Node) -> Result<Node> {
        let bp = token.binding_power();
        match token {
            Token::Dot => {
                let rhs = self.dot_rhs(bp)?;
                Ok(Node::Subexpr(Box::new(left), Box::new(rhs)))
            }
            Token::Pipe => Ok(Node::Pipe(Box::new(left), Box::new(self.expression(bp)?))),
            Token::Or => Ok(Node::Or(Box::new(left), Box::new(self.expression(bp)?))),
            Token::And => Ok(Node::And(Box::new(left), Box::new(self.expression(bp)?))),
            Token::Cmp(op) => Ok(Node::Compare(
                op,
                Box::new(left),
                Box::new(self.expression(bp)?),
            )),
            Token::LParen => self.call(left, offset),
            Token::Filter => self.filter(left),
            Token::Flatten => {
                let rhs = self.projection_rhs(bp)?;
                Ok(Node::Projection(
                    Box::new(Node::Flatten(Box::new(left))),
                    Box::new(rhs),
                ))
            }
            Token::LBracket => self.bracket(left),
            other => Err(RuleError::syntax(
                offset,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn call(&mut self, callee: Node, offset: usize) -> Result<Node> {
        let Node::Field(name) = callee else {
            return Err(RuleError::syntax(offset, "only named functions can be called"));
        };
        let (function, arity) = Function::lookup(&name)
            .ok_or_else(|| RuleError::syntax(offset, format!("unknown function '{name}'")))?;

        let mut args = Vec::new();
        if self.peek() != &Token::RParen {
            loop {
                args.push(self.expression(0)?);
                if self.peek() == &Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;

        if args.len() != arity {
            return Err(RuleError::syntax(
                offset,
                format!("{name}() takes {arity} argument(s), got {}", args.len()),
            ));
        }
        Ok(Node::Call(function, args))
    }

    fn bracket(&mut self, left: Node) -> Result<Node> {
        match self.advance() {
            (Token::Number(n), _) => {
                self.expect(&Token::RBracket)?;
                Ok(Node::Index(Box::new(left), n))
            }
            (Token::Star, _) => {
                self.expect(&Token::RBracket)?;
                let rhs = self.projection_rhs(Token::Star.binding_power())?;
                Ok(Node::Projection(Box::new(left), Box::new(rhs)))
            }
            (token, offset) => Err(RuleError::syntax(
                offset,
                format!("expected an index or '*', found {}", token.describe()),
            )),
        }
    }

    fn filter(&mut self, base: Node) -> Result<Node> {
        let cond = self.expression(0)?;
        self.expect(&Token::RBracket)?;
        let then = self.projection_rhs(Token::Filter.binding_power())?;
        Ok(Node::Filter {
            base: Box::new(base),
            cond: Box::new(cond),
            then: Box::new(then),
        })
    }

    fn projection_rhs(&mut self, rbp: u8) -> Result<Node> {
        if self.peek().binding_power() < 10 {
            return Ok(Node::Current);
        }
        match self.peek() {
            Token::LBracket | Token::Filter => self.expression(rbp),
            Token::Dot => {
                self.advance();
                self.dot_rhs(rbp)
            }
            other => Err(RuleError::syntax(
                self.offset(),
                format!("unexpected {} after projection", other.describe()),
            )),
        }
    }

    fn dot_rhs(&mut self, rbp: u8) -> Result<Node> {
        match self.peek().clone() {
            Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                self.advance();
                self.continue_expression(Node::Field(name), rbp)
            }
            Token::Star => self.expression(rbp),
            other => Err(RuleError::syntax(
                self.offset(),
                format!("expected a field name after '.', found {}", other.describe()),
            )),
        }
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Value {
    match op {
        CmpOp::Eq => Value::Bool(json_eq(a, b)),
        CmpOp::Ne => Value::Bool(!json_eq(a, b)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) if a.is_number() && b.is_number() => Value::Bool(match op {
                CmpOp::Lt => x < y,
                CmpOp::Le => x <= y,
                CmpOp::Gt => x > y,
                _ => x >= y,
            }),
            _ => Value::Null,
        },
    }
}

fn project(items: &[Value], rhs: &Node) -> Result<Value> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let value = eval(rhs, item)?;
        if !value.is_null() {
            out.push(value);
        }
    }
    Ok(Value::Array(out))
}

fn eval(node: &Node, current: &Value) -> Result<Value> {
    match node {
        Node::Current => Ok(current.clone()),
        Node::Field(name) => Ok(current.get(name.as_str()).cloned().unwrap_or(Value::Null)),
        Node::Literal(value) => Ok(value.clone()),
        Node::Subexpr(lhs, rhs) | Node::Pipe(lhs, rhs) => {
            let base = eval(lhs, current)?;
            eval(rhs, &base)
        }
        Node::Index(lhs, index) => Ok(match eval(lhs, current)? {
            Value::Array(items) => resolve_index(*index, items.len())
                .map(|i| items[i].clone())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        Node::Projection(lhs, rhs) => match eval(lhs, current)? {
            Value::Array(items) => project(&items, rhs),
            _ => Ok(Value::Null),
        },
        Node::ObjectProjection(lhs, rhs) => match eval(lhs, current)? {
            Value::Object(map) => {
                let values: Vec<Value> = map.into_iter().map(|(_, v)| v).collect();
                project(&values, rhs)
            }
            _ => Ok(Value::Null),
        },
        Node::Flatten(lhs) => match eval(lhs, current)? {
            Value::Array(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Array(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                Ok(Value::Array(flat))
            }
            _ => Ok(Value::Null),
        },
        Node::Filter { base, cond, then } => match eval(base, current)? {
            Value::Array(items) => {
                let mut kept = Vec::new();
                for item in items {
                    if is_query_truthy(&eval(cond, &item)?) {
                        kept.push(item);
                    }
                }
                project(&kept, then)
            }
            _ => Ok(Value::Null),
        },
        Node::Compare(op, lhs, rhs) => {
            let a = eval(lhs, current)?;
            let b = eval(rhs, current)?;
            Ok(compare(*op, &a, &b))
        }
        Node::Not(inner) => Ok(Value::Bool(!is_query_truthy(&eval(inner, current)?))),
        Node::And(lhs, rhs) => {
            let a = eval(lhs, current)?;
            if is_query_truthy(&a) {
                eval(rhs, current)
            } else {
                Ok(a)
            }
        }
        Node::Or(lhs, rhs) => {
            let a = eval(lhs, current)?;
            if is_query_truthy(&a) {
                Ok(a)
            } else {
                eval(rhs, current)
            }
        }
        Node::Call(function, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, current))
                .collect::<Result<Vec<_>>>()?;
            function.call(&values)
        }
    }
}

/// A compiled structured query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    root: Node,
}

impl Query {
    /// Parse a query.
    pub fn compile(source: &str) -> Result<Self> {
        let mut parser = Parser {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
        };
        let root = parser.expression(0)?;
        parser.expect(&Token::Eof)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate the query against a document.
    pub fn search(&self, data: &Value) -> Result<Value> {
        eval(&self.root, data)
    }

    /// Source text the query was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search(query: &str, data: &Value) -> Value {
        Query::compile(query)
            .expect("compile query")
            .search(data)
            .expect("evaluate query")
    }

    fn scan() -> Value {
        json!({
            "url": "https://shop.example",
            "cookie_banner_detected": false,
            "robots_meta": null,
            "scan_time_ms": 1840,
            "cookies": [
                {"name": "_ga", "domain": ".shop.example", "secure": false, "same_site": null},
                {"name": "session", "domain": "shop.example", "secure": true, "same_site": "Lax"}
            ],
            "third_party_domains": ["cdn.tracker.example", "fonts.example"],
            "scripts": [
                {"script_url": "https://shop.example/app.js", "response_size": 1024},
                {"script_url": "https://cdn.tracker.example/t.js", "response_size": null}
            ]
        })
    }

    #[test]
    fn test_field_and_literal_comparison() {
        let data = scan();
        assert_eq!(search("cookie_banner_detected == false", &data), json!(true));
        assert_eq!(search("cookie_banner_detected", &data), json!(false));
        assert_eq!(search("!cookie_banner_detected", &data), json!(true));
        assert_eq!(search("missing_field", &data), Value::Null);
        assert_eq!(search("robots_meta == null", &data), json!(true));
    }

    #[test]
    fn test_sub_expressions_and_indices() {
        let data = scan();
        assert_eq!(search("cookies[0].name", &data), json!("_ga"));
        assert_eq!(search("cookies[-1].name", &data), json!("session"));
        assert_eq!(search("cookies[5].name", &data), Value::Null);
        assert_eq!(search("url.host", &data), Value::Null);
    }

    #[test]
    fn test_projections() {
        let data = scan();
        assert_eq!(search("cookies[*].name", &data), json!(["_ga", "session"]));
        assert_eq!(
            search("scripts[*].response_size", &data),
            json!([1024])
        );
        assert_eq!(search("length(cookies[*])", &data), json!(2));
        assert_eq!(
            search("*.name", &json!({"a": {"name": "x"}, "b": {"name": "y"}})),
            json!(["x", "y"])
        );
        assert_eq!(search("[][]", &json!([[1, [2]], [3]])), json!([1, 2, 3]));
    }

    #[test]
    fn test_filters() {
        let data = scan();
        assert_eq!(
            search("cookies[?secure == `false`].name", &data),
            json!(["_ga"])
        );
        assert_eq!(
            search("length(cookies[?same_site == null]) > `0`", &data),
            json!(true)
        );
        assert_eq!(
            search("scripts[?response_size == null] | length(@)", &data),
            json!(1)
        );
    }

    #[test]
    fn test_functions() {
        let data = scan();
        assert_eq!(
            search("contains(third_party_domains, 'fonts.example')", &data),
            json!(true)
        );
        assert_eq!(search("starts_with(url, 'https://')", &data), json!(true));
        assert_eq!(search("ends_with(url, '.org')", &data), json!(false));
        assert_eq!(search("to_number('42')", &data), json!(42));
        assert_eq!(search("to_number('nope')", &data), Value::Null);
        assert_eq!(
            search("keys(@)", &json!({"a": 1})),
            json!(["a"])
        );
    }

    #[test]
    fn test_boolean_operators() {
        let data = scan();
        assert_eq!(
            search("scan_time_ms > `1000` && !cookie_banner_detected", &data),
            json!(true)
        );
        assert_eq!(search("robots_meta || 'index'", &data), json!("index"));
        assert_eq!(search("(scan_time_ms < 10) || cookies[0].secure", &data), json!(false));
    }

    #[test]
    fn test_ordering_on_non_numbers_is_null() {
        assert_eq!(search("url > `1`", &scan()), Value::Null);
    }

    #[test]
    fn test_quoted_identifiers_and_literals() {
        let data = json!({"true": 1, "with space": "yes"});
        assert_eq!(search("\"true\"", &data), json!(1));
        assert_eq!(search("\"with space\"", &data), json!("yes"));
        assert_eq!(search("'it\\'s'", &data), json!("it's"));
        assert_eq!(search("`{\"a\": [1]}`.a[0]", &data), json!(1));
    }

    #[test]
    fn test_function_type_error_is_evaluation_error() {
        let query = Query::compile("length(scan_time_ms)").expect("compile");
        assert!(matches!(
            query.search(&scan()),
            Err(RuleError::Evaluation(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in [
            "",
            "cookies[",
            "a ==",
            "a = b",
            "unknown_fn(a)",
            "length(a, b)",
            "a.",
            "&a",
            "'unterminated",
            "a b",
        ] {
            assert!(
                matches!(Query::compile(bad), Err(RuleError::Syntax { .. })),
                "expected syntax error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_nesting_is_capped() {
        let deep = format!("{}a{}", "(".repeat(100), ")".repeat(100));
        assert!(Query::compile(&deep).is_err());
        let shallow = format!("{}a{}", "(".repeat(10), ")".repeat(10));
        assert!(Query::compile(&shallow).is_ok());
    }
}
