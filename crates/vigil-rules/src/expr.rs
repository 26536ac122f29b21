//! Expression dialect.
//!
//! A small, side-effect-free expression language over the serialized scan
//! result. The only name in scope is `result`; everything else is a literal,
//! an operator or one of the whitelisted functions (`len`, `lower`, `upper`,
//! `abs`, `any`, `all`). Evaluation can fail (missing key, bad operand
//! types, division by zero), in which case the rule is not satisfied.
//!
//! ```text
//! not result.cookie_banner_detected and len(result.cookies) > 0
//! 'google-analytics.com' in result['third_party_domains']
//! ```

use crate::error::{Result, RuleError};
use crate::value::{is_truthy, json_cmp, json_eq, resolve_index, type_name};
use serde_json::{Number, Value};
use std::cmp::Ordering;

const MAX_DEPTH: usize = 64;
const ROOT_NAME: &str = "result";

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    Eof,
}

static OPERATORS: [&str; 19] = [
    "==", "!=", "<=", ">=", "//", "<", ">", "+", "-", "*", "/", "%", "(", ")", "[", "]", ".", ",",
    "=",
];

fn lex(src: &str) -> Result<Vec<(Tok, usize)>> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push((Tok::Name(chars[start..i].iter().collect()), start));
        } else if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let tok = if is_float {
                text.parse().map(Tok::Float).ok()
            } else {
                text.parse().map(Tok::Int).ok()
            }
            .ok_or_else(|| RuleError::syntax(start, format!("invalid number '{text}'")))?;
            out.push((tok, start));
        } else if c == '\'' || c == '"' {
            i += 1;
            let mut s = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(RuleError::syntax(start, "unterminated string")),
                    Some('\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or_else(|| RuleError::syntax(i, "dangling escape"))?;
                        s.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => *other,
                        });
                        i += 2;
                    }
                    Some(&q) if q == c => {
                        i += 1;
                        break;
                    }
                    Some(&other) => {
                        s.push(other);
                        i += 1;
                    }
                }
            }
            out.push((Tok::Str(s), start));
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| RuleError::syntax(start, format!("unexpected character '{c}'")))?;
            if *op == "=" {
                return Err(RuleError::syntax(start, "assignment is not allowed"));
            }
            i += op.chars().count();
            out.push((Tok::Op(*op), start));
        }
    }

    out.push((Tok::Eof, chars.len()));
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Len,
    Lower,
    Upper,
    Abs,
    Any,
    All,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "abs" => Self::Abs,
            "any" => Self::Any,
            "all" => Self::All,
            _ => return None,
        })
    }

    fn call(self, arg: Value) -> Result<Value> {
        match (self, arg) {
            (Self::Len, Value::String(s)) => Ok(Value::from(s.chars().count())),
            (Self::Len, Value::Array(a)) => Ok(Value::from(a.len())),
            (Self::Len, Value::Object(o)) => Ok(Value::from(o.len())),
            (Self::Lower, Value::String(s)) => Ok(Value::String(s.to_lowercase())),
            (Self::Upper, Value::String(s)) => Ok(Value::String(s.to_uppercase())),
            (Self::Abs, Value::Number(n)) => Ok(match n.as_i64() {
                Some(i) => i
                    .checked_abs()
                    .map(Value::from)
                    .ok_or_else(|| RuleError::eval("integer overflow in abs()"))?,
                None => Value::from(n.as_f64().unwrap_or(0.0).abs()),
            }),
            (Self::Any, Value::Array(a)) => Ok(Value::Bool(a.iter().any(is_truthy))),
            (Self::All, Value::Array(a)) => Ok(Value::Bool(a.iter().all(is_truthy))),
            (f, other) => Err(RuleError::eval(format!(
                "{f:?} does not accept a {}",
                type_name(&other)
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Root,
    Const(Value),
    List(Vec<Expr>),
    Attr(Box<Expr>, String),
    Subscript(Box<Expr>, Box<Expr>),
    Call(Builtin, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Chained comparison: `a < b <= c`.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

struct Parser {
    toks: Vec<(Tok, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].0
    }

    fn offset(&self) -> usize {
        self.toks[self.pos.min(self.toks.len() - 1)].1
    }

    fn bump(&mut self) -> Tok {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_op(&mut self, op: &str) -> Result<()> {
        if self.is_op(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(RuleError::syntax(
                self.offset(),
                format!("expected '{op}', found {:?}", self.peek()),
            ))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(RuleError::syntax(self.offset(), "expression nested too deeply"))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self, n: usize) {
        self.depth -= n;
    }

    fn expr(&mut self) -> Result<Expr> {
        self.enter()?;
        let e = self.or_expr()?;
        self.leave(1);
        Ok(e)
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        let mut chained = 0;
        while self.is_keyword("or") {
            self.bump();
            self.enter()?;
            chained += 1;
            left = Expr::Or(Box::new(left), Box::new(self.and_expr()?));
        }
        self.leave(chained);
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        let mut chained = 0;
        while self.is_keyword("and") {
            self.bump();
            self.enter()?;
            chained += 1;
            left = Expr::And(Box::new(left), Box::new(self.not_expr()?));
        }
        self.leave(chained);
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.is_keyword("not") {
            self.bump();
            self.enter()?;
            let inner = self.not_expr()?;
            self.leave(1);
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn keyword_at(&self, ahead: usize, kw: &str) -> bool {
        matches!(self.toks.get(self.pos + ahead), Some((Tok::Name(n), _)) if n == kw)
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let (op, width) = match self.peek() {
            Tok::Op("==") => (CmpOp::Eq, 1),
            Tok::Op("!=") => (CmpOp::Ne, 1),
            Tok::Op("<") => (CmpOp::Lt, 1),
            Tok::Op("<=") => (CmpOp::Le, 1),
            Tok::Op(">") => (CmpOp::Gt, 1),
            Tok::Op(">=") => (CmpOp::Ge, 1),
            Tok::Name(n) if n == "in" => (CmpOp::In, 1),
            Tok::Name(n) if n == "is" && self.keyword_at(1, "not") => (CmpOp::Ne, 2),
            Tok::Name(n) if n == "is" => (CmpOp::Eq, 1),
            Tok::Name(n) if n == "not" && self.keyword_at(1, "in") => (CmpOp::NotIn, 2),
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let first = self.sum()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            self.enter()?;
            rest.push((op, self.sum()?));
        }
        self.leave(rest.len());
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => break,
            };
            self.bump();
            self.enter()?;
            chained += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.term()?));
        }
        self.leave(chained);
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("//") => BinOp::FloorDiv,
                Tok::Op("%") => BinOp::Mod,
                _ => break,
            };
            self.bump();
            self.enter()?;
            chained += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.unary()?));
        }
        self.leave(chained);
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.is_op("-") || self.is_op("+") {
            let negate = self.is_op("-");
            self.bump();
            self.enter()?;
            let inner = self.unary()?;
            self.leave(1);
            return Ok(if negate {
                Expr::Neg(Box::new(inner))
            } else {
                inner
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut node = self.primary()?;
        let mut chained = 0;
        loop {
            if self.is_op(".") {
                self.bump();
                let offset = self.offset();
                let Tok::Name(field) = self.bump() else {
                    return Err(RuleError::syntax(offset, "expected a field name after '.'"));
                };
                if self.is_op("(") {
                    return Err(RuleError::syntax(offset, "method calls are not allowed"));
                }
                node = Expr::Attr(Box::new(node), field);
            } else if self.is_op("[") {
                self.bump();
                let index = self.expr()?;
                self.eat_op("]")?;
                node = Expr::Subscript(Box::new(node), Box::new(index));
            } else if self.is_op("(") {
                return Err(RuleError::syntax(
                    self.offset(),
                    "only whitelisted functions can be called",
                ));
            } else {
                break;
            }
            self.enter()?;
            chained += 1;
        }
        self.leave(chained);
        Ok(node)
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.bump() {
            Tok::Int(i) => Ok(Expr::Const(Value::from(i))),
            Tok::Float(f) => Ok(Expr::Const(Value::from(f))),
            Tok::Str(s) => Ok(Expr::Const(Value::String(s))),
            Tok::Op("(") => {
                let inner = self.expr()?;
                self.eat_op(")")?;
                Ok(inner)
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                while !self.is_op("]") {
                    items.push(self.expr()?);
                    if !self.is_op("]") {
                        self.eat_op(",")?;
                    }
                }
                self.bump();
                Ok(Expr::List(items))
            }
            Tok::Name(name) => self.name(name, offset),
            other => Err(RuleError::syntax(offset, format!("unexpected {other:?}"))),
        }
    }

    fn name(&mut self, name: String, offset: usize) -> Result<Expr> {
        match name.as_str() {
            ROOT_NAME => Ok(Expr::Root),
            "True" | "true" => Ok(Expr::Const(Value::Bool(true))),
            "False" | "false" => Ok(Expr::Const(Value::Bool(false))),
            "None" | "null" => Ok(Expr::Const(Value::Null)),
            _ => {
                let builtin = Builtin::lookup(&name).ok_or_else(|| {
                    RuleError::syntax(offset, format!("unknown name '{name}'"))
                })?;
                self.eat_op("(")?;
                let arg = self.expr()?;
                self.eat_op(")")?;
                Ok(Expr::Call(builtin, Box::new(arg)))
            }
        }
    }
}

fn number(value: &Value) -> Option<&Number> {
    match value {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

fn arithmetic(op: BinOp, a: Value, b: Value) -> Result<Value> {
    if let (Some(x), Some(y)) = (number(&a), number(&b)) {
        if let (Some(x), Some(y), false) = (x.as_i64(), y.as_i64(), op == BinOp::Div) {
            let out = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Sub => x.checked_sub(y),
                BinOp::Mul => x.checked_mul(y),
                BinOp::FloorDiv | BinOp::Mod if y == 0 => {
                    return Err(RuleError::eval("division by zero"))
                }
                // Floor semantics: the remainder takes the sign of the divisor.
                BinOp::FloorDiv => x
                    .checked_div_euclid(y)
                    .zip(x.checked_rem_euclid(y))
                    .and_then(|(q, r)| if y < 0 && r != 0 { q.checked_sub(1) } else { Some(q) }),
                BinOp::Mod => x
                    .checked_rem_euclid(y)
                    .and_then(|r| if y < 0 && r != 0 { r.checked_add(y) } else { Some(r) }),
                BinOp::Div => None,
            };
            return out
                .map(Value::from)
                .ok_or_else(|| RuleError::eval("integer overflow"));
        }
        let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
        let out = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div | BinOp::FloorDiv | BinOp::Mod if y == 0.0 => {
                return Err(RuleError::eval("division by zero"))
            }
            BinOp::Div => x / y,
            BinOp::FloorDiv => (x / y).floor(),
            BinOp::Mod => x - y * (x / y).floor(),
        };
        return Ok(Value::from(out));
    }

    match (op, a, b) {
        (BinOp::Add, Value::String(x), Value::String(y)) => Ok(Value::String(x + &y)),
        (BinOp::Add, Value::Array(mut x), Value::Array(y)) => {
            x.extend(y);
            Ok(Value::Array(x))
        }
        (op, a, b) => Err(RuleError::eval(format!(
            "unsupported operand types for {op:?}: {} and {}",
            type_name(&a),
            type_name(&b)
        ))),
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool> {
    let ordered = |want: fn(Ordering) -> bool| {
        json_cmp(a, b).map(want).ok_or_else(|| {
            RuleError::eval(format!(
                "cannot order {} and {}",
                type_name(a),
                type_name(b)
            ))
        })
    };
    match op {
        CmpOp::Eq => Ok(json_eq(a, b)),
        CmpOp::Ne => Ok(!json_eq(a, b)),
        CmpOp::Lt => ordered(Ordering::is_lt),
        CmpOp::Le => ordered(Ordering::is_le),
        CmpOp::Gt => ordered(Ordering::is_gt),
        CmpOp::Ge => ordered(Ordering::is_ge),
        CmpOp::In | CmpOp::NotIn => {
            let found = match (a, b) {
                (Value::String(needle), Value::String(hay)) => hay.contains(needle.as_str()),
                (item, Value::Array(items)) => items.iter().any(|x| json_eq(x, item)),
                (Value::String(key), Value::Object(map)) => map.contains_key(key),
                _ => {
                    return Err(RuleError::eval(format!(
                        "'in' needs a container, got {} in {}",
                        type_name(a),
                        type_name(b)
                    )))
                }
            };
            Ok(found == (op == CmpOp::In))
        }
    }
}

fn subscript(base: Value, index: &Value) -> Result<Value> {
    match (base, index) {
        (Value::Object(mut map), Value::String(key)) => map
            .remove(key)
            .ok_or_else(|| RuleError::eval(format!("missing key '{key}'"))),
        (Value::Array(mut items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| RuleError::eval("list index must be an integer"))?;
            let at = resolve_index(i, items.len())
                .ok_or_else(|| RuleError::eval(format!("list index {i} out of range")))?;
            Ok(items.swap_remove(at))
        }
        (Value::String(s), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| RuleError::eval("string index must be an integer"))?;
            let chars: Vec<char> = s.chars().collect();
            let at = resolve_index(i, chars.len())
                .ok_or_else(|| RuleError::eval(format!("string index {i} out of range")))?;
            Ok(Value::String(chars[at].to_string()))
        }
        (base, index) => Err(RuleError::eval(format!(
            "cannot index {} with {}",
            type_name(&base),
            type_name(index)
        ))),
    }
}

fn eval(expr: &Expr, root: &Value) -> Result<Value> {
    match expr {
        Expr::Root => Ok(root.clone()),
        Expr::Const(v) => Ok(v.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, root))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Expr::Attr(base, field) => subscript(eval(base, root)?, &Value::String(field.clone())),
        Expr::Subscript(base, index) => {
            let base = eval(base, root)?;
            let index = eval(index, root)?;
            subscript(base, &index)
        }
        Expr::Call(builtin, arg) => builtin.call(eval(arg, root)?),
        Expr::Neg(inner) => arithmetic(BinOp::Sub, Value::from(0), eval(inner, root)?),
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval(inner, root)?))),
        Expr::Binary(op, a, b) => arithmetic(*op, eval(a, root)?, eval(b, root)?),
        Expr::Compare(first, rest) => {
            let mut left = eval(first, root)?;
            for (op, right) in rest {
                let right = eval(right, root)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::And(a, b) => {
            let left = eval(a, root)?;
            if is_truthy(&left) {
                eval(b, root)
            } else {
                Ok(left)
            }
        }
        Expr::Or(a, b) => {
            let left = eval(a, root)?;
            if is_truthy(&left) {
                Ok(left)
            } else {
                eval(b, root)
            }
        }
    }
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse an expression.
    pub fn compile(source: &str) -> Result<Self> {
        let mut parser = Parser {
            toks: lex(source)?,
            pos: 0,
            depth: 0,
        };
        let root = parser.expr()?;
        if parser.peek() != &Tok::Eof {
            return Err(RuleError::syntax(
                parser.offset(),
                format!("unexpected {:?}", parser.peek()),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate with `result` bound to `data`.
    pub fn evaluate(&self, data: &Value) -> Result<Value> {
        eval(&self.root, data)
    }

    /// Source text the expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}
