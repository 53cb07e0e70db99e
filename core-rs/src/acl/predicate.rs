//! Predicate expression engine
//!
//! Rule conditions are small boolean expressions over the rule's named
//! bindings, e.g. `r.owner == p` or `r.mileage < 100000 && p.level == 'gold'`.
//! The grammar is deliberately tiny: literals, dotted property paths, `!`,
//! comparison operators, `&&` and `||`, and parentheses.
//!
//! Property paths may walk through relationship references. A path step that
//! lands on a relationship whose target has not been materialized yet does
//! not fail - it reports the reference through [`EvalError::Unresolved`] so
//! the caller can fetch the target and re-execute the predicate. Everything
//! else that goes wrong at runtime (unbound variables, missing properties,
//! type errors) is an [`EvalError::Fault`].

use crate::model::{relationship_target, Resource};
use crate::resolver::ResolutionState;
use serde_json::Value;
use std::fmt;

/// Runtime outcome of a failed predicate execution pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EvalError {
    /// The predicate dereferenced a relationship that is not materialized.
    /// Carries the fully-qualified identifier of the required target.
    Unresolved(String),
    /// A genuine runtime fault; the controller treats this as a failed check.
    Fault(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Unresolved(fqi) => write!(f, "unresolved relationship '{}'", fqi),
            EvalError::Fault(message) => write!(f, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Literal),
    Path(Vec<String>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    Dot,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    return Err("single '=' is not an operator, use '=='".to_string());
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err("single '&' is not an operator, use '&&'".to_string());
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err("single '|' is not an operator, use '||'".to_string());
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\\' {
                        match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(escaped) => value.push(escaped),
                            None => return Err("unterminated escape in string literal".to_string()),
                        }
                    } else {
                        value.push(c);
                    }
                }
                if !closed {
                    return Err("unterminated string literal".to_string());
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        number.push(c);
                        chars.next();
                    } else if c == '.' {
                        // Lookahead: "1.5" is a float, "x.1" never lexes here,
                        // and "1.foo" is a malformed number.
                        let mut ahead = chars.clone();
                        ahead.next();
                        match ahead.peek() {
                            Some(d) if d.is_ascii_digit() => {
                                is_float = true;
                                number.push(c);
                                chars.next();
                            }
                            _ => break,
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let parsed = number
                        .parse::<f64>()
                        .map_err(|e| format!("invalid number '{}': {}", number, e))?;
                    tokens.push(Token::Float(parsed));
                } else {
                    let parsed = number
                        .parse::<i64>()
                        .map_err(|e| format!("invalid number '{}': {}", number, e))?;
                    tokens.push(Token::Int(parsed));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn consume(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {:?}, found {:?}", expected, token)),
            None => Err(format!("expected {:?}, found end of expression", expected)),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Bang) {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.consume(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Int(i)) => Ok(Expr::Literal(Literal::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Literal::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::Str(s))),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                _ => {
                    let mut segments = vec![ident];
                    while self.peek() == Some(&Token::Dot) {
                        self.advance();
                        match self.advance() {
                            Some(Token::Ident(segment)) => segments.push(segment),
                            Some(token) => {
                                return Err(format!(
                                    "expected property name after '.', found {:?}",
                                    token
                                ))
                            }
                            None => {
                                return Err(
                                    "expected property name after '.', found end of expression"
                                        .to_string(),
                                )
                            }
                        }
                    }
                    Ok(Expr::Path(segments))
                }
            },
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Parse a predicate expression into its AST.
pub(crate) fn parse(expression: &str) -> Result<Expr, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let expr = parser.parse_expr()?;
    if parser.position != parser.tokens.len() {
        return Err(format!(
            "unexpected trailing token {:?}",
            parser.tokens[parser.position]
        ));
    }
    Ok(expr)
}

/// A value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EvalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A typed instance or relationship reference, by fully-qualified
    /// identifier. Identity comparisons never force resolution.
    Entity(String),
    /// A structural JSON value (object or array) reached mid-document.
    Json(Value),
}

impl EvalValue {
    fn from_json(value: &Value) -> EvalValue {
        match value {
            Value::Null => EvalValue::Null,
            Value::Bool(b) => EvalValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => EvalValue::Int(i),
                None => EvalValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => match s.strip_prefix(crate::model::RELATIONSHIP_PREFIX) {
                Some(fqi) => EvalValue::Entity(fqi.to_string()),
                None => EvalValue::Str(s.clone()),
            },
            other => EvalValue::Json(other.clone()),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            EvalValue::Int(i) => Some(*i as f64),
            EvalValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Truthiness coercion for the final result and for `!`/`&&`/`||`.
pub(crate) fn truthy(value: &EvalValue) -> bool {
    match value {
        EvalValue::Null => false,
        EvalValue::Bool(b) => *b,
        EvalValue::Int(i) => *i != 0,
        EvalValue::Float(f) => *f != 0.0 && !f.is_nan(),
        EvalValue::Str(s) => !s.is_empty(),
        EvalValue::Entity(_) => true,
        EvalValue::Json(_) => true,
    }
}

fn values_equal(lhs: &EvalValue, rhs: &EvalValue) -> bool {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return a == b;
    }
    match (lhs, rhs) {
        (EvalValue::Null, EvalValue::Null) => true,
        (EvalValue::Bool(a), EvalValue::Bool(b)) => a == b,
        (EvalValue::Str(a), EvalValue::Str(b)) => a == b,
        (EvalValue::Entity(a), EvalValue::Entity(b)) => a == b,
        (EvalValue::Entity(a), EvalValue::Str(b)) => a == b,
        (EvalValue::Str(a), EvalValue::Entity(b)) => a == b,
        (EvalValue::Json(a), EvalValue::Json(b)) => a == b,
        _ => false,
    }
}

/// The named instances a predicate executes against.
pub(crate) struct Bindings<'a> {
    entries: Vec<(&'a str, &'a Resource)>,
}

impl<'a> Bindings<'a> {
    pub(crate) fn new() -> Self {
        Bindings {
            entries: Vec::new(),
        }
    }

    pub(crate) fn bind(&mut self, name: &'a str, resource: &'a Resource) {
        self.entries.push((name, resource));
    }

    fn lookup(&self, name: &str) -> Option<&'a Resource> {
        self.entries
            .iter()
            .find(|(bound, _)| *bound == name)
            .map(|(_, resource)| *resource)
    }
}

enum Cursor<'a> {
    Instance(&'a Resource),
    Document(&'a Value),
}

/// Evaluate an expression against the bindings and the relationships
/// materialized so far.
pub(crate) fn evaluate(
    expr: &Expr,
    bindings: &Bindings<'_>,
    state: &ResolutionState,
) -> Result<EvalValue, EvalError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Bool(b) => EvalValue::Bool(*b),
            Literal::Int(i) => EvalValue::Int(*i),
            Literal::Float(f) => EvalValue::Float(*f),
            Literal::Str(s) => EvalValue::Str(s.clone()),
        }),
        Expr::Path(segments) => evaluate_path(segments, bindings, state),
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, bindings, state)?;
            match op {
                UnaryOp::Not => Ok(EvalValue::Bool(!truthy(&value))),
            }
        }
        Expr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => {
                let left = evaluate(lhs, bindings, state)?;
                if !truthy(&left) {
                    return Ok(EvalValue::Bool(false));
                }
                let right = evaluate(rhs, bindings, state)?;
                Ok(EvalValue::Bool(truthy(&right)))
            }
            BinaryOp::Or => {
                let left = evaluate(lhs, bindings, state)?;
                if truthy(&left) {
                    return Ok(EvalValue::Bool(true));
                }
                let right = evaluate(rhs, bindings, state)?;
                Ok(EvalValue::Bool(truthy(&right)))
            }
            BinaryOp::Eq => {
                let left = evaluate(lhs, bindings, state)?;
                let right = evaluate(rhs, bindings, state)?;
                Ok(EvalValue::Bool(values_equal(&left, &right)))
            }
            BinaryOp::Ne => {
                let left = evaluate(lhs, bindings, state)?;
                let right = evaluate(rhs, bindings, state)?;
                Ok(EvalValue::Bool(!values_equal(&left, &right)))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let left = evaluate(lhs, bindings, state)?;
                let right = evaluate(rhs, bindings, state)?;
                compare(*op, &left, &right)
            }
        },
    }
}

fn compare(op: BinaryOp, lhs: &EvalValue, rhs: &EvalValue) -> Result<EvalValue, EvalError> {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        let result = match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => false,
        };
        return Ok(EvalValue::Bool(result));
    }
    if let (EvalValue::Str(a), EvalValue::Str(b)) = (lhs, rhs) {
        let result = match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => false,
        };
        return Ok(EvalValue::Bool(result));
    }
    Err(EvalError::Fault(format!(
        "cannot order {:?} against {:?}",
        lhs, rhs
    )))
}

fn evaluate_path(
    segments: &[String],
    bindings: &Bindings<'_>,
    state: &ResolutionState,
) -> Result<EvalValue, EvalError> {
    let root = bindings.lookup(&segments[0]).ok_or_else(|| {
        EvalError::Fault(format!("unbound variable '{}'", segments[0]))
    })?;

    if segments.len() == 1 {
        return Ok(EvalValue::Entity(root.fully_qualified_identifier()));
    }

    let mut cursor = Cursor::Instance(root);
    for (index, segment) in segments[1..].iter().enumerate() {
        let is_last = index == segments.len() - 2;
        let value = match &cursor {
            Cursor::Instance(resource) => resource.property(segment).ok_or_else(|| {
                EvalError::Fault(format!(
                    "'{}' has no property '{}'",
                    resource.fully_qualified_type(),
                    segment
                ))
            })?,
            Cursor::Document(Value::Object(map)) => map.get(segment).ok_or_else(|| {
                EvalError::Fault(format!("no such property '{}'", segment))
            })?,
            Cursor::Document(_) => {
                return Err(EvalError::Fault(format!(
                    "cannot access property '{}' of a scalar value",
                    segment
                )))
            }
        };

        if let Some(fqi) = relationship_target(value) {
            if is_last {
                return Ok(EvalValue::Entity(fqi.to_string()));
            }
            match state.get(fqi) {
                Some(target) => cursor = Cursor::Instance(target),
                None => return Err(EvalError::Unresolved(fqi.to_string())),
            }
        } else if is_last {
            return Ok(EvalValue::from_json(value));
        } else {
            cursor = Cursor::Document(value);
        }
    }

    Err(EvalError::Fault("empty property path".to_string()))
}
