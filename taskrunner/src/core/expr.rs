//! Small arithmetic/logical expression engine.
//!
//! Parses the normalized condition syntax (`and`, `or`, `not`, `=`, `<>`,
//! comparisons, arithmetic, ternary, a handful of functions) into an AST and
//! evaluates it. Every failure is an [`ExprError`]; nothing panics.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Coerce to boolean: booleans as-is, numbers non-zero, `"true"`/`"false"` strings.
    pub fn to_bool(&self) -> Result<bool, ExprError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            Value::Str(s) => Err(ExprError::NotBoolean(s.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number literal '{0}'")]
    BadNumber(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
    #[error("operator '{op}' cannot combine {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("operator '{op}' cannot apply to {operand}")]
    BadOperand { op: &'static str, operand: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("value '{0}' is not a boolean")]
    NotBoolean(String),
    #[error("function '{0}' expects numeric arguments")]
    NotNumeric(String),
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("parameter '{0}' has no expression literal")]
    NoLiteral(String),
}

/// Parse and evaluate `source`.
pub fn evaluate(source: &str) -> Result<Value, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let ast = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(ExprError::UnexpectedToken(token.to_string()));
    }
    eval(&ast)
}

// ---------------------------------------------------------------------------
// Tokens

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Ident(s) => f.write_str(s),
            Token::Op(op) => f.write_str(op),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
        }
    }
}

/// Longest operators first so `<=` wins over `<`.
const OPERATORS: &[&str] = &[
    "<>", "<=", ">=", "==", "!=", "&&", "||", "<", ">", "=", "!", "+", "-", "*", "/", "%", "?",
    ":",
];

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, ch) = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        match ch {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ExprError::UnterminatedString),
                        Some((_, '\\')) if matches!(chars.get(i + 1), Some((_, '\''))) => {
                            text.push('\'');
                            i += 2;
                        }
                        Some((_, '\'')) => {
                            i += 1;
                            break;
                        }
                        Some((_, c)) => {
                            text.push(*c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i)) => {
                let start = i;
                let mut is_float = false;
                while let Some((_, c)) = chars.get(i) {
                    if c.is_ascii_digit() {
                        i += 1;
                    } else if *c == '.' && !is_float {
                        is_float = true;
                        i += 1;
                    } else if (*c == 'e' || *c == 'E') && exponent_follows(&chars, i) {
                        is_float = true;
                        i += 2;
                    } else {
                        break;
                    }
                }
                let end = chars.get(i).map_or(source.len(), |(o, _)| *o);
                let text = &source[chars[start].0..end];
                let token = if is_float {
                    text.parse::<f64>().map(Token::Float)
                } else {
                    text.parse::<i64>().map(Token::Int).or_else(|_| {
                        // Out of i64 range: keep it as a float.
                        text.parse::<f64>().map(Token::Float)
                    })
                }
                .map_err(|_| ExprError::BadNumber(text.to_string()))?;
                tokens.push(token);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while let Some((_, c)) = chars.get(i) {
                    if c.is_alphanumeric() || *c == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let end = chars.get(i).map_or(source.len(), |(o, _)| *o);
                tokens.push(Token::Ident(source[chars[start].0..end].to_string()));
            }
            _ => {
                let rest = &source[offset..];
                let op = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or(ExprError::UnexpectedChar { ch, offset })?;
                tokens.push(Token::Op(*op));
                i += op.chars().count();
            }
        }
    }
    Ok(tokens)
}

fn next_is_digit(chars: &[(usize, char)], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_digit())
}

fn exponent_follows(chars: &[(usize, char)], i: usize) -> bool {
    match chars.get(i + 1) {
        Some((_, c)) if c.is_ascii_digit() => true,
        Some((_, '+' | '-')) => chars.get(i + 2).is_some_and(|(_, c)| c.is_ascii_digit()),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// AST + parser

#[derive(Debug, Clone, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// Deepest AST the parser will build. Parsing, evaluation and drop all
/// recurse over the tree, so this bounds their stack use.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Nodes on the path from the root to the node being parsed.
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    /// Left-associative chain of `operand (op operand)*`. Each link nests the
    /// tree one level deeper.
    fn chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
        operator: fn(&mut Self) -> Option<BinOp>,
    ) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut left = operand(self)?;
        while let Some(op) = operator(self) {
            self.descend()?;
            let right = operand(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_op(&mut self, candidates: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if candidates.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken(token.to_string()))
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let condition = self.or()?;
        let expr = if self.eat_op(&["?"]).is_some() {
            let then = self.expression()?;
            self.expect(Token::Op(":"))?;
            let otherwise = self.expression()?;
            Expr::Ternary(Box::new(condition), Box::new(then), Box::new(otherwise))
        } else {
            condition
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::and, |p| {
            (p.eat_keyword("or") || p.eat_op(&["||"]).is_some()).then_some(BinOp::Or)
        })
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::equality, |p| {
            (p.eat_keyword("and") || p.eat_op(&["&&"]).is_some()).then_some(BinOp::And)
        })
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::relational, |p| {
            p.eat_op(&["=", "==", "<>", "!="]).map(|op| match op {
                "=" | "==" => BinOp::Eq,
                _ => BinOp::Ne,
            })
        })
    }

    fn relational(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::additive, |p| {
            p.eat_op(&["<", "<=", ">", ">="]).map(|op| match op {
                "<" => BinOp::Lt,
                "<=" => BinOp::Le,
                ">" => BinOp::Gt,
                _ => BinOp::Ge,
            })
        })
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::multiplicative, |p| {
            p.eat_op(&["+", "-"]).map(|op| match op {
                "+" => BinOp::Add,
                _ => BinOp::Sub,
            })
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::unary, |p| {
            p.eat_op(&["*", "/", "%"]).map(|op| match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Rem,
            })
        })
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let wrap: fn(Box<Expr>) -> Expr =
            if self.eat_keyword("not") || self.eat_op(&["!"]).is_some() {
                Expr::Not
            } else if self.eat_op(&["-"]).is_some() {
                Expr::Neg
            } else {
                return self.primary();
            };
        self.descend()?;
        let inner = self.unary()?;
        self.depth -= 1;
        Ok(wrap(Box::new(inner)))
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.next()? {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("true") => {
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("false") => {
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Ident(word) => {
                if self.peek() != Some(&Token::LParen) {
                    return Err(ExprError::UnknownIdentifier(word));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Expr::Call(word, args));
                }
                loop {
                    args.push(self.expression()?);
                    match self.next()? {
                        Token::Comma => continue,
                        Token::RParen => break,
                        other => return Err(ExprError::UnexpectedToken(other.to_string())),
                    }
                }
                Ok(Expr::Call(word, args))
            }
            other => Err(ExprError::UnexpectedToken(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation

fn eval(expr: &Expr) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner)?.to_bool()?)),
        Expr::Neg(inner) => match eval(inner)? {
            Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(ExprError::BadOperand {
                op: "-",
                operand: other.type_name(),
            }),
        },
        Expr::Binary(BinOp::And, left, right) => {
            if !eval(left)?.to_bool()? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(right)?.to_bool()?))
        }
        Expr::Binary(BinOp::Or, left, right) => {
            if eval(left)?.to_bool()? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(right)?.to_bool()?))
        }
        Expr::Binary(op, left, right) => binary(op, eval(left)?, eval(right)?),
        Expr::Ternary(condition, then, otherwise) => {
            if eval(condition)?.to_bool()? {
                eval(then)
            } else {
                eval(otherwise)
            }
        }
        Expr::Call(name, args) => call(name, args),
    }
}

fn mismatch(op: &BinOp, left: &Value, right: &Value) -> ExprError {
    ExprError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn binary(op: &BinOp, left: Value, right: Value) -> Result<Value, ExprError> {
    match op {
        BinOp::Eq => equals(&left, &right).map(Value::Bool),
        BinOp::Ne => equals(&left, &right).map(|eq| Value::Bool(!eq)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(op, &left, &right)?;
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::Add => match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{left}{right}"))),
            _ => arithmetic(op, &left, &right, i64::checked_add, |a, b| a + b),
        },
        BinOp::Sub => arithmetic(op, &left, &right, i64::checked_sub, |a, b| a - b),
        BinOp::Mul => arithmetic(op, &left, &right, i64::checked_mul, |a, b| a * b),
        BinOp::Div => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(mismatch(op, &left, &right)),
            };
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        BinOp::Rem => {
            if right.as_f64() == Some(0.0) {
                return Err(ExprError::DivisionByZero);
            }
            arithmetic(op, &left, &right, i64::checked_rem, |a, b| a % b)
        }
        BinOp::And => Ok(Value::Bool(left.to_bool()? && right.to_bool()?)),
        BinOp::Or => Ok(Value::Bool(left.to_bool()? || right.to_bool()?)),
    }
}

fn arithmetic(
    op: &BinOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b).map(Value::Int).ok_or(ExprError::Overflow),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(mismatch(op, left, right)),
        },
    }
}

fn equals(left: &Value, right: &Value) -> Result<bool, ExprError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(a == b),
            _ => Err(mismatch(&BinOp::Eq, left, right)),
        },
    }
}

fn compare(op: &BinOp, left: &Value, right: &Value) -> Result<std::cmp::Ordering, ExprError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| mismatch(op, left, right)),
            _ => Err(mismatch(op, left, right)),
        },
    }
}

fn call(name: &str, args: &[Expr]) -> Result<Value, ExprError> {
    let lowered = name.to_ascii_lowercase();
    let arity = |expected: &'static str, ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: name.to_string(),
                expected,
                got: args.len(),
            })
        }
    };
    match lowered.as_str() {
        // `if` and `in` evaluate lazily / compare against raw values.
        "if" => {
            arity("3", args.len() == 3)?;
            if eval(&args[0])?.to_bool()? {
                eval(&args[1])
            } else {
                eval(&args[2])
            }
        }
        "in" => {
            arity("at least 2", args.len() >= 2)?;
            let needle = eval(&args[0])?;
            for candidate in &args[1..] {
                if equals(&needle, &eval(candidate)?).unwrap_or(false) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "abs" | "ceiling" | "floor" | "round" | "sqrt" => {
            arity("1", args.len() == 1)?;
            let value = eval(&args[0])?;
            if let Value::Int(i) = value {
                return match lowered.as_str() {
                    "abs" => i.checked_abs().map(Value::Int).ok_or(ExprError::Overflow),
                    "sqrt" => Ok(Value::Float((i as f64).sqrt())),
                    _ => Ok(Value::Int(i)),
                };
            }
            let x = numeric(name, &value)?;
            let result = match lowered.as_str() {
                "abs" => x.abs(),
                "ceiling" => x.ceil(),
                "floor" => x.floor(),
                "round" => x.round(),
                _ => x.sqrt(),
            };
            Ok(Value::Float(result))
        }
        "pow" => {
            arity("2", args.len() == 2)?;
            let base = numeric(name, &eval(&args[0])?)?;
            let exp = numeric(name, &eval(&args[1])?)?;
            Ok(Value::Float(base.powf(exp)))
        }
        "min" | "max" => {
            arity("2", args.len() == 2)?;
            let a = eval(&args[0])?;
            let b = eval(&args[1])?;
            let ordering = compare(&BinOp::Lt, &a, &b)?;
            let pick_left = if lowered == "min" {
                ordering.is_le()
            } else {
                ordering.is_ge()
            };
            Ok(if pick_left { a } else { b })
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn numeric(name: &str, value: &Value) -> Result<f64, ExprError> {
    value
        .as_f64()
        .ok_or_else(|| ExprError::NotNumeric(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truthy(source: &str) -> bool {
        evaluate(source)
            .and_then(|v| v.to_bool())
            .unwrap_or_else(|err| panic!("{source}: {err}"))
    }

    #[test]
    fn comparisons_and_logic() {
        assert!(truthy("2 > 1"));
        assert!(truthy("1 <= 1 and 3 <> 4"));
        assert!(truthy("not (1 = 2) or false"));
        assert!(truthy("1 < 2 && 2 < 3"));
        assert!(!truthy("TRUE AND FALSE"));
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(evaluate("1 + 2 * 3"), Ok(Value::Int(7)));
        assert_eq!(evaluate("(1 + 2) * 3"), Ok(Value::Int(9)));
        assert_eq!(evaluate("7 % 4 - -1"), Ok(Value::Int(4)));
        assert_eq!(evaluate("5 / 2"), Ok(Value::Float(2.5)));
        assert_eq!(evaluate("1.5e1 + 0.5"), Ok(Value::Float(15.5)));
    }

    #[test]
    fn strings_compare_and_concatenate() {
        assert!(truthy("'abc' = 'abc'"));
        assert!(truthy("'abc' < 'abd'"));
        assert_eq!(evaluate("'a' + 1"), Ok(Value::Str("a1".into())));
        assert!(truthy("'it\\'s' = 'it\\'s'"));
    }

    #[test]
    fn large_integers_stay_exact() {
        assert!(truthy("638400000000000001 > 638400000000000000"));
    }

    #[test]
    fn functions() {
        assert_eq!(evaluate("abs(-3)"), Ok(Value::Int(3)));
        assert_eq!(evaluate("Max(2, 9)"), Ok(Value::Int(9)));
        assert_eq!(evaluate("if(1 > 2, 'a', 'b')"), Ok(Value::Str("b".into())));
        assert!(truthy("in(3, 1, 2, 3)"));
        assert_eq!(evaluate("round(2.6)"), Ok(Value::Float(3.0)));
        assert!(truthy("2 > 1 ? true : false"));
    }

    #[test]
    fn errors_are_reported_not_panicked() {
        assert_eq!(evaluate("1 +"), Err(ExprError::UnexpectedEnd));
        assert!(matches!(
            evaluate("unknown_name > 1"),
            Err(ExprError::UnknownIdentifier(_))
        ));
        assert!(matches!(evaluate("'abc"), Err(ExprError::UnterminatedString)));
        assert!(matches!(evaluate("1 / 0"), Err(ExprError::DivisionByZero)));
        assert!(matches!(
            evaluate("'a' > 1"),
            Err(ExprError::TypeMismatch { .. })
        ));
        assert!(matches!(evaluate("1 2"), Err(ExprError::UnexpectedToken(_))));
        assert!(matches!(evaluate("1 # 2"), Err(ExprError::UnexpectedChar { .. })));
        assert!(matches!(evaluate("nope(1)"), Err(ExprError::UnknownFunction(_))));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(evaluate(&deep), Err(ExprError::TooDeep(MAX_DEPTH)));
        let negations = format!("{}true", "not ".repeat(10_000));
        assert_eq!(evaluate(&negations), Err(ExprError::TooDeep(MAX_DEPTH)));
        let sum = vec!["1"; 10_000].join(" + ");
        assert_eq!(evaluate(&sum), Err(ExprError::TooDeep(MAX_DEPTH)));

        let shallow = format!("{}1{} = 1", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&shallow), Ok(Value::Bool(true)));
        assert_eq!(evaluate("not not not false"), Ok(Value::Bool(true)));
    }

    #[test]
    fn bool_coercion() {
        assert_eq!(Value::Int(0).to_bool(), Ok(false));
        assert_eq!(Value::Str("TRUE".into()).to_bool(), Ok(true));
        assert!(Value::Str("yes".into()).to_bool().is_err());
    }
}
