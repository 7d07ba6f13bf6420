//! Condition expressions for `if`
//!
//! A closed grammar parsed into a typed tree and evaluated against the
//! script variables:
//!
//! ```text
//! or      := and ("||" and)*
//! and     := compare ("&&" compare)*
//! compare := operand (("==" | "=" | "!=" | "<>" | "<" | "<=" | ">" | ">=") operand)?
//! operand := integer | "string" | %var | $var | "(" or ")"
//! ```
//!
//! Parsing stops at the first token that cannot continue the expression;
//! whatever follows is returned to the caller (the body of the `if`).

use crate::types::{Value, VarRef};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expected an operand at '{0}'")]
    ExpectedOperand(String),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Missing closing parenthesis")]
    UnclosedParen,
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Invalid variable '{0}'")]
    InvalidVariable(String),
    #[error("Cannot order non-numeric values '{0}' and '{1}'")]
    NotComparable(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(VarRef),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Var(VarRef),
    Cmp(CmpOp),
    And,
    Or,
    Open,
    Close,
    /// Anything the grammar does not know; ends the expression
    Other,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Look at the next token without consuming it. Returns the token and
    /// the offset just past it.
    fn peek(&self) -> Result<Option<(Token, usize)>, ExprError> {
        let trimmed = self.rest().trim_start();
        let start = self.src.len() - trimmed.len();
        let Some(c) = trimmed.chars().next() else {
            return Ok(None);
        };

        const SYMBOLS: [(&str, Token); 12] = [
            ("==", Token::Cmp(CmpOp::Eq)),
            ("!=", Token::Cmp(CmpOp::Ne)),
            ("<>", Token::Cmp(CmpOp::Ne)),
            ("<=", Token::Cmp(CmpOp::Le)),
            (">=", Token::Cmp(CmpOp::Ge)),
            ("&&", Token::And),
            ("||", Token::Or),
            ("=", Token::Cmp(CmpOp::Eq)),
            ("<", Token::Cmp(CmpOp::Lt)),
            (">", Token::Cmp(CmpOp::Gt)),
            ("(", Token::Open),
            (")", Token::Close),
        ];
        for (symbol, token) in SYMBOLS {
            if trimmed.starts_with(symbol) {
                return Ok(Some((token, start + symbol.len())));
            }
        }

        let word_len = |s: &str| {
            s.char_indices()
                .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_'))
                .map_or(s.len(), |(i, _)| i)
        };

        match c {
            '"' => {
                let body = &trimmed[1..];
                let end = body.find('"').ok_or(ExprError::UnterminatedString)?;
                Ok(Some((Token::Str(body[..end].to_string()), start + end + 2)))
            }
            '%' | '$' => {
                let len = 1 + word_len(&trimmed[1..]);
                let text = &trimmed[..len];
                let var = VarRef::parse(text)
                    .map_err(|_| ExprError::InvalidVariable(text.to_string()))?;
                Ok(Some((Token::Var(var), start + len)))
            }
            '-' | '0'..='9' => {
                let sign = usize::from(c == '-');
                let digits = trimmed[sign..]
                    .find(|ch: char| !ch.is_ascii_digit())
                    .unwrap_or(trimmed.len() - sign);
                if digits == 0 {
                    return Ok(Some((Token::Other, start)));
                }
                let text = &trimmed[..sign + digits];
                let n = text
                    .parse()
                    .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
                Ok(Some((Token::Int(n), start + text.len())))
            }
            _ => Ok(Some((Token::Other, start))),
        }
    }

    fn bump(&mut self, end: usize) {
        self.pos = end;
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl Parser<'_> {
    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.and()?;
        while let Some((Token::Or, end)) = self.lexer.peek()? {
            self.lexer.bump(end);
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.compare()?;
        while let Some((Token::And, end)) = self.lexer.peek()? {
            self.lexer.bump(end);
            let rhs = self.compare()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn compare(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.operand()?;
        if let Some((Token::Cmp(op), end)) = self.lexer.peek()? {
            self.lexer.bump(end);
            let rhs = self.operand()?;
            return Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn expected(&self) -> ExprError {
        ExprError::ExpectedOperand(self.lexer.rest().trim().to_string())
    }

    fn operand(&mut self) -> Result<Expr, ExprError> {
        let Some((token, end)) = self.lexer.peek()? else {
            return Err(self.expected());
        };
        let expr = match token {
            Token::Int(n) => Expr::Literal(Value::Int(n)),
            Token::Str(s) => Expr::Literal(Value::Str(s)),
            Token::Var(v) => Expr::Var(v),
            Token::Open => {
                self.lexer.bump(end);
                let inner = self.or()?;
                match self.lexer.peek()? {
                    Some((Token::Close, end)) => self.lexer.bump(end),
                    _ => return Err(ExprError::UnclosedParen),
                }
                return Ok(inner);
            }
            _ => return Err(self.expected()),
        };
        self.lexer.bump(end);
        Ok(expr)
    }
}

/// Parse a condition from the front of `src`, returning it together with
/// the unparsed remainder (leading whitespace trimmed).
pub fn parse_condition(src: &str) -> Result<(Expr, &str), ExprError> {
    let mut parser = Parser {
        lexer: Lexer { src, pos: 0 },
    };
    let expr = parser.or()?;
    Ok((expr, parser.lexer.rest().trim_start()))
}

impl Expr {
    pub fn eval(&self, lookup: &impl Fn(&VarRef) -> Value) -> Result<Value, ExprError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(var) => Ok(lookup(var)),
            Expr::And(lhs, rhs) => {
                let result = lhs.eval(lookup)?.is_truthy() && rhs.eval(lookup)?.is_truthy();
                Ok(Value::Int(i64::from(result)))
            }
            Expr::Or(lhs, rhs) => {
                let result = lhs.eval(lookup)?.is_truthy() || rhs.eval(lookup)?.is_truthy();
                Ok(Value::Int(i64::from(result)))
            }
            Expr::Compare(lhs, op, rhs) => {
                let (a, b) = (lhs.eval(lookup)?, rhs.eval(lookup)?);
                compare(&a, *op, &b).map(|r| Value::Int(i64::from(r)))
            }
        }
    }

    pub fn is_true(&self, lookup: &impl Fn(&VarRef) -> Value) -> Result<bool, ExprError> {
        self.eval(lookup).map(|v| v.is_truthy())
    }
}

fn compare(a: &Value, op: CmpOp, b: &Value) -> Result<bool, ExprError> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
        });
    }
    let (x, y) = (a.to_string(), b.to_string());
    match op {
        CmpOp::Eq => Ok(x == y),
        CmpOp::Ne => Ok(x != y),
        _ => Err(ExprError::NotComparable(x, y)),
    }
}
