// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sandboxed applicability expression evaluator (C7).
//!
//! A fixed grammar over a whitelisted set of [`CompanyProfile`] attributes —
//! no host-language `eval`, no arbitrary method calls. Expressions are
//! parsed once into an [`Expr`] AST and walked directly; nothing here ever
//! constructs or runs Rust code from bundle text.
//!
//! Grammar (informal):
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := unary ("and" unary)*
//! unary      := "not" unary | primary
//! primary    := "(" expr ")" | "true" | "false" | comparison | membership
//! comparison := arith cmp_op arith
//! membership := literal "in" attr
//! arith      := term (("+" | "-") term)*
//! term       := factor (("*" | "/") factor)*
//! factor     := attr | number | string | "true" | "false"
//! cmp_op     := "==" | "!=" | ">=" | "<=" | ">" | "<"
//! ```

use compliance_core::{CompanyProfile, ListedStatus};
use compliance_error::{ComplianceError, ErrorKind, Result};

/// Whitelisted attributes an applicability expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attr {
    Employees,
    Turnover,
    ListedStatus,
    ReportingYear,
    ReportingYearStart,
    ReportingYearEnd,
    Jurisdictions,
    Regimes,
}

impl Attr {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "employees" => Ok(Self::Employees),
            "turnover" => Ok(Self::Turnover),
            "listed_status" => Ok(Self::ListedStatus),
            "reporting_year" => Ok(Self::ReportingYear),
            "reporting_year_start" => Ok(Self::ReportingYearStart),
            "reporting_year_end" => Ok(Self::ReportingYearEnd),
            "jurisdictions" => Ok(Self::Jurisdictions),
            "regimes" => Ok(Self::Regimes),
            other => Err(ComplianceError::new(
                ErrorKind::Validation,
                "applicability expression references a non-whitelisted symbol",
            )
            .with_context("reason_code", "UNKNOWN_SYMBOL")
            .with_context("attribute", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
}

/// An arithmetic/value expression appearing on either side of a comparison.
///
/// `Add`/`Sub`/`Mul`/`Div` only evaluate against numeric attributes; applying
/// them to a string- or list-valued attribute is a `TYPE_MISMATCH` error at
/// evaluation time, not a parse error — the grammar doesn't type-check attrs.
#[derive(Debug, Clone, PartialEq)]
enum ArithExpr {
    Attr(Attr),
    Number(f64),
    Str(String),
    Bool(bool),
    Add(Box<ArithExpr>, Box<ArithExpr>),
    Sub(Box<ArithExpr>, Box<ArithExpr>),
    Mul(Box<ArithExpr>, Box<ArithExpr>),
    Div(Box<ArithExpr>, Box<ArithExpr>),
}

/// Parsed applicability expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool),
    Compare(ArithExpr, CompareOp, ArithExpr),
    Membership(Literal, Attr),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    And,
    Or,
    Not,
    In,
    True,
    False,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Op("+"));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op("-"));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op("*"));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op("/"));
                i += 1;
            }
            '"' => {
                let mut j = i + 1;
                let mut s = String::new();
                while j < chars.len() && chars[j] != '"' {
                    s.push(chars[j]);
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(syntax_error("unterminated string literal"));
                }
                tokens.push(Token::Str(s));
                i = j + 1;
            }
            '>' | '<' | '=' | '!' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                match two.as_str() {
                    ">=" => {
                        tokens.push(Token::Op(">="));
                        i += 2;
                    }
                    "<=" => {
                        tokens.push(Token::Op("<="));
                        i += 2;
                    }
                    "==" => {
                        tokens.push(Token::Op("=="));
                        i += 2;
                    }
                    "!=" => {
                        tokens.push(Token::Op("!="));
                        i += 2;
                    }
                    _ if c == '>' => {
                        tokens.push(Token::Op(">"));
                        i += 1;
                    }
                    _ if c == '<' => {
                        tokens.push(Token::Op("<"));
                        i += 1;
                    }
                    _ => return Err(syntax_error("unexpected operator")),
                }
            }
            _ if c.is_ascii_digit() => {
                let mut j = i;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                    j += 1;
                }
                let text: String = chars[i..j].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| syntax_error("invalid numeric literal"))?;
                tokens.push(Token::Number(n));
                i = j;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut j = i;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[i..j].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word),
                });
                i = j;
            }
            other => {
                return Err(syntax_error(&format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn syntax_error(message: &str) -> ComplianceError {
    ComplianceError::new(ErrorKind::Validation, "applicability expression syntax error")
        .with_context("reason_code", "EXPRESSION_SYNTAX")
        .with_context("detail", message)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(syntax_error(&format!("expected {expected:?}, found {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Some(Token::Str(s)) => {
                self.advance();
                self.expect(&Token::In)?;
                let attr = self.parse_attr()?;
                Ok(Expr::Membership(Literal::Str(s), attr))
            }
            Some(Token::Ident(_)) | Some(Token::Number(_)) => {
                let lhs = self.parse_arith()?;
                let op = self.parse_compare_op()?;
                let rhs = self.parse_arith()?;
                Ok(Expr::Compare(lhs, op, rhs))
            }
            other => Err(syntax_error(&format!("unexpected token {other:?}"))),
        }
    }

    fn parse_attr(&mut self) -> Result<Attr> {
        match self.advance() {
            Some(Token::Ident(name)) => Attr::from_name(&name),
            other => Err(syntax_error(&format!("expected attribute name, found {other:?}"))),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp> {
        match self.advance() {
            Some(Token::Op("==")) => Ok(CompareOp::Eq),
            Some(Token::Op("!=")) => Ok(CompareOp::Ne),
            Some(Token::Op(">=")) => Ok(CompareOp::Ge),
            Some(Token::Op("<=")) => Ok(CompareOp::Le),
            Some(Token::Op(">")) => Ok(CompareOp::Gt),
            Some(Token::Op("<")) => Ok(CompareOp::Lt),
            other => Err(syntax_error(&format!("expected comparison operator, found {other:?}"))),
        }
    }

    fn parse_arith(&mut self) -> Result<ArithExpr> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Op("+")) => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = ArithExpr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Op("-")) => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = ArithExpr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<ArithExpr> {
        let mut lhs = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Op("*")) => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    lhs = ArithExpr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Op("/")) => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    lhs = ArithExpr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<ArithExpr> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(ArithExpr::Attr(Attr::from_name(&name)?)),
            Some(Token::Number(n)) => Ok(ArithExpr::Number(n)),
            Some(Token::Str(s)) => Ok(ArithExpr::Str(s)),
            Some(Token::True) => Ok(ArithExpr::Bool(true)),
            Some(Token::False) => Ok(ArithExpr::Bool(false)),
            other => Err(syntax_error(&format!("expected a value, found {other:?}"))),
        }
    }
}

/// Parse `source` into an [`Expr`], validating attribute names against the
/// whitelist as it goes.
///
/// # Errors
///
/// `ErrorKind::Validation` (`EXPRESSION_SYNTAX` or `UNKNOWN_SYMBOL`) on
/// any malformed or non-whitelisted expression.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(syntax_error("trailing tokens after expression"));
    }
    Ok(expr)
}

fn resolve_attr(attr: Attr, profile: &CompanyProfile) -> AttrValue {
    match attr {
        Attr::Employees => AttrValue::Number(profile.employees as f64),
        Attr::Turnover => AttrValue::Number(profile.turnover),
        Attr::ReportingYear => AttrValue::Number(profile.reporting_year as f64),
        Attr::ReportingYearStart => AttrValue::Str(profile.reporting_year_start.to_string()),
        Attr::ReportingYearEnd => AttrValue::Str(profile.reporting_year_end.to_string()),
        Attr::ListedStatus => AttrValue::Str(match profile.listed_status {
            ListedStatus::Listed => "listed".to_string(),
            ListedStatus::Unlisted => "unlisted".to_string(),
        }),
        Attr::Jurisdictions => AttrValue::List(profile.jurisdictions.clone()),
        Attr::Regimes => AttrValue::List(profile.regimes.clone()),
    }
}

enum AttrValue {
    Number(f64),
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

fn eval_arith(expr: &ArithExpr, profile: &CompanyProfile) -> Result<AttrValue> {
    match expr {
        ArithExpr::Attr(attr) => Ok(resolve_attr(*attr, profile)),
        ArithExpr::Number(n) => Ok(AttrValue::Number(*n)),
        ArithExpr::Str(s) => Ok(AttrValue::Str(s.clone())),
        ArithExpr::Bool(b) => Ok(AttrValue::Bool(*b)),
        ArithExpr::Add(l, r) => arith_numeric(l, r, profile, |a, b| a + b),
        ArithExpr::Sub(l, r) => arith_numeric(l, r, profile, |a, b| a - b),
        ArithExpr::Mul(l, r) => arith_numeric(l, r, profile, |a, b| a * b),
        ArithExpr::Div(l, r) => arith_numeric(l, r, profile, |a, b| a / b),
    }
}

fn arith_numeric(
    lhs: &ArithExpr,
    rhs: &ArithExpr,
    profile: &CompanyProfile,
    op: impl Fn(f64, f64) -> f64,
) -> Result<AttrValue> {
    match (eval_arith(lhs, profile)?, eval_arith(rhs, profile)?) {
        (AttrValue::Number(a), AttrValue::Number(b)) => Ok(AttrValue::Number(op(a, b))),
        _ => Err(type_mismatch("arithmetic operands must both be numeric")),
    }
}

/// Evaluate a parsed expression against `profile`.
///
/// # Errors
///
/// `ErrorKind::Validation` (`TYPE_MISMATCH`) if a comparison compares
/// incompatible types (e.g. a numeric attribute against a string literal).
pub fn evaluate(expr: &Expr, profile: &CompanyProfile) -> Result<bool> {
    match expr {
        Expr::Bool(b) => Ok(*b),
        Expr::And(l, r) => Ok(evaluate(l, profile)? && evaluate(r, profile)?),
        Expr::Or(l, r) => Ok(evaluate(l, profile)? || evaluate(r, profile)?),
        Expr::Not(inner) => Ok(!evaluate(inner, profile)?),
        Expr::Membership(Literal::Str(needle), attr) => match resolve_attr(*attr, profile) {
            AttrValue::List(items) => Ok(items.iter().any(|i| i == needle)),
            _ => Err(type_mismatch("membership target is not a list attribute")),
        },
        Expr::Compare(lhs, op, rhs) => {
            match (eval_arith(lhs, profile)?, eval_arith(rhs, profile)?) {
                (AttrValue::Number(l), AttrValue::Number(r)) => Ok(compare_f64(l, *op, r)),
                (AttrValue::Str(l), AttrValue::Str(r)) => Ok(compare_str(&l, *op, &r)),
                (AttrValue::Bool(l), AttrValue::Bool(r)) => compare_bool(l, *op, r),
                _ => Err(type_mismatch("comparison operand types do not match")),
            }
        }
    }
}

fn type_mismatch(detail: &str) -> ComplianceError {
    ComplianceError::new(ErrorKind::Validation, "applicability expression type mismatch")
        .with_context("reason_code", "TYPE_MISMATCH")
        .with_context("detail", detail)
}

fn compare_f64(lhs: f64, op: CompareOp, rhs: f64) -> bool {
    match op {
        CompareOp::Eq => (lhs - rhs).abs() < f64::EPSILON,
        CompareOp::Ne => (lhs - rhs).abs() >= f64::EPSILON,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
    }
}

fn compare_str(lhs: &str, op: CompareOp, rhs: &str) -> bool {
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
    }
}

fn compare_bool(lhs: bool, op: CompareOp, rhs: bool) -> Result<bool> {
    match op {
        CompareOp::Eq => Ok(lhs == rhs),
        CompareOp::Ne => Ok(lhs != rhs),
        _ => Err(type_mismatch("boolean comparison supports only == and !=")),
    }
}

/// Parse and evaluate `source` against `profile` in one step.
pub fn parse_and_evaluate(source: &str, profile: &CompanyProfile) -> Result<bool> {
    evaluate(&parse(source)?, profile)
}
