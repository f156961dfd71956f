//! Inline expression lexer, AST, parser, and evaluator.
//!
//! Tokens of a data code line that are not `[Name(...)]` calls, and every
//! argument a built-in evaluates, go through this module:
//!
//! ```text
//! (i < 3)        "Hello"        i+1        Res("status") == "ok"
//! ```
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  relational  →  additive  →  multiplicative  →  unary  →
//!   primary

use regex::Regex;

use super::error::EvalError;
use super::value::Value;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the expression evaluator.
///
/// The [`Interpreter`](super::interp::Interpreter) implements this trait so
/// identifiers resolve against its environment and calls reach the function
/// registry.
pub trait EvalContext {
    /// Look up a variable.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Invoke a registered function with already-evaluated arguments.
    fn call_fn(&mut self, name: &str, args: Vec<Value>) -> Result<Value, EvalError>;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Str(String),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,
    RegexMatch,    // =/
    NotRegexMatch, // !/

    // Logical
    And, // &&
    Or,  // ||

    // Misc
    Comma,
    LParen,
    RParen,
    /// Unrecognised input; reported as a diagnostic rather than treated as EOF.
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if f(c)) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    fn read_number(&mut self, start: usize) -> Token {
        self.take_while(|c| c.is_ascii_digit());
        let digits = &self.src[start..self.pos];
        match digits.parse() {
            Ok(n) => Token::Int(n),
            // Too large for i64: keep the digits as text.
            Err(_) => Token::Str(digits.to_owned()),
        }
    }

    fn read_string(&mut self) -> Token {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => break,
                },
                Some('"') => break,
                Some(c) => s.push(c),
            }
        }
        Token::Str(s)
    }

    fn next_token(&mut self) -> Token {
        self.skip_ws();
        let start = self.pos;
        let ch = match self.advance() {
            None => return Token::Eof,
            Some(c) => c,
        };

        match ch {
            '0'..='9' => self.read_number(start),
            '"' => self.read_string(),
            c if c.is_alphabetic() || c == '_' => {
                self.take_while(|c| c.is_alphanumeric() || c == '_');
                Token::Ident(self.src[start..self.pos].to_owned())
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else if self.eat('/') {
                    Token::NotRegexMatch
                } else {
                    Token::Bang
                }
            }
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else if self.eat('/') {
                    Token::RegexMatch
                } else {
                    Token::Unknown('=')
                }
            }
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c => Token::Unknown(c),
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    RegexMatch,
    NotRegexMatch,
}

#[derive(Debug, Clone)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                Token::RegexMatch => BinOp::RegexMatch,
                Token::NotRegexMatch => BinOp::NotRegexMatch,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Token::Minus => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Bang => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let tok = self.advance();
        match tok {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.parse_expr()?);
                        while self.eat(&Token::Comma) {
                            args.push(self.parse_expr()?);
                        }
                    }
                    if !self.eat(&Token::RParen) {
                        return Err(format!("expected ')' after args to {name}"));
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(match name.as_str() {
                        "true" => Expr::Literal(Value::Bool(true)),
                        "false" => Expr::Literal(Value::Bool(false)),
                        _ => Expr::Var(name),
                    })
                }
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected ')'".into());
                }
                Ok(inner)
            }
            Token::Unknown(c) => Err(format!("unexpected character '{c}'")),
            Token::Eof => Err("empty expression".into()),
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

/// Parse an inline expression into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, EvalError> {
    let malformed = |msg: String| EvalError::MalformedExpression(format!("{}: {msg}", src.trim()));
    let tokens = Lexer::new(src).tokenize();
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr().map_err(malformed)?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(malformed(format!("unexpected trailing token {other:?}"))),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] AST node against the given context.
pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::Var(name) => ctx
            .get_var(name)
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            match op {
                UnaryOp::Neg => v.arith_neg().map_err(EvalError::Expression),
                UnaryOp::Not => Ok(Value::Bool(!truthy(&v)?)),
            }
        }

        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit for && and ||
            match op {
                BinOp::And => {
                    if !truthy(&eval_expr(lhs, ctx)?)? {
                        return Ok(Value::Bool(false));
                    }
                    return Ok(Value::Bool(truthy(&eval_expr(rhs, ctx)?)?));
                }
                BinOp::Or => {
                    if truthy(&eval_expr(lhs, ctx)?)? {
                        return Ok(Value::Bool(true));
                    }
                    return Ok(Value::Bool(truthy(&eval_expr(rhs, ctx)?)?));
                }
                _ => {}
            }
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binop(op, &l, &r)
        }

        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for ae in arg_exprs {
                args.push(eval_expr(ae, ctx)?);
            }
            ctx.call_fn(name, args)
        }
    }
}

fn truthy(v: &Value) -> Result<bool, EvalError> {
    v.as_bool().ok_or_else(|| EvalError::TypeMismatch {
        expected: "a boolean",
        found: v.type_name().to_owned(),
    })
}

fn eval_binop(op: &BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;
    let arith = |res: Result<Value, String>| res.map_err(EvalError::Expression);
    match op {
        BinOp::Add => arith(l.arith_add(r)),
        BinOp::Sub => arith(l.arith_sub(r)),
        BinOp::Mul => arith(l.arith_mul(r)),
        BinOp::Div => arith(l.arith_div(r)),
        BinOp::Rem => arith(l.arith_rem(r)),

        BinOp::Eq => Ok(Value::Bool(l.cmp_value(r) == Ordering::Equal)),
        BinOp::Ne => Ok(Value::Bool(l.cmp_value(r) != Ordering::Equal)),
        BinOp::Lt => Ok(Value::Bool(l.cmp_value(r) == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(l.cmp_value(r) != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(l.cmp_value(r) == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(l.cmp_value(r) != Ordering::Less)),

        BinOp::RegexMatch => regex_match(r, l).map(Value::Bool),
        BinOp::NotRegexMatch => regex_match(r, l).map(|m| Value::Bool(!m)),

        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn regex_match(pattern: &Value, text: &Value) -> Result<bool, EvalError> {
    let re = Regex::new(&pattern.to_string())
        .map_err(|e| EvalError::Expression(format!("invalid regex: {e}")))?;
    Ok(re.is_match(&text.to_string()))
}

/// Convenience: parse and evaluate an inline expression.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
