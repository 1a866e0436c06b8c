//! Expression lexer, AST, parser, and evaluator.
//!
//! The language covers integer/float arithmetic, string comparison, the
//! ternary operator, assignment, glob (`=~`) and regex (`=/`) matching, and
//! function calls.
//!
//! Operator precedence (lowest → highest):
//!   comma  →  assign  →  ternary  →  or  →  and  →  relational  →
//!   additive  →  multiplicative  →  unary  →  primary

use std::cmp::Ordering;

use regex::Regex;

use super::value::Value;
use crate::error::EvalError;

/// Deepest allowed nesting of parentheses and unary operators.
const MAX_NESTING: usize = 64;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// What the evaluator can see of the outside world.
pub trait EvalContext {
    fn get_var(&self, name: &str) -> Option<Value>;

    fn set_var(&mut self, name: &str, value: Value) -> Result<(), EvalError>;

    /// Invoke a function by name.
    fn call_fn(&mut self, name: &str, args: Vec<Value>) -> Result<Value, EvalError>;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    GlobMatch,
    RegexMatch,
    NotGlobMatch,
    NotRegexMatch,

    And,
    Or,

    Assign,
    PlusAssign,
    MinusAssign,

    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { chars: src.chars().peekable() }
    }

    fn eat(&mut self, ch: char) -> bool {
        self.chars.next_if_eq(&ch).is_some()
    }

    fn take_while(&mut self, s: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.chars.next_if(|&c| pred(c)) {
            s.push(c);
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        if first == '0' && self.chars.next_if(|c| matches!(c, 'x' | 'X')).is_some() {
            let mut hex = String::new();
            self.take_while(&mut hex, |c| c.is_ascii_hexdigit());
            return Token::Int(i64::from_str_radix(&hex, 16).unwrap_or(0));
        }

        self.take_while(&mut s, |c| c.is_ascii_digit());
        let mut is_float = false;
        if self.eat('.') {
            is_float = true;
            s.push('.');
            self.take_while(&mut s, |c| c.is_ascii_digit());
        }
        if let Some(e) = self.chars.next_if(|c| matches!(c, 'e' | 'E')) {
            is_float = true;
            s.push(e);
            if let Some(sign) = self.chars.next_if(|c| matches!(c, '+' | '-')) {
                s.push(sign);
            }
            self.take_while(&mut s, |c| c.is_ascii_digit());
        }

        if is_float {
            Token::Float(s.parse().unwrap_or(0.0))
        } else {
            s.parse().map_or(Token::Float(s.parse().unwrap_or(0.0)), Token::Int)
        }
    }

    fn read_string(&mut self, quote: char) -> Token {
        let mut s = String::new();
        while let Some(c) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => break,
                },
                c if c == quote => break,
                c => s.push(c),
            }
        }
        Token::Str(s)
    }

    fn next_token(&mut self) -> Token {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(ch) = self.chars.next() else { return Token::Eof };

        match ch {
            '0'..='9' => self.read_number(ch),
            '"' | '\'' => self.read_string(ch),
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::from(c);
                self.take_while(&mut s, |c| c.is_alphanumeric() || c == '_');
                Token::Ident(s)
            }
            '+' if self.eat('=') => Token::PlusAssign,
            '+' => Token::Plus,
            '-' if self.eat('=') => Token::MinusAssign,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' if self.eat('=') => Token::Ne,
            '!' if self.eat('~') => Token::NotGlobMatch,
            '!' if self.eat('/') => Token::NotRegexMatch,
            '!' => Token::Bang,
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '=' if self.eat('=') => Token::Eq,
            '=' if self.eat('~') => Token::GlobMatch,
            '=' if self.eat('/') => Token::RegexMatch,
            '=' => Token::Assign,
            '?' => Token::Question,
            ':' => Token::Colon,
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
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
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
    GlobMatch,
    RegexMatch,
    NotGlobMatch,
    NotRegexMatch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(String, AssignOp, Box<Expr>),
    Call(String, Vec<Expr>),
    Comma(Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn syntax(msg: impl Into<String>) -> EvalError {
    EvalError::Syntax(msg.into())
}

impl Parser {
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

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, EvalError>) -> Result<T, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(syntax("expression nested too deeply"));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn parse_comma(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_assign()?;
        if self.peek() != &Token::Comma {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_assign()?);
        }
        Ok(Expr::Comma(exprs))
    }

    fn parse_assign(&mut self) -> Result<Expr, EvalError> {
        if let Token::Ident(name) = self.peek().clone() {
            let op = match self.tokens.get(self.pos + 1) {
                Some(Token::Assign) => Some(AssignOp::Set),
                Some(Token::PlusAssign) => Some(AssignOp::Add),
                Some(Token::MinusAssign) => Some(AssignOp::Sub),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 2;
                let rhs = self.nested(Self::parse_assign)?;
                return Ok(Expr::Assign(name, op, Box::new(rhs)));
            }
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_or()?;
        if !self.eat(&Token::Colon) {
            return Err(syntax("expected ':' in ternary"));
        }
        let otherwise = self.nested(Self::parse_ternary)?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                Token::GlobMatch => BinOp::GlobMatch,
                Token::RegexMatch => BinOp::RegexMatch,
                Token::NotGlobMatch => BinOp::NotGlobMatch,
                Token::NotRegexMatch => BinOp::NotRegexMatch,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
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

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
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

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        let inner = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary(op, Box::new(inner)))
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) if self.eat(&Token::LParen) => {
                let mut args = Vec::new();
                if self.peek() != &Token::RParen {
                    args.push(self.nested(Self::parse_assign)?);
                    while self.eat(&Token::Comma) {
                        args.push(self.nested(Self::parse_assign)?);
                    }
                }
                if !self.eat(&Token::RParen) {
                    return Err(syntax(format!("expected ')' after arguments to {name}")));
                }
                Ok(Expr::Call(name, args))
            }
            Token::Ident(name) => Ok(Expr::Var(name)),
            Token::LParen => {
                let inner = self.nested(Self::parse_comma)?;
                if !self.eat(&Token::RParen) {
                    return Err(syntax("expected ')'"));
                }
                Ok(inner)
            }
            Token::Eof => Err(syntax("unexpected end of expression")),
            Token::Unknown(c) => Err(syntax(format!("unexpected character '{c}'"))),
            other => Err(syntax(format!("unexpected token {other:?}"))),
        }
    }
}

/// Parse an expression string into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, EvalError> {
    let mut parser = Parser { tokens: Lexer::new(src).tokenize(), pos: 0, depth: 0 };
    let expr = parser.parse_comma()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(syntax(format!("trailing input at {other:?}"))),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::Var(name) => Ok(ctx.get_var(name).unwrap_or_default()),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            Ok(match op {
                UnaryOp::Neg => v.arith_neg(),
                UnaryOp::Not => Value::from(!v.as_bool()),
            })
        }

        Expr::Binary(BinOp::And, lhs, rhs) => {
            let truth = eval_expr(lhs, ctx)?.as_bool() && eval_expr(rhs, ctx)?.as_bool();
            Ok(Value::from(truth))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let truth = eval_expr(lhs, ctx)?.as_bool() || eval_expr(rhs, ctx)?.as_bool();
            Ok(Value::from(truth))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binop(*op, &l, &r)
        }

        Expr::Ternary(cond, then, otherwise) => {
            if eval_expr(cond, ctx)?.as_bool() {
                eval_expr(then, ctx)
            } else {
                eval_expr(otherwise, ctx)
            }
        }

        Expr::Assign(name, op, rhs) => {
            let rval = eval_expr(rhs, ctx)?;
            let new_val = match op {
                AssignOp::Set => rval,
                AssignOp::Add => ctx.get_var(name).unwrap_or_default().arith_add(&rval),
                AssignOp::Sub => ctx.get_var(name).unwrap_or_default().arith_sub(&rval),
            };
            ctx.set_var(name, new_val.clone())?;
            Ok(new_val)
        }

        Expr::Call(name, arg_exprs) => {
            let args = arg_exprs
                .iter()
                .map(|ae| eval_expr(ae, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            ctx.call_fn(name, args)
        }

        Expr::Comma(exprs) => {
            let mut last = Value::default();
            for e in exprs {
                last = eval_expr(e, ctx)?;
            }
            Ok(last)
        }
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let ord = || l.cmp_value(r);
    Ok(match op {
        BinOp::Add => l.arith_add(r),
        BinOp::Sub => l.arith_sub(r),
        BinOp::Mul => l.arith_mul(r),
        BinOp::Div => l.arith_div(r)?,
        BinOp::Rem => l.arith_rem(r)?,

        BinOp::Eq => Value::from(ord() == Ordering::Equal),
        BinOp::Ne => Value::from(ord() != Ordering::Equal),
        BinOp::Lt => Value::from(ord() == Ordering::Less),
        BinOp::Le => Value::from(ord() != Ordering::Greater),
        BinOp::Gt => Value::from(ord() == Ordering::Greater),
        BinOp::Ge => Value::from(ord() != Ordering::Less),

        BinOp::GlobMatch => Value::from(glob_match(&r.to_string(), &l.to_string())),
        BinOp::NotGlobMatch => Value::from(!glob_match(&r.to_string(), &l.to_string())),
        BinOp::RegexMatch => Value::from(regex_match(&r.to_string(), &l.to_string())),
        BinOp::NotRegexMatch => Value::from(!regex_match(&r.to_string(), &l.to_string())),

        BinOp::And | BinOp::Or => unreachable!("short-circuited in eval_expr"),
    })
}

// ── Matching ──────────────────────────────────────────────────────────────────

fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_inner(&p, &t)
}

fn glob_match_inner(p: &[char], t: &[char]) -> bool {
    match (p.first(), t.first()) {
        (None, None) => true,
        (Some('*'), _) => {
            let rest = &p[p.iter().take_while(|&&c| c == '*').count()..];
            (0..=t.len()).any(|i| glob_match_inner(rest, &t[i..]))
        }
        (Some('?'), Some(_)) => glob_match_inner(&p[1..], &t[1..]),
        (Some(pc), Some(tc)) if pc == tc => glob_match_inner(&p[1..], &t[1..]),
        _ => false,
    }
}

/// Invalid patterns never match.
fn regex_match(pattern: &str, text: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(text))
}

/// Parse and evaluate an expression string.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestCtx {
        vars: HashMap<String, Value>,
    }

    impl TestCtx {
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }
        fn set_var(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
            self.vars.insert(name.into(), value);
            Ok(())
        }
        fn call_fn(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, EvalError> {
            Err(EvalError::UnknownFunction(name.into()))
        }
    }

    fn eval(src: &str) -> Value {
        eval_str(src, &mut TestCtx::default()).expect("eval failed")
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("2.5"), Value::Float(2.5));
        assert_eq!(eval("\"hello\""), Value::Str("hello".into()));
        assert_eq!(eval("'héllo'"), Value::Str("héllo".into()));
        assert_eq!(eval("0xff"), Value::Int(255));
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("10 / 3"), Value::Int(3));
        assert_eq!(eval("10 % 3"), Value::Int(1));
        assert_eq!(eval("-(3 + 2)"), Value::Int(-5));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("3 == 3"), Value::Int(1));
        assert_eq!(eval("2 >= 3"), Value::Int(0));
        assert_eq!(eval("1 && 0"), Value::Int(0));
        assert_eq!(eval("0 || 1"), Value::Int(1));
        assert_eq!(eval("!0"), Value::Int(1));
        assert_eq!(eval("0 ? 10 : 20"), Value::Int(20));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval("\"roar\" + \"!\""), Value::Str("roar!".into()));
    }

    #[test]
    fn variables_and_assignment() {
        let mut ctx = TestCtx::default().with("x", Value::Int(7));
        assert_eq!(eval_str("x + 1", &mut ctx), Ok(Value::Int(8)));
        assert_eq!(eval_str("x += 5, x", &mut ctx), Ok(Value::Int(12)));
        assert_eq!(ctx.vars.get("x"), Some(&Value::Int(12)));
    }

    #[test]
    fn unknown_variables_are_empty() {
        assert_eq!(eval("nope"), Value::Str(String::new()));
    }

    #[test]
    fn matching_operators() {
        assert_eq!(eval("\"hello\" =~ \"h?l*\""), Value::Int(1));
        assert_eq!(eval("\"hello\" !~ \"x*\""), Value::Int(1));
        assert_eq!(eval("\"hello\" =/ \"^hel+o$\""), Value::Int(1));
        assert_eq!(eval("\"hello\" =/ \"(\""), Value::Int(0));
    }

    #[test]
    fn errors() {
        let mut ctx = TestCtx::default();
        assert_eq!(eval_str("1 / 0", &mut ctx), Err(EvalError::DivisionByZero));
        assert!(matches!(eval_str("1 +", &mut ctx), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("1 2", &mut ctx), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("(1", &mut ctx), Err(EvalError::Syntax(_))));
        assert_eq!(
            eval_str("zap(1)", &mut ctx),
            Err(EvalError::UnknownFunction("zap".into()))
        );
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let src = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(
            eval_str(&src, &mut TestCtx::default()),
            Err(EvalError::Syntax(_))
        ));
    }

    #[test]
    fn glob_star() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("foo*", "foobar"));
        assert!(!glob_match("foo*", "barfoo"));
        assert!(glob_match("f*r", "foobar"));
    }
}
