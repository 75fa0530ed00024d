//! The `expr` engine: a small recursive-descent parser over an expression
//! token stream plus an evaluator with Tcl's per-operator coercion rules.
//!
//! Expressions are parsed to a compact AST first so that `&&`, `||`, and
//! `?:` can skip evaluation of untaken branches (including their command
//! substitutions), then the tree is evaluated against the live interpreter
//! for `$var` and `[script]` operands.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::{
    error::FeatherError,
    eval::Evaluator,
    host::HostOps,
    list,
    number::{self, Num},
    parse::{self, ConstructScan, DollarScan, QuotedScan, TokenKind},
    status::FlowResult,
};

/// A computed expression value. Variables and command results enter as
/// `Str` (their string form) and are coerced per-operator; numeric literals
/// enter pre-parsed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Int(i64),
    Double(f64),
    Str(String),
}

impl Operand {
    pub fn from_bool(b: bool) -> Self {
        Self::Int(i64::from(b))
    }

    /// The value's string form.
    pub fn into_text(self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Double(d) => number::format_double(d),
            Self::Str(s) => s,
        }
    }

    pub fn text(&self) -> String {
        self.clone().into_text()
    }

    fn as_number(&self) -> Option<Num> {
        match self {
            Self::Int(i) => Some(Num::Int(*i)),
            Self::Double(d) => Some(Num::Double(*d)),
            Self::Str(s) => number::parse_number(s),
        }
    }

    fn as_boolean(&self) -> Result<bool, FeatherError> {
        match self {
            Self::Int(i) => Ok(*i != 0),
            Self::Double(d) => Ok(*d != 0.0),
            Self::Str(s) => {
                number::parse_boolean(s).ok_or_else(|| FeatherError::expected("boolean", s))
            }
        }
    }
}

// --- AST ----------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Int(i64),
    Double(f64),
    Str(String),
    /// Double-quoted string with substitutions, concatenated at eval time.
    Interp(Vec<Piece>),
    Var(String),
    Script(String),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
    Call(MathFunc, Vec<Node>),
}

#[derive(Debug, Clone)]
enum Piece {
    Lit(String),
    Var(String),
    Script(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    NumEq,
    NumNe,
    StrEq,
    StrNe,
    In,
    Ni,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Pow => "**",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::NumEq => "==",
            Self::NumNe => "!=",
            Self::StrEq => "eq",
            Self::StrNe => "ne",
            Self::In => "in",
            Self::Ni => "ni",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Math functions callable inside expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
enum MathFunc {
    Abs,
    Ceil,
    Floor,
    Round,
    Int,
    Double,
    Wide,
    Sqrt,
    Exp,
    Log,
    Log10,
    Pow,
    Fmod,
    Hypot,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Isnan,
    Isinf,
}

impl MathFunc {
    fn arity(self) -> usize {
        match self {
            Self::Pow | Self::Fmod | Self::Hypot | Self::Atan2 => 2,
            _ => 1,
        }
    }
}

// --- lexer --------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Double(f64),
    Str(String),
    Interp(Vec<TokPiece>),
    Var(String),
    Script(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Op(BinaryOp),
    Bang,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

#[derive(Debug, Clone, PartialEq)]
enum TokPiece {
    Lit(String),
    Var(String),
    Script(String),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(message: impl Into<String>) -> FeatherError {
        FeatherError::new(message)
    }

    fn next_tok(&mut self) -> Result<Option<Tok>, FeatherError> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return Ok(None);
        }
        let at = self.pos;
        let b = bytes[at];
        let tok = match b {
            b'(' => {
                self.pos += 1;
                Tok::LParen
            }
            b')' => {
                self.pos += 1;
                Tok::RParen
            }
            b',' => {
                self.pos += 1;
                Tok::Comma
            }
            b'?' => {
                self.pos += 1;
                Tok::Question
            }
            b':' => {
                self.pos += 1;
                Tok::Colon
            }
            b'!' => {
                if bytes.get(at + 1) == Some(&b'=') {
                    self.pos += 2;
                    Tok::Op(BinaryOp::NumNe)
                } else {
                    self.pos += 1;
                    Tok::Bang
                }
            }
            b'~' => {
                self.pos += 1;
                Tok::Tilde
            }
            b'*' => {
                if bytes.get(at + 1) == Some(&b'*') {
                    self.pos += 2;
                    Tok::Op(BinaryOp::Pow)
                } else {
                    self.pos += 1;
                    Tok::Star
                }
            }
            b'/' => {
                self.pos += 1;
                Tok::Slash
            }
            b'%' => {
                self.pos += 1;
                Tok::Percent
            }
            b'+' => {
                self.pos += 1;
                Tok::Plus
            }
            b'-' => {
                self.pos += 1;
                Tok::Minus
            }
            b'<' => match bytes.get(at + 1) {
                Some(b'<') => {
                    self.pos += 2;
                    Tok::Op(BinaryOp::Shl)
                }
                Some(b'=') => {
                    self.pos += 2;
                    Tok::Op(BinaryOp::Le)
                }
                _ => {
                    self.pos += 1;
                    Tok::Op(BinaryOp::Lt)
                }
            },
            b'>' => match bytes.get(at + 1) {
                Some(b'>') => {
                    self.pos += 2;
                    Tok::Op(BinaryOp::Shr)
                }
                Some(b'=') => {
                    self.pos += 2;
                    Tok::Op(BinaryOp::Ge)
                }
                _ => {
                    self.pos += 1;
                    Tok::Op(BinaryOp::Gt)
                }
            },
            b'=' => {
                if bytes.get(at + 1) == Some(&b'=') {
                    self.pos += 2;
                    Tok::Op(BinaryOp::NumEq)
                } else {
                    return Err(Self::error("syntax error in expression: single \"=\""));
                }
            }
            b'&' => {
                if bytes.get(at + 1) == Some(&b'&') {
                    self.pos += 2;
                    Tok::Op(BinaryOp::And)
                } else {
                    self.pos += 1;
                    Tok::Op(BinaryOp::BitAnd)
                }
            }
            b'|' => {
                if bytes.get(at + 1) == Some(&b'|') {
                    self.pos += 2;
                    Tok::Op(BinaryOp::Or)
                } else {
                    self.pos += 1;
                    Tok::Op(BinaryOp::BitOr)
                }
            }
            b'^' => {
                self.pos += 1;
                Tok::Op(BinaryOp::BitXor)
            }
            b'$' => match parse::scan_dollar(self.src, at) {
                DollarScan::Token(token, next) => {
                    self.pos = next;
                    Tok::Var(token.inner(self.src).to_owned())
                }
                DollarScan::Plain | DollarScan::Incomplete(_) => {
                    return Err(Self::error("syntax error in expression: invalid \"$\""));
                }
            },
            b'[' => match parse::scan_bracketed(self.src, at) {
                ConstructScan::Done(token, next) => {
                    self.pos = next;
                    Tok::Script(token.inner(self.src).to_owned())
                }
                ConstructScan::Incomplete(_) => {
                    return Err(Self::error("missing close-bracket in expression"));
                }
            },
            b'{' => match parse::scan_braced(self.src, at) {
                ConstructScan::Done(token, next) => {
                    self.pos = next;
                    Tok::Str(token.inner(self.src).to_owned())
                }
                ConstructScan::Incomplete(_) => {
                    return Err(Self::error("missing close-brace in expression"));
                }
            },
            b'"' => match parse::scan_quoted(self.src, at) {
                QuotedScan::Done(token, next) => {
                    self.pos = next;
                    let mut pieces = Vec::new();
                    for part in &token.parts {
                        match part.kind {
                            TokenKind::Literal => pieces.push(TokPiece::Lit(
                                parse::substitute_backslashes(part.inner(self.src)),
                            )),
                            TokenKind::Variable | TokenKind::BracedVariable => {
                                pieces.push(TokPiece::Var(part.inner(self.src).to_owned()));
                            }
                            TokenKind::Command => {
                                pieces.push(TokPiece::Script(part.inner(self.src).to_owned()));
                            }
                            _ => {}
                        }
                    }
                    Tok::Interp(pieces)
                }
                QuotedScan::Incomplete(_) => {
                    return Err(Self::error("missing close-quote in expression"));
                }
            },
            b'0'..=b'9' => self.lex_number(at)?,
            b'.' if bytes.get(at + 1).is_some_and(u8::is_ascii_digit) => self.lex_number(at)?,
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let mut i = at + 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                self.pos = i;
                Tok::Ident(self.src[at..i].to_owned())
            }
            other => {
                return Err(Self::error(format!(
                    "syntax error in expression: unexpected character \"{}\"",
                    other as char
                )));
            }
        };
        Ok(Some(tok))
    }

    fn lex_number(&mut self, at: usize) -> Result<Tok, FeatherError> {
        let bytes = self.src.as_bytes();
        let len = bytes.len();
        let mut i = at;
        if bytes[at] == b'0' && matches!(bytes.get(at + 1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')) {
            i = at + 2;
            while i < len && bytes[i].is_ascii_alphanumeric() {
                i += 1;
            }
        } else {
            while i < len && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < len && bytes[i] == b'.' {
                i += 1;
                while i < len && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < len && matches!(bytes[i], b'e' | b'E') {
                let mut j = i + 1;
                if j < len && matches!(bytes[j], b'+' | b'-') {
                    j += 1;
                }
                if j < len && bytes[j].is_ascii_digit() {
                    i = j + 1;
                    while i < len && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
        }
        let text = &self.src[at..i];
        self.pos = i;
        match number::parse_number(text) {
            Some(Num::Int(v)) => Ok(Tok::Int(v)),
            Some(Num::Double(v)) => Ok(Tok::Double(v)),
            None => Err(Self::error(format!("invalid number \"{text}\""))),
        }
    }
}

// --- parser -------------------------------------------------------------

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Option<Tok>>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            lexer: Lexer::new(src),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Option<&Tok>, FeatherError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_tok()?);
        }
        Ok(self.peeked.as_ref().unwrap().as_ref())
    }

    fn advance(&mut self) -> Result<Option<Tok>, FeatherError> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lexer.next_tok(),
        }
    }

    fn expect(&mut self, want: &Tok, what: &str) -> Result<(), FeatherError> {
        match self.advance()? {
            Some(ref tok) if tok == want => Ok(()),
            _ => Err(FeatherError::new(format!("missing {what} in expression"))),
        }
    }

    fn parse_full(&mut self) -> Result<Node, FeatherError> {
        let node = self.parse_ternary()?;
        if self.peek()?.is_some() {
            return Err(FeatherError::new("syntax error in expression: extra tokens after expression"));
        }
        Ok(node)
    }

    fn parse_ternary(&mut self) -> Result<Node, FeatherError> {
        let cond = self.parse_binary(0)?;
        if matches!(self.peek()?, Some(Tok::Question)) {
            self.advance()?;
            let then = self.parse_ternary()?;
            self.expect(&Tok::Colon, "\":\"")?;
            let otherwise = self.parse_ternary()?;
            return Ok(Node::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)));
        }
        Ok(cond)
    }

    /// Binary levels from loosest (`||`, level 0) to tightest (`* / %`).
    fn parse_binary(&mut self, level: usize) -> Result<Node, FeatherError> {
        const LEVELS: &[&[BinaryOp]] = &[
            &[BinaryOp::Or],
            &[BinaryOp::And],
            &[BinaryOp::BitOr],
            &[BinaryOp::BitXor],
            &[BinaryOp::BitAnd],
            &[BinaryOp::In, BinaryOp::Ni],
            &[BinaryOp::StrEq, BinaryOp::StrNe],
            &[BinaryOp::NumEq, BinaryOp::NumNe],
            &[BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge],
            &[BinaryOp::Shl, BinaryOp::Shr],
            &[BinaryOp::Add, BinaryOp::Sub],
            &[BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod],
        ];
        if level >= LEVELS.len() {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek()? {
                Some(&Tok::Op(op)) if LEVELS[level].contains(&op) => op,
                Some(Tok::Plus) if LEVELS[level].contains(&BinaryOp::Add) => BinaryOp::Add,
                Some(Tok::Minus) if LEVELS[level].contains(&BinaryOp::Sub) => BinaryOp::Sub,
                Some(Tok::Star) if LEVELS[level].contains(&BinaryOp::Mul) => BinaryOp::Mul,
                Some(Tok::Slash) if LEVELS[level].contains(&BinaryOp::Div) => BinaryOp::Div,
                Some(Tok::Percent) if LEVELS[level].contains(&BinaryOp::Mod) => BinaryOp::Mod,
                Some(Tok::Ident(word)) => match word.as_str() {
                    "eq" if LEVELS[level].contains(&BinaryOp::StrEq) => BinaryOp::StrEq,
                    "ne" if LEVELS[level].contains(&BinaryOp::StrNe) => BinaryOp::StrNe,
                    "in" if LEVELS[level].contains(&BinaryOp::In) => BinaryOp::In,
                    "ni" if LEVELS[level].contains(&BinaryOp::Ni) => BinaryOp::Ni,
                    _ => break,
                },
                _ => break,
            };
            self.advance()?;
            let right = self.parse_binary(level + 1)?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, FeatherError> {
        let op = match self.peek()? {
            Some(Tok::Minus) => Some(UnaryOp::Neg),
            Some(Tok::Plus) => Some(UnaryOp::Plus),
            Some(Tok::Bang) => Some(UnaryOp::Not),
            Some(Tok::Tilde) => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Node::Unary(op, Box::new(operand)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Node, FeatherError> {
        let base = self.parse_primary()?;
        if matches!(self.peek()?, Some(Tok::Op(BinaryOp::Pow))) {
            self.advance()?;
            // right-associative, and the exponent may carry unary signs
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Node, FeatherError> {
        let Some(tok) = self.advance()? else {
            return Err(FeatherError::new("empty expression"));
        };
        match tok {
            Tok::Int(v) => Ok(Node::Int(v)),
            Tok::Double(v) => Ok(Node::Double(v)),
            Tok::Str(s) => Ok(Node::Str(s)),
            Tok::Var(name) => Ok(Node::Var(name)),
            Tok::Script(script) => Ok(Node::Script(script)),
            Tok::Interp(pieces) => {
                if pieces.is_empty() {
                    return Ok(Node::Str(String::new()));
                }
                if let [TokPiece::Lit(text)] = pieces.as_slice() {
                    return Ok(Node::Str(text.clone()));
                }
                Ok(Node::Interp(
                    pieces
                        .into_iter()
                        .map(|p| match p {
                            TokPiece::Lit(s) => Piece::Lit(s),
                            TokPiece::Var(s) => Piece::Var(s),
                            TokPiece::Script(s) => Piece::Script(s),
                        })
                        .collect(),
                ))
            }
            Tok::LParen => {
                let inner = self.parse_ternary()?;
                self.expect(&Tok::RParen, "\")\"")?;
                Ok(inner)
            }
            Tok::Ident(word) => {
                if matches!(self.peek()?, Some(Tok::LParen)) {
                    self.advance()?;
                    let func = MathFunc::from_str(&word)
                        .map_err(|_| FeatherError::new(format!("unknown math function \"{word}\"")))?;
                    let mut args = Vec::new();
                    if !matches!(self.peek()?, Some(Tok::RParen)) {
                        loop {
                            args.push(self.parse_ternary()?);
                            if matches!(self.peek()?, Some(Tok::Comma)) {
                                self.advance()?;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&Tok::RParen, "\")\"")?;
                    if args.len() != func.arity() {
                        return Err(FeatherError::new(format!(
                            "wrong # args for math function \"{word}\""
                        )));
                    }
                    return Ok(Node::Call(func, args));
                }
                // bareword booleans are the only bare operands
                if number::parse_boolean(&word).is_some() && !word.bytes().all(|b| b.is_ascii_digit()) {
                    return Ok(Node::Str(word));
                }
                Err(FeatherError::new(format!("invalid bareword \"{word}\"")))
            }
            other => Err(FeatherError::new(format!(
                "syntax error in expression: unexpected {other:?}"
            ))),
        }
    }
}

// --- evaluation ---------------------------------------------------------

/// Evaluates expression text against the live interpreter.
pub(crate) fn eval_expr<H: HostOps>(ev: &mut Evaluator<'_, H>, text: &str) -> FlowResult<Operand> {
    let node = Parser::new(text).parse_full().map_err(|mut e| {
        e.set_error_code("TCL PARSE EXPR");
        e
    })?;
    eval_node(ev, &node)
}

/// Evaluates expression text and applies the boolean protocol to the result.
pub(crate) fn eval_expr_bool<H: HostOps>(ev: &mut Evaluator<'_, H>, text: &str) -> FlowResult<bool> {
    let operand = eval_expr(ev, text)?;
    Ok(operand.as_boolean()?)
}

fn eval_node<H: HostOps>(ev: &mut Evaluator<'_, H>, node: &Node) -> FlowResult<Operand> {
    match node {
        Node::Int(v) => Ok(Operand::Int(*v)),
        Node::Double(v) => Ok(Operand::Double(*v)),
        Node::Str(s) => Ok(Operand::Str(s.clone())),
        Node::Interp(pieces) => {
            let mut out = String::new();
            for piece in pieces {
                match piece {
                    Piece::Lit(s) => out.push_str(s),
                    Piece::Var(name) => {
                        let value = ev.var_read(name)?;
                        out.push_str(&ev.value_text(value));
                    }
                    Piece::Script(script) => {
                        let value = ev.eval_script(script)?;
                        out.push_str(&ev.value_text(value));
                    }
                }
            }
            Ok(Operand::Str(out))
        }
        Node::Var(name) => {
            let value = ev.var_read(name)?;
            Ok(Operand::Str(ev.value_text(value)))
        }
        Node::Script(script) => {
            let value = ev.eval_script(script)?;
            Ok(Operand::Str(ev.value_text(value)))
        }
        Node::Unary(op, operand) => eval_unary(ev, *op, operand),
        Node::Binary(op, left, right) => eval_binary(ev, *op, left, right),
        Node::Ternary(cond, then, otherwise) => {
            let test = eval_node(ev, cond)?.as_boolean()?;
            eval_node(ev, if test { then } else { otherwise })
        }
        Node::Call(func, args) => eval_call(ev, *func, args),
    }
}

fn eval_unary<H: HostOps>(ev: &mut Evaluator<'_, H>, op: UnaryOp, operand: &Node) -> FlowResult<Operand> {
    let value = eval_node(ev, operand)?;
    match op {
        UnaryOp::Not => Ok(Operand::from_bool(!value.as_boolean()?)),
        UnaryOp::BitNot => Ok(Operand::Int(!require_int(&value, "~")?)),
        UnaryOp::Neg => match require_number(&value, "-")? {
            Num::Int(i) => Ok(Operand::Int(i.wrapping_neg())),
            Num::Double(d) => Ok(Operand::Double(-d)),
        },
        UnaryOp::Plus => match require_number(&value, "+")? {
            Num::Int(i) => Ok(Operand::Int(i)),
            Num::Double(d) => Ok(Operand::Double(d)),
        },
    }
}

fn eval_binary<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    op: BinaryOp,
    left: &Node,
    right: &Node,
) -> FlowResult<Operand> {
    // short-circuit forms first
    match op {
        BinaryOp::And => {
            if !eval_node(ev, left)?.as_boolean()? {
                return Ok(Operand::from_bool(false));
            }
            return Ok(Operand::from_bool(eval_node(ev, right)?.as_boolean()?));
        }
        BinaryOp::Or => {
            if eval_node(ev, left)?.as_boolean()? {
                return Ok(Operand::from_bool(true));
            }
            return Ok(Operand::from_bool(eval_node(ev, right)?.as_boolean()?));
        }
        _ => {}
    }

    let a = eval_node(ev, left)?;
    let b = eval_node(ev, right)?;
    let symbol = op.symbol();
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, &a, &b)
        }
        BinaryOp::Shl | BinaryOp::Shr => {
            let x = require_int(&a, symbol)?;
            let n = require_int(&b, symbol)?;
            if n < 0 {
                return Err(FeatherError::new("negative shift argument").into());
            }
            let result = if op == BinaryOp::Shl {
                if n >= 64 { 0 } else { x.wrapping_shl(n as u32) }
            } else if n >= 64 {
                x >> 63
            } else {
                x >> n
            };
            Ok(Operand::Int(result))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(&a, &b);
            Ok(Operand::from_bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::NumEq => Ok(Operand::from_bool(compare(&a, &b) == Ordering::Equal)),
        BinaryOp::NumNe => Ok(Operand::from_bool(compare(&a, &b) != Ordering::Equal)),
        BinaryOp::StrEq => Ok(Operand::from_bool(a.text() == b.text())),
        BinaryOp::StrNe => Ok(Operand::from_bool(a.text() != b.text())),
        BinaryOp::In | BinaryOp::Ni => {
            let needle = a.text();
            let elements = list::parse_list(&b.text()).map_err(FeatherError::from)?;
            let found = elements.iter().any(|e| *e == needle);
            Ok(Operand::from_bool(if op == BinaryOp::In { found } else { !found }))
        }
        BinaryOp::BitAnd | BinaryOp::BitXor | BinaryOp::BitOr => {
            let x = require_int(&a, symbol)?;
            let y = require_int(&b, symbol)?;
            Ok(Operand::Int(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitXor => x ^ y,
                _ => x | y,
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn arithmetic(op: BinaryOp, a: &Operand, b: &Operand) -> FlowResult<Operand> {
    let symbol = op.symbol();
    let x = require_number(a, symbol)?;
    let y = require_number(b, symbol)?;
    if let (Num::Int(i), Num::Int(j)) = (x, y) {
        return int_arithmetic(op, i, j);
    }
    let (dx, dy) = (widen(x), widen(y));
    let result = match op {
        BinaryOp::Add => dx + dy,
        BinaryOp::Sub => dx - dy,
        BinaryOp::Mul => dx * dy,
        BinaryOp::Div => dx / dy,
        BinaryOp::Mod => dx % dy,
        BinaryOp::Pow => dx.powf(dy),
        _ => unreachable!(),
    };
    Ok(Operand::Double(result))
}

fn int_arithmetic(op: BinaryOp, i: i64, j: i64) -> FlowResult<Operand> {
    let result = match op {
        BinaryOp::Add => i.wrapping_add(j),
        BinaryOp::Sub => i.wrapping_sub(j),
        BinaryOp::Mul => i.wrapping_mul(j),
        BinaryOp::Div => {
            if j == 0 {
                return Err(FeatherError::div_by_zero().into());
            }
            floor_div(i, j)
        }
        BinaryOp::Mod => {
            if j == 0 {
                return Err(FeatherError::div_by_zero().into());
            }
            floor_mod(i, j)
        }
        BinaryOp::Pow => {
            if j < 0 {
                return Ok(Operand::Double((i as f64).powf(j as f64)));
            }
            let mut acc: i64 = 1;
            let mut base = i;
            let mut exp = j as u64;
            while exp > 0 {
                if exp & 1 == 1 {
                    acc = acc.wrapping_mul(base);
                }
                base = base.wrapping_mul(base);
                exp >>= 1;
            }
            acc
        }
        _ => unreachable!(),
    };
    Ok(Operand::Int(result))
}

/// Integer division truncating toward negative infinity, so the remainder
/// always carries the divisor's sign.
fn floor_div(i: i64, j: i64) -> i64 {
    let q = i.wrapping_div(j);
    if (i % j != 0) && ((i < 0) != (j < 0)) {
        q - 1
    } else {
        q
    }
}

fn floor_mod(i: i64, j: i64) -> i64 {
    let r = i.wrapping_rem(j);
    if r != 0 && ((r < 0) != (j < 0)) {
        r + j
    } else {
        r
    }
}

fn widen(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Double(d) => d,
    }
}

/// Numeric comparison when both sides read as numbers, lexicographic
/// otherwise.
fn compare(a: &Operand, b: &Operand) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return match (x, y) {
            (Num::Int(i), Num::Int(j)) => i.cmp(&j),
            (x, y) => widen(x).partial_cmp(&widen(y)).unwrap_or(Ordering::Greater),
        };
    }
    a.text().cmp(&b.text())
}

fn require_number(operand: &Operand, symbol: &str) -> Result<Num, FeatherError> {
    operand.as_number().ok_or_else(|| {
        FeatherError::new(format!(
            "can't use non-numeric string as operand of \"{symbol}\""
        ))
    })
}

fn require_int(operand: &Operand, symbol: &str) -> Result<i64, FeatherError> {
    match operand.as_number() {
        Some(Num::Int(i)) => Ok(i),
        Some(Num::Double(_)) => Err(FeatherError::new(format!(
            "can't use floating-point value as operand of \"{symbol}\""
        ))),
        None => Err(FeatherError::new(format!(
            "can't use non-numeric string as operand of \"{symbol}\""
        ))),
    }
}

fn domain_error() -> FeatherError {
    FeatherError::with_code(
        "domain error: argument not in valid range",
        "ARITH DOMAIN {domain error: argument not in valid range}",
    )
}

fn eval_call<H: HostOps>(ev: &mut Evaluator<'_, H>, func: MathFunc, args: &[Node]) -> FlowResult<Operand> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_node(ev, arg)?);
    }
    let num = |i: usize| -> Result<Num, FeatherError> { require_number(&values[i], "()") };
    let dbl = |i: usize| -> Result<f64, FeatherError> { Ok(widen(require_number(&values[i], "()")?)) };

    let result = match func {
        MathFunc::Abs => match num(0)? {
            Num::Int(i) => Operand::Int(i.wrapping_abs()),
            Num::Double(d) => Operand::Double(d.abs()),
        },
        MathFunc::Ceil => Operand::Double(dbl(0)?.ceil()),
        MathFunc::Floor => Operand::Double(dbl(0)?.floor()),
        MathFunc::Round => match num(0)? {
            Num::Int(i) => Operand::Int(i),
            Num::Double(d) => Operand::Int(d.round() as i64),
        },
        MathFunc::Int | MathFunc::Wide => match num(0)? {
            Num::Int(i) => Operand::Int(i),
            Num::Double(d) => {
                if d.is_nan() || d.is_infinite() {
                    return Err(domain_error().into());
                }
                Operand::Int(d.trunc() as i64)
            }
        },
        MathFunc::Double => Operand::Double(dbl(0)?),
        MathFunc::Sqrt => {
            let d = dbl(0)?;
            if d < 0.0 {
                return Err(domain_error().into());
            }
            Operand::Double(d.sqrt())
        }
        MathFunc::Exp => Operand::Double(dbl(0)?.exp()),
        MathFunc::Log => {
            let d = dbl(0)?;
            if d <= 0.0 {
                return Err(domain_error().into());
            }
            Operand::Double(d.ln())
        }
        MathFunc::Log10 => {
            let d = dbl(0)?;
            if d <= 0.0 {
                return Err(domain_error().into());
            }
            Operand::Double(d.log10())
        }
        MathFunc::Pow => Operand::Double(dbl(0)?.powf(dbl(1)?)),
        MathFunc::Fmod => {
            let (x, y) = (dbl(0)?, dbl(1)?);
            if y == 0.0 {
                return Err(domain_error().into());
            }
            Operand::Double(x % y)
        }
        MathFunc::Hypot => Operand::Double(dbl(0)?.hypot(dbl(1)?)),
        MathFunc::Sin => Operand::Double(dbl(0)?.sin()),
        MathFunc::Cos => Operand::Double(dbl(0)?.cos()),
        MathFunc::Tan => Operand::Double(dbl(0)?.tan()),
        MathFunc::Asin => {
            let d = dbl(0)?;
            if !(-1.0..=1.0).contains(&d) {
                return Err(domain_error().into());
            }
            Operand::Double(d.asin())
        }
        MathFunc::Acos => {
            let d = dbl(0)?;
            if !(-1.0..=1.0).contains(&d) {
                return Err(domain_error().into());
            }
            Operand::Double(d.acos())
        }
        MathFunc::Atan => Operand::Double(dbl(0)?.atan()),
        MathFunc::Atan2 => Operand::Double(dbl(0)?.atan2(dbl(1)?)),
        MathFunc::Sinh => Operand::Double(dbl(0)?.sinh()),
        MathFunc::Cosh => Operand::Double(dbl(0)?.cosh()),
        MathFunc::Tanh => Operand::Double(dbl(0)?.tanh()),
        MathFunc::Isnan => Operand::from_bool(dbl(0)?.is_nan()),
        MathFunc::Isinf => Operand::from_bool(dbl(0)?.is_infinite()),
    };
    Ok(result)
}
