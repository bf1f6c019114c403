//! Expression engine for derived fields.
//!
//! A derived field is written as an arithmetic expression over other field
//! names, e.g. `"(gamma - 1) * density * InternalEnergy"` with `gamma`
//! substituted as a number. Supported syntax:
//!
//! - arithmetic `+ - * /` and unary minus
//! - comparisons `== != < <= > >=` and boolean `&& || !` (true = 1.0, false = 0.0)
//! - functions `abs sqrt log log10 exp pow min max`
//!
//! Identifiers that are not function calls are field references.

use ap_core::{Error, Result};

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Node {
    Const(f64),
    Field(usize), // index into required_fields
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Ln,
    Log10,
    Exp,
    Pow,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "log" => Func::Ln,
            "log10" => Func::Log10,
            "exp" => Func::Exp,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Pow | Func::Min | Func::Max => 2,
            _ => 1,
        }
    }
}

// ── Compiled expression ────────────────────────────────────────

/// A parsed expression ready for evaluation against field columns.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    root: Node,
    /// Field names referenced by the expression, in order of first occurrence.
    pub required_fields: Vec<String>,
}

impl CompiledExpr {
    /// Parse an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(Error::Expression("empty expression".into()));
        }
        let mut parser = Parser { tokens: &tokens, pos: 0, fields: Vec::new() };
        let root = parser.parse_or()?;
        if let Some(t) = parser.peek() {
            return Err(Error::Expression(format!(
                "unexpected token {t:?} after expression '{input}'"
            )));
        }
        Ok(CompiledExpr { source: input.to_string(), root, required_fields: parser.fields })
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate for one element. `values` follows the order of `required_fields`.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval(&self.root, values)
    }

    /// Evaluate for `n` elements. `columns` follows the order of
    /// `required_fields`; each column must hold at least `n` values.
    pub fn eval_columns(&self, columns: &[&[f64]], n: usize) -> Vec<f64> {
        if columns.is_empty() {
            return vec![eval(&self.root, &[]); n];
        }
        let mut row = vec![0.0f64; columns.len()];
        (0..n)
            .map(|i| {
                for (slot, col) in row.iter_mut().zip(columns) {
                    *slot = col[i];
                }
                eval(&self.root, &row)
            })
            .collect()
    }
}

// ── Evaluation ─────────────────────────────────────────────────

#[inline]
fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval(node: &Node, vals: &[f64]) -> f64 {
    match node {
        Node::Const(c) => *c,
        Node::Field(i) => vals[*i],
        Node::Neg(a) => -eval(a, vals),
        Node::Not(a) => flag(eval(a, vals) <= 0.0),
        Node::Binary(op, a, b) => {
            let l = eval(a, vals);
            let r = eval(b, vals);
            match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => l / r,
                Op::Eq => flag((l - r).abs() < f64::EPSILON),
                Op::Ne => flag((l - r).abs() >= f64::EPSILON),
                Op::Lt => flag(l < r),
                Op::Le => flag(l <= r),
                Op::Gt => flag(l > r),
                Op::Ge => flag(l >= r),
                Op::And => flag(l > 0.0 && r > 0.0),
                Op::Or => flag(l > 0.0 || r > 0.0),
            }
        }
        Node::Call(f, args) => {
            let x = eval(&args[0], vals);
            match f {
                Func::Abs => x.abs(),
                Func::Sqrt => x.sqrt(),
                Func::Ln => x.ln(),
                Func::Log10 => x.log10(),
                Func::Exp => x.exp(),
                Func::Pow => x.powf(eval(&args[1], vals)),
                Func::Min => x.min(eval(&args[1], vals)),
                Func::Max => x.max(eval(&args[1], vals)),
            }
        }
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

const TWO_CHAR_OPS: [&str; 6] = ["&&", "||", "==", "!=", "<=", ">="];

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| input[i..].starts_with(**op)) {
            tokens.push(Token::Op(*op));
            i += 2;
            continue;
        }

        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '+' => tokens.push(Token::Op("+")),
            '-' => tokens.push(Token::Op("-")),
            '*' => tokens.push(Token::Op("*")),
            '/' => tokens.push(Token::Op("/")),
            '<' => tokens.push(Token::Op("<")),
            '>' => tokens.push(Token::Op(">")),
            '!' => tokens.push(Token::Op("!")),
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < bytes.len() {
                    let d = bytes[i] as char;
                    let exp_sign =
                        (d == '+' || d == '-') && i > start && matches!(bytes[i - 1], b'e' | b'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text = &input[start..i];
                let n = text
                    .parse::<f64>()
                    .map_err(|_| Error::Expression(format!("invalid number: '{text}'")))?;
                tokens.push(Token::Num(n));
                continue;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(input[start..i].to_string()));
                continue;
            }
            _ => return Err(Error::Expression(format!("unexpected character: '{c}'"))),
        }
        i += 1;
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    fields: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => Err(Error::Expression(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn field_index(&mut self, name: &str) -> usize {
        match self.fields.iter().position(|f| f == name) {
            Some(i) => i,
            None => {
                self.fields.push(name.to_string());
                self.fields.len() - 1
            }
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut lhs = self.parse_and()?;
        while self.eat_op(&["||"]).is_some() {
            let rhs = self.parse_and()?;
            lhs = Node::Binary(Op::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut lhs = self.parse_cmp()?;
        while self.eat_op(&["&&"]).is_some() {
            let rhs = self.parse_cmp()?;
            lhs = Node::Binary(Op::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Node> {
        let lhs = self.parse_sum()?;
        let op = match self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) {
            Some("==") => Op::Eq,
            Some("!=") => Op::Ne,
            Some("<") => Op::Lt,
            Some("<=") => Op::Le,
            Some(">") => Op::Gt,
            Some(">=") => Op::Ge,
            _ => return Ok(lhs),
        };
        let rhs = self.parse_sum()?;
        Ok(Node::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_sum(&mut self) -> Result<Node> {
        let mut lhs = self.parse_product()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.parse_product()?;
            let op = if op == "+" { Op::Add } else { Op::Sub };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Node> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.parse_unary()?;
            let op = if op == "*" { Op::Mul } else { Op::Div };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        match self.eat_op(&["-", "!"]) {
            Some("-") => Ok(Node::Neg(Box::new(self.parse_unary()?))),
            Some(_) => Ok(Node::Not(Box::new(self.parse_unary()?))),
            None => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Node> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Node::Const(n)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if matches!(self.peek(), Some(Token::LParen)) => {
                self.pos += 1;
                let func = Func::lookup(&name)
                    .ok_or_else(|| Error::Expression(format!("unknown function: '{name}'")))?;
                let mut args = vec![self.parse_or()?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.pos += 1;
                    args.push(self.parse_or()?);
                }
                self.expect(Token::RParen)?;
                if args.len() != func.arity() {
                    return Err(Error::Expression(format!(
                        "{name}() takes {} argument(s), got {}",
                        func.arity(),
                        args.len()
                    )));
                }
                Ok(Node::Call(func, args))
            }
            Some(Token::Ident(name)) => Ok(Node::Field(self.field_index(&name))),
            other => {
                Err(Error::Expression(format!("expected number, field name or '(', got {other:?}")))
            }
        }
    }
}
