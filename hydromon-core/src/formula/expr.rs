//! Arithmetic expression compiler
//!
//! A recursive-descent parser producing a flat node arena. Grammar, lowest
//! precedence first:
//!
//! ```text
//! list    = expr { "," expr }
//! expr    = term { ("+" | "-") term }
//! term    = factor { ("*" | "/" | "%") factor }
//! factor  = power { "^" power }
//! power   = { "-" | "+" } base
//! base    = number | variable | constant
//!         | function0 [ "(" ")" ]
//!         | function1 power
//!         | function1 "(" list ")"
//!         | function2 "(" expr "," expr ")"
//!         | "(" list ")"
//! ```
//!
//! `^` is left associative and unary minus binds tighter than `^`, so
//! `-2^2` is `4` and `2^3^2` is `64`. The comma operator evaluates both sides
//! and yields the right one.
//!
//! Compiling once and evaluating many times keeps the per-cycle cost to a
//! single walk over at most [`EXPR_NODES`] nodes.

use heapless::Vec;
use libm::{
    acos, asin, atan, atan2, ceil, cos, cosh, exp, fabs, floor, fmod, log, log10, pow, sin, sinh,
    sqrt, tan, tanh,
};

use crate::constants::buffers::EXPR_NODES;
use crate::errors::{FormulaError, FormulaResult};

/// Largest argument accepted by `fac`, `ncr` and `npr`
const MAX_FACTORIAL: f64 = 170.0;

/// Deepest parenthesis nesting accepted
const MAX_DEPTH: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unary {
    Neg,
    Abs,
    Acos,
    Asin,
    Atan,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Fac,
    Floor,
    Ln,
    Log10,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Binary {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Atan2,
    Ncr,
    Npr,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Const(f64),
    Var(u8),
    Unary(Unary, u8),
    Binary(Binary, u8, u8),
}

enum Callable {
    Constant(f64),
    One(Unary),
    Two(Binary),
}

fn lookup(name: &str) -> Option<Callable> {
    use Callable::*;
    let c = match name {
        "pi" => Constant(core::f64::consts::PI),
        "e" => Constant(core::f64::consts::E),
        "abs" => One(Unary::Abs),
        "acos" => One(Unary::Acos),
        "asin" => One(Unary::Asin),
        "atan" => One(Unary::Atan),
        "ceil" => One(Unary::Ceil),
        "cos" => One(Unary::Cos),
        "cosh" => One(Unary::Cosh),
        "exp" => One(Unary::Exp),
        "fac" => One(Unary::Fac),
        "floor" => One(Unary::Floor),
        "ln" => One(Unary::Ln),
        "log" | "log10" => One(Unary::Log10),
        "sin" => One(Unary::Sin),
        "sinh" => One(Unary::Sinh),
        "sqrt" => One(Unary::Sqrt),
        "tan" => One(Unary::Tan),
        "tanh" => One(Unary::Tanh),
        "atan2" => Two(Binary::Atan2),
        "ncr" => Two(Binary::Ncr),
        "npr" => Two(Binary::Npr),
        "pow" => Two(Binary::Pow),
        _ => return None,
    };
    Some(c)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Number(f64),
    Ident(&'a str),
    Op(u8),
    Open,
    Close,
    Sep,
    End,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    token: Token<'a>,
    token_pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> FormulaResult<Self> {
        let mut lexer = Self { src, pos: 0, token: Token::End, token_pos: 0 };
        lexer.advance()?;
        Ok(lexer)
    }

    fn advance(&mut self) -> FormulaResult<()> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        self.token_pos = self.pos;

        let Some(&c) = bytes.get(self.pos) else {
            self.token = Token::End;
            return Ok(());
        };

        if c.is_ascii_digit() || c == b'.' {
            self.token = Token::Number(self.number()?);
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let start = self.pos;
            while self.pos < bytes.len() && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_') {
                self.pos += 1;
            }
            self.token = Token::Ident(&self.src[start..self.pos]);
        } else {
            self.pos += 1;
            self.token = match c {
                b'+' | b'-' | b'*' | b'/' | b'%' | b'^' => Token::Op(c),
                b'(' => Token::Open,
                b')' => Token::Close,
                b',' => Token::Sep,
                _ => return Err(FormulaError::UnexpectedCharacter { position: self.token_pos }),
            };
        }
        Ok(())
    }

    fn number(&mut self) -> FormulaResult<f64> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() && (bytes[self.pos].is_ascii_digit() || bytes[self.pos] == b'.') {
            self.pos += 1;
        }
        if self.pos < bytes.len() && (bytes[self.pos] == b'e' || bytes[self.pos] == b'E') {
            let mut end = self.pos + 1;
            if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
                end += 1;
            }
            if end < bytes.len() && bytes[end].is_ascii_digit() {
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                self.pos = end;
            }
        }
        self.src[start..self.pos]
            .parse::<f64>()
            .map_err(|_| FormulaError::UnexpectedCharacter { position: start })
    }
}

/// A compiled expression over a set of named variables
#[derive(Debug, Clone)]
pub struct Expr {
    nodes: Vec<Node, EXPR_NODES>,
    root: u8,
}

struct Parser<'a, 'v> {
    lexer: Lexer<'a>,
    vars: &'v [&'v str],
    nodes: Vec<Node, EXPR_NODES>,
    depth: u8,
}

impl Expr {
    /// Compile `src`, resolving identifiers against `vars` by position.
    pub fn compile(src: &str, vars: &[&str]) -> FormulaResult<Self> {
        if src.trim().is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser { lexer: Lexer::new(src)?, vars, nodes: Vec::new(), depth: 0 };
        let root = parser.list()?;
        if parser.lexer.token != Token::End {
            return Err(FormulaError::UnexpectedToken { position: parser.lexer.token_pos });
        }
        Ok(Self { nodes: parser.nodes, root })
    }

    /// Evaluate with `values` bound to the variables given at compile time.
    ///
    /// Missing values read as 0.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.eval_node(self.root, values)
    }

    fn eval_node(&self, idx: u8, values: &[f64]) -> f64 {
        match self.nodes[usize::from(idx)] {
            Node::Const(v) => v,
            Node::Var(i) => values.get(usize::from(i)).copied().unwrap_or(0.0),
            Node::Unary(op, a) => apply_unary(op, self.eval_node(a, values)),
            Node::Binary(op, a, b) => {
                let a = self.eval_node(a, values);
                let b = self.eval_node(b, values);
                apply_binary(op, a, b)
            }
        }
    }

}

impl<'a, 'v> Parser<'a, 'v> {
    fn push(&mut self, node: Node) -> FormulaResult<u8> {
        let idx = u8::try_from(self.nodes.len()).map_err(|_| FormulaError::TooComplex)?;
        self.nodes.push(node).map_err(|_| FormulaError::TooComplex)?;
        Ok(idx)
    }

    fn unexpected(&self) -> FormulaError {
        FormulaError::UnexpectedToken { position: self.lexer.token_pos }
    }

    fn expect(&mut self, token: Token<'_>) -> FormulaResult<()> {
        if self.lexer.token != token {
            return Err(self.unexpected());
        }
        self.lexer.advance()
    }

    fn list(&mut self) -> FormulaResult<u8> {
        let mut left = self.expr()?;
        while self.lexer.token == Token::Sep {
            self.lexer.advance()?;
            let right = self.expr()?;
            left = self.push(Node::Binary(Binary::Comma, left, right))?;
        }
        Ok(left)
    }

    fn expr(&mut self) -> FormulaResult<u8> {
        let mut left = self.term()?;
        while let Token::Op(c @ (b'+' | b'-')) = self.lexer.token {
            self.lexer.advance()?;
            let right = self.term()?;
            let op = if c == b'+' { Binary::Add } else { Binary::Sub };
            left = self.push(Node::Binary(op, left, right))?;
        }
        Ok(left)
    }

    fn term(&mut self) -> FormulaResult<u8> {
        let mut left = self.factor()?;
        while let Token::Op(c @ (b'*' | b'/' | b'%')) = self.lexer.token {
            self.lexer.advance()?;
            let right = self.factor()?;
            let op = match c {
                b'*' => Binary::Mul,
                b'/' => Binary::Div,
                _ => Binary::Rem,
            };
            left = self.push(Node::Binary(op, left, right))?;
        }
        Ok(left)
    }

    fn factor(&mut self) -> FormulaResult<u8> {
        let mut left = self.power()?;
        while self.lexer.token == Token::Op(b'^') {
            self.lexer.advance()?;
            let right = self.power()?;
            left = self.push(Node::Binary(Binary::Pow, left, right))?;
        }
        Ok(left)
    }

    fn power(&mut self) -> FormulaResult<u8> {
        let mut negate = false;
        while let Token::Op(c @ (b'+' | b'-')) = self.lexer.token {
            if c == b'-' {
                negate = !negate;
            }
            self.lexer.advance()?;
        }
        let base = self.base()?;
        if negate {
            self.push(Node::Unary(Unary::Neg, base))
        } else {
            Ok(base)
        }
    }

    // Every nested construct (parentheses, function arguments, prefix
    // functions) passes through here, so this bounds the recursion.
    fn base(&mut self) -> FormulaResult<u8> {
        if self.depth >= MAX_DEPTH {
            return Err(FormulaError::TooComplex);
        }
        self.depth += 1;
        let node = self.operand();
        self.depth -= 1;
        node
    }

    fn operand(&mut self) -> FormulaResult<u8> {
        match self.lexer.token {
            Token::Number(v) => {
                self.lexer.advance()?;
                self.push(Node::Const(v))
            }
            Token::Open => {
                self.lexer.advance()?;
                let inner = self.list()?;
                self.expect(Token::Close)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                let position = self.lexer.token_pos;
                self.lexer.advance()?;
                if let Some(i) = self.vars.iter().position(|v| *v == name) {
                    let i = u8::try_from(i).map_err(|_| FormulaError::TooComplex)?;
                    return self.push(Node::Var(i));
                }
                match lookup(name) {
                    Some(Callable::Constant(v)) => {
                        if self.lexer.token == Token::Open {
                            self.lexer.advance()?;
                            self.expect(Token::Close)?;
                        }
                        self.push(Node::Const(v))
                    }
                    Some(Callable::One(op)) => {
                        let arg = if self.lexer.token == Token::Open {
                            self.lexer.advance()?;
                            let arg = self.list()?;
                            self.expect(Token::Close)?;
                            arg
                        } else {
                            self.power()?
                        };
                        self.push(Node::Unary(op, arg))
                    }
                    Some(Callable::Two(op)) => {
                        self.expect(Token::Open)?;
                        let a = self.expr()?;
                        self.expect(Token::Sep)?;
                        let b = self.expr()?;
                        self.expect(Token::Close)?;
                        self.push(Node::Binary(op, a, b))
                    }
                    None => Err(FormulaError::UnknownIdentifier { position }),
                }
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn factorial(a: f64) -> f64 {
    if a < 0.0 || a.is_nan() {
        return f64::NAN;
    }
    if a > MAX_FACTORIAL {
        return f64::INFINITY;
    }
    let n = a as u32;
    (2..=n).fold(1.0, |acc, k| acc * f64::from(k))
}

fn combinations(n: f64, r: f64) -> f64 {
    if n < 0.0 || r < 0.0 || n < r || n.is_nan() || r.is_nan() {
        return f64::NAN;
    }
    if n > MAX_FACTORIAL {
        return f64::INFINITY;
    }
    let (n, mut r) = (n as u32, r as u32);
    if r > n / 2 {
        r = n - r;
    }
    (1..=r).fold(1.0, |acc, i| acc * f64::from(n - r + i) / f64::from(i))
}

fn apply_unary(op: Unary, a: f64) -> f64 {
    match op {
        Unary::Neg => -a,
        Unary::Abs => fabs(a),
        Unary::Acos => acos(a),
        Unary::Asin => asin(a),
        Unary::Atan => atan(a),
        Unary::Ceil => ceil(a),
        Unary::Cos => cos(a),
        Unary::Cosh => cosh(a),
        Unary::Exp => exp(a),
        Unary::Fac => factorial(a),
        Unary::Floor => floor(a),
        Unary::Ln => log(a),
        Unary::Log10 => log10(a),
        Unary::Sin => sin(a),
        Unary::Sinh => sinh(a),
        Unary::Sqrt => sqrt(a),
        Unary::Tan => tan(a),
        Unary::Tanh => tanh(a),
    }
}

fn apply_binary(op: Binary, a: f64, b: f64) -> f64 {
    match op {
        Binary::Add => a + b,
        Binary::Sub => a - b,
        Binary::Mul => a * b,
        Binary::Div => a / b,
        Binary::Rem => fmod(a, b),
        Binary::Pow => pow(a, b),
        Binary::Atan2 => atan2(a, b),
        Binary::Ncr => combinations(a, b),
        Binary::Npr => combinations(a, b) * factorial(b),
        Binary::Comma => b,
    }
}
