//! Recursive-descent expression parser.
//!
//! Inside call parentheses arguments may be separated by commas or by
//! whitespace: after whitespace, a token that cannot continue the
//! expression starts the next argument, and so does a sign that is not
//! itself followed by whitespace (`pulse(0 -5 1n)` has three arguments,
//! `max(1 - x)` has one).

use std::f64::consts::{E, PI};

use devlib_core::node::is_ground_name;
use devlib_core::units::parse_number_prefix;

use super::Controller;
use super::ast::{BinaryOp, Expr};
use super::functions::{Func, TranFunc};

pub(super) struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Whitespace-separated arguments are active (inside call parens).
    in_args: bool,
    pub(super) controllers: Vec<Controller>,
}

type PResult<T> = Result<T, String>;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '.' | ':' | '$' | '!' | '[' | ']')
}

impl<'a> Parser<'a> {
    pub(super) fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            in_args: false,
            controllers: Vec::new(),
        }
    }

    pub(super) fn position(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// Skip whitespace; true if any was skipped.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos != start
    }

    /// After whitespace inside call args, a sign glued to the next token
    /// begins a new argument.
    fn sign_starts_argument(&self, skipped: bool) -> bool {
        self.in_args && skipped && self.peek_at(1).is_some_and(|c| !c.is_whitespace())
    }

    fn variable(&mut self, c: Controller) -> Expr {
        let idx = match self.controllers.iter().position(|x| *x == c) {
            Some(i) => i,
            None => {
                self.controllers.push(c);
                self.controllers.len() - 1
            }
        };
        Expr::Var(idx)
    }

    pub(super) fn expression(&mut self) -> PResult<Expr> {
        let mut left = self.term()?;
        loop {
            let save = self.pos;
            let skipped = self.skip_ws();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => {
                    self.pos = save;
                    break;
                }
            };
            if self.sign_starts_argument(skipped) {
                self.pos = save;
                break;
            }
            self.bump();
            let right = self.term()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut left = self.power()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            let op = match self.peek() {
                Some('*') if self.peek_at(1) != Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => {
                    self.pos = save;
                    break;
                }
            };
            self.bump();
            let right = self.power()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn power(&mut self) -> PResult<Expr> {
        let base = self.unary()?;
        let save = self.pos;
        self.skip_ws();
        if self.peek() == Some('^') {
            self.bump();
        } else if self.rest().starts_with("**") {
            self.bump();
            self.bump();
        } else {
            self.pos = save;
            return Ok(base);
        }
        let exp = self.power()?;
        Ok(Expr::binary(BinaryOp::Pow, base, exp))
    }

    fn unary(&mut self) -> PResult<Expr> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.bump();
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some('+') => {
                self.bump();
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.bump();
                let outer = std::mem::replace(&mut self.in_args, false);
                let e = self.expression();
                self.in_args = outer;
                let e = e?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(format!("expected ')' at {}", self.pos));
                }
                self.bump();
                Ok(e)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let (v, n) = parse_number_prefix(self.rest())
                    .ok_or_else(|| format!("bad number at {}", self.pos))?;
                self.pos += n;
                Ok(Expr::Constant(v))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            Some(c) => Err(format!("unexpected '{}' at {}", c, self.pos)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn name(&mut self) -> PResult<String> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.bump();
        }
        if self.pos == start {
            return Err(format!("expected a name at {}", self.pos));
        }
        Ok(self.input[start..self.pos].to_ascii_lowercase())
    }

    fn close_paren(&mut self) -> PResult<()> {
        self.skip_ws();
        if self.peek() != Some(')') {
            return Err(format!("expected ')' at {}", self.pos));
        }
        self.bump();
        Ok(())
    }

    fn identifier(&mut self) -> PResult<Expr> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let ident = self.input[start..self.pos].to_ascii_lowercase();

        let save = self.pos;
        self.skip_ws();
        if self.peek() != Some('(') {
            self.pos = save;
            return match ident.as_str() {
                "pi" => Ok(Expr::Constant(PI)),
                "e" => Ok(Expr::Constant(E)),
                "time" => Ok(Expr::Time),
                _ => Err(format!("unknown identifier '{}'", ident)),
            };
        }
        self.bump();

        match ident.as_str() {
            "v" => {
                let pos = self.name()?;
                self.skip_ws();
                let neg = if self.peek() == Some(',') {
                    self.bump();
                    Some(self.name()?)
                } else {
                    None
                };
                self.close_paren()?;
                let p = self.node_var(pos);
                Ok(match neg.map(|n| self.node_var(n)) {
                    Some(n) => Expr::binary(BinaryOp::Sub, p, n),
                    None => p,
                })
            }
            "i" => {
                let name = self.name()?;
                self.close_paren()?;
                Ok(self.variable(Controller::Branch(name)))
            }
            _ => {
                let args = self.arguments()?;
                self.call(&ident, args)
            }
        }
    }

    fn node_var(&mut self, name: String) -> Expr {
        if is_ground_name(&name) {
            Expr::Constant(0.0)
        } else {
            self.variable(Controller::Node(name))
        }
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        let outer = std::mem::replace(&mut self.in_args, true);
        let result = self.argument_list();
        self.in_args = outer;
        result
    }

    fn argument_list(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.bump(),
                Some(')') => {
                    self.bump();
                    return Ok(args);
                }
                Some(_) => {}
                None => return Err("unterminated argument list".to_string()),
            }
        }
    }

    fn call(&self, name: &str, args: Vec<Expr>) -> PResult<Expr> {
        if let Some(kind) = TranFunc::kind_for(name, args.len()) {
            let mut params = Vec::with_capacity(args.len());
            for a in &args {
                match a.constant() {
                    Some(v) => params.push(v),
                    None => return Err(format!("arguments of {} must be constant", name)),
                }
            }
            return TranFunc::new(kind, params).map(Expr::Tran);
        }
        let func = Func::lookup(name).ok_or_else(|| format!("unknown function '{}'", name))?;
        let (lo, hi) = func.arity();
        if args.len() < lo || args.len() > hi {
            return Err(format!("wrong number of arguments to {}", name));
        }
        Ok(Expr::Call { func, args })
    }
}
