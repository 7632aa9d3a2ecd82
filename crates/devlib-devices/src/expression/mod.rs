//! Parsed functions of circuit variables and time.
//!
//! A [`ParseTree`] is compiled from text such as `2*v(in, out) + i(vsense)^2`
//! or `pulse(0 5 1n 1n 1n 10n 20n)`. Its controlling variables are kept in
//! first-use order; the caller supplies their present values in that order
//! and receives the function value plus one partial derivative per
//! controller.

mod ast;
mod eval;
mod functions;
mod parser;

use std::fmt;

pub use ast::{BinaryOp, Expr};
pub use functions::{Func, TranFunc, TranKind};

use crate::error::{Error, Result};
use parser::Parser;

/// A controlling variable of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controller {
    /// Voltage of a node (lowercased name).
    Node(String),
    /// Current through the branch of a named voltage-type element.
    Branch(String),
}

/// Compiled expression with its ordered controller list.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    text: String,
    expr: Expr,
    controllers: Vec<Controller>,
}

impl ParseTree {
    /// Parse a complete expression.
    pub fn parse(text: &str) -> Result<Self> {
        let (tree, used) = Self::parse_prefix(text)?;
        if !text[used..].trim().is_empty() {
            return Err(Error::Expression(format!(
                "unexpected text after expression: '{}'",
                text[used..].trim()
            )));
        }
        Ok(tree)
    }

    /// Parse the longest expression at the start of `text`.
    ///
    /// Returns the tree and the number of bytes consumed.
    pub fn parse_prefix(text: &str) -> Result<(Self, usize)> {
        let mut p = Parser::new(text);
        let expr = p.expression().map_err(Error::Expression)?;
        let used = p.position();
        let tree = Self {
            text: text[..used].trim().to_string(),
            expr,
            controllers: p.controllers,
        };
        Ok((tree, used))
    }

    /// Build a tree directly from an expression node.
    pub fn from_expr(text: impl Into<String>, expr: Expr, controllers: Vec<Controller>) -> Self {
        Self {
            text: text.into(),
            expr,
            controllers,
        }
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn num_vars(&self) -> usize {
        self.controllers.len()
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate at `x` (one value per controller) and `time`.
    ///
    /// `derivs` must hold one slot per controller and is overwritten with
    /// the partial derivatives.
    pub fn eval(&self, x: &[f64], time: f64, derivs: &mut [f64]) -> Result<f64> {
        if x.len() != self.controllers.len() || derivs.len() != self.controllers.len() {
            return Err(Error::Expression(format!(
                "'{}' expects {} variables",
                self.text,
                self.controllers.len()
            )));
        }
        derivs.fill(0.0);
        let value = self.expr.value(x, time);
        self.expr.backprop(x, time, 1.0, derivs);
        if !value.is_finite() || derivs.iter().any(|d| !d.is_finite()) {
            return Err(Error::Expression(format!(
                "'{}' is not finite at time {}",
                self.text, time
            )));
        }
        Ok(value)
    }

    /// No controllers and no time dependence.
    pub fn is_constant(&self) -> bool {
        self.expr.is_constant()
    }

    pub fn constant_value(&self) -> Option<f64> {
        self.expr.constant()
    }

    pub fn time_dependent(&self) -> bool {
        self.expr.is_time_dependent()
    }

    /// Largest time step the waveforms in the tree tolerate.
    pub fn time_limit(&self) -> Option<f64> {
        self.expr.time_limit()
    }
}

impl fmt::Display for ParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(tree: &ParseTree, x: &[f64], t: f64) -> (f64, Vec<f64>) {
        let mut d = vec![0.0; tree.num_vars()];
        let v = tree.eval(x, t, &mut d).unwrap();
        (v, d)
    }

    #[test]
    fn test_constant_with_suffix() {
        let t = ParseTree::parse("2k * 3").unwrap();
        assert!(t.is_constant());
        assert_eq!(t.constant_value(), Some(6000.0));
    }

    #[test]
    fn test_precedence_and_power() {
        let t = ParseTree::parse("1 + 2 * 3 ^ 2").unwrap();
        assert_eq!(t.constant_value(), Some(19.0));
        let t = ParseTree::parse("2 ** 3").unwrap();
        assert_eq!(t.constant_value(), Some(8.0));
    }

    #[test]
    fn test_controllers_in_first_use_order() {
        let t = ParseTree::parse("v(b) * i(Vsense) + v(A, b)").unwrap();
        assert_eq!(
            t.controllers(),
            &[
                Controller::Node("b".into()),
                Controller::Branch("vsense".into()),
                Controller::Node("a".into()),
            ]
        );
    }

    #[test]
    fn test_ground_reference_is_constant() {
        let t = ParseTree::parse("v(1, 0)").unwrap();
        assert_eq!(t.num_vars(), 1);
    }

    #[test]
    fn test_gradient() {
        let t = ParseTree::parse("v(a)*v(b) + 3*v(a)^2").unwrap();
        let (v, d) = eval(&t, &[2.0, 5.0], 0.0);
        assert_eq!(v, 22.0);
        assert!((d[0] - 17.0).abs() < 1e-12);
        assert!((d[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_of_function_call() {
        let t = ParseTree::parse("exp(v(x)) / v(y)").unwrap();
        let (v, d) = eval(&t, &[0.0, 2.0], 0.0);
        assert!((v - 0.5).abs() < 1e-12);
        assert!((d[0] - 0.5).abs() < 1e-12);
        assert!((d[1] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_whitespace_separated_arguments() {
        let t = ParseTree::parse("pulse(0 -5 1n 1n 1n 10n)").unwrap();
        assert!(t.time_dependent());
        let mut d: [f64; 0] = [];
        assert_eq!(t.eval(&[], 5e-9, &mut d).unwrap(), -5.0);
        let t = ParseTree::parse("max(1 - 3, 0)").unwrap();
        assert_eq!(t.constant_value(), Some(0.0));
    }

    #[test]
    fn test_prefix_stops_at_keyword() {
        let (t, used) = ParseTree::parse_prefix("2*v(1) dc 5").unwrap();
        assert_eq!(t.to_string(), "2*v(1)");
        assert_eq!(&"2*v(1) dc 5"[used..], " dc 5");
    }

    #[test]
    fn test_parse_errors() {
        assert!(ParseTree::parse("v(1) +").is_err());
        assert!(ParseTree::parse("foo(1)").is_err());
        assert!(ParseTree::parse("pulse(v(1) 2)").is_err());
        assert!(ParseTree::parse("bogus").is_err());
        assert!(ParseTree::parse("1 2").is_err());
    }

    #[test]
    fn test_non_finite_is_an_error() {
        let t = ParseTree::parse("1 / v(a)").unwrap();
        let mut d = [0.0];
        assert!(t.eval(&[0.0], 0.0, &mut d).is_err());
    }

    #[test]
    fn test_time_limit_of_sine() {
        let t = ParseTree::parse("sin(0 1 1k)").unwrap();
        let lim = t.time_limit().unwrap();
        assert!((lim - 5e-5).abs() < 1e-15);
    }
}
