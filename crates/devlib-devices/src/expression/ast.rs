//! Expression tree nodes.

use super::functions::{Func, TranFunc};

/// Expression node. Controlling variables are indices into the owning
/// tree's controller list.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(f64),
    /// Controlling variable (node voltage or branch current).
    Var(usize),
    Time,
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg(Box<Expr>),
    Call { func: Func, args: Vec<Expr> },
    /// Transient waveform of time with constant parameters.
    Tran(TranFunc),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Expr {
    pub(super) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Whether the node reads no variables and no time.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Constant(_) => true,
            Expr::Var(_) | Expr::Time | Expr::Tran(_) => false,
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Neg(e) => e.is_constant(),
            Expr::Call { args, .. } => args.iter().all(Expr::is_constant),
        }
    }

    pub fn is_time_dependent(&self) -> bool {
        match self {
            Expr::Time | Expr::Tran(_) => true,
            Expr::Constant(_) | Expr::Var(_) => false,
            Expr::Binary { left, right, .. } => {
                left.is_time_dependent() || right.is_time_dependent()
            }
            Expr::Neg(e) => e.is_time_dependent(),
            Expr::Call { args, .. } => args.iter().any(Expr::is_time_dependent),
        }
    }

    /// Smallest time-step limit of any transient waveform below this node.
    pub fn time_limit(&self) -> Option<f64> {
        let pick = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, None) => x,
            (None, y) => y,
        };
        match self {
            Expr::Tran(f) => f.time_limit(),
            Expr::Constant(_) | Expr::Var(_) | Expr::Time => None,
            Expr::Binary { left, right, .. } => pick(left.time_limit(), right.time_limit()),
            Expr::Neg(e) => e.time_limit(),
            Expr::Call { args, .. } => args.iter().map(Expr::time_limit).fold(None, pick),
        }
    }
}
