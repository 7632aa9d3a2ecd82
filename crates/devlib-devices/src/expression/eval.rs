//! Value and gradient evaluation.
//!
//! The gradient is accumulated in reverse: each node pushes its seed
//! times its local partial down to its operands.

use super::ast::{BinaryOp, Expr};

impl Expr {
    /// Value for variable values `x` at `time`.
    pub fn value(&self, x: &[f64], time: f64) -> f64 {
        match self {
            Expr::Constant(v) => *v,
            Expr::Var(i) => x.get(*i).copied().unwrap_or(0.0),
            Expr::Time => time,
            Expr::Binary { op, left, right } => {
                let l = left.value(x, time);
                let r = right.value(x, time);
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Pow => l.powf(r),
                }
            }
            Expr::Neg(e) => -e.value(x, time),
            Expr::Call { func, args } => {
                let a: Vec<f64> = args.iter().map(|e| e.value(x, time)).collect();
                func.eval(&a)
            }
            Expr::Tran(f) => f.eval(time),
        }
    }

    /// Value of a constant subtree.
    pub fn constant(&self) -> Option<f64> {
        self.is_constant().then(|| self.value(&[], 0.0))
    }

    /// Add `seed * d(self)/d(x_i)` into `grad[i]`.
    pub fn backprop(&self, x: &[f64], time: f64, seed: f64, grad: &mut [f64]) {
        if seed == 0.0 {
            return;
        }
        match self {
            Expr::Constant(_) | Expr::Time | Expr::Tran(_) => {}
            Expr::Var(i) => {
                if let Some(g) = grad.get_mut(*i) {
                    *g += seed;
                }
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Add => {
                    left.backprop(x, time, seed, grad);
                    right.backprop(x, time, seed, grad);
                }
                BinaryOp::Sub => {
                    left.backprop(x, time, seed, grad);
                    right.backprop(x, time, -seed, grad);
                }
                BinaryOp::Mul => {
                    let l = left.value(x, time);
                    let r = right.value(x, time);
                    left.backprop(x, time, seed * r, grad);
                    right.backprop(x, time, seed * l, grad);
                }
                BinaryOp::Div => {
                    let l = left.value(x, time);
                    let r = right.value(x, time);
                    left.backprop(x, time, seed / r, grad);
                    right.backprop(x, time, -seed * l / (r * r), grad);
                }
                BinaryOp::Pow => {
                    let l = left.value(x, time);
                    let r = right.value(x, time);
                    if !right.is_constant() || r != 0.0 {
                        left.backprop(x, time, seed * r * l.powf(r - 1.0), grad);
                    }
                    if !right.is_constant() && l > 0.0 {
                        right.backprop(x, time, seed * l.powf(r) * l.ln(), grad);
                    }
                }
            },
            Expr::Neg(e) => e.backprop(x, time, -seed, grad),
            Expr::Call { func, args } => {
                let a: Vec<f64> = args.iter().map(|e| e.value(x, time)).collect();
                for (i, arg) in args.iter().enumerate() {
                    arg.backprop(x, time, seed * func.partial(&a, i), grad);
                }
            }
        }
    }
}
