//! Built-in math functions and transient waveforms.

use std::f64::consts::{LN_10, PI};

/// Math function applied to argument expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Sgn,
    Step,
    Uramp,
    Pow,
    Min,
    Max,
    Limit,
}

impl Func {
    pub fn lookup(name: &str) -> Option<Func> {
        Some(match name.to_ascii_lowercase().as_str() {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "sgn" | "sign" => Func::Sgn,
            "u" | "step" => Func::Step,
            "uramp" => Func::Uramp,
            "pow" | "pwr" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            "limit" => Func::Limit,
            _ => return None,
        })
    }

    /// Accepted argument count range.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Func::Pow => (2, 2),
            Func::Min | Func::Max => (1, usize::MAX),
            Func::Limit => (3, 3),
            _ => (1, 1),
        }
    }

    pub fn eval(self, a: &[f64]) -> f64 {
        let x = a.first().copied().unwrap_or(0.0);
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Log10 => x.log10(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Sgn => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Func::Step => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Func::Uramp => x.max(0.0),
            Func::Pow => x.powf(a[1]),
            Func::Min => a.iter().copied().fold(f64::INFINITY, f64::min),
            Func::Max => a.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Func::Limit => x.max(a[1].min(a[2])).min(a[1].max(a[2])),
        }
    }

    /// Partial derivative with respect to argument `i`.
    pub fn partial(self, a: &[f64], i: usize) -> f64 {
        let x = a.first().copied().unwrap_or(0.0);
        match self {
            Func::Min | Func::Max => {
                let target = self.eval(a);
                let first = a.iter().position(|&v| v == target);
                if first == Some(i) { 1.0 } else { 0.0 }
            }
            Func::Pow => {
                if i == 0 {
                    a[1] * x.powf(a[1] - 1.0)
                } else if x > 0.0 {
                    x.powf(a[1]) * x.ln()
                } else {
                    0.0
                }
            }
            Func::Limit => {
                let (lo, hi) = (a[1].min(a[2]), a[1].max(a[2]));
                match i {
                    0 if x > lo && x < hi => 1.0,
                    1 | 2 if (x <= lo && a[i] == lo) || (x >= hi && a[i] == hi) => 1.0,
                    _ => 0.0,
                }
            }
            _ if i > 0 => 0.0,
            Func::Sin => x.cos(),
            Func::Cos => -x.sin(),
            Func::Tan => 1.0 / (x.cos() * x.cos()),
            Func::Atan => 1.0 / (1.0 + x * x),
            Func::Sinh => x.cosh(),
            Func::Cosh => x.sinh(),
            Func::Tanh => 1.0 - x.tanh() * x.tanh(),
            Func::Exp => x.exp(),
            Func::Ln => 1.0 / x,
            Func::Log10 => 1.0 / (x * LN_10),
            Func::Sqrt => {
                if x > 0.0 {
                    0.5 / x.sqrt()
                } else {
                    0.0
                }
            }
            Func::Abs => Func::Sgn.eval(a),
            Func::Sgn | Func::Step => 0.0,
            Func::Uramp => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Kind of transient waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranKind {
    Pulse,
    Sine,
    Exponential,
    Pwl,
}

/// Transient waveform with its constant parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TranFunc {
    pub kind: TranKind,
    pub params: Vec<f64>,
}

impl TranFunc {
    /// Waveform for a call name and argument count, if it is one.
    ///
    /// `sin` and `exp` with fewer than three arguments are math functions.
    pub fn kind_for(name: &str, nargs: usize) -> Option<TranKind> {
        match name.to_ascii_lowercase().as_str() {
            "pulse" => Some(TranKind::Pulse),
            "pwl" => Some(TranKind::Pwl),
            "sin" if nargs >= 3 => Some(TranKind::Sine),
            "exp" if nargs >= 3 => Some(TranKind::Exponential),
            _ => None,
        }
    }

    pub fn new(kind: TranKind, params: Vec<f64>) -> Result<Self, String> {
        let ok = match kind {
            TranKind::Pulse => (2..=7).contains(&params.len()),
            TranKind::Sine => (3..=6).contains(&params.len()),
            TranKind::Exponential => (3..=6).contains(&params.len()),
            TranKind::Pwl => params.len() >= 2 && params.len() % 2 == 0,
        };
        if !ok {
            return Err(format!("wrong number of arguments to {:?}", kind));
        }
        Ok(Self { kind, params })
    }

    fn p(&self, i: usize, default: f64) -> f64 {
        self.params.get(i).copied().unwrap_or(default)
    }

    pub fn eval(&self, t: f64) -> f64 {
        match self.kind {
            TranKind::Pulse => {
                let (v1, v2) = (self.p(0, 0.0), self.p(1, 0.0));
                let (td, tr, tf) = (self.p(2, 0.0), self.p(3, 0.0), self.p(4, 0.0));
                let pw = self.p(5, f64::INFINITY);
                let per = self.p(6, 0.0);
                let mut tt = t - td;
                if tt < 0.0 {
                    return v1;
                }
                if per > 0.0 {
                    tt %= per;
                }
                if tt < tr {
                    v1 + (v2 - v1) * tt / tr
                } else if tt < tr + pw {
                    v2
                } else if tt < tr + pw + tf {
                    v2 + (v1 - v2) * (tt - tr - pw) / tf
                } else {
                    v1
                }
            }
            TranKind::Sine => {
                let (vo, va, freq) = (self.p(0, 0.0), self.p(1, 0.0), self.p(2, 0.0));
                let (td, theta) = (self.p(3, 0.0), self.p(4, 0.0));
                let phase = self.p(5, 0.0) * PI / 180.0;
                if t < td {
                    return vo + va * phase.sin();
                }
                let tt = t - td;
                vo + va * (-tt * theta).exp() * (2.0 * PI * freq * tt + phase).sin()
            }
            TranKind::Exponential => {
                let (v1, v2) = (self.p(0, 0.0), self.p(1, 0.0));
                let (td1, tau1) = (self.p(2, 0.0), self.p(3, 0.0));
                let (td2, tau2) = (self.p(4, f64::INFINITY), self.p(5, 0.0));
                let rise = |dt: f64, tau: f64| {
                    if tau > 0.0 {
                        1.0 - (-dt / tau).exp()
                    } else {
                        1.0
                    }
                };
                let mut v = v1;
                if t >= td1 {
                    v += (v2 - v1) * rise(t - td1, tau1);
                }
                if t >= td2 {
                    v += (v1 - v2) * rise(t - td2, tau2);
                }
                v
            }
            TranKind::Pwl => {
                let pts: Vec<(f64, f64)> =
                    self.params.chunks(2).map(|c| (c[0], c[1])).collect();
                if t <= pts[0].0 {
                    return pts[0].1;
                }
                for w in pts.windows(2) {
                    let ((t0, v0), (t1, v1)) = (w[0], w[1]);
                    if t <= t1 {
                        if t1 <= t0 {
                            return v1;
                        }
                        return v0 + (v1 - v0) * (t - t0) / (t1 - t0);
                    }
                }
                pts[pts.len() - 1].1
            }
        }
    }

    /// Largest time step that resolves the waveform's features.
    pub fn time_limit(&self) -> Option<f64> {
        let positive_min = |vals: &[f64]| {
            vals.iter()
                .copied()
                .filter(|v| *v > 0.0 && v.is_finite())
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        };
        match self.kind {
            TranKind::Pulse => positive_min(&[
                self.p(3, 0.0),
                self.p(4, 0.0),
                self.p(5, 0.0),
                self.p(6, 0.0),
            ]),
            TranKind::Sine => {
                let freq = self.p(2, 0.0);
                (freq > 0.0).then(|| 1.0 / (20.0 * freq))
            }
            TranKind::Exponential => positive_min(&[self.p(3, 0.0), self.p(5, 0.0)]),
            TranKind::Pwl => {
                let steps: Vec<f64> = self
                    .params
                    .chunks(2)
                    .collect::<Vec<_>>()
                    .windows(2)
                    .map(|w| w[1][0] - w[0][0])
                    .collect();
                positive_min(&steps)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tran(kind: TranKind, p: &[f64]) -> TranFunc {
        TranFunc::new(kind, p.to_vec()).unwrap()
    }

    #[test]
    fn test_pulse_edges() {
        let f = tran(TranKind::Pulse, &[0.0, 5.0, 1.0, 1.0, 1.0, 2.0, 10.0]);
        assert_eq!(f.eval(0.5), 0.0);
        assert_eq!(f.eval(1.5), 2.5);
        assert_eq!(f.eval(3.0), 5.0);
        assert_eq!(f.eval(4.5), 2.5);
        assert_eq!(f.eval(6.0), 0.0);
        assert_eq!(f.eval(13.0), 5.0);
        assert_eq!(f.time_limit(), Some(1.0));
    }

    #[test]
    fn test_sine_and_delay() {
        let f = tran(TranKind::Sine, &[1.0, 2.0, 1.0, 1.0]);
        assert_eq!(f.eval(0.5), 1.0);
        assert!((f.eval(1.25) - 3.0).abs() < 1e-12);
        assert_eq!(f.time_limit(), Some(0.05));
    }

    #[test]
    fn test_exponential() {
        let f = tran(TranKind::Exponential, &[0.0, 1.0, 0.0, 1.0, 10.0, 1.0]);
        assert!((f.eval(1.0) - (1.0 - (-1f64).exp())).abs() < 1e-12);
        assert!(f.eval(40.0).abs() < 1e-9);
    }

    #[test]
    fn test_pwl() {
        let f = tran(TranKind::Pwl, &[0.0, 0.0, 1.0, 2.0, 3.0, 2.0]);
        assert_eq!(f.eval(0.5), 1.0);
        assert_eq!(f.eval(2.0), 2.0);
        assert_eq!(f.eval(9.0), 2.0);
        assert_eq!(f.time_limit(), Some(1.0));
        assert!(TranFunc::new(TranKind::Pwl, vec![0.0, 1.0, 2.0]).is_err());
    }

    #[test]
    fn test_math_partials() {
        assert_eq!(Func::Exp.partial(&[0.0], 0), 1.0);
        assert_eq!(Func::Pow.partial(&[3.0, 2.0], 0), 6.0);
        assert_eq!(Func::Max.partial(&[1.0, 4.0], 1), 1.0);
        assert_eq!(Func::Max.partial(&[1.0, 4.0], 0), 0.0);
        assert_eq!(Func::Limit.eval(&[5.0, 0.0, 2.0]), 2.0);
        assert_eq!(Func::Limit.partial(&[1.0, 0.0, 2.0], 0), 1.0);
    }

    #[test]
    fn test_sin_name_depends_on_arity() {
        assert_eq!(TranFunc::kind_for("sin", 1), None);
        assert_eq!(TranFunc::kind_for("SIN", 3), Some(TranKind::Sine));
        assert_eq!(TranFunc::kind_for("pulse", 2), Some(TranKind::Pulse));
    }
}
