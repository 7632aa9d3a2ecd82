//! Typed parameter values exchanged through `set_param` / `ask_inst`.

use num_complex::Complex64;

use devlib_core::NodeId;

use crate::expression::ParseTree;

/// Scalar kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Flag,
    Int,
    Real,
    Complex,
    Str,
    /// Name of another circuit element.
    Uid,
    Node,
    Tree,
}

/// Kind plus vector-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    pub kind: ValueKind,
    pub vector: bool,
}

impl DataType {
    pub const fn scalar(kind: ValueKind) -> Self {
        Self {
            kind,
            vector: false,
        }
    }

    pub const fn vector(kind: ValueKind) -> Self {
        Self { kind, vector: true }
    }

    /// Whether `value` has this type.
    pub fn accepts(&self, value: &IfValue) -> bool {
        match value {
            IfValue::Vector(items) => {
                self.vector && items.iter().all(|v| v.kind() == Some(self.kind))
            }
            scalar => !self.vector && scalar.kind() == Some(self.kind),
        }
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum IfValue {
    Flag(bool),
    Int(i64),
    Real(f64),
    Complex(Complex64),
    Str(String),
    Uid(String),
    Node(NodeId),
    Tree(ParseTree),
    Vector(Vec<IfValue>),
}

impl IfValue {
    /// Scalar kind, `None` for vectors.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            IfValue::Flag(_) => ValueKind::Flag,
            IfValue::Int(_) => ValueKind::Int,
            IfValue::Real(_) => ValueKind::Real,
            IfValue::Complex(_) => ValueKind::Complex,
            IfValue::Str(_) => ValueKind::Str,
            IfValue::Uid(_) => ValueKind::Uid,
            IfValue::Node(_) => ValueKind::Node,
            IfValue::Tree(_) => ValueKind::Tree,
            IfValue::Vector(_) => return None,
        })
    }

    pub fn as_real(&self) -> Option<f64> {
        match *self {
            IfValue::Real(v) => Some(v),
            _ => None,
        }
    }

    /// Real values of a real vector.
    pub fn as_real_vec(&self) -> Option<Vec<f64>> {
        match self {
            IfValue::Vector(items) => items.iter().map(IfValue::as_real).collect(),
            _ => None,
        }
    }

    /// Real vector from plain values.
    pub fn real_vec(values: &[f64]) -> Self {
        IfValue::Vector(values.iter().map(|&v| IfValue::Real(v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_flag_is_orthogonal() {
        let real = DataType::scalar(ValueKind::Real);
        let realvec = DataType::vector(ValueKind::Real);
        assert!(real.accepts(&IfValue::Real(1.0)));
        assert!(!real.accepts(&IfValue::real_vec(&[1.0])));
        assert!(realvec.accepts(&IfValue::real_vec(&[1.0, 2.0])));
        assert!(!realvec.accepts(&IfValue::Real(1.0)));
        assert!(!realvec.accepts(&IfValue::Vector(vec![IfValue::Int(1)])));
    }

    #[test]
    fn test_real_vec_roundtrip() {
        let v = IfValue::real_vec(&[1.0, -2.0]);
        assert_eq!(v.as_real_vec(), Some(vec![1.0, -2.0]));
        assert_eq!(IfValue::Int(3).as_real_vec(), None);
    }
}
