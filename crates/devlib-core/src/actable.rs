//! Named AC frequency-response tables.

use num_complex::Complex64;

/// Complex values sampled at increasing frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct AcTable {
    pub name: String,
    points: Vec<(f64, Complex64)>,
}

impl AcTable {
    /// Build a table; points are sorted by frequency.
    pub fn new(name: impl Into<String>, mut points: Vec<(f64, Complex64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn points(&self) -> &[(f64, Complex64)] {
        &self.points
    }

    /// Linearly interpolated value at `freq`, held constant past the ends.
    pub fn eval(&self, freq: f64) -> Complex64 {
        let Some(first) = self.points.first() else {
            return Complex64::new(0.0, 0.0);
        };
        if freq <= first.0 {
            return first.1;
        }
        for pair in self.points.windows(2) {
            let (f0, v0) = pair[0];
            let (f1, v1) = pair[1];
            if freq <= f1 {
                if f1 == f0 {
                    return v1;
                }
                let t = (freq - f0) / (f1 - f0);
                return v0 + (v1 - v0) * t;
            }
        }
        self.points[self.points.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation() {
        let t = AcTable::new(
            "t",
            vec![
                (100.0, Complex64::new(2.0, 2.0)),
                (0.0, Complex64::new(0.0, 0.0)),
            ],
        );
        assert_eq!(t.eval(50.0), Complex64::new(1.0, 1.0));
        assert_eq!(t.eval(-1.0), Complex64::new(0.0, 0.0));
        assert_eq!(t.eval(1e6), Complex64::new(2.0, 2.0));
    }

    #[test]
    fn test_empty_table_is_zero() {
        let t = AcTable::new("e", Vec::new());
        assert_eq!(t.eval(10.0), Complex64::new(0.0, 0.0));
    }
}
