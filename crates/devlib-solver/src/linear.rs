//! Dense linear solves over the assembled MNA system.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{Error, Result};

fn check_dims(rows: usize, cols: usize, rhs: usize) -> Result<()> {
    if rows != cols {
        return Err(Error::DimensionMismatch {
            expected: rows,
            actual: cols,
        });
    }
    if rows != rhs {
        return Err(Error::DimensionMismatch {
            expected: rows,
            actual: rhs,
        });
    }
    Ok(())
}

/// Solve a linear system Ax = b using LU decomposition.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check_dims(a.nrows(), a.ncols(), b.len())?;
    if a.nrows() == 0 {
        return Ok(DVector::zeros(0));
    }
    a.clone().lu().solve(b).ok_or(Error::SingularMatrix)
}

/// Solve a complex linear system Ax = b using LU decomposition.
pub fn solve_complex(a: &DMatrix<Complex64>, b: &DVector<Complex64>) -> Result<DVector<Complex64>> {
    check_dims(a.nrows(), a.ncols(), b.len())?;
    if a.nrows() == 0 {
        return Ok(DVector::zeros(0));
    }
    a.clone().lu().solve(b).ok_or(Error::SingularMatrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_solve_simple() {
        // 2x + y = 5
        // x + 3y = 10
        // Solution: x = 1, y = 3
        let a = dmatrix![2.0, 1.0; 1.0, 3.0];
        let b = dvector![5.0, 10.0];

        let x = solve_dense(&a, &b).unwrap();

        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_singular_matrix() {
        let a = dmatrix![1.0, 2.0; 2.0, 4.0];
        let b = dvector![1.0, 2.0];

        assert!(matches!(solve_dense(&a, &b), Err(Error::SingularMatrix)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = dmatrix![1.0, 2.0; 3.0, 4.0];
        let b = dvector![1.0, 2.0, 3.0];

        assert!(matches!(
            solve_dense(&a, &b),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_empty_system() {
        let a = DMatrix::<f64>::zeros(0, 0);
        let b = DVector::<f64>::zeros(0);
        assert_eq!(solve_dense(&a, &b).unwrap().len(), 0);
    }

    #[test]
    fn test_solve_complex() {
        // (1 + j) x = 2j  ->  x = 1 + j
        let a = dmatrix![Complex64::new(1.0, 1.0)];
        let b = dvector![Complex64::new(0.0, 2.0)];

        let x = solve_complex(&a, &b).unwrap();

        assert!((x[0] - Complex64::new(1.0, 1.0)).norm() < 1e-12);
    }
}
