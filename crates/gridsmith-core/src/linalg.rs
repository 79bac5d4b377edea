//! Dense solves for the regression and ARIMA fallbacks.
//!
//! The systems are the small normal-equation matrices of a least-squares fit,
//! so everything goes through one [`LinearSystemBackend`] call per fit.

use faer::{prelude::*, solvers::PartialPivLu, Mat};

use crate::error::{GridError, GridResult};

/// Solves dense square systems `Ax = b`.
pub trait LinearSystemBackend: Send + Sync {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> GridResult<Vec<f64>>;
}

fn check_dimensions(matrix: &[Vec<f64>], rhs: &[f64]) -> GridResult<()> {
    let n = matrix.len();
    if rhs.len() != n {
        return Err(GridError::Validation(format!(
            "rhs length ({}) does not match matrix dimension {}",
            rhs.len(),
            n
        )));
    }
    if matrix.iter().any(|row| row.len() != n) {
        return Err(GridError::Validation("matrix must be square".to_string()));
    }
    Ok(())
}

/// Lower bound on the condition number above which a system counts as singular.
const MAX_GROWTH: f64 = 1e12;

fn max_abs(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

/// `‖A‖∞‖x‖∞ / ‖b‖∞`, which bounds the condition number of `A` from below.
fn growth(matrix: &[Vec<f64>], rhs: &[f64], solution: &[f64]) -> f64 {
    let rhs_norm = max_abs(rhs.iter().copied());
    if rhs_norm == 0.0 {
        return 0.0;
    }
    let matrix_norm = max_abs(matrix.iter().map(|row| row.iter().map(|v| v.abs()).sum::<f64>()));
    matrix_norm * max_abs(solution.iter().copied()) / rhs_norm
}

/// LU with partial pivoting from `faer`; the default for every local fit.
#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> GridResult<Vec<f64>> {
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(matrix, rhs)?;

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        let solution: Vec<f64> = (0..n).map(|i| sol.read(i, 0)).collect();
        // LU does not report singularity: an exact zero pivot shows up as
        // non-finite entries, a near-zero one as solution growth
        if solution.iter().any(|v| !v.is_finite()) || growth(matrix, rhs, &solution) > MAX_GROWTH {
            return Err(GridError::Validation("singular matrix".to_string()));
        }
        Ok(solution)
    }
}

/// Ordinary least squares via the normal equations `XᵀX β = Xᵀy`.
///
/// `rows` holds one design row per observation; add a column of ones for an
/// intercept. Systems are tiny (a handful of regressors), so the normal
/// equations are well within double precision for the data we fit.
pub fn least_squares(
    backend: &dyn LinearSystemBackend,
    rows: &[Vec<f64>],
    y: &[f64],
) -> GridResult<Vec<f64>> {
    if rows.len() != y.len() {
        return Err(GridError::Validation(format!(
            "design has {} rows but response has {}",
            rows.len(),
            y.len()
        )));
    }
    let k = rows.first().map(Vec::len).unwrap_or(0);
    if k == 0 {
        return Err(GridError::Validation("empty design matrix".to_string()));
    }
    if rows.len() < k {
        return Err(GridError::Validation(format!(
            "need at least {k} observations to fit {k} parameters, got {}",
            rows.len()
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in rows.iter().zip(y) {
        if row.len() != k {
            return Err(GridError::Validation("ragged design matrix".to_string()));
        }
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    backend.solve(&xtx, &xty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faer_solves_diagonal_system() {
        let matrix = vec![vec![2.0, 0.0], vec![0.0, 3.0]];
        let x = FaerSolver.solve(&matrix, &[4.0, 6.0]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12 && (x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn faer_rejects_singular_matrix() {
        let matrix = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(FaerSolver.solve(&matrix, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn faer_rejects_nearly_singular_matrix() {
        let matrix = vec![vec![1.0, 1.0], vec![1.0, 1.0 + 1e-15]];
        assert!(FaerSolver.solve(&matrix, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn mismatched_rhs_is_rejected() {
        let matrix = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(FaerSolver.solve(&matrix, &[1.0]).is_err());
    }

    #[test]
    fn least_squares_recovers_exact_line() {
        // y = 3 + 2x
        let rows: Vec<Vec<f64>> = (0..5).map(|x| vec![1.0, x as f64]).collect();
        let y: Vec<f64> = (0..5).map(|x| 3.0 + 2.0 * x as f64).collect();
        let beta = least_squares(&FaerSolver, &rows, &y).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn least_squares_needs_enough_rows() {
        let rows = vec![vec![1.0, 2.0]];
        assert!(least_squares(&FaerSolver, &rows, &[1.0]).is_err());
    }
}
