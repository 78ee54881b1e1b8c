//! Small dense linear solves with optional Dirichlet constraints.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::bc::DirichletBc;

/// Errors raised by [`solve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinearSolveError {
    #[error("system matrix is {rows}x{cols}, expected a square matrix")]
    NotSquare { rows: usize, cols: usize },

    #[error("right-hand side has {found} entries, system has {expected}")]
    RhsLength { expected: usize, found: usize },

    #[error("constraint on dof {dof} lies outside a system of size {size}")]
    ConstraintOutOfRange { dof: usize, size: usize },

    #[error("system matrix is singular")]
    Singular,
}

/// Solves `matrix * x = rhs`, optionally subject to Dirichlet constraints.
///
/// Constrained unknowns are set to their prescribed values and their
/// contribution is moved to the right-hand side; the remaining unknowns
/// satisfy the rows of the free degrees of freedom only.
///
/// # Errors
///
/// Returns an error if shapes are inconsistent, a constraint lies outside the
/// system, or the (reduced) system is singular.
pub fn solve(
    matrix: &DMatrix<f64>,
    rhs: &DVector<f64>,
    constraints: Option<&DirichletBc>,
) -> Result<DVector<f64>, LinearSolveError> {
    let (rows, cols) = matrix.shape();
    if rows != cols {
        return Err(LinearSolveError::NotSquare { rows, cols });
    }
    if rhs.len() != rows {
        return Err(LinearSolveError::RhsLength {
            expected: rows,
            found: rhs.len(),
        });
    }

    let Some(constraints) = constraints.filter(|bc| !bc.is_empty()) else {
        return lu_solve(matrix.clone(), rhs);
    };

    let mut solution = DVector::zeros(rows);
    let mut constrained = vec![false; rows];
    for (dof, value) in constraints.iter() {
        if dof >= rows {
            return Err(LinearSolveError::ConstraintOutOfRange { dof, size: rows });
        }
        solution[dof] = value;
        constrained[dof] = true;
    }

    let free: Vec<usize> = (0..rows).filter(|&i| !constrained[i]).collect();
    if free.is_empty() {
        return Ok(solution);
    }

    let residual = rhs - matrix * &solution;
    let free_matrix = DMatrix::from_fn(free.len(), free.len(), |i, j| matrix[(free[i], free[j])]);
    let free_rhs = DVector::from_fn(free.len(), |i, _| residual[free[i]]);
    let free_solution = lu_solve(free_matrix, &free_rhs)?;

    for (&dof, &value) in free.iter().zip(free_solution.iter()) {
        solution[dof] = value;
    }
    Ok(solution)
}

fn lu_solve(matrix: DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
    if matrix.is_empty() {
        return Ok(DVector::zeros(0));
    }
    matrix
        .lu()
        .solve(rhs)
        .filter(|x| x.iter().all(|value| value.is_finite()))
        .ok_or(LinearSolveError::Singular)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn tridiagonal(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => 2.0,
            1 => -1.0,
            _ => 0.0,
        })
    }

    #[test]
    fn unconstrained_solve() {
        let matrix = tridiagonal(3);
        let expected = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let rhs = &matrix * &expected;

        let solution = solve(&matrix, &rhs, None).expect("should solve");

        assert_relative_eq!(solution, expected, epsilon = 1e-12);
    }

    #[test]
    fn constrained_dofs_take_prescribed_values() {
        let matrix = tridiagonal(4);
        let rhs = DVector::zeros(4);
        let bc = DirichletBc::new().with(0, 1.0).with(3, 4.0);

        let solution = solve(&matrix, &rhs, Some(&bc)).expect("should solve");

        // Discrete harmonic interpolation between the two ends.
        assert_relative_eq!(
            solution,
            DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn singular_system_is_reported() {
        let matrix = DMatrix::from_element(2, 2, 1.0);
        let rhs = DVector::from_vec(vec![1.0, 2.0]);

        assert_eq!(solve(&matrix, &rhs, None), Err(LinearSolveError::Singular));
    }

    #[test]
    fn shape_errors() {
        let rhs = DVector::zeros(2);
        assert!(matches!(
            solve(&DMatrix::zeros(2, 3), &rhs, None),
            Err(LinearSolveError::NotSquare { rows: 2, cols: 3 })
        ));
        assert!(matches!(
            solve(&tridiagonal(3), &rhs, None),
            Err(LinearSolveError::RhsLength {
                expected: 3,
                found: 2
            })
        ));
        let bc = DirichletBc::new().with(5, 1.0);
        assert!(matches!(
            solve(&tridiagonal(2), &rhs, Some(&bc)),
            Err(LinearSolveError::ConstraintOutOfRange { dof: 5, size: 2 })
        ));
    }

    #[test]
    fn empty_system_has_empty_solution() {
        let solution = solve(&DMatrix::zeros(0, 0), &DVector::zeros(0), None).expect("should solve");
        assert!(solution.is_empty());
    }
}
