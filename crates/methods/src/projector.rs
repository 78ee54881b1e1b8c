//! Galerkin projection of truth operators and online recombination.
//!
//! Offline, each truth operator of a term is projected onto the reduced basis
//! `Z`: matrices become `Z^T A Z`, vectors become `Z^T f`. The dual
//! output correction uses the rectangular variant `Z_l^T A Z_r`.
//!
//! Online, the stored operators are truncated to the requested size and
//! recombined as `sum_q theta[q] * reduced[q]`.

use nalgebra::{DMatrix, DVector};
use reduct_core::{AffineExpansion, AlgebraError, ReducedOperator, Term, TruthOperator};

use crate::error::{DimensionError, Error};

/// Projects every operator of a term onto `z`.
///
/// # Errors
///
/// Fails on Dirichlet operators (they are never projected) and on shape
/// mismatches between operators and the basis.
pub fn project(
    operators: &AffineExpansion<TruthOperator>,
    z: &DMatrix<f64>,
) -> Result<AffineExpansion<ReducedOperator>, Error> {
    project_cross(operators, z, z)
}

/// Projects every operator of a term between two bases, `Z_l^T A Z_r`.
///
/// Vector operators only use the left basis.
///
/// # Errors
///
/// Fails on Dirichlet operators and on shape mismatches.
pub fn project_cross(
    operators: &AffineExpansion<TruthOperator>,
    left: &DMatrix<f64>,
    right: &DMatrix<f64>,
) -> Result<AffineExpansion<ReducedOperator>, Error> {
    operators.try_map(|operator| match operator {
        TruthOperator::Matrix(matrix) => {
            check_shape(left.nrows(), matrix.nrows(), matrix.shape())?;
            check_shape(right.nrows(), matrix.ncols(), matrix.shape())?;
            Ok(ReducedOperator::Matrix(left.tr_mul(&(matrix * right))))
        }
        TruthOperator::Vector(vector) => {
            check_shape(left.nrows(), vector.len(), vector.shape())?;
            Ok(ReducedOperator::Vector(left.tr_mul(vector)))
        }
        TruthOperator::DirichletBc(_) => Err(AlgebraError::UnexpectedKind {
            expected: "matrix or vector",
            found: "boundary condition",
        }
        .into()),
    })
}

/// Projects a truth-space function with the inner product: `Z^T X u`.
///
/// # Errors
///
/// Fails on shape mismatches.
pub fn project_function(
    function: &DVector<f64>,
    inner_product: &DMatrix<f64>,
    z: &DMatrix<f64>,
) -> Result<DVector<f64>, Error> {
    check_shape(inner_product.ncols(), function.len(), function.shape())?;
    check_shape(z.nrows(), inner_product.nrows(), inner_product.shape())?;
    Ok(z.tr_mul(&(inner_product * function)))
}

/// Returns `sum_q thetas[q] * operators[q][:rows, :cols]`.
///
/// An empty expansion recombines to zeros.
///
/// # Errors
///
/// Returns [`DimensionError::ThetaLength`] if `thetas.len() != Q` and
/// [`DimensionError::BasisSize`] if the block exceeds the stored size.
pub fn recombine_matrix(
    term: &Term,
    operators: &AffineExpansion<ReducedOperator>,
    thetas: &[f64],
    rows: usize,
    cols: usize,
) -> Result<DMatrix<f64>, Error> {
    let truncated = truncate(term, operators, thetas, rows, cols)?;
    if truncated.is_empty() {
        return Ok(DMatrix::zeros(rows, cols));
    }
    Ok(truncated.combine(thetas)?.into_matrix()?)
}

/// Returns `sum_q thetas[q] * operators[q][:n]`.
///
/// An empty expansion recombines to zeros.
///
/// # Errors
///
/// Returns [`DimensionError::ThetaLength`] if `thetas.len() != Q` and
/// [`DimensionError::BasisSize`] if `n` exceeds the stored size.
pub fn recombine_vector(
    term: &Term,
    operators: &AffineExpansion<ReducedOperator>,
    thetas: &[f64],
    n: usize,
) -> Result<DVector<f64>, Error> {
    let truncated = truncate(term, operators, thetas, n, 1)?;
    if truncated.is_empty() {
        return Ok(DVector::zeros(n));
    }
    Ok(truncated.combine(thetas)?.into_vector()?)
}

fn truncate(
    term: &Term,
    operators: &AffineExpansion<ReducedOperator>,
    thetas: &[f64],
    rows: usize,
    cols: usize,
) -> Result<AffineExpansion<ReducedOperator>, Error> {
    if thetas.len() != operators.len() {
        return Err(DimensionError::ThetaLength {
            term: term.clone(),
            expected: operators.len(),
            found: thetas.len(),
        }
        .into());
    }
    operators.try_map(|operator| {
        let (stored_rows, stored_cols) = operator.shape();
        let cols = match operator {
            ReducedOperator::Matrix(_) => cols,
            ReducedOperator::Vector(_) => 1,
        };
        operator.truncated(rows, cols).ok_or_else(|| {
            DimensionError::BasisSize {
                term: term.clone(),
                requested: rows.max(cols),
                available: if rows > stored_rows {
                    stored_rows
                } else {
                    stored_cols
                },
            }
            .into()
        })
    })
}

fn check_shape(expected: usize, found: usize, shape: (usize, usize)) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(AlgebraError::ShapeMismatch {
            expected: (expected, shape.1),
            found: shape,
        }
        .into())
    }
}
