//! Generalized eigenvalue bounds of bilinear forms against an inner product.
//!
//! All quantities are restricted to the free (unconstrained) degrees of
//! freedom, where the inner product is positive definite.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while computing spectral bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercivityError {
    #[error("inner product is not positive definite on the free dofs")]
    NotPositiveDefinite,

    #[error("operator is {found:?}, inner product is {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("no free degrees of freedom")]
    NoFreeDofs,
}

/// The extreme generalized eigenvalues of `sym(A) v = lambda X v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EigenvalueBounds {
    pub min: f64,
    pub max: f64,
}

/// Computes generalized eigenvalue bounds relative to a fixed inner product.
#[derive(Debug, Clone)]
pub struct SpectralBounds {
    free: Vec<usize>,
    cholesky: Cholesky<f64, nalgebra::Dyn>,
    dimension: usize,
}

impl SpectralBounds {
    /// Factors the inner product restricted to `free`.
    ///
    /// # Errors
    ///
    /// Fails if no dof is free or the restricted inner product is not
    /// positive definite.
    pub fn new(inner_product: &DMatrix<f64>, free: Vec<usize>) -> Result<Self, CoercivityError> {
        if free.is_empty() {
            return Err(CoercivityError::NoFreeDofs);
        }
        let restricted = restrict(inner_product, &free);
        let cholesky = Cholesky::new(restricted).ok_or(CoercivityError::NotPositiveDefinite)?;
        Ok(Self {
            free,
            cholesky,
            dimension: inner_product.nrows(),
        })
    }

    /// Returns the extreme eigenvalues of `L^-1 sym(A) L^-T`, with `X = L L^T`.
    ///
    /// # Errors
    ///
    /// Fails if `operator` does not match the inner product's shape.
    pub fn bounds(&self, operator: &DMatrix<f64>) -> Result<EigenvalueBounds, CoercivityError> {
        if operator.shape() != (self.dimension, self.dimension) {
            return Err(CoercivityError::ShapeMismatch {
                expected: (self.dimension, self.dimension),
                found: operator.shape(),
            });
        }
        let restricted = restrict(operator, &self.free);
        let symmetric = (&restricted + restricted.transpose()) * 0.5;

        let l = self.cholesky.l();
        let left = l
            .solve_lower_triangular(&symmetric)
            .ok_or(CoercivityError::NotPositiveDefinite)?;
        let transformed = l
            .solve_lower_triangular(&left.transpose())
            .ok_or(CoercivityError::NotPositiveDefinite)?;
        let transformed = (&transformed + transformed.transpose()) * 0.5;

        let eigenvalues = SymmetricEigen::new(transformed).eigenvalues;
        Ok(EigenvalueBounds {
            min: eigenvalues.min(),
            max: eigenvalues.max(),
        })
    }

    /// Returns the coercivity constant `inf_v a(v, v) / (v, v)_X`.
    ///
    /// # Errors
    ///
    /// Fails if `operator` does not match the inner product's shape.
    pub fn coercivity_constant(&self, operator: &DMatrix<f64>) -> Result<f64, CoercivityError> {
        self.bounds(operator).map(|bounds| bounds.min)
    }
}

fn restrict(matrix: &DMatrix<f64>, free: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(free.len(), free.len(), |i, j| matrix[(free[i], free[j])])
}
