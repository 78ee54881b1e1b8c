use nalgebra::{DMatrix, DVector};

use crate::basis::{BasisError, BasisFunctions};

/// Orthonormalizes newly added basis functions in the inner product `X`.
#[derive(Debug, Clone)]
pub struct GramSchmidt {
    inner_product: DMatrix<f64>,
    tolerance: f64,
}

impl GramSchmidt {
    /// Relative norm below which a new function counts as linearly dependent.
    pub const DEFAULT_TOLERANCE: f64 = 1e-12;

    #[must_use]
    pub fn new(inner_product: DMatrix<f64>) -> Self {
        Self {
            inner_product,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }

    #[must_use]
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    #[must_use]
    pub fn inner_product(&self) -> &DMatrix<f64> {
        &self.inner_product
    }

    /// Returns `x^T X y`.
    #[must_use]
    pub fn dot(&self, x: &DVector<f64>, y: &DVector<f64>) -> f64 {
        x.dot(&(&self.inner_product * y))
    }

    /// Returns the `X`-norm of `x`.
    #[must_use]
    pub fn norm(&self, x: &DVector<f64>) -> f64 {
        self.dot(x, x).abs().sqrt()
    }

    /// Orthonormalizes the last basis function against functions `skip..`.
    ///
    /// The first `skip` functions (liftings) are left untouched and are not
    /// projected out. Orthogonalization runs twice for stability.
    ///
    /// # Errors
    ///
    /// If the new function is numerically dependent on the previous ones it is
    /// removed and [`BasisError::LinearlyDependent`] is returned.
    pub fn apply(&self, basis: &mut BasisFunctions, skip: usize) -> Result<(), BasisError> {
        let Some(last) = basis.len().checked_sub(1) else {
            return Ok(());
        };
        let Some(mut candidate) = basis.column(last).cloned() else {
            return Ok(());
        };
        let original_norm = self.norm(&candidate);

        for _ in 0..2 {
            for previous in &basis.columns()[skip.min(last)..last] {
                let projection = self.dot(&candidate, previous);
                candidate.axpy(-projection, previous, 1.0);
            }
        }

        let norm = self.norm(&candidate);
        if norm <= self.tolerance * original_norm.max(f64::MIN_POSITIVE) {
            basis.pop();
            return Err(BasisError::LinearlyDependent { index: last });
        }
        candidate /= norm;

        if let Some(column) = basis.column_mut(last) {
            *column = candidate;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn weighted() -> GramSchmidt {
        GramSchmidt::new(DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 2.0, 4.0])))
    }

    #[test]
    fn produces_an_orthonormal_family() {
        let gs = weighted();
        let mut basis = BasisFunctions::new(3);
        for snapshot in [[1.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 0.0, 1.0]] {
            basis
                .enrich(DVector::from_row_slice(&snapshot))
                .expect("fits");
            gs.apply(&mut basis, 0).expect("independent");
        }

        for (i, x) in basis.columns().iter().enumerate() {
            for (j, y) in basis.columns().iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(gs.dot(x, y), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn leading_functions_can_be_skipped() {
        let gs = weighted();
        let mut basis = BasisFunctions::new(3);
        let lifting = DVector::from_vec(vec![3.0, 0.0, 0.0]);
        basis.enrich(lifting.clone()).expect("fits");
        basis
            .enrich(DVector::from_vec(vec![0.0, 1.0, 0.0]))
            .expect("fits");

        gs.apply(&mut basis, 1).expect("independent");

        assert_eq!(basis.column(0), Some(&lifting));
        assert_relative_eq!(gs.norm(&basis.columns()[1]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn dependent_function_is_dropped() {
        let gs = weighted();
        let mut basis = BasisFunctions::new(3);
        basis
            .enrich(DVector::from_vec(vec![1.0, 0.0, 0.0]))
            .expect("fits");
        gs.apply(&mut basis, 0).expect("independent");
        basis
            .enrich(DVector::from_vec(vec![2.0, 0.0, 0.0]))
            .expect("fits");

        let result = gs.apply(&mut basis, 0);

        assert_eq!(result, Err(BasisError::LinearlyDependent { index: 1 }));
        assert_eq!(basis.len(), 1);
    }
}
