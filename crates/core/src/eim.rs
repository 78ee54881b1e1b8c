//! Empirical interpolation of parametrized functions.
//!
//! # Algorithm
//!
//! Given nodal snapshots `g(mu_i)` of a non-affine function, the greedy loop
//! picks the snapshot worst approximated by the current interpolant (maximum
//! norm), takes the node where its residual is largest as the next
//! interpolation point, and adds the residual scaled to one at that point as
//! the next basis function. The interpolation matrix `B[i][j] = q_j(x_i)` is
//! lower triangular with unit diagonal, so coefficients follow from a forward
//! substitution.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::basis::BasisError;

/// An interpolant `g(x; mu) ~ sum_m theta_m(mu) q_m(x)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalInterpolation {
    points: Vec<usize>,
    basis: Vec<DVector<f64>>,
}

impl EmpiricalInterpolation {
    /// Trains an interpolant on `snapshots`.
    ///
    /// Stops after `n_max` functions or once the largest interpolation error
    /// falls to `tolerance`. Returns the interpolant and the maximum error
    /// recorded before each enrichment.
    ///
    /// # Errors
    ///
    /// Fails if snapshots have different lengths.
    pub fn train(
        snapshots: &[DVector<f64>],
        n_max: usize,
        tolerance: f64,
    ) -> Result<(Self, Vec<f64>), BasisError> {
        let mut interpolation = Self::default();
        let mut history = Vec::new();
        if let Some(first) = snapshots.first() {
            if let Some(bad) = snapshots.iter().find(|s| s.len() != first.len()) {
                return Err(BasisError::Dimension {
                    expected: first.len(),
                    found: bad.len(),
                });
            }
        }

        while interpolation.len() < n_max {
            let worst = snapshots
                .iter()
                .filter_map(|snapshot| {
                    let residual = snapshot - interpolation.interpolate_function(snapshot)?;
                    let error = residual.amax();
                    Some((error, residual))
                })
                .max_by(|a, b| a.0.total_cmp(&b.0));

            let Some((error, residual)) = worst else {
                break;
            };
            history.push(error);
            if error <= tolerance {
                break;
            }

            let point = residual.iamax();
            let scale = residual[point];
            interpolation.points.push(point);
            interpolation.basis.push(residual / scale);
        }

        Ok((interpolation, history))
    }

    /// Returns the number of basis functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.basis.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.basis.is_empty()
    }

    /// Returns the interpolation nodes.
    #[must_use]
    pub fn points(&self) -> &[usize] {
        &self.points
    }

    #[must_use]
    pub fn basis(&self) -> &[DVector<f64>] {
        &self.basis
    }

    /// Returns the interpolation coefficients for the given point values.
    ///
    /// Returns `None` if the number of values does not match the number of
    /// points.
    #[must_use]
    pub fn coefficients(&self, values_at_points: &[f64]) -> Option<DVector<f64>> {
        let m = self.len();
        if values_at_points.len() != m {
            return None;
        }
        let matrix = DMatrix::from_fn(m, m, |i, j| self.basis[j][self.points[i]]);
        matrix.solve_lower_triangular(&DVector::from_column_slice(values_at_points))
    }

    /// Samples a nodal function at the interpolation points.
    #[must_use]
    pub fn sample(&self, function: &DVector<f64>) -> Option<Vec<f64>> {
        self.points
            .iter()
            .map(|&point| function.get(point).copied())
            .collect()
    }

    /// Returns the interpolant of a nodal function.
    #[must_use]
    pub fn interpolate_function(&self, function: &DVector<f64>) -> Option<DVector<f64>> {
        let coefficients = self.coefficients(&self.sample(function)?)?;
        let mut result = DVector::zeros(function.len());
        for (q, &theta) in self.basis.iter().zip(coefficients.iter()) {
            if q.len() != result.len() {
                return None;
            }
            result.axpy(theta, q, 1.0);
        }
        Some(result)
    }

    /// Returns the maximum-norm interpolation error of a nodal function.
    #[must_use]
    pub fn error(&self, function: &DVector<f64>) -> Option<f64> {
        let interpolant = self.interpolate_function(function)?;
        Some((function - interpolant).amax())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn exponential(mu: f64, n: usize) -> DVector<f64> {
        DVector::from_fn(n, |i, _| (-mu * i as f64 / (n - 1) as f64).exp())
    }

    #[test]
    fn interpolation_is_exact_at_the_points() {
        let snapshots: Vec<_> = [1.0, 2.0, 4.0, 8.0]
            .iter()
            .map(|&mu| exponential(mu, 21))
            .collect();

        let (eim, _) = EmpiricalInterpolation::train(&snapshots, 3, 0.0).expect("should train");
        let target = exponential(3.0, 21);
        let interpolant = eim.interpolate_function(&target).expect("sizes match");

        assert_eq!(eim.len(), 3);
        for &point in eim.points() {
            assert_relative_eq!(interpolant[point], target[point], epsilon = 1e-12);
        }
    }

    #[test]
    fn training_reproduces_the_snapshot_span() {
        let snapshots: Vec<_> = [1.0, 5.0].iter().map(|&mu| exponential(mu, 11)).collect();

        let (eim, history) =
            EmpiricalInterpolation::train(&snapshots, 10, 1e-12).expect("should train");

        assert_eq!(eim.len(), 2);
        assert_eq!(history.len(), 3);
        for snapshot in &snapshots {
            assert!(eim.error(snapshot).expect("sizes match") < 1e-12);
        }
    }

    #[test]
    fn coefficient_count_must_match() {
        let eim = EmpiricalInterpolation::default();
        assert!(eim.coefficients(&[1.0]).is_none());
        assert_eq!(eim.coefficients(&[]).map(|c| c.len()), Some(0));
    }
}
