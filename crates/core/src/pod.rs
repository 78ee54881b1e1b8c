//! Proper orthogonal decomposition of a snapshot matrix.
//!
//! # Algorithm
//!
//! With snapshots `S = [s_1 .. s_m]` and inner product `X`, the correlation
//! matrix `C = S^T X S` is diagonalized as `C v_k = lambda_k v_k` with
//! eigenvalues sorted in decreasing order. Mode `k` is `S v_k / sqrt(lambda_k)`,
//! which makes the modes `X`-orthonormal. Modes are retained until the
//! discarded energy `1 - sum_{k<=n} lambda_k / sum_k lambda_k` drops to the
//! tolerance, or `n_max` modes have been kept.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::basis::BasisError;

/// The decomposition of a snapshot set.
#[derive(Debug, Clone, PartialEq)]
pub struct ProperOrthogonalDecomposition {
    eigenvalues: Vec<f64>,
    modes: Vec<DVector<f64>>,
}

impl ProperOrthogonalDecomposition {
    /// Eigenvalues below this fraction of the largest one carry no mode.
    pub const RANK_TOLERANCE: f64 = 1e-10;

    /// Decomposes `snapshots` in the inner product `inner_product`.
    ///
    /// # Errors
    ///
    /// Fails if a snapshot does not match the inner product's dimension.
    pub fn compute(
        snapshots: &[DVector<f64>],
        inner_product: &DMatrix<f64>,
    ) -> Result<Self, BasisError> {
        let dimension = inner_product.nrows();
        if let Some(bad) = snapshots.iter().find(|s| s.len() != dimension) {
            return Err(BasisError::Dimension {
                expected: dimension,
                found: bad.len(),
            });
        }
        if snapshots.is_empty() {
            return Ok(Self {
                eigenvalues: Vec::new(),
                modes: Vec::new(),
            });
        }

        let matrix = DMatrix::from_columns(snapshots);
        let correlation = matrix.transpose() * inner_product * &matrix;
        let correlation = (&correlation + correlation.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(correlation);

        let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

        let mut eigenvalues = Vec::with_capacity(order.len());
        let mut modes = Vec::with_capacity(order.len());
        let largest = order.first().map_or(0.0, |&k| eigen.eigenvalues[k]);
        for k in order {
            let lambda = eigen.eigenvalues[k];
            eigenvalues.push(lambda.max(0.0));
            if lambda > Self::RANK_TOLERANCE * largest.max(f64::MIN_POSITIVE) {
                modes.push(&matrix * eigen.eigenvectors.column(k) / lambda.sqrt());
            }
        }

        Ok(Self { eigenvalues, modes })
    }

    /// Returns all eigenvalues in decreasing order, clamped at zero.
    #[must_use]
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Returns the modes associated with numerically positive eigenvalues.
    #[must_use]
    pub fn modes(&self) -> &[DVector<f64>] {
        &self.modes
    }

    /// Returns how many modes to keep for the given budget.
    #[must_use]
    pub fn retained(&self, n_max: usize, tolerance: f64) -> usize {
        let total: f64 = self.eigenvalues.iter().sum();
        let available = self.modes.len().min(n_max);
        if total <= 0.0 {
            return 0;
        }

        let mut energy = 0.0;
        for (n, lambda) in self.eigenvalues.iter().take(available).enumerate() {
            energy += lambda;
            if 1.0 - energy / total <= tolerance {
                return n + 1;
            }
        }
        available
    }

    /// Returns the relative energy discarded when keeping `n` modes.
    #[must_use]
    pub fn discarded_energy(&self, n: usize) -> f64 {
        let total: f64 = self.eigenvalues.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let kept: f64 = self.eigenvalues.iter().take(n).sum();
        (1.0 - kept / total).max(0.0)
    }
}
