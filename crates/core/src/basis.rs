use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Folder, StorageError};

/// Errors raised while growing or reading a basis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BasisError {
    #[error("basis functions have {expected} entries, got {found}")]
    Dimension { expected: usize, found: usize },

    #[error("requested {requested} basis functions, only {available} available")]
    TooFew { requested: usize, available: usize },

    #[error("basis function {index} is linearly dependent on the previous ones")]
    LinearlyDependent { index: usize },
}

/// The reduced basis matrix `Z`: an ordered list of truth-space columns.
///
/// The basis only ever grows during the offline stage; online queries read
/// its leading columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisFunctions {
    dimension: usize,
    columns: Vec<DVector<f64>>,
}

impl BasisFunctions {
    /// Creates an empty basis for a truth space of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            columns: Vec::new(),
        }
    }

    /// Returns the truth-space dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the number of basis functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&DVector<f64>> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[DVector<f64>] {
        &self.columns
    }

    /// Appends a snapshot to the basis.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot does not live in the truth space.
    pub fn enrich(&mut self, snapshot: DVector<f64>) -> Result<(), BasisError> {
        if snapshot.len() != self.dimension {
            return Err(BasisError::Dimension {
                expected: self.dimension,
                found: snapshot.len(),
            });
        }
        self.columns.push(snapshot);
        Ok(())
    }

    /// Removes and returns the last basis function.
    pub fn pop(&mut self) -> Option<DVector<f64>> {
        self.columns.pop()
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> Option<&mut DVector<f64>> {
        self.columns.get_mut(index)
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    /// Returns the `dimension x n` matrix of the first `n` basis functions.
    ///
    /// # Errors
    ///
    /// Returns [`BasisError::TooFew`] if fewer than `n` functions exist.
    pub fn matrix(&self, n: usize) -> Result<DMatrix<f64>, BasisError> {
        if n > self.len() {
            return Err(BasisError::TooFew {
                requested: n,
                available: self.len(),
            });
        }
        Ok(DMatrix::from_fn(self.dimension, n, |i, j| self.columns[j][i]))
    }

    /// Re-expands reduced coefficients in the truth space as `Z[:N] * coefficients`.
    ///
    /// # Errors
    ///
    /// Fails if there are more coefficients than basis functions.
    pub fn reconstruct(&self, coefficients: &DVector<f64>) -> Result<DVector<f64>, BasisError> {
        if coefficients.len() > self.len() {
            return Err(BasisError::TooFew {
                requested: coefficients.len(),
                available: self.len(),
            });
        }
        let mut result = DVector::zeros(self.dimension);
        for (column, &coefficient) in self.columns.iter().zip(coefficients.iter()) {
            result.axpy(coefficient, column, 1.0);
        }
        Ok(result)
    }

    /// Saves the basis under `name`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn save(&self, folder: &Folder, name: &str) -> Result<(), StorageError> {
        folder.save(name, self)
    }

    /// Loads a basis saved under `name`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn load(folder: &Folder, name: &str) -> Result<Self, StorageError> {
        folder.load(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn sample() -> BasisFunctions {
        let mut basis = BasisFunctions::new(3);
        basis
            .enrich(DVector::from_vec(vec![1.0, 0.0, 0.0]))
            .expect("fits");
        basis
            .enrich(DVector::from_vec(vec![0.0, 2.0, 1.0]))
            .expect("fits");
        basis
    }

    #[test]
    fn enrich_checks_the_dimension() {
        let mut basis = sample();
        assert_eq!(
            basis.enrich(DVector::zeros(2)),
            Err(BasisError::Dimension {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(basis.len(), 2);
    }

    #[test]
    fn matrix_is_truncated_to_the_leading_columns() {
        let basis = sample();

        let z = basis.matrix(1).expect("one column exists");

        assert_eq!(z.shape(), (3, 1));
        assert_eq!(basis.matrix(0).expect("empty block").shape(), (3, 0));
        assert!(matches!(basis.matrix(3), Err(BasisError::TooFew { .. })));
    }

    #[test]
    fn reconstruct_is_z_times_coefficients() {
        let basis = sample();
        let coefficients = DVector::from_vec(vec![2.0, -1.0]);

        let expanded = basis.reconstruct(&coefficients).expect("should expand");

        let z = basis.matrix(2).expect("two columns");
        assert_relative_eq!(expanded, z * coefficients);
    }
}
