use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    algebra::{AlgebraError, LinearCombination, product_sum},
    storage::{Folder, StorageError},
};

/// The ordered operators of one term's affine decomposition.
///
/// The length `Q` is fixed once the expansion is assembled and must match the
/// number of coefficients the problem returns for the same term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffineExpansion<T> {
    operators: Vec<T>,
}

impl<T> AffineExpansion<T> {
    #[must_use]
    pub fn new(operators: Vec<T>) -> Self {
        Self { operators }
    }

    /// An expansion with `Q = 0`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            operators: Vec::new(),
        }
    }

    /// Returns `Q`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    #[must_use]
    pub fn get(&self, q: usize) -> Option<&T> {
        self.operators.get(q)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.operators.iter()
    }

    pub fn push(&mut self, operator: T) {
        self.operators.push(operator);
    }

    /// Applies `f` to every operator, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn try_map<U, E>(&self, f: impl FnMut(&T) -> Result<U, E>) -> Result<AffineExpansion<U>, E> {
        self.operators.iter().map(f).collect()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.operators
    }
}

impl<T> Default for AffineExpansion<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: LinearCombination> AffineExpansion<T> {
    /// Returns `sum_q thetas[q] * operators[q]`.
    ///
    /// # Errors
    ///
    /// Fails if `thetas.len() != Q`, if `Q == 0`, or if the operators have
    /// incompatible shapes.
    pub fn combine(&self, thetas: &[f64]) -> Result<T, AlgebraError> {
        product_sum(thetas, &self.operators)
    }
}

impl<T: Serialize> AffineExpansion<T> {
    /// Saves the expansion under `name`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn save(&self, folder: &Folder, name: &str) -> Result<(), StorageError> {
        folder.save(name, self)
    }
}

impl<T: DeserializeOwned> AffineExpansion<T> {
    /// Loads an expansion saved under `name`; `Q` is whatever was stored.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn load(folder: &Folder, name: &str) -> Result<Self, StorageError> {
        folder.load(name)
    }
}

impl<T> FromIterator<T> for AffineExpansion<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a AffineExpansion<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.operators.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    use crate::algebra::ReducedOperator;

    #[test]
    fn combine_checks_the_number_of_thetas() {
        let expansion: AffineExpansion<DVector<f64>> =
            [1.0, 2.0].iter().map(|&v| DVector::from_element(2, v)).collect();

        assert_eq!(expansion.len(), 2);
        assert!(matches!(
            expansion.combine(&[1.0]),
            Err(AlgebraError::ThetaCount {
                expected: 2,
                found: 1
            })
        ));
        assert_relative_eq!(
            expansion.combine(&[1.0, 1.0]).expect("should combine"),
            DVector::from_element(2, 3.0)
        );
    }

    #[test]
    fn storage_round_trip_discovers_q() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let folder = Folder::new(dir.path());
        let expansion = AffineExpansion::new(vec![
            ReducedOperator::Matrix(DMatrix::identity(2, 2)),
            ReducedOperator::Matrix(DMatrix::from_element(2, 2, 0.5)),
            ReducedOperator::Matrix(DMatrix::zeros(2, 2)),
        ]);

        expansion.save(&folder, "a").expect("should save");
        let loaded: AffineExpansion<ReducedOperator> =
            AffineExpansion::load(&folder, "a").expect("should load");

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded, expansion);
    }

    #[test]
    fn empty_expansions_persist() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let folder = Folder::new(dir.path());

        AffineExpansion::<ReducedOperator>::empty()
            .save(&folder, "unused")
            .expect("should save");

        assert!(folder.exists("unused"));
        let loaded: AffineExpansion<ReducedOperator> =
            AffineExpansion::load(&folder, "unused").expect("should load");
        assert!(loaded.is_empty());
    }
}
