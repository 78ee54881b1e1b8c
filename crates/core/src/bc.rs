use std::collections::BTreeMap;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::algebra::{AlgebraError, LinearCombination};

/// A set of Dirichlet constraints: prescribed values keyed by degree of freedom.
///
/// Combining two sets sums the values prescribed on a shared degree of
/// freedom, so an affine expansion of boundary data recombines like any
/// other operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirichletBc(BTreeMap<usize, f64>);

impl DirichletBc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prescribes `value` on `dof`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, dof: usize, value: f64) -> Self {
        self.0.insert(dof, value);
        self
    }

    pub fn insert(&mut self, dof: usize, value: f64) {
        self.0.insert(dof, value);
    }

    #[must_use]
    pub fn get(&self, dof: usize) -> Option<f64> {
        self.0.get(&dof).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(dof, value)` pairs in increasing dof order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().map(|(&dof, &value)| (dof, value))
    }

    /// Iterates over the constrained dofs.
    pub fn dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    /// Returns `true` if every prescribed value is zero.
    #[must_use]
    pub fn is_homogeneous(&self) -> bool {
        self.0.values().all(|&value| value == 0.0)
    }

    /// Returns the same constraints with every value set to zero.
    #[must_use]
    pub fn homogenized(&self) -> Self {
        Self(self.0.keys().map(|&dof| (dof, 0.0)).collect())
    }

    /// Returns the vector of length `dimension` that carries the prescribed
    /// values and vanishes elsewhere.
    ///
    /// Returns `None` if a constrained dof lies outside the vector.
    #[must_use]
    pub fn lifting(&self, dimension: usize) -> Option<DVector<f64>> {
        let mut lifting = DVector::zeros(dimension);
        for (dof, value) in self.iter() {
            *lifting.get_mut(dof)? = value;
        }
        Some(lifting)
    }
}

impl FromIterator<(usize, f64)> for DirichletBc {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl LinearCombination for DirichletBc {
    fn scaled(&self, theta: f64) -> Self {
        Self(self.0.iter().map(|(&dof, &value)| (dof, theta * value)).collect())
    }

    fn add_scaled(&mut self, theta: f64, other: &Self) -> Result<(), AlgebraError> {
        for (dof, value) in other.iter() {
            *self.0.entry(dof).or_insert(0.0) += theta * value;
        }
        Ok(())
    }
}
