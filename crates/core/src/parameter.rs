use std::{fmt, ops::Index};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in parameter space, usually written `mu`.
///
/// Parameters are immutable once built; problems carry the currently active
/// one and replace it wholesale on every `set_mu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter(Vec<f64>);

impl Parameter {
    /// Creates a parameter from its ordered components.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self(values.into())
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the zero-dimensional parameter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the components as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Index<usize> for Parameter {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl<const N: usize> From<[f64; N]> for Parameter {
    fn from(values: [f64; N]) -> Self {
        Self(values.to_vec())
    }
}

impl From<Vec<f64>> for Parameter {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Errors raised while describing or sampling a parameter domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("invalid bounds for component {index}: [{min}, {max}]")]
    InvalidBounds { index: usize, min: f64, max: f64 },

    #[error("parameter has {found} components, domain has {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("component {index} = {value} lies outside [{min}, {max}]")]
    OutOfRange {
        index: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("cannot sample an empty parameter set")]
    EmptySet,
}

/// The box domain `[min_0, max_0] x ... x [min_p, max_p]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange(Vec<(f64, f64)>);

impl ParameterRange {
    /// Creates a domain from ordered `(min, max)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is non-finite or `min > max`.
    pub fn new(bounds: impl Into<Vec<(f64, f64)>>) -> Result<Self, SamplingError> {
        let bounds = bounds.into();
        for (index, &(min, max)) in bounds.iter().enumerate() {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(SamplingError::InvalidBounds { index, min, max });
            }
        }
        Ok(Self(bounds))
    }

    /// Returns the number of parameter components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.0
    }

    /// Checks that `mu` has the right dimension and lies inside the box.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn check(&self, mu: &Parameter) -> Result<(), SamplingError> {
        if mu.len() != self.len() {
            return Err(SamplingError::DimensionMismatch {
                expected: self.len(),
                found: mu.len(),
            });
        }
        for (index, (&value, &(min, max))) in mu.as_slice().iter().zip(&self.0).enumerate() {
            if !(min..=max).contains(&value) {
                return Err(SamplingError::OutOfRange {
                    index,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// How sample points are distributed in the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampling {
    /// Tensor grid with the same number of points along every component.
    Equispaced,
    /// Independent uniform draws from a seeded generator.
    Random { seed: u64 },
}

/// A finite, ordered set of parameters used for training or testing.
///
/// Sets are generated once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet(Vec<Parameter>);

impl ParameterSet {
    /// Samples `size` points from `range`.
    ///
    /// Equispaced sampling places `round(size^(1/p))` points per component
    /// and returns their tensor product, so the resulting length may differ
    /// from `size` when `size` is not a perfect power.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::EmptySet`] when `size` is zero.
    pub fn generate(
        range: &ParameterRange,
        size: usize,
        sampling: Sampling,
    ) -> Result<Self, SamplingError> {
        if size == 0 {
            return Err(SamplingError::EmptySet);
        }
        if range.is_empty() {
            return Ok(Self(vec![Parameter::new(Vec::new())]));
        }

        let points = match sampling {
            Sampling::Equispaced => equispaced(range, size),
            Sampling::Random { seed } => random(range, size, seed),
        };
        Ok(Self(points))
    }

    /// Wraps an explicit list of points.
    #[must_use]
    pub fn from_points(points: Vec<Parameter>) -> Self {
        Self(points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn equispaced(range: &ParameterRange, size: usize) -> Vec<Parameter> {
    let dims = range.len();
    let per_dim = ((size as f64).powf(1.0 / dims as f64).round() as usize).max(1);

    let axes: Vec<Vec<f64>> = range
        .bounds()
        .iter()
        .map(|&(min, max)| {
            if per_dim == 1 {
                vec![min]
            } else {
                (0..per_dim)
                    .map(|i| min + (max - min) * i as f64 / (per_dim - 1) as f64)
                    .collect()
            }
        })
        .collect();

    let mut points: Vec<Vec<f64>> = vec![Vec::with_capacity(dims)];
    for axis in &axes {
        points = points
            .into_iter()
            .flat_map(|prefix| {
                axis.iter().map(move |&value| {
                    let mut next = prefix.clone();
                    next.push(value);
                    next
                })
            })
            .collect();
    }
    points.into_iter().map(Parameter::new).collect()
}

fn random(range: &ParameterRange, size: usize, seed: u64) -> Vec<Parameter> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            range
                .bounds()
                .iter()
                .map(|&(min, max)| {
                    if min < max {
                        rng.random_range(min..=max)
                    } else {
                        min
                    }
                })
                .collect::<Vec<_>>()
                .into()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn unit_square() -> ParameterRange {
        ParameterRange::new(vec![(0.0, 1.0), (0.0, 2.0)]).unwrap()
    }

    #[test]
    fn rejects_inverted_bounds() {
        let result = ParameterRange::new(vec![(1.0, 0.0)]);
        assert!(matches!(
            result,
            Err(SamplingError::InvalidBounds { index: 0, .. })
        ));
    }

    #[test]
    fn check_reports_out_of_range_component() {
        let range = unit_square();
        assert!(range.check(&Parameter::from([0.5, 1.5])).is_ok());
        assert!(matches!(
            range.check(&Parameter::from([0.5, 2.5])),
            Err(SamplingError::OutOfRange { index: 1, .. })
        ));
        assert!(matches!(
            range.check(&Parameter::from([0.5])),
            Err(SamplingError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn equispaced_builds_tensor_grid() {
        let set = ParameterSet::generate(&unit_square(), 9, Sampling::Equispaced).unwrap();

        assert_eq!(set.len(), 9);
        assert_eq!(set.get(0), Some(&Parameter::from([0.0, 0.0])));
        assert_eq!(set.get(1), Some(&Parameter::from([0.0, 1.0])));
        let last = set.get(8).unwrap();
        assert_relative_eq!(last[0], 1.0);
        assert_relative_eq!(last[1], 2.0);
    }

    #[test]
    fn random_sampling_is_seeded_and_inside_the_box() {
        let range = unit_square();
        let first = ParameterSet::generate(&range, 20, Sampling::Random { seed: 7 }).unwrap();
        let second = ParameterSet::generate(&range, 20, Sampling::Random { seed: 7 }).unwrap();

        assert_eq!(first, second);
        assert!(first.iter().all(|mu| range.check(mu).is_ok()));
    }

    #[test]
    fn empty_request_is_an_error() {
        let result = ParameterSet::generate(&unit_square(), 0, Sampling::Equispaced);
        assert_eq!(result, Err(SamplingError::EmptySet));
    }

    #[test]
    fn displays_as_tuple() {
        assert_eq!(Parameter::from([1.0, 0.5]).to_string(), "(1, 0.5)");
    }
}
