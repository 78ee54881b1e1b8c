use std::{cell::RefCell, rc::Rc};

use reduct_core::{
    EigenvalueBounds, Observer, ParameterSet, SharedTruth, SpectralBounds, Term, truth,
};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{ErrorAnalysis, SpeedupAnalysis},
    error::{DimensionError, Error},
    method::{Action, Event, MethodCore, ReductionMethod},
    reduced::{ReducedCore, ReducedProblem, SharedReducedProblem},
};

/// Folder holding the trained bounds.
const SCM: &str = "scm";

/// Name of the stored bounds inside [`SCM`].
const BOUNDS: &str = "bounds";

/// Eigenvalues above this are treated as non-negative.
const PSD_TOLERANCE: f64 = 1e-12;

/// Bounds shared between the method layer that trains them and the reduced
/// layer that evaluates them.
pub type SharedScmBounds = Rc<RefCell<Option<ScmBounds>>>;

/// A coercivity constant computed exactly at a training parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Anchor {
    thetas: Vec<f64>,
    alpha: f64,
}

/// Offline data of the successive constraint method.
///
/// # Algorithm
///
/// With `a(mu) = sum_q theta_q(mu) a_q`, two lower bounds of the coercivity
/// constant are available online without any truth-size computation:
///
/// - the bounding box `sum_q theta_q (theta_q >= 0 ? min_q : max_q)`, where
///   `[min_q, max_q]` bounds the generalized eigenvalues of `a_q`,
/// - for positive semi-definite `a_q` and positive coefficients, the anchor
///   bound `alpha(mu_k) * min_q theta_q(mu) / theta_q(mu_k)` at each training
///   parameter `mu_k` whose constant was computed exactly.
///
/// The larger of the valid bounds is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmBounds {
    bounds: Vec<EigenvalueBounds>,
    anchors: Vec<Anchor>,
}

impl ScmBounds {
    /// Trains the bounds of the stiffness term, with exact constants at up to
    /// `n_anchors` evenly spread training parameters.
    ///
    /// The truth parameter is restored afterwards.
    ///
    /// # Errors
    ///
    /// Propagates truth assembly and eigenvalue failures.
    pub fn train(
        truth: &SharedTruth,
        training: &ParameterSet,
        n_anchors: usize,
    ) -> Result<Self, Error> {
        let (spectral, operators, original) = {
            let truth = truth.borrow();
            let spectral =
                SpectralBounds::new(&truth::inner_product(&*truth)?, truth::free_dofs(&*truth)?)?;
            (
                spectral,
                truth.assemble_operator(&Term::Stiffness)?,
                truth.mu().clone(),
            )
        };

        let bounds = operators
            .iter()
            .map(|operator| Ok(spectral.bounds(operator.as_matrix()?)?))
            .collect::<Result<Vec<_>, Error>>()?;

        let stride = (training.len() / n_anchors.max(1)).max(1);
        let anchors = training
            .iter()
            .step_by(stride)
            .take(n_anchors)
            .map(|mu| {
                truth.borrow_mut().set_mu(mu.clone())?;
                let truth = truth.borrow();
                let alpha =
                    spectral.coercivity_constant(&truth::matrix(&*truth, &Term::Stiffness)?)?;
                Ok(Anchor {
                    thetas: truth.compute_theta(&Term::Stiffness)?,
                    alpha,
                })
            })
            .collect::<Result<Vec<_>, Error>>();
        truth.borrow_mut().set_mu(original)?;
        let anchors = anchors?;

        log::info!(
            "trained SCM bounds for {} operators with {} anchors",
            bounds.len(),
            anchors.len()
        );
        Ok(Self { bounds, anchors })
    }

    /// Returns a lower bound of the coercivity constant for the stiffness
    /// coefficients `thetas`.
    ///
    /// # Errors
    ///
    /// Returns a dimension error if `thetas` does not match the trained
    /// operators.
    pub fn lower_bound(&self, thetas: &[f64]) -> Result<f64, Error> {
        if thetas.len() != self.bounds.len() {
            return Err(DimensionError::ThetaLength {
                term: Term::Stiffness,
                expected: self.bounds.len(),
                found: thetas.len(),
            }
            .into());
        }

        let mut best: f64 = thetas
            .iter()
            .zip(&self.bounds)
            .map(|(theta, bounds)| {
                if *theta >= 0.0 {
                    theta * bounds.min
                } else {
                    theta * bounds.max
                }
            })
            .sum();

        let monotone = thetas.iter().all(|theta| *theta > 0.0)
            && self.bounds.iter().all(|bounds| bounds.min >= -PSD_TOLERANCE);
        if monotone {
            for anchor in &self.anchors {
                if anchor.thetas.iter().any(|theta| *theta <= 0.0) {
                    continue;
                }
                let ratio = thetas
                    .iter()
                    .zip(&anchor.thetas)
                    .map(|(theta, anchor)| theta / anchor)
                    .fold(f64::INFINITY, f64::min);
                best = best.max(anchor.alpha * ratio);
            }
        }
        Ok(best)
    }
}

/// Trains the SCM bounds before the wrapped method runs, since greedy error
/// estimates need them.
pub struct SuccessiveConstraintMethod {
    inner: Box<dyn ReductionMethod>,
    bounds: SharedScmBounds,
    n_anchors: usize,
}

impl SuccessiveConstraintMethod {
    /// Default number of exact constants computed offline.
    pub const ANCHORS: usize = 10;

    #[must_use]
    pub fn new(inner: Box<dyn ReductionMethod>, bounds: SharedScmBounds) -> Self {
        Self {
            inner,
            bounds,
            n_anchors: Self::ANCHORS,
        }
    }
}

impl ReductionMethod for SuccessiveConstraintMethod {
    fn layer(&self) -> &'static str {
        "successive constraint"
    }

    fn inner(&self) -> Option<&dyn ReductionMethod> {
        Some(self.inner.as_ref() as &dyn ReductionMethod)
    }

    fn inner_mut(&mut self) -> Option<&mut dyn ReductionMethod> {
        Some(self.inner.as_mut() as &mut dyn ReductionMethod)
    }

    fn core(&self) -> &MethodCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut MethodCore {
        self.inner.core_mut()
    }

    fn offline(
        &mut self,
        observer: &mut dyn Observer<Event, Action>,
    ) -> Result<SharedReducedProblem, Error> {
        let training = self.core_mut().training_set()?;
        let bounds = ScmBounds::train(self.core().truth(), &training, self.n_anchors)?;
        let folder = self.core().folders().folder(SCM);
        folder.create()?;
        folder.save(BOUNDS, &bounds)?;
        *self.bounds.borrow_mut() = Some(bounds);
        self.inner.offline(observer)
    }

    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        self.inner.error_analysis(n)
    }

    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        self.inner.speedup_analysis(n)
    }
}

/// Uses the SCM lower bound as the stability factor.
pub struct SuccessiveConstraintProblem {
    inner: Box<dyn ReducedProblem>,
    bounds: SharedScmBounds,
}

impl SuccessiveConstraintProblem {
    #[must_use]
    pub fn new(inner: Box<dyn ReducedProblem>, bounds: SharedScmBounds) -> Self {
        Self { inner, bounds }
    }
}

impl ReducedProblem for SuccessiveConstraintProblem {
    fn layer(&self) -> &'static str {
        "successive constraint"
    }

    fn inner(&self) -> Option<&dyn ReducedProblem> {
        Some(self.inner.as_ref() as &dyn ReducedProblem)
    }

    fn inner_mut(&mut self) -> Option<&mut dyn ReducedProblem> {
        Some(self.inner.as_mut() as &mut dyn ReducedProblem)
    }

    fn core(&self) -> &ReducedCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut ReducedCore {
        self.inner.core_mut()
    }

    /// Returns the SCM lower bound, loading stored bounds on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonPositiveStabilityFactor`] if the bound is not
    /// positive.
    fn stability_factor(&mut self) -> Result<f64, Error> {
        if self.bounds.borrow().is_none() {
            let stored: ScmBounds = self.core().folders().folder(SCM).load(BOUNDS)?;
            *self.bounds.borrow_mut() = Some(stored);
        }
        let thetas = self.core().theta(&Term::Stiffness)?;
        let bound = match self.bounds.borrow().as_ref() {
            Some(bounds) => bounds.lower_bound(&thetas)?,
            None => return Err(Error::Unsupported("stability factor without SCM bounds")),
        };
        if bound > 0.0 {
            Ok(bound)
        } else {
            Err(Error::NonPositiveStabilityFactor(bound))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn bounds() -> ScmBounds {
        ScmBounds {
            bounds: vec![
                EigenvalueBounds { min: 0.0, max: 1.0 },
                EigenvalueBounds { min: 0.0, max: 1.0 },
            ],
            anchors: vec![Anchor {
                thetas: vec![1.0, 1.0],
                alpha: 1.0,
            }],
        }
    }

    #[test]
    fn anchor_bound_scales_with_the_smallest_ratio() {
        let bound = bounds().lower_bound(&[2.0, 0.5]).expect("two coefficients");
        assert_relative_eq!(bound, 0.5);
    }

    #[test]
    fn box_bound_applies_without_anchors() {
        let bounds = ScmBounds {
            bounds: vec![EigenvalueBounds { min: 0.5, max: 2.0 }],
            anchors: Vec::new(),
        };
        assert_relative_eq!(bounds.lower_bound(&[3.0]).expect("one coefficient"), 1.5);
        assert_relative_eq!(bounds.lower_bound(&[-1.0]).expect("one coefficient"), -2.0);
    }

    #[test]
    fn mismatched_coefficients_are_rejected() {
        assert!(matches!(
            bounds().lower_bound(&[1.0]),
            Err(Error::Dimension(DimensionError::ThetaLength { .. }))
        ));
    }
}
