use std::rc::Rc;

use reduct_core::{BasisError, Observer, Parameter, ParameterSet, SamplingError, truth};

use crate::{
    analysis::{self, ErrorAnalysis, SpeedupAnalysis},
    error::Error,
    reduced::SharedReducedProblem,
    stage::Stage,
};

use super::{Action, Event, MethodCore, ReductionMethod};

/// The greedy reduced basis method.
///
/// # Algorithm
///
/// Starting from the first training parameter:
///
/// 1. Solve the truth problem, remove the Dirichlet lifting, append the
///    snapshot to the basis and orthonormalize it in the inner product.
/// 2. Rebuild the reduced operators.
/// 3. Solve the reduced problem on every training parameter and pick the one
///    with the largest error estimate as the next snapshot.
///
/// The loop stops at `n_max` basis functions, once the largest estimate
/// falls to the tolerance, when a snapshot is linearly dependent on the
/// basis, or when the observer returns [`Action::StopEarly`].
pub struct ReducedBasis {
    core: MethodCore,
}

impl ReducedBasis {
    #[must_use]
    pub fn new(core: MethodCore) -> Self {
        Self { core }
    }

    /// Appends the truth snapshot at `mu`, returning `false` if it adds
    /// nothing to the basis.
    fn enrich(&self, mu: &Parameter) -> Result<bool, Error> {
        let gram_schmidt = self.core.gram_schmidt()?;
        let truth = Rc::clone(self.core.truth());
        let mut reduced = self.core.reduced().borrow_mut();
        reduced.set_mu(mu.clone())?;

        let solution = truth::solve_or_import(&mut *truth.borrow_mut())?;
        let mut snapshot = solution
            .states()
            .last()
            .cloned()
            .ok_or(Error::Unsupported("empty truth solution"))?;
        if let Some(lifting) = reduced.core().lifting()? {
            snapshot -= lifting;
        }

        let n_bc = reduced.core().n_bc();
        let basis = reduced.core_mut().basis_mut();
        basis.enrich(snapshot)?;
        match gram_schmidt.apply(basis, n_bc) {
            Ok(()) => Ok(true),
            Err(BasisError::LinearlyDependent { index }) => {
                log::warn!("snapshot at {mu} is linearly dependent (column {index}), stopping");
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Returns the training parameter with the largest error estimate.
    fn worst_parameter(
        &self,
        training: &ParameterSet,
        n: usize,
    ) -> Result<(f64, Parameter), Error> {
        let mut reduced = self.core.reduced().borrow_mut();
        let mut worst: Option<(f64, Parameter)> = None;
        for mu in training.iter() {
            reduced.set_mu(mu.clone())?;
            reduced.solve(n)?;
            let estimate = reduced.estimate_error()?;
            if worst.as_ref().is_none_or(|(max, _)| estimate > *max) {
                worst = Some((estimate, mu.clone()));
            }
        }
        worst.ok_or(Error::Sampling(SamplingError::EmptySet))
    }
}

impl ReductionMethod for ReducedBasis {
    fn layer(&self) -> &'static str {
        "reduced basis"
    }

    fn core(&self) -> &MethodCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MethodCore {
        &mut self.core
    }

    fn offline(
        &mut self,
        observer: &mut dyn Observer<Event, Action>,
    ) -> Result<SharedReducedProblem, Error> {
        let config = self.core.settings().greedy;
        let training = self.core.training_set()?;
        self.core.reduced().borrow_mut().init(Stage::Offline)?;
        self.core.push_liftings()?;

        let mut mu = training
            .get(0)
            .cloned()
            .ok_or(Error::Sampling(SamplingError::EmptySet))?;
        let mut built = false;
        for iteration in 0.. {
            log::info!("greedy iteration {iteration}: snapshot at {mu}");
            if !self.enrich(&mu)? {
                break;
            }
            self.core.reduced().borrow_mut().build_reduced_operators()?;
            built = true;

            let n = self.core.reduced().borrow().core().n_max();
            if n >= config.n_max() {
                log::info!("reached the maximum basis size {n}");
                break;
            }

            let (max_error_estimate, next) = self.worst_parameter(&training, n)?;
            log::info!("N = {n}: maximum error estimate {max_error_estimate:e} at {next}");
            let event = Event::GreedyIteration {
                iteration,
                n,
                max_error_estimate,
                next: next.clone(),
            };
            if let Some(Action::StopEarly) = observer.observe(&event) {
                log::info!("greedy stopped by observer");
                break;
            }
            if max_error_estimate <= config.tolerance() {
                break;
            }
            mu = next;
        }

        if !built {
            self.core.reduced().borrow_mut().build_reduced_operators()?;
        }
        Ok(Rc::clone(self.core.reduced()))
    }

    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        analysis::errors(&mut self.core, n)
    }

    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        analysis::speedup(&mut self.core, n)
    }
}
