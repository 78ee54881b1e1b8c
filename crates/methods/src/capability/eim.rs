use std::{collections::BTreeMap, rc::Rc};

use reduct_core::{Capability, EmpiricalInterpolation, Observer, SharedTruth};

use crate::{
    analysis::{ErrorAnalysis, SpeedupAnalysis},
    error::Error,
    method::{Action, AssemblyMode, Event, MethodCore, ReductionMethod},
    reduced::{ReducedCore, ReducedProblem, SharedReducedProblem},
    stage::Stage,
};

/// Folder holding one trained interpolant per parametrized function.
const INTERPOLATION: &str = "empirical_interpolation";

/// Trains empirical interpolants before the wrapped method runs.
///
/// Interpolants are trained on the training set, saved, and attached to the
/// truth problem so that the reduced operators are assembled from them. When
/// an outer layer already switched to exact evaluation they are trained and
/// saved but not attached.
pub struct EmpiricalInterpolationMethod {
    inner: Box<dyn ReductionMethod>,
    interpolations: BTreeMap<String, EmpiricalInterpolation>,
}

impl EmpiricalInterpolationMethod {
    #[must_use]
    pub fn new(inner: Box<dyn ReductionMethod>) -> Self {
        Self {
            inner,
            interpolations: BTreeMap::new(),
        }
    }

    /// Returns the trained interpolants by function name.
    #[must_use]
    pub fn interpolations(&self) -> &BTreeMap<String, EmpiricalInterpolation> {
        &self.interpolations
    }

    fn train(&mut self) -> Result<(), Error> {
        let config = self.core().settings().interpolation;
        let training = self.core_mut().training_set()?;
        let truth = Rc::clone(self.core().truth());
        let folder = self.core().folders().folder(INTERPOLATION);
        folder.create()?;

        let functions = truth.borrow().parametrized_functions();
        for name in functions {
            let snapshots = {
                let truth = truth.borrow();
                training
                    .iter()
                    .map(|mu| truth.evaluate_parametrized_function(&name, mu))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let (interpolation, history) =
                EmpiricalInterpolation::train(&snapshots, config.n_max(), config.tolerance())?;
            log::info!(
                "interpolated `{name}` with {} functions, final error {:e}",
                interpolation.len(),
                history.last().copied().unwrap_or(0.0)
            );
            folder.save(&name, &interpolation)?;
            self.interpolations.insert(name, interpolation);
        }
        Ok(())
    }
}

impl ReductionMethod for EmpiricalInterpolationMethod {
    fn layer(&self) -> &'static str {
        "empirical interpolation"
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
        self.train()?;
        if self.core().mode() == AssemblyMode::Exact {
            log::debug!("exact evaluation requested, interpolants are not attached");
        } else {
            let truth = Rc::clone(self.core().truth());
            for (name, interpolation) in &self.interpolations {
                truth
                    .borrow_mut()
                    .attach_interpolation(name, interpolation.clone())?;
            }
            self.core_mut().mode = AssemblyMode::Empirical;
        }
        self.inner.offline(observer)
    }

    /// Adds the interpolation error of every function at every testing
    /// parameter to the wrapped analysis.
    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        let mut analysis = self.inner.error_analysis(n)?;
        let testing = self.core_mut().testing_set()?;
        let truth = Rc::clone(self.core().truth());
        let truth = truth.borrow();
        for (name, interpolation) in &self.interpolations {
            let errors = testing
                .iter()
                .map(|mu| {
                    let function = truth.evaluate_parametrized_function(name, mu)?;
                    interpolation
                        .error(&function)
                        .ok_or(Error::Unsupported("interpolation of a function of another size"))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            analysis.interpolation_errors.insert(name.clone(), errors);
        }
        Ok(analysis)
    }

    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        self.inner.speedup_analysis(n)
    }
}

/// Loads and attaches the stored interpolants when going online.
pub struct EmpiricalInterpolationProblem {
    inner: Box<dyn ReducedProblem>,
}

impl EmpiricalInterpolationProblem {
    #[must_use]
    pub fn new(inner: Box<dyn ReducedProblem>) -> Self {
        Self { inner }
    }

    fn attach_stored(truth: &SharedTruth, core: &ReducedCore) -> Result<(), Error> {
        let folder = core.folders().folder(INTERPOLATION);
        let functions = truth.borrow().parametrized_functions();
        for name in functions {
            let interpolation: EmpiricalInterpolation = folder.load(&name)?;
            truth.borrow_mut().attach_interpolation(&name, interpolation)?;
        }
        Ok(())
    }
}

impl ReducedProblem for EmpiricalInterpolationProblem {
    fn layer(&self) -> &'static str {
        "empirical interpolation"
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

    fn init(&mut self, stage: Stage) -> Result<(), Error> {
        if stage == Stage::Online {
            let truth = Rc::clone(self.core().truth());
            let exact = truth
                .borrow()
                .capabilities()
                .contains(&Capability::ExactParametrizedFunctions);
            if !exact {
                Self::attach_stored(&truth, self.core())?;
            }
        }
        self.inner.init(stage)
    }
}
