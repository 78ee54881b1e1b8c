use reduct_core::Observer;

use crate::{
    analysis::{ErrorAnalysis, SpeedupAnalysis},
    error::Error,
    reduced::SharedReducedProblem,
};

use super::{Action, Event, MethodCore, ReductionMethod};

/// Reduction of a time-dependent problem.
///
/// Snapshots and errors already cover every time step in the layers below;
/// this layer checks that the truth problem carries a time grid before any
/// stage runs.
pub struct TimeDependentReduction {
    inner: Box<dyn ReductionMethod>,
}

impl TimeDependentReduction {
    #[must_use]
    pub fn new(inner: Box<dyn ReductionMethod>) -> Self {
        Self { inner }
    }

    fn check_time_grid(&self) -> Result<(), Error> {
        let truth = self.core().truth().borrow();
        match truth.time_grid() {
            Some(grid) => {
                log::debug!(
                    "{}: {} steps of {} up to {}",
                    truth.name(),
                    grid.steps(),
                    grid.dt(),
                    grid.final_time()
                );
                Ok(())
            }
            None => Err(Error::Configuration(format!(
                "truth problem `{}` has no time grid",
                truth.name()
            ))),
        }
    }
}

impl ReductionMethod for TimeDependentReduction {
    fn layer(&self) -> &'static str {
        "time dependent"
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
        self.check_time_grid()?;
        self.inner.offline(observer)
    }

    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        self.check_time_grid()?;
        self.inner.error_analysis(n)
    }

    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        self.check_time_grid()?;
        self.inner.speedup_analysis(n)
    }
}
