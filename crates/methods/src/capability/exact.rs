use nalgebra::DVector;
use reduct_core::Observer;

use crate::{
    analysis::{ErrorAnalysis, SpeedupAnalysis},
    error::Error,
    method::{Action, AssemblyMode, Event, MethodCore, ReductionMethod},
    reduced::{ReducedCore, ReducedProblem, SharedReducedProblem, is_square},
};

/// Switches the assembly of parametrized functions to exact evaluation.
pub struct ExactEvaluationMethod {
    inner: Box<dyn ReductionMethod>,
}

impl ExactEvaluationMethod {
    #[must_use]
    pub fn new(inner: Box<dyn ReductionMethod>) -> Self {
        Self { inner }
    }
}

impl ReductionMethod for ExactEvaluationMethod {
    fn layer(&self) -> &'static str {
        "exact parametrized functions"
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
        self.core_mut().mode = AssemblyMode::Exact;
        self.inner.offline(observer)
    }

    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        self.inner.error_analysis(n)
    }

    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        self.inner.speedup_analysis(n)
    }
}

/// Re-projects the truth operators at the current parameter before every
/// online solve.
///
/// Stored operators are replaced in memory only; the offline data on disk is
/// left untouched.
pub struct ExactEvaluationProblem {
    inner: Box<dyn ReducedProblem>,
}

impl ExactEvaluationProblem {
    #[must_use]
    pub fn new(inner: Box<dyn ReducedProblem>) -> Self {
        Self { inner }
    }

    fn reproject(&mut self) -> Result<(), Error> {
        let terms: Vec<_> = self
            .core()
            .terms()
            .keys()
            .filter(|term| is_square(term))
            .cloned()
            .collect();
        for term in terms {
            let operators = self.core().project_truth_term(&term)?;
            let core = self.core_mut();
            core.terms.insert(term.clone(), operators.len());
            core.operators.insert(term, operators);
        }
        Ok(())
    }
}

impl ReducedProblem for ExactEvaluationProblem {
    fn layer(&self) -> &'static str {
        "exact parametrized functions"
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

    fn solve(&mut self, n: usize) -> Result<DVector<f64>, Error> {
        self.reproject()?;
        self.inner.solve(n)
    }
}
