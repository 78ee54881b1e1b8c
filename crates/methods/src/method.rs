//! Reduction methods: offline basis construction and online analysis.
//!
//! A reduction method owns the truth problem and the reduced problem it
//! builds. Like reduced problems, methods are layered: capability wrappers
//! (empirical interpolation, SCM, ...) implement [`ReductionMethod`], hold
//! the layer below, and override only the stage their capability changes.
//!
//! # Observer Events
//!
//! [`ReductionMethod::offline`] emits one [`Event`] per greedy iteration, per
//! POD snapshot, and once when POD modes are selected. Observers can return
//! [`Action::StopEarly`] to keep the basis built so far.

mod action;
mod config;
mod event;
mod greedy;
mod pod;
mod shared;
mod time;

pub use action::Action;
pub use config::{ConfigError, GreedyConfig, PodConfig, Settings, TrainingConfig};
pub use event::Event;
pub use greedy::ReducedBasis;
pub use pod::PodGalerkin;
pub use shared::{AssemblyMode, MethodCore};
pub use time::TimeDependentReduction;

use std::rc::Rc;

use reduct_core::Observer;

use crate::{
    analysis::{ErrorAnalysis, SpeedupAnalysis},
    error::Error,
    reduced::SharedReducedProblem,
};

/// One layer of a reduction method.
pub trait ReductionMethod {
    /// A short name for this layer.
    fn layer(&self) -> &'static str;

    /// Returns the wrapped layer, if any.
    fn inner(&self) -> Option<&dyn ReductionMethod> {
        None
    }

    /// Returns the wrapped layer, if any.
    fn inner_mut(&mut self) -> Option<&mut dyn ReductionMethod> {
        None
    }

    /// Returns the state shared by all layers.
    fn core(&self) -> &MethodCore;

    fn core_mut(&mut self) -> &mut MethodCore;

    /// Builds the reduced basis and reduced operators.
    ///
    /// The observer receives an [`Event`] per step and may stop the
    /// construction early.
    ///
    /// # Errors
    ///
    /// Propagates truth, projection and storage failures.
    fn offline(
        &mut self,
        observer: &mut dyn Observer<Event, Action>,
    ) -> Result<SharedReducedProblem, Error> {
        forward_mut(self)?.offline(observer)
    }

    /// Compares reduced and truth solutions over the testing set with `n`
    /// basis functions (all of them when `None`).
    ///
    /// Truth solutions are recomputed, never imported.
    ///
    /// # Errors
    ///
    /// Returns a dimension error if `n` exceeds the basis size.
    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        forward_mut(self)?.error_analysis(n)
    }

    /// Times reduced and truth solves over the testing set.
    ///
    /// # Errors
    ///
    /// Returns a dimension error if `n` exceeds the basis size.
    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        forward_mut(self)?.speedup_analysis(n)
    }

    /// Runs [`offline`](Self::offline) without observer support.
    ///
    /// # Errors
    ///
    /// Propagates truth, projection and storage failures.
    fn offline_unobserved(&mut self) -> Result<SharedReducedProblem, Error> {
        self.offline(&mut ())
    }

    /// Returns the reduced problem this method builds.
    fn reduced_problem(&self) -> SharedReducedProblem {
        Rc::clone(self.core().reduced())
    }

    /// Lists layer names from the outermost wrapper down to the base.
    fn layers(&self) -> Vec<&'static str> {
        let mut layers = vec![self.layer()];
        let mut current = self.inner();
        while let Some(layer) = current {
            layers.push(layer.layer());
            current = layer.inner();
        }
        layers
    }
}

fn forward_mut<M: ReductionMethod + ?Sized>(
    method: &mut M,
) -> Result<&mut dyn ReductionMethod, Error> {
    let layer = method.layer();
    method
        .inner_mut()
        .ok_or_else(|| Error::Configuration(format!("layer `{layer}` must implement this operation")))
}
