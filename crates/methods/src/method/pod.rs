use std::rc::Rc;

use reduct_core::{Observer, ProperOrthogonalDecomposition, truth};

use crate::{
    analysis::{self, ErrorAnalysis, SpeedupAnalysis},
    error::Error,
    reduced::SharedReducedProblem,
    stage::Stage,
};

use super::{Action, Event, MethodCore, ReductionMethod};

/// The POD-Galerkin method.
///
/// Collects truth snapshots over the whole training set (every time step for
/// time-dependent problems), removes the Dirichlet lifting from each, and
/// keeps the leading modes of their proper orthogonal decomposition in the
/// inner product.
pub struct PodGalerkin {
    core: MethodCore,
}

impl PodGalerkin {
    #[must_use]
    pub fn new(core: MethodCore) -> Self {
        Self { core }
    }
}

impl ReductionMethod for PodGalerkin {
    fn layer(&self) -> &'static str {
        "pod-galerkin"
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
        let config = self.core.settings().pod;
        let training = self.core.training_set()?;
        self.core.reduced().borrow_mut().init(Stage::Offline)?;
        self.core.push_liftings()?;

        let truth = Rc::clone(self.core.truth());
        let grid = truth.borrow().time_grid();
        let mut snapshots = Vec::new();
        {
            let mut reduced = self.core.reduced().borrow_mut();
            for (index, mu) in training.iter().enumerate() {
                reduced.set_mu(mu.clone())?;
                let solution = truth::solve_or_import(&mut *truth.borrow_mut())?;
                for (k, state) in solution.states().iter().enumerate() {
                    if let Some(grid) = grid {
                        reduced.core_mut().set_time(grid.time(k));
                    }
                    let mut snapshot = state.clone();
                    if let Some(lifting) = reduced.core().lifting()? {
                        snapshot -= lifting;
                    }
                    snapshots.push(snapshot);
                }
                log::debug!("snapshot {} of {} at {mu}", index + 1, training.len());

                let event = Event::Snapshot {
                    index,
                    total: training.len(),
                };
                if let Some(Action::StopEarly) = observer.observe(&event) {
                    log::info!("snapshot collection stopped by observer");
                    break;
                }
            }
            if grid.is_some() {
                reduced.core_mut().set_time(0.0);
            }
        }

        let inner_product = truth::inner_product(&*truth.borrow())?;
        let pod = ProperOrthogonalDecomposition::compute(&snapshots, &inner_product)?;
        let retained = pod.retained(config.n_max(), config.tolerance());
        let discarded_energy = pod.discarded_energy(retained);
        log::info!(
            "keeping {retained} of {} POD modes, discarded energy {discarded_energy:e}",
            pod.modes().len()
        );

        {
            let mut reduced = self.core.reduced().borrow_mut();
            let basis = reduced.core_mut().basis_mut();
            for mode in pod.modes().iter().take(retained) {
                basis.enrich(mode.clone())?;
            }
            reduced.build_reduced_operators()?;
        }
        observer.observe(&Event::PodModes {
            retained,
            discarded_energy,
        });

        Ok(Rc::clone(self.core.reduced()))
    }

    fn error_analysis(&mut self, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
        analysis::errors(&mut self.core, n)
    }

    fn speedup_analysis(&mut self, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
        analysis::speedup(&mut self.core, n)
    }
}
