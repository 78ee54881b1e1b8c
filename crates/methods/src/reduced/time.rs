use std::{collections::BTreeMap, rc::Rc};

use nalgebra::DVector;
use reduct_core::{
    AffineExpansion, Folder, Folders, Parameter, ReducedOperator, Term, TimeGrid, TruthSolution,
    linear, truth,
};

use crate::{
    error::{DimensionError, Error},
    projector,
    stage::Stage,
};

use super::{ReducedCore, ReducedProblem};

/// Replays the stationary machinery once per time step.
///
/// Marches `(M_N/dt + A_N) u^k = M_N/dt u^{k-1} + f_N(t_k)` with implicit
/// Euler from the projected initial condition, caches the whole trajectory,
/// and evaluates outputs and errors step by step with both clocks set to
/// `k * dt`. Each of these restores the clocks it found.
pub struct TimeDependentReducedProblem {
    inner: Box<dyn ReducedProblem>,
    initial_conditions: BTreeMap<String, Term>,
    homogeneous: BTreeMap<String, bool>,
    truth_trajectory: Option<Vec<DVector<f64>>>,
}

impl TimeDependentReducedProblem {
    #[must_use]
    pub fn new(inner: Box<dyn ReducedProblem>) -> Self {
        Self {
            inner,
            initial_conditions: BTreeMap::new(),
            homogeneous: BTreeMap::new(),
            truth_trajectory: None,
        }
    }

    /// Returns whether each component starts from a homogeneous initial
    /// condition.
    #[must_use]
    pub fn homogeneous_initial_conditions(&self) -> &BTreeMap<String, bool> {
        &self.homogeneous
    }

    /// Returns the initial-condition term of a single-component problem.
    ///
    /// Single-component problems always hold exactly one entry.
    ///
    /// # Errors
    ///
    /// Fails if the problem has several components.
    pub fn single_initial_condition(&self) -> Result<&Term, Error> {
        match (self.initial_conditions.len(), self.initial_conditions.values().next()) {
            (1, Some(term)) => Ok(term),
            (count, _) => Err(Error::Configuration(format!(
                "expected a single initial condition, found {count}"
            ))),
        }
    }

    fn grid(&self) -> Result<TimeGrid, Error> {
        self.core().truth().borrow().time_grid().ok_or_else(|| {
            Error::Configuration("time-dependent problems need a truth time grid".to_owned())
        })
    }

    fn is_homogeneous(&self, term: &Term) -> bool {
        self.initial_conditions
            .iter()
            .find(|(_, ic)| *ic == term)
            .is_some_and(|(component, _)| self.homogeneous.get(component).copied().unwrap_or(true))
    }

    /// Projects the initial condition: `(Z^T X Z) u_0 = sum_c Z^T X g_c`,
    /// with lifting coefficients fixed to their value at `t = 0`.
    fn initial_state(&self, size: usize) -> Result<DVector<f64>, Error> {
        let core = self.core();
        let mut rhs = DVector::zeros(size);
        for term in self.initial_conditions.values() {
            if self.is_homogeneous(term) {
                continue;
            }
            rhs += core.recombine_vector(term, size)?;
        }

        let inner_product = core
            .stored(&Term::InnerProduct)?
            .get(0)
            .and_then(|x| x.truncated(size, size))
            .ok_or(DimensionError::BasisSize {
                term: Term::InnerProduct,
                requested: size,
                available: core.basis().len(),
            })?
            .into_matrix()?;
        let constraints = core.lifting_constraints()?;
        Ok(linear::solve(&inner_product, &rhs, constraints.as_ref())?)
    }

    fn truth_trajectory(&mut self) -> Result<Vec<DVector<f64>>, Error> {
        if let Some(states) = &self.truth_trajectory {
            return Ok(states.clone());
        }
        let truth = Rc::clone(self.core().truth());
        let solution = truth::solve_or_import(&mut *truth.borrow_mut())?;
        let states = solution.states().to_vec();
        self.truth_trajectory = Some(states.clone());
        Ok(states)
    }

    /// Marches `size` coefficients over `grid`, starting from the projected
    /// initial state. Leaves the clock at the final time.
    fn march(&mut self, grid: TimeGrid, size: usize) -> Result<Vec<DVector<f64>>, Error> {
        let mut states = vec![self.initial_state(size)?];
        for k in 1..=grid.steps() {
            self.core_mut().set_time(grid.time(k));
            let core = self.core();
            let mass = core.recombine_matrix(&Term::Mass, size)? / grid.dt();
            let a = core.recombine_matrix(&Term::Stiffness, size)?;
            let f = core.recombine_vector(&Term::Forcing, size)?;
            let previous = states.last().cloned().unwrap_or_else(|| DVector::zeros(size));
            let rhs = &mass * previous + f;
            let constraints = core.lifting_constraints()?;
            states.push(linear::solve(&(mass + a), &rhs, constraints.as_ref())?);
        }
        Ok(states)
    }

    /// Evaluates `step` on the wrapped problem at every cached time step.
    fn replay(
        &mut self,
        step: impl Fn(&mut dyn ReducedProblem) -> Result<Vec<f64>, Error>,
    ) -> Result<Vec<f64>, Error> {
        let grid = self.grid()?;
        let trajectory = self.core().trajectory().to_vec();
        if trajectory.is_empty() {
            return Err(Error::NotReady {
                state: self.core().state(),
                expected: "a solved trajectory",
            });
        }
        let truth_states = self.truth_trajectory()?;
        if truth_states.len() != trajectory.len() {
            return Err(DimensionError::Basis {
                requested: trajectory.len(),
                available: truth_states.len(),
            }
            .into());
        }

        let current = self.core().solution().clone();
        let start = self.core().time();
        let result: Result<Vec<f64>, Error> = trajectory
            .into_iter()
            .zip(truth_states)
            .enumerate()
            .map(|(k, (state, truth_state))| {
                let core = self.inner.core_mut();
                core.set_time(grid.time(k));
                core.solution = state;
                core.truth_state = Some(truth_state);
                Ok(step(self.inner.as_mut())?.first().copied().unwrap_or(0.0))
            })
            .collect();

        let core = self.inner.core_mut();
        core.solution = current;
        core.truth_state = None;
        core.set_time(start);
        result
    }
}

impl ReducedProblem for TimeDependentReducedProblem {
    fn layer(&self) -> &'static str {
        "time dependent"
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
        self.inner.init(stage)?;
        self.grid()?;

        let components = self.core().truth().borrow().components();
        self.initial_conditions = components
            .iter()
            .map(|component| {
                (
                    component.clone(),
                    Term::initial_condition(component, components.len()),
                )
            })
            .collect();
        self.homogeneous.clear();
        for (component, term) in &self.initial_conditions {
            let defined = self.inner.core().optional_theta(term)?.is_some();
            self.homogeneous.insert(component.clone(), !defined);
        }

        let mut terms = vec![Term::Mass, Term::InnerProduct];
        terms.extend(self.initial_conditions.values().cloned());
        for term in &terms {
            match stage {
                Stage::Offline => {
                    let q = if self.is_homogeneous(term) {
                        0
                    } else {
                        self.core().truth().borrow().assemble_operator(term)?.len()
                    };
                    self.core_mut().terms.insert(term.clone(), q);
                }
                Stage::Online => {
                    self.assemble_operator(term, stage)?;
                }
            }
        }
        Ok(())
    }

    fn assemble_operator(&mut self, term: &Term, stage: Stage) -> Result<usize, Error> {
        if !matches!(term, Term::InitialCondition(_)) {
            return self.inner.assemble_operator(term, stage);
        }

        let folder: Folder = self.core().folder(Folders::REDUCED_OPERATORS);
        let name = term.to_string();
        let operators = match stage {
            Stage::Offline if self.is_homogeneous(term) => {
                let operators = AffineExpansion::empty();
                operators.save(&folder, &name)?;
                operators
            }
            Stage::Offline => {
                let core = self.core();
                let (initial, inner_product) = {
                    let truth = core.truth().borrow();
                    (truth.assemble_operator(term)?, truth::inner_product(&*truth)?)
                };
                let z = core.basis().matrix(core.basis().len())?;
                let operators: AffineExpansion<ReducedOperator> =
                    initial.try_map(|operator| -> Result<ReducedOperator, Error> {
                        let function = operator.as_vector()?;
                        Ok(ReducedOperator::Vector(projector::project_function(
                            function,
                            &inner_product,
                            &z,
                        )?))
                    })?;
                operators.save(&folder, &name)?;
                operators
            }
            Stage::Online => AffineExpansion::load(&folder, &name)?,
        };

        let q = operators.len();
        let core = self.core_mut();
        core.operators.insert(term.clone(), operators);
        core.terms.insert(term.clone(), q);
        Ok(q)
    }

    fn build_reduced_operators(&mut self) -> Result<(), Error> {
        self.inner.build_reduced_operators()?;
        let terms: Vec<Term> = self.initial_conditions.values().cloned().collect();
        for term in &terms {
            self.assemble_operator(term, Stage::Offline)?;
        }
        Ok(())
    }

    fn set_mu(&mut self, mu: Parameter) -> Result<(), Error> {
        self.truth_trajectory = None;
        self.inner.set_mu(mu)
    }

    fn solve(&mut self, n: usize) -> Result<DVector<f64>, Error> {
        let grid = self.grid()?;
        let available = self.core().n_max();
        if n > available {
            return Err(DimensionError::Basis {
                requested: n,
                available,
            }
            .into());
        }
        let size = n + self.core().n_bc();
        let start = self.core().time();

        self.core_mut().set_time(0.0);
        let states = self.march(grid, size);
        self.core_mut().set_time(start);
        let states = states?;

        let last = states.last().cloned().unwrap_or_else(|| DVector::zeros(size));
        let core = self.core_mut();
        core.trajectory = states;
        core.solution = last.clone();
        core.n = n;
        Ok(last)
    }

    fn output(&mut self) -> Result<Vec<f64>, Error> {
        let grid = self.grid()?;
        let trajectory = self.core().trajectory().to_vec();
        if trajectory.is_empty() {
            return self.inner.output();
        }

        let current = self.core().solution().clone();
        let start = self.core().time();
        let result: Result<Vec<f64>, Error> = trajectory
            .into_iter()
            .enumerate()
            .map(|(k, state)| {
                let core = self.inner.core_mut();
                core.set_time(grid.time(k));
                core.solution = state;
                Ok(self.inner.output()?.first().copied().unwrap_or(0.0))
            })
            .collect();

        let core = self.inner.core_mut();
        core.solution = current;
        core.set_time(start);
        result
    }

    fn residual_dual_norm(&mut self) -> Result<f64, Error> {
        Err(Error::Unsupported("residual of a time-dependent problem"))
    }

    fn compute_error(&mut self) -> Result<Vec<f64>, Error> {
        self.replay(|problem| problem.compute_error())
    }

    fn compute_relative_error(&mut self) -> Result<Vec<f64>, Error> {
        self.replay(|problem| problem.compute_relative_error())
    }

    fn compute_error_output(&mut self) -> Result<Vec<f64>, Error> {
        self.replay(|problem| problem.compute_error_output())
    }

    fn compute_relative_error_output(&mut self) -> Result<Vec<f64>, Error> {
        self.replay(|problem| problem.compute_relative_error_output())
    }

    fn export_solution(&mut self, folder: &Folder, name: &str) -> Result<(), Error> {
        let core = self.core();
        let states = core
            .trajectory()
            .iter()
            .map(|coefficients| core.reconstruct(coefficients))
            .collect::<Result<Vec<_>, _>>()?;
        core.truth()
            .borrow()
            .export_solution(folder, name, &TruthSolution::Transient(states))?;
        Ok(())
    }
}
