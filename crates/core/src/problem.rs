//! The contract between the reduction machinery and a full-order problem.
//!
//! A [`TruthProblem`] owns the expensive discretization. The reduction
//! machinery never copies it: reduced problems and reduction methods hold a
//! [`SharedTruth`] back-reference and drive it through this trait.

use std::{
    cell::{Cell, RefCell},
    fmt,
    path::PathBuf,
    rc::Rc,
};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    affine::AffineExpansion,
    algebra::{AlgebraError, TruthOperator},
    coercivity::CoercivityError,
    eim::EmpiricalInterpolation,
    linear::LinearSolveError,
    parameter::{Parameter, ParameterRange, SamplingError},
    storage::{Folder, StorageError},
    term::Term,
    truth,
};

/// The physics family a truth problem belongs to.
///
/// The family decides which base reduced problem and reduction method apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysicsFamily {
    /// Stationary problems with a coercive bilinear form.
    EllipticCoercive,
    /// Time-dependent problems `m(du/dt, v) + a(u, v) = f(v)` with a
    /// coercive `a`.
    Parabolic,
}

/// Optional capability markers a truth problem can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Non-affine functions are replaced by empirical interpolants.
    EmpiricalInterpolation,
    /// Non-affine functions are evaluated exactly at each online parameter.
    ExactParametrizedFunctions,
    /// Stability factors come from a successive-constraint lower bound.
    SuccessiveConstraint,
    /// Stability factors are computed exactly from an eigenproblem.
    ExactCoercivityConstant,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmpiricalInterpolation => "empirical interpolation",
            Self::ExactParametrizedFunctions => "exact parametrized functions",
            Self::SuccessiveConstraint => "successive constraint method",
            Self::ExactCoercivityConstant => "exact coercivity constant",
        };
        f.write_str(name)
    }
}

/// Errors raised by truth problems.
#[derive(Debug, Error)]
pub enum TruthError {
    /// The problem does not define `term`.
    ///
    /// Callers treat this as "no contribution" for optional lifting and
    /// initial-condition terms.
    #[error("term `{0}` is not defined by this problem")]
    UndefinedTerm(Term),

    #[error("operation `{0}` is not supported by this problem")]
    Unsupported(&'static str),

    #[error("expected exactly one inner product operator, found {0}")]
    InnerProductCount(usize),

    #[error("invalid time grid: dt = {dt}, final time = {final_time}")]
    InvalidTimeGrid { dt: f64, final_time: f64 },

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    LinearSolve(#[from] LinearSolveError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Coercivity(#[from] CoercivityError),
}

/// A truth solution: one state for steady problems, one per time step otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TruthSolution {
    Steady(DVector<f64>),
    Transient(Vec<DVector<f64>>),
}

impl TruthSolution {
    /// Returns the states in time order.
    #[must_use]
    pub fn states(&self) -> &[DVector<f64>] {
        match self {
            Self::Steady(state) => std::slice::from_ref(state),
            Self::Transient(states) => states,
        }
    }

    /// Returns the state at step `k`; steady solutions answer every step.
    #[must_use]
    pub fn at(&self, k: usize) -> Option<&DVector<f64>> {
        match self {
            Self::Steady(state) => Some(state),
            Self::Transient(states) => states.get(k),
        }
    }
}

/// A uniform time discretization of `[0, final_time]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    dt: f64,
    final_time: f64,
}

impl TimeGrid {
    /// Creates a grid with step `dt` up to `final_time`.
    ///
    /// # Errors
    ///
    /// Fails unless `dt > 0` and `final_time >= 0`, both finite.
    pub fn new(dt: f64, final_time: f64) -> Result<Self, TruthError> {
        if !(dt.is_finite() && dt > 0.0 && final_time.is_finite() && final_time >= 0.0) {
            return Err(TruthError::InvalidTimeGrid { dt, final_time });
        }
        Ok(Self { dt, final_time })
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[must_use]
    pub fn final_time(&self) -> f64 {
        self.final_time
    }

    /// Returns the number of steps; the trajectory holds `steps() + 1` states.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn steps(&self) -> usize {
        (self.final_time / self.dt).round() as usize
    }

    /// Returns `k * dt`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn time(&self, k: usize) -> f64 {
        k as f64 * self.dt
    }
}

/// In-memory store of truth solutions keyed by parameter.
///
/// Truth problems that own one answer repeated solves by importing the stored
/// solution, unless importing has been disabled with [`ImportDisabled`].
#[derive(Debug)]
pub struct SolutionCache {
    import_enabled: Rc<Cell<bool>>,
    entries: Vec<(Parameter, TruthSolution)>,
}

impl Default for SolutionCache {
    fn default() -> Self {
        Self {
            import_enabled: Rc::new(Cell::new(true)),
            entries: Vec::new(),
        }
    }
}

/// Clones get their own import switch.
impl Clone for SolutionCache {
    fn clone(&self) -> Self {
        Self {
            import_enabled: Rc::new(Cell::new(self.import_enabled.get())),
            entries: self.entries.clone(),
        }
    }
}

impl SolutionCache {
    #[must_use]
    pub fn import_enabled(&self) -> bool {
        self.import_enabled.get()
    }

    pub fn set_import_enabled(&mut self, enabled: bool) {
        self.import_enabled.set(enabled);
    }

    /// Returns the stored solution for `mu`, if importing is enabled.
    #[must_use]
    pub fn import(&self, mu: &Parameter) -> Option<&TruthSolution> {
        if !self.import_enabled.get() {
            return None;
        }
        self.entries
            .iter()
            .find(|(stored, _)| stored == mu)
            .map(|(_, solution)| solution)
    }

    /// Stores `solution` for `mu`, replacing any previous entry.
    pub fn store(&mut self, mu: Parameter, solution: TruthSolution) {
        match self.entries.iter_mut().find(|(stored, _)| *stored == mu) {
            Some(entry) => entry.1 = solution,
            None => self.entries.push((mu, solution)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A full-order ("truth") problem.
///
/// Implementors provide the affine decomposition of their terms and a truth
/// solver. Everything else has defaults expressed through those primitives.
pub trait TruthProblem {
    /// A short identifier, also used as the default storage prefix.
    fn name(&self) -> &str;

    fn family(&self) -> PhysicsFamily;

    /// Returns the number of degrees of freedom.
    fn dimension(&self) -> usize;

    /// Returns the currently active parameter.
    fn mu(&self) -> &Parameter;

    /// Activates a new parameter.
    ///
    /// # Errors
    ///
    /// Fails if `mu` is outside [`TruthProblem::mu_range`].
    fn set_mu(&mut self, mu: Parameter) -> Result<(), TruthError>;

    fn mu_range(&self) -> &ParameterRange;

    /// Returns the affine coefficients of `term` at the current parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UndefinedTerm`] for terms the problem lacks.
    fn compute_theta(&self, term: &Term) -> Result<Vec<f64>, TruthError>;

    /// Returns the parameter-independent operators of `term`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UndefinedTerm`] for terms the problem lacks.
    fn assemble_operator(&self, term: &Term) -> Result<AffineExpansion<TruthOperator>, TruthError>;

    /// Solves the full-order problem at the current parameter.
    ///
    /// # Errors
    ///
    /// Propagates assembly and linear-solve failures.
    fn solve(&mut self) -> Result<TruthSolution, TruthError>;

    /// Returns the optional capabilities this problem declares, in any order.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Returns the names of the solution components.
    fn components(&self) -> Vec<String> {
        vec!["u".to_owned()]
    }

    /// Returns the storage prefix for offline data.
    fn folder_prefix(&self) -> PathBuf {
        PathBuf::from(self.name())
    }

    /// Evaluates the output functional on every state of `solution`.
    ///
    /// Uses the output term `s` when defined, otherwise the compliant output
    /// `f(u)`.
    ///
    /// # Errors
    ///
    /// Propagates assembly failures.
    fn output(&mut self, solution: &TruthSolution) -> Result<Vec<f64>, TruthError> {
        truth::output(self, solution)
    }

    /// Returns the time discretization of time-dependent problems.
    fn time_grid(&self) -> Option<TimeGrid> {
        None
    }

    /// Returns the current time.
    fn time(&self) -> f64 {
        0.0
    }

    /// Sets the current time used by time-dependent coefficients.
    fn set_time(&mut self, _time: f64) {}

    /// Returns a stability factor (coercivity lower bound) at the current
    /// parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Unsupported`] unless the problem provides one.
    fn stability_factor(&self) -> Result<f64, TruthError> {
        Err(TruthError::Unsupported("stability_factor"))
    }

    /// Names the non-affine functions eligible for empirical interpolation.
    fn parametrized_functions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Returns the nodal values of a parametrized function at `mu`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Unsupported`] unless the problem declares
    /// parametrized functions.
    fn evaluate_parametrized_function(
        &self,
        _name: &str,
        _mu: &Parameter,
    ) -> Result<DVector<f64>, TruthError> {
        Err(TruthError::Unsupported("evaluate_parametrized_function"))
    }

    /// Replaces a parametrized function by its empirical interpolant.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Unsupported`] unless the problem declares
    /// parametrized functions.
    fn attach_interpolation(
        &mut self,
        _name: &str,
        _interpolation: EmpiricalInterpolation,
    ) -> Result<(), TruthError> {
        Err(TruthError::Unsupported("attach_interpolation"))
    }

    /// Returns the cache used to import previously computed solutions.
    fn solution_cache(&mut self) -> Option<&mut SolutionCache> {
        None
    }

    /// Persists a truth-space solution.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    fn export_solution(
        &self,
        folder: &Folder,
        name: &str,
        solution: &TruthSolution,
    ) -> Result<(), TruthError> {
        folder.save(name, solution)?;
        Ok(())
    }
}

/// A truth problem shared between reduced problems and reduction methods.
pub type SharedTruth = Rc<RefCell<dyn TruthProblem>>;

/// Wraps a concrete truth problem for sharing.
pub fn share<P: TruthProblem + 'static>(problem: P) -> SharedTruth {
    Rc::new(RefCell::new(problem))
}

/// Scoped switch that forces true solves instead of imports.
///
/// The previous setting is restored when the guard is dropped, including on
/// early returns and unwinding. Restoring does not borrow the truth problem,
/// so it also succeeds while the problem is borrowed elsewhere.
pub struct ImportDisabled {
    switch: Option<(Rc<Cell<bool>>, bool)>,
}

impl ImportDisabled {
    #[must_use]
    pub fn new(truth: &SharedTruth) -> Self {
        let switch = truth.borrow_mut().solution_cache().map(|cache| {
            let switch = Rc::clone(&cache.import_enabled);
            let previous = switch.replace(false);
            (switch, previous)
        });
        Self { switch }
    }
}

impl Drop for ImportDisabled {
    fn drop(&mut self) {
        if let Some((switch, previous)) = &self.switch {
            switch.set(*previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn time_grid_counts_steps() {
        let grid = TimeGrid::new(0.1, 1.0).expect("valid grid");
        assert_eq!(grid.steps(), 10);
        assert_relative_eq!(grid.time(3), 0.3, epsilon = 1e-12);

        let empty = TimeGrid::new(0.1, 0.0).expect("valid grid");
        assert_eq!(empty.steps(), 0);

        assert!(TimeGrid::new(0.0, 1.0).is_err());
        assert!(TimeGrid::new(0.1, -1.0).is_err());
    }

    #[test]
    fn steady_solutions_answer_every_step() {
        let solution = TruthSolution::Steady(DVector::from_element(2, 1.0));
        assert_eq!(solution.states().len(), 1);
        assert!(solution.at(5).is_some());

        let transient = TruthSolution::Transient(vec![DVector::zeros(2); 3]);
        assert!(transient.at(2).is_some());
        assert!(transient.at(3).is_none());
    }

    #[test]
    fn cache_imports_only_when_enabled() {
        let mut cache = SolutionCache::default();
        let mu = Parameter::from([1.0]);
        cache.store(mu.clone(), TruthSolution::Steady(DVector::zeros(1)));
        cache.store(mu.clone(), TruthSolution::Steady(DVector::from_element(1, 2.0)));

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.import(&mu),
            Some(&TruthSolution::Steady(DVector::from_element(1, 2.0)))
        );

        cache.set_import_enabled(false);
        assert!(cache.import(&mu).is_none());
    }
}
