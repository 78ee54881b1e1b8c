//! Reduced problems: the online state machine and its capability layers.
//!
//! A reduced problem is a chain of layers over one base problem. Each layer
//! implements [`ReducedProblem`], owns the layer below it, forwards every
//! operation it does not change through the trait's default methods, and
//! overrides only what its capability alters. State shared by all layers
//! (basis, stored operators, current solution) lives in a [`ReducedCore`]
//! owned by the base.
//!
//! States move `Uninitialized -> OfflineBuilt -> OnlineReady`:
//!
//! - [`ReducedProblem::init`] declares terms (offline) or loads stored
//!   operators (online).
//! - [`ReducedProblem::build_reduced_operators`] projects every declared term
//!   onto the current basis.
//! - [`ReducedProblem::solve`] recombines the stored operators at the current
//!   parameter and solves the small system.

mod dual;
mod elliptic;
mod shared;
mod time;

use std::{cell::RefCell, fmt, rc::Rc};

use nalgebra::DVector;
use reduct_core::{Folder, Parameter, Term};

use crate::{error::Error, stage::Stage};

pub use dual::DualReducedProblem;
pub use elliptic::EllipticCoerciveReducedProblem;
pub use shared::ReducedCore;
pub use time::TimeDependentReducedProblem;

/// Lifecycle of a reduced problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemState {
    Uninitialized,
    OfflineBuilt,
    OnlineReady,
}

impl fmt::Display for ProblemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::OfflineBuilt => f.write_str("offline-built"),
            Self::OnlineReady => f.write_str("online-ready"),
        }
    }
}

/// A reduced problem shared by a reduction method, its caller and, for dual
/// problems, the dual layer that couples to it.
pub type SharedReducedProblem = Rc<RefCell<Box<dyn ReducedProblem>>>;

/// Wraps a composed reduced problem for sharing.
#[must_use]
pub fn share(problem: Box<dyn ReducedProblem>) -> SharedReducedProblem {
    Rc::new(RefCell::new(problem))
}

/// One layer of a reduced problem.
///
/// Base problems return `None` from [`inner`](Self::inner) and implement
/// every operation; wrappers return the layer below and rely on the default
/// forwarding methods.
pub trait ReducedProblem {
    /// A short name for this layer.
    fn layer(&self) -> &'static str;

    /// Returns the wrapped layer, if any.
    fn inner(&self) -> Option<&dyn ReducedProblem> {
        None
    }

    /// Returns the wrapped layer, if any.
    fn inner_mut(&mut self) -> Option<&mut dyn ReducedProblem> {
        None
    }

    /// Returns the state shared by all layers.
    fn core(&self) -> &ReducedCore;

    fn core_mut(&mut self) -> &mut ReducedCore;

    /// Prepares the problem for `stage`.
    ///
    /// Offline, declares every term the truth problem defines. Online, loads
    /// the stored operators and basis. Calling `init` again is harmless.
    ///
    /// # Errors
    ///
    /// Propagates truth and storage failures.
    fn init(&mut self, stage: Stage) -> Result<(), Error> {
        forward_mut(self)?.init(stage)
    }

    /// Assembles the reduced operators of `term` and returns `Q`.
    ///
    /// Offline, projects the truth operators onto the current basis and saves
    /// them. Online, loads them; `Q` is whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTerm`] for terms no layer handles.
    fn assemble_operator(&mut self, term: &Term, stage: Stage) -> Result<usize, Error> {
        forward_mut(self)?.assemble_operator(term, stage)
    }

    /// Projects every declared term onto the current basis.
    ///
    /// # Errors
    ///
    /// Propagates projection and storage failures.
    fn build_reduced_operators(&mut self) -> Result<(), Error> {
        forward_mut(self)?.build_reduced_operators()
    }

    /// Activates a parameter on the reduced and truth problems.
    ///
    /// # Errors
    ///
    /// Fails if the truth problem rejects `mu`.
    fn set_mu(&mut self, mu: Parameter) -> Result<(), Error> {
        forward_mut(self)?.set_mu(mu)
    }

    /// Solves with `n` basis functions and stores the coefficient vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] before offline assembly or online loading,
    /// and dimension errors if `n` exceeds the stored size.
    fn solve(&mut self, n: usize) -> Result<DVector<f64>, Error> {
        forward_mut(self)?.solve(n)
    }

    /// Evaluates the output on the current solution, one value per state.
    ///
    /// # Errors
    ///
    /// Propagates recombination failures.
    fn output(&mut self) -> Result<Vec<f64>, Error> {
        forward_mut(self)?.output()
    }

    /// Returns the stability factor at the current parameter.
    ///
    /// # Errors
    ///
    /// Fails if no layer and no truth problem provides one.
    fn stability_factor(&mut self) -> Result<f64, Error> {
        forward_mut(self)?.stability_factor()
    }

    /// Returns the dual norm of the truth residual of the current solution.
    ///
    /// # Errors
    ///
    /// Propagates truth assembly failures.
    fn residual_dual_norm(&mut self) -> Result<f64, Error> {
        forward_mut(self)?.residual_dual_norm()
    }

    /// Returns the energy-norm error against the truth solution, one value
    /// per state.
    ///
    /// # Errors
    ///
    /// Propagates truth solve failures.
    fn compute_error(&mut self) -> Result<Vec<f64>, Error> {
        forward_mut(self)?.compute_error()
    }

    /// Returns the error relative to the truth solution's energy norm.
    ///
    /// # Errors
    ///
    /// Propagates truth solve failures.
    fn compute_relative_error(&mut self) -> Result<Vec<f64>, Error> {
        forward_mut(self)?.compute_relative_error()
    }

    /// Returns the absolute output error, one value per state.
    ///
    /// # Errors
    ///
    /// Propagates truth solve failures.
    fn compute_error_output(&mut self) -> Result<Vec<f64>, Error> {
        forward_mut(self)?.compute_error_output()
    }

    /// Returns the output error relative to the truth output.
    ///
    /// # Errors
    ///
    /// Propagates truth solve failures.
    fn compute_relative_error_output(&mut self) -> Result<Vec<f64>, Error> {
        forward_mut(self)?.compute_relative_error_output()
    }

    /// Re-expands the current solution in the truth space and exports it.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    fn export_solution(&mut self, folder: &Folder, name: &str) -> Result<(), Error> {
        forward_mut(self)?.export_solution(folder, name)
    }

    /// Returns the a posteriori error bound
    /// `residual_dual_norm / sqrt(stability_factor)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonPositiveStabilityFactor`] if the stability factor
    /// is not positive.
    fn estimate_error(&mut self) -> Result<f64, Error> {
        let residual = self.residual_dual_norm()?;
        let alpha = self.stability_factor()?;
        if alpha <= 0.0 || !alpha.is_finite() {
            return Err(Error::NonPositiveStabilityFactor(alpha));
        }
        Ok(residual / alpha.sqrt())
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

fn forward_mut<P: ReducedProblem + ?Sized>(problem: &mut P) -> Result<&mut dyn ReducedProblem, Error> {
    let layer = problem.layer();
    problem
        .inner_mut()
        .ok_or_else(|| Error::Configuration(format!("layer `{layer}` must implement this operation")))
}

/// Returns `true` for terms projected with `Z^T A Z` or `Z^T f`.
pub(crate) fn is_square(term: &Term) -> bool {
    matches!(
        term,
        Term::Stiffness | Term::Mass | Term::Forcing | Term::Output | Term::InnerProduct
    )
}

/// Returns `error / norm`, with `0/0 = 0` and `x/0 = inf`.
pub(crate) fn relative(error: f64, norm: f64) -> f64 {
    if norm == 0.0 {
        if error == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        error / norm
    }
}
