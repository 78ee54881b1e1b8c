//! Dual (adjoint) problems for output correction.
//!
//! For a primal problem `a(u, v; mu) = f(v; mu)` with output `s(u; mu)`, the
//! dual problem reads `a(v, psi; mu) = -s(v; mu)`. Its reduced solution
//! corrects the primal reduced output:
//!
//! ```text
//! s_corrected = s(u_N) - r(psi_N),    r(v) = f(v) - a(u_N, v)
//! ```
//!
//! [`DualTruthProblem`] builds the dual from a primal truth problem so that
//! the usual composition engine can reduce it; [`PrimalDual`] drives the two
//! reduced problems together.

use std::{path::PathBuf, rc::Rc};

use reduct_core::{
    AffineExpansion, Capability, Parameter, ParameterRange, PhysicsFamily, SharedTruth,
    SolutionCache, Term, TruthError, TruthOperator, TruthProblem, TruthSolution, truth,
};

use crate::{
    error::Error,
    reduced::{ProblemState, SharedReducedProblem},
};

/// The adjoint of a stationary primal truth problem.
///
/// The dual shares the primal's parameter: activating a parameter on the
/// dual activates it on the primal too.
pub struct DualTruthProblem {
    primal: SharedTruth,
    name: String,
    mu: Parameter,
    range: ParameterRange,
    cache: SolutionCache,
}

impl DualTruthProblem {
    /// Builds the dual of `primal`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Unsupported`] for time-dependent primals.
    pub fn new(primal: SharedTruth) -> Result<Self, TruthError> {
        let (name, mu, range, family) = {
            let primal = primal.borrow();
            (
                format!("{}_dual", primal.name()),
                primal.mu().clone(),
                primal.mu_range().clone(),
                primal.family(),
            )
        };
        if family != PhysicsFamily::EllipticCoercive {
            return Err(TruthError::Unsupported("dual of a time-dependent problem"));
        }
        Ok(Self {
            primal,
            name,
            mu,
            range,
            cache: SolutionCache::default(),
        })
    }

    /// Returns the primal term whose functional drives the dual: the output
    /// `s` if declared, otherwise the compliant `f`.
    fn source(&self) -> Result<Term, TruthError> {
        match self.primal.borrow().compute_theta(&Term::Output) {
            Ok(_) => Ok(Term::Output),
            Err(TruthError::UndefinedTerm(_)) => Ok(Term::Forcing),
            Err(error) => Err(error),
        }
    }
}

impl TruthProblem for DualTruthProblem {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> PhysicsFamily {
        PhysicsFamily::EllipticCoercive
    }

    fn dimension(&self) -> usize {
        self.primal.borrow().dimension()
    }

    fn mu(&self) -> &Parameter {
        &self.mu
    }

    fn set_mu(&mut self, mu: Parameter) -> Result<(), TruthError> {
        self.range.check(&mu)?;
        self.primal.borrow_mut().set_mu(mu.clone())?;
        self.mu = mu;
        Ok(())
    }

    fn mu_range(&self) -> &ParameterRange {
        &self.range
    }

    fn compute_theta(&self, term: &Term) -> Result<Vec<f64>, TruthError> {
        match term {
            Term::Stiffness | Term::InnerProduct | Term::DirichletBc => {
                self.primal.borrow().compute_theta(term)
            }
            Term::Forcing => {
                let thetas = self.primal.borrow().compute_theta(&self.source()?)?;
                Ok(thetas.into_iter().map(|theta| -theta).collect())
            }
            other => Err(TruthError::UndefinedTerm(other.clone())),
        }
    }

    fn assemble_operator(&self, term: &Term) -> Result<AffineExpansion<TruthOperator>, TruthError> {
        let primal = self.primal.borrow();
        match term {
            Term::Stiffness => primal.assemble_operator(term)?.try_map(|operator| {
                Ok(TruthOperator::Matrix(operator.as_matrix()?.transpose()))
            }),
            Term::Forcing => primal.assemble_operator(&self.source()?),
            Term::DirichletBc => primal.assemble_operator(term)?.try_map(|operator| {
                Ok(TruthOperator::DirichletBc(
                    operator.as_dirichlet_bc()?.homogenized(),
                ))
            }),
            Term::InnerProduct => primal.assemble_operator(term),
            other => Err(TruthError::UndefinedTerm(other.clone())),
        }
    }

    fn solve(&mut self) -> Result<TruthSolution, TruthError> {
        Ok(TruthSolution::Steady(truth::solve_elliptic(self)?))
    }

    /// Returns the primal capabilities; parametrized functions of the primal
    /// are not interpolated again for the dual.
    fn capabilities(&self) -> Vec<Capability> {
        self.primal
            .borrow()
            .capabilities()
            .into_iter()
            .filter(|capability| *capability != Capability::EmpiricalInterpolation)
            .collect()
    }

    fn folder_prefix(&self) -> PathBuf {
        self.primal.borrow().folder_prefix().join("dual")
    }

    fn stability_factor(&self) -> Result<f64, TruthError> {
        self.primal.borrow().stability_factor()
    }

    fn solution_cache(&mut self) -> Option<&mut SolutionCache> {
        Some(&mut self.cache)
    }
}

/// A primal output together with its dual correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedOutput {
    /// The reduced primal output `s(u_N)`.
    pub primal: f64,
    /// The dual correction `r(psi_N)`.
    pub correction: f64,
}

impl CorrectedOutput {
    /// Returns `primal - correction`.
    #[must_use]
    pub fn corrected(&self) -> f64 {
        self.primal - self.correction
    }
}

/// Solves a primal reduced problem and its dual at the same parameter.
pub struct PrimalDual {
    primal: SharedReducedProblem,
    dual: SharedReducedProblem,
}

impl PrimalDual {
    #[must_use]
    pub fn new(primal: SharedReducedProblem, dual: SharedReducedProblem) -> Self {
        Self { primal, dual }
    }

    #[must_use]
    pub fn primal(&self) -> &SharedReducedProblem {
        &self.primal
    }

    #[must_use]
    pub fn dual(&self) -> &SharedReducedProblem {
        &self.dual
    }

    /// Solves both problems at `mu` with `n_primal` and `n_dual` basis
    /// functions and returns the corrected output.
    ///
    /// # Errors
    ///
    /// Propagates reduced solve failures, including dimension errors when a
    /// size exceeds its basis.
    pub fn solve(
        &self,
        mu: &Parameter,
        n_primal: usize,
        n_dual: usize,
    ) -> Result<CorrectedOutput, Error> {
        let primal = {
            let mut primal = self.primal.borrow_mut();
            primal.set_mu(mu.clone())?;
            primal.solve(n_primal)?;
            primal.output()?.first().copied().unwrap_or(0.0)
        };

        let mut dual = self.dual.borrow_mut();
        dual.set_mu(mu.clone())?;
        dual.solve(n_dual)?;
        let correction = dual.output()?.first().copied().unwrap_or(0.0);

        log::debug!("output at {mu}: {primal} corrected by {correction}");
        Ok(CorrectedOutput { primal, correction })
    }

    /// Returns the output error bound `||r_primal|| ||r_dual|| / alpha` of
    /// the last solve.
    ///
    /// # Errors
    ///
    /// Fails before any solve or if no stability factor is available.
    pub fn output_error_bound(&self) -> Result<f64, Error> {
        let mut primal = self.primal.borrow_mut();
        if primal.core().state() == ProblemState::Uninitialized {
            return Err(Error::NotReady {
                state: ProblemState::Uninitialized,
                expected: "a solved primal problem",
            });
        }
        let primal_residual = primal.residual_dual_norm()?;
        let alpha = primal.stability_factor()?;
        if alpha <= 0.0 {
            return Err(Error::NonPositiveStabilityFactor(alpha));
        }
        drop(primal);

        let dual_residual = self.dual.borrow_mut().residual_dual_norm()?;
        Ok(primal_residual * dual_residual / alpha)
    }
}

/// Returns a shared handle on the dual of `primal`.
///
/// # Errors
///
/// Returns [`TruthError::Unsupported`] for time-dependent primals.
pub fn dual_truth(primal: &SharedTruth) -> Result<SharedTruth, TruthError> {
    Ok(reduct_core::share(DualTruthProblem::new(Rc::clone(primal))?))
}
