use std::collections::BTreeMap;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use reduct_core::{
    AffineExpansion, BasisFunctions, DirichletBc, Folder, Folders, Parameter, ReducedOperator,
    SharedTruth, Term, TruthError, truth,
};

use crate::{
    error::{DimensionError, Error},
    projector,
};

use super::ProblemState;

/// State shared by every layer of a reduced problem.
///
/// The base problem owns it; wrappers reach it through
/// [`ReducedProblem::core`](super::ReducedProblem::core).
pub struct ReducedCore {
    truth: SharedTruth,
    folders: Folders,
    pub(crate) state: ProblemState,
    pub(crate) basis: BasisFunctions,
    pub(crate) n_bc: usize,
    pub(crate) terms: BTreeMap<Term, usize>,
    pub(crate) operators: BTreeMap<Term, AffineExpansion<ReducedOperator>>,
    pub(crate) mu: Parameter,
    pub(crate) time: f64,
    pub(crate) n: usize,
    pub(crate) solution: DVector<f64>,
    pub(crate) trajectory: Vec<DVector<f64>>,
    pub(crate) truth_state: Option<DVector<f64>>,
    inner_product: Option<(DMatrix<f64>, Vec<usize>, Cholesky<f64, Dyn>)>,
}

impl ReducedCore {
    pub(crate) fn new(truth: SharedTruth, folders: Folders) -> Self {
        let (dimension, mu) = {
            let truth = truth.borrow();
            (truth.dimension(), truth.mu().clone())
        };
        Self {
            truth,
            folders,
            state: ProblemState::Uninitialized,
            basis: BasisFunctions::new(dimension),
            n_bc: 0,
            terms: BTreeMap::new(),
            operators: BTreeMap::new(),
            mu,
            time: 0.0,
            n: 0,
            solution: DVector::zeros(0),
            trajectory: Vec::new(),
            truth_state: None,
            inner_product: None,
        }
    }

    /// Returns the truth problem this reduced problem refers to.
    #[must_use]
    pub fn truth(&self) -> &SharedTruth {
        &self.truth
    }

    #[must_use]
    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    #[must_use]
    pub fn state(&self) -> ProblemState {
        self.state
    }

    #[must_use]
    pub fn basis(&self) -> &BasisFunctions {
        &self.basis
    }

    /// Gives reduction methods access to grow the basis.
    pub fn basis_mut(&mut self) -> &mut BasisFunctions {
        &mut self.basis
    }

    /// Returns the number of leading basis functions holding Dirichlet liftings.
    #[must_use]
    pub fn n_bc(&self) -> usize {
        self.n_bc
    }

    /// Returns the number of basis functions available to online solves.
    #[must_use]
    pub fn n_max(&self) -> usize {
        self.basis.len().saturating_sub(self.n_bc)
    }

    /// Returns the declared terms with their number of affine operators.
    #[must_use]
    pub fn terms(&self) -> &BTreeMap<Term, usize> {
        &self.terms
    }

    /// Returns the stored reduced operators of `term`.
    #[must_use]
    pub fn operators(&self, term: &Term) -> Option<&AffineExpansion<ReducedOperator>> {
        self.operators.get(term)
    }

    #[must_use]
    pub fn mu(&self) -> &Parameter {
        &self.mu
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the size `N` of the current solution, liftings excluded.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Returns the current reduced solution, lifting coefficients first.
    #[must_use]
    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }

    /// Returns the cached reduced trajectory of time-dependent problems.
    #[must_use]
    pub fn trajectory(&self) -> &[DVector<f64>] {
        &self.trajectory
    }

    pub(crate) fn folder(&self, name: &str) -> Folder {
        self.folders.folder(name)
    }

    /// Sets the clock of both the reduced and the truth problem.
    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
        self.truth.borrow_mut().set_time(time);
    }

    /// Returns the affine coefficients of `term` at the current parameter.
    pub(crate) fn theta(&self, term: &Term) -> Result<Vec<f64>, Error> {
        Ok(self.truth.borrow().compute_theta(term)?)
    }

    /// Returns the coefficients of `term`, or `None` if the truth problem does
    /// not define it.
    pub(crate) fn optional_theta(&self, term: &Term) -> Result<Option<Vec<f64>>, Error> {
        match self.truth.borrow().compute_theta(term) {
            Ok(thetas) => Ok(Some(thetas)),
            Err(TruthError::UndefinedTerm(_)) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub(crate) fn stored(&self, term: &Term) -> Result<&AffineExpansion<ReducedOperator>, Error> {
        self.operators
            .get(term)
            .ok_or_else(|| Error::UnknownTerm(term.clone()))
    }

    /// Recombines a matrix term on the leading `size` basis functions.
    pub(crate) fn recombine_matrix(&self, term: &Term, size: usize) -> Result<DMatrix<f64>, Error> {
        let thetas = self.theta(term)?;
        projector::recombine_matrix(term, self.stored(term)?, &thetas, size, size)
    }

    /// Recombines a vector term on the leading `size` basis functions.
    pub(crate) fn recombine_vector(&self, term: &Term, size: usize) -> Result<DVector<f64>, Error> {
        let thetas = self.theta(term)?;
        projector::recombine_vector(term, self.stored(term)?, &thetas, size)
    }

    /// Returns the constraints fixing lifting coefficients to `theta_dirichlet_bc`.
    pub(crate) fn lifting_constraints(&self) -> Result<Option<DirichletBc>, Error> {
        if self.n_bc == 0 {
            return Ok(None);
        }
        let thetas = self.theta(&Term::DirichletBc)?;
        if thetas.len() != self.n_bc {
            return Err(DimensionError::ThetaLength {
                term: Term::DirichletBc,
                expected: self.n_bc,
                found: thetas.len(),
            }
            .into());
        }
        Ok(Some(thetas.into_iter().enumerate().collect()))
    }

    /// Projects the truth operators of `term` on the whole current basis.
    pub(crate) fn project_truth_term(
        &self,
        term: &Term,
    ) -> Result<AffineExpansion<ReducedOperator>, Error> {
        let operators = self.truth.borrow().assemble_operator(term)?;
        let z = self.basis.matrix(self.basis.len())?;
        projector::project(&operators, &z)
    }

    /// Returns the truth-space lifting for the current Dirichlet coefficients.
    pub(crate) fn lifting(&self) -> Result<Option<DVector<f64>>, Error> {
        let Some(constraints) = self.lifting_constraints()? else {
            return Ok(None);
        };
        let mut lifting = DVector::zeros(self.basis.dimension());
        for (q, theta) in constraints.iter() {
            let column = self.basis.column(q).ok_or(DimensionError::Basis {
                requested: self.n_bc,
                available: self.basis.len(),
            })?;
            lifting.axpy(theta, column, 1.0);
        }
        Ok(Some(lifting))
    }

    /// Re-expands the current solution in the truth space.
    pub(crate) fn reconstruct(&self, coefficients: &DVector<f64>) -> Result<DVector<f64>, Error> {
        Ok(self.basis.reconstruct(coefficients)?)
    }

    /// Returns the truth inner product with its free dofs and factorization.
    pub(crate) fn inner_product(
        &mut self,
    ) -> Result<&(DMatrix<f64>, Vec<usize>, Cholesky<f64, Dyn>), Error> {
        if self.inner_product.is_none() {
            let (x, free) = {
                let truth = self.truth.borrow();
                (truth::inner_product(&*truth)?, truth::free_dofs(&*truth)?)
            };
            let restricted =
                DMatrix::from_fn(free.len(), free.len(), |i, j| x[(free[i], free[j])]);
            let cholesky = Cholesky::new(restricted).ok_or(Error::Coercivity(
                reduct_core::CoercivityError::NotPositiveDefinite,
            ))?;
            self.inner_product = Some((x, free, cholesky));
        }
        self.inner_product
            .as_ref()
            .ok_or(Error::Unsupported("inner product"))
    }

    /// Returns `sqrt(r_f^T X_ff^-1 r_f)` for a truth-space residual.
    pub(crate) fn dual_norm(&mut self, residual: &DVector<f64>) -> Result<f64, Error> {
        let (_, free, cholesky) = self.inner_product()?;
        let restricted = DVector::from_fn(free.len(), |i, _| residual[free[i]]);
        let riesz = cholesky.solve(&restricted);
        Ok(restricted.dot(&riesz).abs().sqrt())
    }

    /// Forgets everything tied to the previous parameter.
    pub(crate) fn reset_solution_caches(&mut self) {
        self.trajectory.clear();
        self.truth_state = None;
    }
}
