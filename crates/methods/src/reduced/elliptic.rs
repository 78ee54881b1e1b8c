use std::rc::Rc;

use nalgebra::{DMatrix, DVector};
use reduct_core::{
    AffineExpansion, BasisFunctions, Folder, Folders, Parameter, SharedTruth, Term, TruthSolution,
    linear, truth,
};

use crate::{
    error::{DimensionError, Error},
    stage::Stage,
};

use super::{ProblemState, ReducedCore, ReducedProblem, is_square, relative};

/// Name of the stored basis inside the basis folder.
pub(crate) const BASIS: &str = "basis";

/// The base reduced problem for coercive, stationary problems.
///
/// Solves `A_N(mu) u_N = f_N(mu)` where both sides are affine recombinations
/// of stored reduced operators. Non-homogeneous Dirichlet data is handled by
/// `N_bc` leading lifting functions whose coefficients are fixed to
/// `theta_dirichlet_bc(mu)`.
pub struct EllipticCoerciveReducedProblem {
    core: ReducedCore,
}

impl EllipticCoerciveReducedProblem {
    #[must_use]
    pub fn new(truth: SharedTruth, folders: Folders) -> Self {
        Self {
            core: ReducedCore::new(truth, folders),
        }
    }

    /// Records `term` with the number of truth operators it expands into.
    fn declare(&mut self, term: Term) -> Result<(), Error> {
        let q = self.core.truth().borrow().assemble_operator(&term)?.len();
        self.core.terms.insert(term, q);
        Ok(())
    }

    /// Counts lifting functions: one per Dirichlet operator, unless all
    /// prescribed values vanish.
    fn detect_liftings(&mut self) -> Result<(), Error> {
        if self.core.optional_theta(&Term::DirichletBc)?.is_none() {
            self.core.n_bc = 0;
            return Ok(());
        }
        let operators = self.core.truth().borrow().assemble_operator(&Term::DirichletBc)?;
        let mut homogeneous = true;
        for operator in &operators {
            homogeneous &= operator.as_dirichlet_bc()?.is_homogeneous();
        }
        self.core.n_bc = if homogeneous { 0 } else { operators.len() };
        self.core.terms.insert(Term::DirichletBc, operators.len());
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), Error> {
        match self.core.state {
            ProblemState::OfflineBuilt | ProblemState::OnlineReady => Ok(()),
            state => Err(Error::NotReady {
                state,
                expected: "offline-built or online-ready",
            }),
        }
    }

    fn ensure_solved(&self) -> Result<usize, Error> {
        self.ensure_ready()?;
        let size = self.core.n + self.core.n_bc;
        if self.core.solution.len() == size {
            Ok(size)
        } else {
            Err(Error::NotReady {
                state: self.core.state,
                expected: "a solved reduced problem",
            })
        }
    }

    fn truth_state(&mut self) -> Result<DVector<f64>, Error> {
        if let Some(state) = &self.core.truth_state {
            return Ok(state.clone());
        }
        let truth = Rc::clone(self.core.truth());
        let solution = truth::solve_or_import(&mut *truth.borrow_mut())?;
        let state = solution
            .states()
            .last()
            .cloned()
            .ok_or(Error::Unsupported("empty truth solution"))?;
        self.core.truth_state = Some(state.clone());
        Ok(state)
    }

    fn truth_stiffness(&self) -> Result<DMatrix<f64>, Error> {
        Ok(truth::matrix(&*self.core.truth().borrow(), &Term::Stiffness)?)
    }

    fn output_term(&self) -> Term {
        if self.core.terms.contains_key(&Term::Output) {
            Term::Output
        } else {
            Term::Forcing
        }
    }

    fn truth_output(&mut self) -> Result<f64, Error> {
        let state = self.truth_state()?;
        let truth = Rc::clone(self.core.truth());
        let output = truth
            .borrow_mut()
            .output(&TruthSolution::Steady(state))?;
        Ok(output.first().copied().unwrap_or(0.0))
    }
}

fn energy_norm(matrix: &DMatrix<f64>, vector: &DVector<f64>) -> f64 {
    vector.dot(&(matrix * vector)).abs().sqrt()
}

impl ReducedProblem for EllipticCoerciveReducedProblem {
    fn layer(&self) -> &'static str {
        "elliptic coercive"
    }

    fn core(&self) -> &ReducedCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ReducedCore {
        &mut self.core
    }

    fn init(&mut self, stage: Stage) -> Result<(), Error> {
        self.detect_liftings()?;

        let mut terms = vec![Term::Stiffness, Term::Forcing];
        if self.core.optional_theta(&Term::Output)?.is_some() {
            terms.push(Term::Output);
        }

        match stage {
            Stage::Offline => {
                self.core.folder(Folders::REDUCED_OPERATORS).create()?;
                for term in terms {
                    self.declare(term)?;
                }
            }
            Stage::Online => {
                let folder = self.core.folder(Folders::BASIS);
                self.core.basis = BasisFunctions::load(&folder, BASIS)?;
                for term in terms {
                    self.assemble_operator(&term, stage)?;
                }
                self.core.state = ProblemState::OnlineReady;
            }
        }
        Ok(())
    }

    fn assemble_operator(&mut self, term: &Term, stage: Stage) -> Result<usize, Error> {
        if !is_square(term) {
            return Err(Error::UnknownTerm(term.clone()));
        }
        let folder: Folder = self.core.folder(Folders::REDUCED_OPERATORS);
        let name = term.to_string();
        let operators = match stage {
            Stage::Offline => {
                let operators = self.core.project_truth_term(term)?;
                operators.save(&folder, &name)?;
                operators
            }
            Stage::Online => AffineExpansion::load(&folder, &name)?,
        };
        let q = operators.len();
        self.core.operators.insert(term.clone(), operators);
        self.core.terms.insert(term.clone(), q);
        Ok(q)
    }

    fn build_reduced_operators(&mut self) -> Result<(), Error> {
        let terms: Vec<Term> = self
            .core
            .terms
            .keys()
            .filter(|term| is_square(term))
            .cloned()
            .collect();
        for term in &terms {
            self.assemble_operator(term, Stage::Offline)?;
        }
        self.core.basis.save(&self.core.folder(Folders::BASIS), BASIS)?;
        self.core.state = ProblemState::OfflineBuilt;
        Ok(())
    }

    fn set_mu(&mut self, mu: Parameter) -> Result<(), Error> {
        self.core.truth().borrow_mut().set_mu(mu.clone())?;
        self.core.mu = mu;
        self.core.reset_solution_caches();
        Ok(())
    }

    fn solve(&mut self, n: usize) -> Result<DVector<f64>, Error> {
        self.ensure_ready()?;
        let available = self.core.n_max();
        if n > available {
            return Err(DimensionError::Basis {
                requested: n,
                available,
            }
            .into());
        }

        let size = n + self.core.n_bc;
        let a = self.core.recombine_matrix(&Term::Stiffness, size)?;
        let f = self.core.recombine_vector(&Term::Forcing, size)?;
        let constraints = self.core.lifting_constraints()?;
        let solution = linear::solve(&a, &f, constraints.as_ref())?;

        self.core.solution = solution.clone();
        self.core.n = n;
        Ok(solution)
    }

    fn output(&mut self) -> Result<Vec<f64>, Error> {
        let size = self.ensure_solved()?;
        let functional = self.core.recombine_vector(&self.output_term(), size)?;
        Ok(vec![functional.dot(&self.core.solution)])
    }

    fn stability_factor(&mut self) -> Result<f64, Error> {
        Ok(self.core.truth().borrow().stability_factor()?)
    }

    fn residual_dual_norm(&mut self) -> Result<f64, Error> {
        self.ensure_solved()?;
        let reduced = self.core.reconstruct(&self.core.solution)?;
        let residual = {
            let truth = self.core.truth().borrow();
            let a = truth::matrix(&*truth, &Term::Stiffness)?;
            let f = truth::vector(&*truth, &Term::Forcing)?;
            f - a * reduced
        };
        self.core.dual_norm(&residual)
    }

    fn compute_error(&mut self) -> Result<Vec<f64>, Error> {
        self.ensure_solved()?;
        let exact = self.truth_state()?;
        let reduced = self.core.reconstruct(&self.core.solution)?;
        let a = self.truth_stiffness()?;
        Ok(vec![energy_norm(&a, &(exact - reduced))])
    }

    fn compute_relative_error(&mut self) -> Result<Vec<f64>, Error> {
        let error = self.compute_error()?;
        let exact = self.truth_state()?;
        let norm = energy_norm(&self.truth_stiffness()?, &exact);
        Ok(error.into_iter().map(|e| relative(e, norm)).collect())
    }

    fn compute_error_output(&mut self) -> Result<Vec<f64>, Error> {
        let exact = self.truth_output()?;
        let reduced = self.output()?;
        Ok(reduced.into_iter().map(|s| (exact - s).abs()).collect())
    }

    fn compute_relative_error_output(&mut self) -> Result<Vec<f64>, Error> {
        let exact = self.truth_output()?;
        let error = self.compute_error_output()?;
        Ok(error.into_iter().map(|e| relative(e, exact.abs())).collect())
    }

    fn export_solution(&mut self, folder: &Folder, name: &str) -> Result<(), Error> {
        self.ensure_solved()?;
        let state = self.core.reconstruct(&self.core.solution)?;
        self.core
            .truth()
            .borrow()
            .export_solution(folder, name, &TruthSolution::Steady(state))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_terms() {
        assert!(is_square(&Term::Stiffness));
        assert!(is_square(&Term::InnerProduct));
        assert!(!is_square(&Term::DirichletBc));
        assert!(!is_square(&Term::output_correction(Term::Stiffness)));
    }

    #[test]
    fn relative_error_edge_cases() {
        assert_eq!(relative(0.0, 0.0), 0.0);
        assert_eq!(relative(1.0, 0.0), f64::INFINITY);
        assert_eq!(relative(1.0, 4.0), 0.25);
    }
}
