use std::rc::Rc;

use nalgebra::DVector;
use reduct_core::{AffineExpansion, Folders, ReducedOperator, Term, TruthError, TruthOperator};

use crate::{error::Error, projector, stage::Stage};

use super::{ReducedCore, ReducedProblem, SharedReducedProblem};

/// Primal terms whose reduced coupling corrects the primal output.
const CORRECTED: [Term; 2] = [Term::Stiffness, Term::Forcing];

/// Couples a dual reduced problem to its primal.
///
/// Besides the dual's own operators, stores the rectangular projections
/// `Z_dual^T A_q Z_primal` and `Z_dual^T f_q` of the primal operators, and
/// evaluates the output correction `psi^T (f_N - A_N u_N)` where `u_N` is the
/// current primal solution.
pub struct DualReducedProblem {
    inner: Box<dyn ReducedProblem>,
    primal: SharedReducedProblem,
}

impl DualReducedProblem {
    #[must_use]
    pub fn new(inner: Box<dyn ReducedProblem>, primal: SharedReducedProblem) -> Self {
        Self { inner, primal }
    }

    /// Returns the primal problem this dual corrects.
    #[must_use]
    pub fn primal(&self) -> &SharedReducedProblem {
        &self.primal
    }

    fn correction_terms() -> impl Iterator<Item = Term> {
        CORRECTED.into_iter().map(Term::output_correction)
    }

    /// Returns the primal operators of `term`, empty if the primal lacks it.
    fn primal_operators(&self, term: &Term) -> Result<AffineExpansion<TruthOperator>, Error> {
        let truth = Rc::clone(self.primal.borrow().core().truth());
        let operators = truth.borrow().assemble_operator(term);
        match operators {
            Ok(operators) => Ok(operators),
            Err(TruthError::UndefinedTerm(_)) => Ok(AffineExpansion::empty()),
            Err(error) => Err(error.into()),
        }
    }

    /// Returns the primal coefficients of `term`, empty if the primal lacks it.
    fn primal_theta(&self, term: &Term) -> Result<Vec<f64>, Error> {
        let truth = Rc::clone(self.primal.borrow().core().truth());
        let thetas = truth.borrow().compute_theta(term);
        match thetas {
            Ok(thetas) => Ok(thetas),
            Err(TruthError::UndefinedTerm(_)) => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }
}

impl ReducedProblem for DualReducedProblem {
    fn layer(&self) -> &'static str {
        "dual"
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
        let folder = self.core().folder(Folders::ERROR_ESTIMATION);
        if stage == Stage::Offline {
            folder.create()?;
        }
        for term in Self::correction_terms() {
            match stage {
                Stage::Offline => {
                    let Term::OutputCorrection(primal_term) = &term else {
                        continue;
                    };
                    let q = self.primal_operators(primal_term)?.len();
                    AffineExpansion::<ReducedOperator>::empty().save(&folder, &term.to_string())?;
                    self.core_mut().terms.insert(term, q);
                }
                Stage::Online => {
                    self.assemble_operator(&term, stage)?;
                }
            }
        }
        Ok(())
    }

    fn assemble_operator(&mut self, term: &Term, stage: Stage) -> Result<usize, Error> {
        let Term::OutputCorrection(primal_term) = term else {
            return self.inner.assemble_operator(term, stage);
        };

        let folder = self.core().folder(Folders::ERROR_ESTIMATION);
        let name = term.to_string();
        let operators: AffineExpansion<ReducedOperator> = match stage {
            Stage::Offline => {
                let truth_operators = self.primal_operators(primal_term)?;
                let right = {
                    let primal = self.primal.borrow();
                    let basis = primal.core().basis();
                    basis.matrix(basis.len())?
                };
                let basis = self.core().basis();
                let left = basis.matrix(basis.len())?;
                let operators = projector::project_cross(&truth_operators, &left, &right)?;
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
        for term in Self::correction_terms() {
            self.assemble_operator(&term, Stage::Offline)?;
        }
        Ok(())
    }

    /// Returns `[psi^T f_corr(mu) - psi^T A_corr(mu) u_primal]`.
    ///
    /// Empty bases on either side give a zero correction.
    fn output(&mut self) -> Result<Vec<f64>, Error> {
        let psi = self.core().solution().clone();
        let u: DVector<f64> = self.primal.borrow().core().solution().clone();

        let stiffness = Term::output_correction(Term::Stiffness);
        let forcing = Term::output_correction(Term::Forcing);
        let theta_a = self.primal_theta(&Term::Stiffness)?;
        let theta_f = self.primal_theta(&Term::Forcing)?;

        let core = self.core();
        let a = projector::recombine_matrix(
            &stiffness,
            core.stored(&stiffness)?,
            &theta_a,
            psi.len(),
            u.len(),
        )?;
        let f = projector::recombine_vector(&forcing, core.stored(&forcing)?, &theta_f, psi.len())?;

        Ok(vec![psi.dot(&f) - psi.dot(&(a * u))])
    }
}
