use reduct_core::{SpectralBounds, Term, truth};

use crate::{
    error::Error,
    reduced::{ReducedCore, ReducedProblem},
};

/// Computes the stability factor as the exact coercivity constant
/// `inf_v a(v, v; mu) / (v, v)_X` over the free truth dofs.
///
/// The inner-product factorization is computed once and reused.
pub struct ExactCoercivityConstant {
    inner: Box<dyn ReducedProblem>,
    spectral: Option<SpectralBounds>,
}

impl ExactCoercivityConstant {
    #[must_use]
    pub fn new(inner: Box<dyn ReducedProblem>) -> Self {
        Self {
            inner,
            spectral: None,
        }
    }
}

impl ReducedProblem for ExactCoercivityConstant {
    fn layer(&self) -> &'static str {
        "exact coercivity constant"
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

    fn stability_factor(&mut self) -> Result<f64, Error> {
        let truth = self.inner.core().truth().borrow();
        if self.spectral.is_none() {
            let spectral =
                SpectralBounds::new(&truth::inner_product(&*truth)?, truth::free_dofs(&*truth)?)?;
            self.spectral = Some(spectral);
        }
        let stiffness = truth::matrix(&*truth, &Term::Stiffness)?;
        match &self.spectral {
            Some(spectral) => Ok(spectral.coercivity_constant(&stiffness)?),
            None => Err(Error::Unsupported("coercivity constant")),
        }
    }
}
