use reduct_core::{Folders, GramSchmidt, ParameterSet, SharedTruth, Term, TruthError, truth};

use crate::{error::Error, reduced::SharedReducedProblem};

use super::Settings;

/// How truth operators of parametrized functions are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyMode {
    /// Operators are affine as declared by the truth problem.
    #[default]
    Affine,
    /// Parametrized functions are replaced by their empirical interpolants.
    Empirical,
    /// Parametrized functions are evaluated exactly at every parameter.
    Exact,
}

/// State shared by every layer of a reduction method.
pub struct MethodCore {
    truth: SharedTruth,
    reduced: SharedReducedProblem,
    folders: Folders,
    settings: Settings,
    pub(crate) mode: AssemblyMode,
    training_set: Option<ParameterSet>,
    testing_set: Option<ParameterSet>,
}

/// Name of a stored parameter set inside its folder.
const PARAMETERS: &str = "parameters";

impl MethodCore {
    #[must_use]
    pub fn new(
        truth: SharedTruth,
        reduced: SharedReducedProblem,
        folders: Folders,
        settings: Settings,
    ) -> Self {
        Self {
            truth,
            reduced,
            folders,
            settings,
            mode: AssemblyMode::Affine,
            training_set: None,
            testing_set: None,
        }
    }

    #[must_use]
    pub fn truth(&self) -> &SharedTruth {
        &self.truth
    }

    /// Returns the reduced problem this method builds.
    #[must_use]
    pub fn reduced(&self) -> &SharedReducedProblem {
        &self.reduced
    }

    #[must_use]
    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn mode(&self) -> AssemblyMode {
        self.mode
    }

    /// Returns the training set, loading or generating it on first use.
    ///
    /// # Errors
    ///
    /// Propagates sampling and storage failures.
    pub fn training_set(&mut self) -> Result<ParameterSet, Error> {
        if self.training_set.is_none() {
            let set = self.parameter_set(Folders::TRAINING_SET, true)?;
            self.training_set = Some(set);
        }
        self.training_set
            .clone()
            .ok_or(Error::Unsupported("training set"))
    }

    /// Returns the testing set, loading or generating it on first use.
    ///
    /// # Errors
    ///
    /// Propagates sampling and storage failures.
    pub fn testing_set(&mut self) -> Result<ParameterSet, Error> {
        if self.testing_set.is_none() {
            let set = self.parameter_set(Folders::TESTING_SET, false)?;
            self.testing_set = Some(set);
        }
        self.testing_set
            .clone()
            .ok_or(Error::Unsupported("testing set"))
    }

    fn parameter_set(&self, name: &str, training: bool) -> Result<ParameterSet, Error> {
        let folder = self.folders.folder(name);
        if folder.exists(PARAMETERS) {
            log::debug!("loading {name} from {}", folder.path().display());
            return Ok(folder.load(PARAMETERS)?);
        }

        let config = if training {
            self.settings.training
        } else {
            self.settings.testing
        };
        let range = self.truth.borrow().mu_range().clone();
        let set = ParameterSet::generate(&range, config.size(), config.sampling())?;
        folder.create()?;
        folder.save(PARAMETERS, &set)?;
        log::info!("generated {name} with {} parameters", set.len());
        Ok(set)
    }

    /// Returns the Gram-Schmidt process in the truth inner product.
    pub(crate) fn gram_schmidt(&self) -> Result<GramSchmidt, Error> {
        Ok(GramSchmidt::new(truth::inner_product(&*self.truth.borrow())?))
    }

    /// Adds the Dirichlet lifting functions in front of an empty basis.
    ///
    /// One function per Dirichlet operator, holding its prescribed values.
    /// Liftings are not orthonormalized so that their coefficients stay equal
    /// to `theta_dirichlet_bc`.
    pub(crate) fn push_liftings(&self) -> Result<(), Error> {
        let mut reduced = self.reduced.borrow_mut();
        let n_bc = reduced.core().n_bc();
        if n_bc == 0 || !reduced.core().basis().is_empty() {
            return Ok(());
        }

        let (operators, dimension) = {
            let truth = self.truth.borrow();
            let operators = match truth.assemble_operator(&Term::DirichletBc) {
                Ok(operators) => operators,
                Err(TruthError::UndefinedTerm(_)) => return Ok(()),
                Err(error) => return Err(error.into()),
            };
            (operators, truth.dimension())
        };
        for operator in &operators {
            let lifting = operator
                .as_dirichlet_bc()?
                .lifting(dimension)
                .ok_or(Error::Unsupported("lifting of an out-of-range Dirichlet dof"))?;
            reduced.core_mut().basis_mut().enrich(lifting)?;
        }
        log::debug!("added {} lifting functions", operators.len());
        Ok(())
    }
}

