use reduct_core::{
    AlgebraError, BasisError, CoercivityError, LinearSolveError, SamplingError, StorageError, Term,
    TruthError,
};
use thiserror::Error;

use crate::{method::ConfigError, reduced::ProblemState};

/// Errors raised by reduced problems, reduction methods and composition.
///
/// Offline/online staging errors usually mean the persisted offline data is
/// stale or incompatible. Nothing here is retried; regenerate the offline data.
#[derive(Debug, Error)]
pub enum Error {
    /// No base strategy or capability matches the truth problem.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A term that is not declared was requested.
    #[error("unknown term `{0}`")]
    UnknownTerm(Term),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    /// A stage name other than `online` or `offline`.
    #[error("invalid stage `{0}`, expected `online` or `offline`")]
    Stage(String),

    #[error("reduced problem is {state}, expected {expected}")]
    NotReady {
        state: ProblemState,
        expected: &'static str,
    },

    #[error("stability factor {0} is not positive")]
    NonPositiveStabilityFactor(f64),

    #[error("operation `{0}` is not available for this problem")]
    Unsupported(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Truth(TruthError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    LinearSolve(#[from] LinearSolveError),

    #[error(transparent)]
    Basis(#[from] BasisError),

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Coercivity(#[from] CoercivityError),
}

/// Stored offline data does not match an online request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("term `{term}` has {expected} stored operators, got {found} coefficients")]
    ThetaLength {
        term: Term,
        expected: usize,
        found: usize,
    },

    #[error("term `{term}` stores {available} basis functions, {requested} requested")]
    BasisSize {
        term: Term,
        requested: usize,
        available: usize,
    },

    #[error("basis has {available} functions, {requested} requested")]
    Basis { requested: usize, available: usize },
}

impl From<TruthError> for Error {
    fn from(error: TruthError) -> Self {
        match error {
            TruthError::UndefinedTerm(term) => Self::UnknownTerm(term),
            other => Self::Truth(other),
        }
    }
}
