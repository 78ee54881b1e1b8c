use std::{fmt, str::FromStr};

use thiserror::Error;

/// A named operator of the governing equations.
///
/// Every term has an affine expansion: an ordered list of
/// parameter-independent operators plus one scalar coefficient per operator.
/// The string form of a term is the key used for persisted storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// Bilinear form of the stationary operator, `a`.
    Stiffness,
    /// Bilinear form multiplying the time derivative, `m`.
    Mass,
    /// Right-hand side linear form, `f`.
    Forcing,
    /// Output functional, `s`.
    Output,
    /// Dirichlet boundary data, `dirichlet_bc`.
    DirichletBc,
    /// Inner product of the truth space, `inner_product`.
    InnerProduct,
    /// Initial condition, optionally for a single solution component.
    InitialCondition(Option<String>),
    /// Cross term between the dual and primal bases used to correct outputs.
    OutputCorrection(Box<Term>),
}

/// A term name that does not match any known operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown term `{0}`")]
pub struct UnknownTerm(pub String);

const INITIAL_CONDITION: &str = "initial_condition";
const OUTPUT_CORRECTION: &str = "output_correction_and_estimation_";

impl Term {
    /// Returns the initial-condition term for `component`.
    ///
    /// Problems with a single component use the unsuffixed name.
    #[must_use]
    pub fn initial_condition(component: &str, n_components: usize) -> Self {
        if n_components > 1 {
            Self::InitialCondition(Some(component.to_owned()))
        } else {
            Self::InitialCondition(None)
        }
    }

    /// Returns the output-correction term coupling to `term`.
    #[must_use]
    pub fn output_correction(term: Term) -> Self {
        Self::OutputCorrection(Box::new(term))
    }

    /// Returns `true` if the term's operators are bilinear forms.
    #[must_use]
    pub fn is_bilinear(&self) -> bool {
        match self {
            Self::Stiffness | Self::Mass | Self::InnerProduct => true,
            Self::OutputCorrection(inner) => inner.is_bilinear(),
            _ => false,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stiffness => f.write_str("a"),
            Self::Mass => f.write_str("m"),
            Self::Forcing => f.write_str("f"),
            Self::Output => f.write_str("s"),
            Self::DirichletBc => f.write_str("dirichlet_bc"),
            Self::InnerProduct => f.write_str("inner_product"),
            Self::InitialCondition(None) => f.write_str(INITIAL_CONDITION),
            Self::InitialCondition(Some(component)) => {
                write!(f, "{INITIAL_CONDITION}_{component}")
            }
            Self::OutputCorrection(inner) => write!(f, "{OUTPUT_CORRECTION}{inner}"),
        }
    }
}

impl FromStr for Term {
    type Err = UnknownTerm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Self::Stiffness),
            "m" => Ok(Self::Mass),
            "f" => Ok(Self::Forcing),
            "s" => Ok(Self::Output),
            "dirichlet_bc" => Ok(Self::DirichletBc),
            "inner_product" => Ok(Self::InnerProduct),
            INITIAL_CONDITION => Ok(Self::InitialCondition(None)),
            _ => {
                if let Some(component) = s.strip_prefix("initial_condition_") {
                    if !component.is_empty() {
                        return Ok(Self::InitialCondition(Some(component.to_owned())));
                    }
                } else if let Some(inner) = s.strip_prefix(OUTPUT_CORRECTION) {
                    return inner
                        .parse::<Term>()
                        .map(Self::output_correction)
                        .map_err(|_| UnknownTerm(s.to_owned()));
                }
                Err(UnknownTerm(s.to_owned()))
            }
        }
    }
}
