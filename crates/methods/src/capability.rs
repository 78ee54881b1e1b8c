//! Optional capability layers.
//!
//! Each capability contributes a reduction-method layer and a reduced-problem
//! layer. The composition engine wraps them around the base layers in
//! [`CAPABILITY_ORDER`], whatever order the truth problem lists them in:
//!
//! 1. [`Capability::EmpiricalInterpolation`] trains interpolants of the
//!    truth problem's parametrized functions and attaches them, which turns
//!    non-affine operators into affine ones.
//! 2. [`Capability::ExactParametrizedFunctions`] re-projects operators at the
//!    current parameter on every online solve instead.
//! 3. [`Capability::SuccessiveConstraint`] replaces the stability factor by a
//!    lower bound trained offline.
//! 4. [`Capability::ExactCoercivityConstant`] computes the stability factor
//!    exactly from a generalized eigenproblem.
//!
//! Later layers see the combined behavior of earlier ones: exact evaluation
//! keeps interpolants from being attached, and the exact coercivity constant
//! overrides an SCM bound.

mod coercivity;
mod eim;
mod exact;
mod scm;

pub use coercivity::ExactCoercivityConstant;
pub use eim::{EmpiricalInterpolationMethod, EmpiricalInterpolationProblem};
pub use exact::{ExactEvaluationMethod, ExactEvaluationProblem};
pub use scm::{ScmBounds, SharedScmBounds, SuccessiveConstraintMethod, SuccessiveConstraintProblem};

use reduct_core::Capability;

/// The order capability layers are applied in, innermost first.
pub const CAPABILITY_ORDER: [Capability; 4] = [
    Capability::EmpiricalInterpolation,
    Capability::ExactParametrizedFunctions,
    Capability::SuccessiveConstraint,
    Capability::ExactCoercivityConstant,
];
