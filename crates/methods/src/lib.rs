//! Offline/online reduced-order modeling of affinely parametrized problems.
//!
//! Given a [`TruthProblem`](reduct_core::TruthProblem), this crate builds a
//! cheap surrogate in two stages:
//!
//! - **Offline**, a [`ReductionMethod`] grows a reduced basis (greedy
//!   [`ReducedBasis`] or [`PodGalerkin`]) and projects every parameter-free
//!   truth operator onto it.
//! - **Online**, a [`ReducedProblem`] recombines the stored reduced operators
//!   with the truth problem's coefficients at a new parameter and solves a
//!   small dense system.
//!
//! [`compose`] picks the base pair for a truth problem and layers the
//! capabilities it declares, in a fixed order. [`compose_dual`] builds the
//! adjoint reduction whose output corrects the primal output.
//!
//! # Modules
//!
//! - [`reduced`]: reduced problems and their lifecycle
//! - [`method`]: reduction methods, configuration and observer events
//! - [`capability`]: optional capability layers
//! - [`projector`]: Galerkin projection and affine recombination
//! - [`dual`]: dual truth problems and output correction
//! - [`analysis`]: error and speedup analyses

pub mod analysis;
pub mod capability;
pub mod dual;
pub mod method;
pub mod projector;
pub mod reduced;

mod compose;
mod error;
mod stage;

pub use analysis::{ErrorAnalysis, SpeedupAnalysis};
pub use compose::{
    MethodConstructor, REGISTRY, ReducedConstructor, Registration, Strategy, compose,
    compose_dual, compose_with, resolve,
};
pub use dual::{CorrectedOutput, DualTruthProblem, PrimalDual};
pub use error::{DimensionError, Error};
pub use method::{
    Action, Event, PodGalerkin, ReducedBasis, ReductionMethod, Settings, TimeDependentReduction,
};
pub use reduced::{ProblemState, ReducedProblem, SharedReducedProblem};
pub use stage::Stage;
