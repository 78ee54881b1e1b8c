//! Core types and collaborators for reduced-order modeling.
//!
//! This crate defines the shared abstractions the reduction machinery builds
//! on:
//!
//! - [`TruthProblem`]: the contract a full-order problem exposes (affine
//!   coefficients, parameter-independent operators, a truth solver)
//! - [`AffineExpansion`]: an ordered, persistable list of operators for one
//!   [`Term`]
//! - [`TruthOperator`] and [`ReducedOperator`]: dense operators combined with
//!   [`product_sum`]
//! - [`BasisFunctions`], [`GramSchmidt`], [`ProperOrthogonalDecomposition`]
//!   and [`EmpiricalInterpolation`]: basis construction collaborators
//! - [`Folder`] and [`Folders`]: persisted storage for offline data
//! - [`Observer`]: receives stage events and optionally returns control actions

mod affine;
mod algebra;
mod basis;
mod bc;
mod coercivity;
mod eim;
mod gram_schmidt;
mod observer;
mod parameter;
mod pod;
mod problem;
mod storage;
mod term;

pub mod linear;
pub mod truth;

pub use affine::AffineExpansion;
pub use algebra::{AlgebraError, LinearCombination, ReducedOperator, TruthOperator, product_sum};
pub use basis::{BasisError, BasisFunctions};
pub use bc::DirichletBc;
pub use coercivity::{CoercivityError, EigenvalueBounds, SpectralBounds};
pub use eim::EmpiricalInterpolation;
pub use gram_schmidt::GramSchmidt;
pub use linear::LinearSolveError;
pub use observer::Observer;
pub use parameter::{Parameter, ParameterRange, ParameterSet, Sampling, SamplingError};
pub use pod::ProperOrthogonalDecomposition;
pub use problem::{
    Capability, ImportDisabled, PhysicsFamily, SharedTruth, SolutionCache, TimeGrid, TruthError,
    TruthProblem, TruthSolution, share,
};
pub use storage::{Folder, Folders, StorageError};
pub use term::{Term, UnknownTerm};
