//! The capability composition engine.
//!
//! [`compose`] resolves a base reduction strategy for a truth problem from
//! the [`REGISTRY`], then wraps the base reduced problem and the base method
//! with one layer per capability the truth problem declares, always in
//! [`CAPABILITY_ORDER`]. The result is an ordinary [`ReductionMethod`]
//! whose [`layers`](ReductionMethod::layers) list the applied wrappers.
//!
//! ```ignore
//! let mut method = compose(truth, Strategy::ReducedBasis)?;
//! let reduced = method.offline_unobserved()?;
//! reduced.borrow_mut().set_mu(Parameter::new([1.0, 1.0]))?;
//! let coefficients = reduced.borrow_mut().solve(5)?;
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use reduct_core::{Capability, Folders, PhysicsFamily, SharedTruth};

use crate::{
    capability::{
        CAPABILITY_ORDER, EmpiricalInterpolationMethod, EmpiricalInterpolationProblem,
        ExactCoercivityConstant, ExactEvaluationMethod, ExactEvaluationProblem, SharedScmBounds,
        SuccessiveConstraintMethod, SuccessiveConstraintProblem,
    },
    dual,
    error::Error,
    method::{MethodCore, PodGalerkin, ReducedBasis, ReductionMethod, Settings, TimeDependentReduction},
    reduced::{
        self, DualReducedProblem, EllipticCoerciveReducedProblem, ReducedProblem,
        SharedReducedProblem, TimeDependentReducedProblem,
    },
};

/// A base reduction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Greedy reduced basis driven by the a posteriori error estimate.
    ReducedBasis,
    /// Proper orthogonal decomposition of training snapshots.
    PodGalerkin,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReducedBasis => f.write_str("reduced basis"),
            Self::PodGalerkin => f.write_str("POD-Galerkin"),
        }
    }
}

/// Builds a base reduced problem.
pub type ReducedConstructor = fn(SharedTruth, Folders) -> Box<dyn ReducedProblem>;

/// Builds a base reduction method.
pub type MethodConstructor = fn(MethodCore) -> Box<dyn ReductionMethod>;

/// A base reduced problem and method for one physics family and strategy.
#[derive(Clone, Copy)]
pub struct Registration {
    pub family: PhysicsFamily,
    pub strategy: Strategy,
    pub reduced: ReducedConstructor,
    pub method: MethodConstructor,
}

/// Every supported base pair.
///
/// Greedy reduced basis is not registered for parabolic problems, since it
/// needs an a posteriori estimate over the whole trajectory.
pub const REGISTRY: [Registration; 3] = [
    Registration {
        family: PhysicsFamily::EllipticCoercive,
        strategy: Strategy::ReducedBasis,
        reduced: elliptic_reduced,
        method: reduced_basis,
    },
    Registration {
        family: PhysicsFamily::EllipticCoercive,
        strategy: Strategy::PodGalerkin,
        reduced: elliptic_reduced,
        method: pod_galerkin,
    },
    Registration {
        family: PhysicsFamily::Parabolic,
        strategy: Strategy::PodGalerkin,
        reduced: parabolic_reduced,
        method: parabolic_pod_galerkin,
    },
];

fn elliptic_reduced(truth: SharedTruth, folders: Folders) -> Box<dyn ReducedProblem> {
    Box::new(EllipticCoerciveReducedProblem::new(truth, folders))
}

fn parabolic_reduced(truth: SharedTruth, folders: Folders) -> Box<dyn ReducedProblem> {
    Box::new(TimeDependentReducedProblem::new(elliptic_reduced(
        truth, folders,
    )))
}

fn reduced_basis(core: MethodCore) -> Box<dyn ReductionMethod> {
    Box::new(ReducedBasis::new(core))
}

fn pod_galerkin(core: MethodCore) -> Box<dyn ReductionMethod> {
    Box::new(PodGalerkin::new(core))
}

fn parabolic_pod_galerkin(core: MethodCore) -> Box<dyn ReductionMethod> {
    Box::new(TimeDependentReduction::new(pod_galerkin(core)))
}

/// Returns the registration for `family` and `strategy`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the pair is not registered.
pub fn resolve(family: PhysicsFamily, strategy: Strategy) -> Result<Registration, Error> {
    REGISTRY
        .iter()
        .find(|registration| registration.family == family && registration.strategy == strategy)
        .copied()
        .ok_or_else(|| {
            Error::Configuration(format!("no {strategy} reduction registered for {family:?} problems"))
        })
}

/// Composes a reduction method for `truth` with default [`Settings`].
///
/// # Errors
///
/// Returns [`Error::Configuration`] if no base strategy matches.
pub fn compose(truth: SharedTruth, strategy: Strategy) -> Result<Box<dyn ReductionMethod>, Error> {
    compose_with(truth, strategy, Settings::default())
}

/// Composes a reduction method for `truth`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if no base strategy matches.
pub fn compose_with(
    truth: SharedTruth,
    strategy: Strategy,
    settings: Settings,
) -> Result<Box<dyn ReductionMethod>, Error> {
    build(truth, strategy, settings, None)
}

/// Composes the reduction of the dual of `primal`'s truth problem.
///
/// The dual reduced problem is coupled to `primal`'s reduced problem, so its
/// output is the correction of the primal output. Offline data is stored
/// next to the primal's, in a `dual` subfolder.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for time-dependent primals.
pub fn compose_dual(
    primal: &dyn ReductionMethod,
    strategy: Strategy,
) -> Result<Box<dyn ReductionMethod>, Error> {
    let truth = primal.core().truth();
    if truth.borrow().family() != PhysicsFamily::EllipticCoercive {
        return Err(Error::Configuration(format!(
            "no dual reduction for {:?} problems",
            truth.borrow().family()
        )));
    }
    let dual_truth = dual::dual_truth(truth)?;
    build(
        dual_truth,
        strategy,
        primal.core().settings().clone(),
        Some(primal.reduced_problem()),
    )
}

fn build(
    truth: SharedTruth,
    strategy: Strategy,
    settings: Settings,
    primal: Option<SharedReducedProblem>,
) -> Result<Box<dyn ReductionMethod>, Error> {
    let (family, capabilities, prefix, name) = {
        let truth = truth.borrow();
        (
            truth.family(),
            truth.capabilities(),
            truth.folder_prefix(),
            truth.name().to_string(),
        )
    };
    let registration = resolve(family, strategy)?;
    let folders = Folders::new(settings.root.join(prefix));
    let scm: SharedScmBounds = Rc::new(RefCell::new(None));
    let declared: Vec<Capability> = CAPABILITY_ORDER
        .into_iter()
        .filter(|capability| capabilities.contains(capability))
        .collect();

    let mut reduced = (registration.reduced)(Rc::clone(&truth), folders.clone());
    for capability in &declared {
        reduced = wrap_reduced(*capability, reduced, &scm);
    }
    if let Some(primal) = primal {
        reduced = Box::new(DualReducedProblem::new(reduced, primal));
    }
    let reduced = reduced::share(reduced);

    let core = MethodCore::new(truth, reduced, folders, settings);
    let mut method = (registration.method)(core);
    for capability in &declared {
        method = wrap_method(*capability, method, &scm);
    }

    log::info!(
        "composed {strategy} for `{name}`: method [{}], reduced problem [{}]",
        method.layers().join(" > "),
        method.reduced_problem().borrow().layers().join(" > ")
    );
    Ok(method)
}

/// Wraps `inner` with the reduced-problem layer of `capability`.
fn wrap_reduced(
    capability: Capability,
    inner: Box<dyn ReducedProblem>,
    scm: &SharedScmBounds,
) -> Box<dyn ReducedProblem> {
    match capability {
        Capability::EmpiricalInterpolation => Box::new(EmpiricalInterpolationProblem::new(inner)),
        Capability::ExactParametrizedFunctions => Box::new(ExactEvaluationProblem::new(inner)),
        Capability::SuccessiveConstraint => {
            Box::new(SuccessiveConstraintProblem::new(inner, Rc::clone(scm)))
        }
        Capability::ExactCoercivityConstant => Box::new(ExactCoercivityConstant::new(inner)),
    }
}

/// Wraps `inner` with the method layer of `capability`.
///
/// The exact coercivity constant needs no offline work.
fn wrap_method(
    capability: Capability,
    inner: Box<dyn ReductionMethod>,
    scm: &SharedScmBounds,
) -> Box<dyn ReductionMethod> {
    match capability {
        Capability::EmpiricalInterpolation => Box::new(EmpiricalInterpolationMethod::new(inner)),
        Capability::ExactParametrizedFunctions => Box::new(ExactEvaluationMethod::new(inner)),
        Capability::SuccessiveConstraint => {
            Box::new(SuccessiveConstraintMethod::new(inner, Rc::clone(scm)))
        }
        Capability::ExactCoercivityConstant => inner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_pairs() {
        let registration = resolve(PhysicsFamily::Parabolic, Strategy::PodGalerkin)
            .expect("parabolic POD is registered");
        assert_eq!(registration.family, PhysicsFamily::Parabolic);
        assert_eq!(registration.strategy, Strategy::PodGalerkin);
    }

    #[test]
    fn unregistered_pairs_are_configuration_errors() {
        assert!(matches!(
            resolve(PhysicsFamily::Parabolic, Strategy::ReducedBasis),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn registry_pairs_are_unique() {
        for (i, a) in REGISTRY.iter().enumerate() {
            for b in &REGISTRY[i + 1..] {
                assert!(a.family != b.family || a.strategy != b.strategy);
            }
        }
    }
}
