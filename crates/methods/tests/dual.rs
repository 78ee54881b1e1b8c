mod support;

use std::rc::Rc;

use reduct_core::{
    AffineExpansion, Folders, Parameter, ReducedOperator, Term, TruthError, TruthProblem, share,
};
use reduct_methods::{
    DualTruthProblem, Error, PrimalDual, ProblemState, ReducedProblem, ReductionMethod, Stage,
    Strategy, compose_dual, compose_with,
};
use tempfile::tempdir;

use support::{ThermalBlock, settings, truth_solution};

#[test]
fn dual_forcing_is_the_negated_output() {
    let primal = share(ThermalBlock::new(4).with_output());
    let mut dual = DualTruthProblem::new(Rc::clone(&primal)).expect("should build the dual");
    dual.set_mu(Parameter::new([1.5, 0.5])).expect("mu in range");

    assert_eq!(dual.name(), "thermal_block_4_output_dual");
    assert_eq!(primal.borrow().mu(), &Parameter::new([1.5, 0.5]));
    assert_eq!(
        dual.compute_theta(&Term::Forcing).expect("should negate"),
        [-1.0]
    );
    assert_eq!(
        dual.compute_theta(&Term::Stiffness).expect("should forward"),
        [1.5, 0.5, 1.5, 0.5]
    );
}

#[test]
fn compliant_duals_use_the_forcing() {
    let primal = share(ThermalBlock::new(4));
    let mut dual = DualTruthProblem::new(primal).expect("should build the dual");
    dual.set_mu(Parameter::new([1.5, 0.5])).expect("mu in range");

    assert_eq!(
        dual.compute_theta(&Term::Forcing).expect("should negate"),
        [-1.0, -1.5, -0.5, -1.0]
    );
    assert!(matches!(
        dual.compute_theta(&Term::Mass),
        Err(TruthError::UndefinedTerm(Term::Mass))
    ));
}

#[test]
fn time_dependent_primals_have_no_dual_truth() {
    let primal = share(ThermalBlock::new(4).parabolic(0.1, 0.5));

    assert!(matches!(
        DualTruthProblem::new(primal),
        Err(TruthError::Unsupported(_))
    ));
}

#[test]
fn correction_improves_the_output() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).with_output());
    let mut primal = compose_with(Rc::clone(&truth), Strategy::ReducedBasis, settings(dir.path()))
        .expect("should compose the primal");
    primal.offline_unobserved().expect("primal offline should succeed");

    let mut dual =
        compose_dual(primal.as_ref(), Strategy::ReducedBasis).expect("should compose the dual");
    assert_eq!(
        dual.reduced_problem().borrow().layers(),
        ["dual", "elliptic coercive"]
    );
    dual.offline_unobserved().expect("dual offline should succeed");

    let mu = Parameter::new([1.3, 0.7]);
    let mut reference = ThermalBlock::new(4).with_output();
    let solution = truth_solution(&mut reference, &mu);
    let exact = reference.output(&solution).expect("should evaluate the output")[0];

    let n_dual = dual.reduced_problem().borrow().core().n_max();
    let pair = PrimalDual::new(primal.reduced_problem(), dual.reduced_problem());
    let output = pair.solve(&mu, 1, n_dual).expect("should solve both");
    let bound = pair.output_error_bound().expect("should bound the output");

    let primal_error = (exact - output.primal).abs();
    let corrected_error = (exact - output.corrected()).abs();
    assert!(corrected_error < primal_error);
    assert!(corrected_error <= bound * (1.0 + 1e-8) + 1e-12);
}

#[test]
fn empty_dual_basis_gives_no_correction() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).with_output());
    let mut primal = compose_with(truth, Strategy::ReducedBasis, settings(dir.path()))
        .expect("should compose the primal");
    primal.offline_unobserved().expect("primal offline should succeed");
    let dual =
        compose_dual(primal.as_ref(), Strategy::PodGalerkin).expect("should compose the dual");

    let reduced = dual.reduced_problem();
    let mut reduced = reduced.borrow_mut();
    reduced.init(Stage::Offline).expect("should declare terms");
    reduced
        .build_reduced_operators()
        .expect("should project onto empty bases");
    reduced.set_mu(Parameter::new([1.0, 1.0])).expect("mu in range");
    assert_eq!(reduced.solve(0).expect("should solve").len(), 0);

    assert_eq!(reduced.output().expect("should correct"), [0.0]);
}

#[test]
fn empty_primal_and_dual_bases_give_no_correction() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).with_output());
    let primal = compose_with(truth, Strategy::ReducedBasis, settings(dir.path()))
        .expect("should compose the primal");
    {
        let reduced = primal.reduced_problem();
        let mut reduced = reduced.borrow_mut();
        reduced.init(Stage::Offline).expect("should declare terms");
        reduced
            .build_reduced_operators()
            .expect("should project onto an empty basis");
    }
    let dual =
        compose_dual(primal.as_ref(), Strategy::ReducedBasis).expect("should compose the dual");
    {
        let reduced = dual.reduced_problem();
        let mut reduced = reduced.borrow_mut();
        reduced.init(Stage::Offline).expect("should declare terms");
        reduced
            .build_reduced_operators()
            .expect("should project onto empty bases");
    }

    let pair = PrimalDual::new(primal.reduced_problem(), dual.reduced_problem());
    let output = pair
        .solve(&Parameter::new([1.2, 0.9]), 0, 0)
        .expect("should solve both");

    assert_eq!(output.primal, 0.0);
    assert_eq!(output.correction, 0.0);
    assert_eq!(
        dual.reduced_problem().borrow_mut().output().expect("should correct"),
        [0.0]
    );
}

#[test]
fn offline_init_stores_empty_correction_operators() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).with_output());
    let primal = compose_with(truth, Strategy::ReducedBasis, settings(dir.path()))
        .expect("should compose the primal");
    let dual =
        compose_dual(primal.as_ref(), Strategy::ReducedBasis).expect("should compose the dual");

    let reduced = dual.reduced_problem();
    let mut reduced = reduced.borrow_mut();
    reduced.init(Stage::Offline).expect("should declare terms");

    let folder = reduced.core().folders().folder(Folders::ERROR_ESTIMATION);
    for name in [
        "output_correction_and_estimation_a",
        "output_correction_and_estimation_f",
    ] {
        assert!(folder.exists(name), "{name} should be stored");
        let stored = AffineExpansion::<ReducedOperator>::load(&folder, name)
            .expect("should load the empty expansion");
        assert!(stored.is_empty());
    }
    assert!(
        !reduced
            .core()
            .folders()
            .folder(Folders::REDUCED_OPERATORS)
            .exists("output_correction_and_estimation_a")
    );
    assert_eq!(
        reduced
            .core()
            .terms()
            .get(&Term::output_correction(Term::Stiffness)),
        Some(&4)
    );
}

#[test]
fn dual_forcing_reports_output_failures() {
    let primal = share(ThermalBlock::new(4).with_failing_output());
    let dual = DualTruthProblem::new(primal).expect("should build the dual");

    assert!(matches!(
        dual.compute_theta(&Term::Forcing),
        Err(TruthError::Unsupported(_))
    ));
    assert!(matches!(
        dual.assemble_operator(&Term::Forcing),
        Err(TruthError::Unsupported(_))
    ));
}

#[test]
fn output_bounds_need_a_solved_primal() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).with_output());
    let primal = compose_with(truth, Strategy::ReducedBasis, settings(dir.path()))
        .expect("should compose the primal");
    let dual =
        compose_dual(primal.as_ref(), Strategy::ReducedBasis).expect("should compose the dual");
    let pair = PrimalDual::new(primal.reduced_problem(), dual.reduced_problem());

    assert!(matches!(
        pair.output_error_bound(),
        Err(Error::NotReady {
            state: ProblemState::Uninitialized,
            ..
        })
    ));
}

#[test]
fn dual_solves_share_the_primal_parameter() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).with_output());
    let mut primal = compose_with(Rc::clone(&truth), Strategy::ReducedBasis, settings(dir.path()))
        .expect("should compose the primal");
    primal.offline_unobserved().expect("primal offline should succeed");
    let mut dual =
        compose_dual(primal.as_ref(), Strategy::ReducedBasis).expect("should compose the dual");
    dual.offline_unobserved().expect("dual offline should succeed");

    let pair = PrimalDual::new(primal.reduced_problem(), dual.reduced_problem());
    let mu = Parameter::new([0.8, 1.6]);
    pair.solve(&mu, 2, 2).expect("should solve both");

    assert_eq!(truth.borrow().mu(), &mu);
    assert_eq!(pair.primal().borrow().core().mu(), &mu);
    assert_eq!(pair.dual().borrow().core().mu(), &mu);
}
