mod support;

use std::rc::Rc;

use approx::assert_relative_eq;
use reduct_core::{Folder, Folders, Parameter, Term, TruthProblem, TruthSolution, share};
use reduct_methods::{
    ReducedProblem, ReductionMethod, Stage, Strategy, compose_with,
    reduced::{EllipticCoerciveReducedProblem, TimeDependentReducedProblem},
};
use tempfile::tempdir;

use support::{ThermalBlock, settings, truth_solution};

#[test]
fn trajectories_cover_every_time_step() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.5));
    let mut method = compose_with(Rc::clone(&truth), Strategy::PodGalerkin, settings(dir.path()))
        .expect("should compose");
    let reduced = method.offline_unobserved().expect("offline should succeed");

    let mu = Parameter::new([1.4, 0.8]);
    let mut reduced = reduced.borrow_mut();
    let n = reduced.core().n_max();
    reduced.set_mu(mu.clone()).expect("mu in range");
    reduced.solve(n).expect("should march");

    assert_eq!(reduced.core().trajectory().len(), 6);
    assert_eq!(reduced.output().expect("should evaluate outputs").len(), 6);

    let relative = reduced
        .compute_relative_error()
        .expect("should compare trajectories");
    assert_eq!(relative.len(), 6);
    assert!(relative.iter().all(|error| *error < 1e-2));

    let mut reference = ThermalBlock::new(4).parabolic(0.1, 0.5);
    let states = truth_solution(&mut reference, &mu);
    assert_eq!(states.states().len(), 6);
}

#[test]
fn exported_trajectories_are_expanded_step_by_step() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.5));
    let mut method = compose_with(truth, Strategy::PodGalerkin, settings(dir.path()))
        .expect("should compose");
    let reduced = method.offline_unobserved().expect("offline should succeed");

    let mut reduced = reduced.borrow_mut();
    let n = reduced.core().n_max();
    reduced.set_mu(Parameter::new([1.1, 0.6])).expect("mu in range");
    reduced.solve(n).expect("should march");

    let folder = Folder::new(dir.path().join("export"));
    reduced
        .export_solution(&folder, "trajectory")
        .expect("should export");
    let exported: TruthSolution = folder.load("trajectory").expect("should reload");

    let TruthSolution::Transient(states) = exported else {
        panic!("parabolic exports are transient");
    };
    let trajectory = reduced.core().trajectory();
    assert_eq!(states.len(), 6);
    assert_eq!(states.len(), trajectory.len());
    for (state, coefficients) in states.iter().zip(trajectory) {
        let expected = reduced
            .core()
            .basis()
            .reconstruct(coefficients)
            .expect("should expand");
        assert_relative_eq!(*state, expected, epsilon = 1e-12);
    }
}

#[test]
fn marching_restores_the_clocks() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.5));
    let mut method = compose_with(Rc::clone(&truth), Strategy::PodGalerkin, settings(dir.path()))
        .expect("should compose");
    let reduced = method.offline_unobserved().expect("offline should succeed");

    let mut reduced = reduced.borrow_mut();
    let n = reduced.core().n_max();
    reduced.set_mu(Parameter::new([1.4, 0.8])).expect("mu in range");
    let start = truth.borrow().time();

    reduced.solve(n).expect("should march");
    assert_relative_eq!(truth.borrow().time(), start);
    assert_relative_eq!(reduced.core().time(), start);

    reduced.output().expect("should evaluate outputs");
    reduced.compute_error().expect("should compare trajectories");
    assert_relative_eq!(truth.borrow().time(), start);
    assert_relative_eq!(reduced.core().time(), start);
}

#[test]
fn error_analysis_reports_every_time_step() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.3));
    let mut method = compose_with(truth, Strategy::PodGalerkin, settings(dir.path()))
        .expect("should compose");
    method.offline_unobserved().expect("offline should succeed");

    let analysis = method.error_analysis(None).expect("should analyze errors");

    assert_eq!(analysis.rows.len(), 5);
    for row in &analysis.rows {
        assert_eq!(row.error.len(), 4);
        assert_eq!(row.output_error.len(), 4);
        assert!(row.estimate.is_none());
    }
}

#[test]
fn zero_final_time_keeps_the_initial_state() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.0));
    let mut method = compose_with(truth, Strategy::PodGalerkin, settings(dir.path()))
        .expect("should compose");
    let reduced = method.offline_unobserved().expect("offline should succeed");

    let mut reduced = reduced.borrow_mut();
    let n = reduced.core().n_max();
    reduced.set_mu(Parameter::new([1.0, 1.0])).expect("mu in range");
    let last = reduced.solve(n).expect("should project the initial state");

    assert_eq!(reduced.core().trajectory(), [last]);
    let error = reduced.compute_error().expect("should compare the initial state");
    assert_eq!(error.len(), 1);
    assert!(error[0] < 1e-8);
}

#[test]
fn initial_conditions_are_tracked_per_component() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.5));
    let mut problem = TimeDependentReducedProblem::new(Box::new(
        EllipticCoerciveReducedProblem::new(truth, Folders::new(dir.path())),
    ));
    problem.init(Stage::Offline).expect("should declare terms");

    assert_eq!(problem.homogeneous_initial_conditions().get("u"), Some(&false));
    assert_eq!(
        problem
            .single_initial_condition()
            .expect("should have one component"),
        &Term::InitialCondition(None)
    );
    assert_eq!(problem.core().terms().get(&Term::InitialCondition(None)), Some(&1));
}

#[test]
fn problems_at_rest_start_from_zero() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4).parabolic(0.1, 0.5).from_rest());
    let mut method = compose_with(Rc::clone(&truth), Strategy::PodGalerkin, settings(dir.path()))
        .expect("should compose");
    let reduced = method.offline_unobserved().expect("offline should succeed");

    let time_layer = reduced.borrow();
    assert_eq!(time_layer.layers(), ["time dependent", "elliptic coercive"]);
    assert_eq!(
        time_layer.core().terms().get(&Term::InitialCondition(None)),
        Some(&0)
    );
    drop(time_layer);

    let mut reduced = reduced.borrow_mut();
    let n = reduced.core().n_max();
    reduced.set_mu(Parameter::new([0.7, 1.9])).expect("mu in range");
    reduced.solve(n).expect("should march");

    let trajectory = reduced.core().trajectory();
    assert_eq!(trajectory.len(), 6);
    assert!(trajectory[0].iter().all(|value| *value == 0.0));
    assert!(trajectory[5].amax() > 0.0);
}

#[test]
fn stationary_truths_cannot_march() {
    let dir = tempdir().expect("should create a temp dir");
    let truth = share(ThermalBlock::new(4));
    let mut problem = TimeDependentReducedProblem::new(Box::new(
        EllipticCoerciveReducedProblem::new(Rc::clone(&truth), Folders::new(dir.path())),
    ));

    assert!(problem.init(Stage::Offline).is_err());
    assert!(truth.borrow().time_grid().is_none());
}
