//! Full-order building blocks expressed through the [`TruthProblem`] contract.
//!
//! Concrete truth problems call these from their `solve` implementations, and
//! the reduction machinery uses them to evaluate truth-space quantities
//! (residuals, energy norms, inner products) at the current parameter.

use nalgebra::{DMatrix, DVector};

use crate::{
    bc::DirichletBc,
    linear,
    problem::{TruthError, TruthProblem, TruthSolution},
    term::Term,
};

/// Returns the affine combination of a matrix term at the current parameter.
///
/// # Errors
///
/// Propagates theta evaluation, assembly and combination failures.
pub fn matrix<P: TruthProblem + ?Sized>(problem: &P, term: &Term) -> Result<DMatrix<f64>, TruthError> {
    let thetas = problem.compute_theta(term)?;
    let operators = problem.assemble_operator(term)?;
    Ok(operators.combine(&thetas)?.into_matrix()?)
}

/// Returns the affine combination of a vector term at the current parameter.
///
/// # Errors
///
/// Propagates theta evaluation, assembly and combination failures.
pub fn vector<P: TruthProblem + ?Sized>(problem: &P, term: &Term) -> Result<DVector<f64>, TruthError> {
    let thetas = problem.compute_theta(term)?;
    let operators = problem.assemble_operator(term)?;
    Ok(operators.combine(&thetas)?.into_vector()?)
}

/// Returns the combined Dirichlet data at the current parameter and time.
///
/// Returns `None` if the problem defines no Dirichlet term.
///
/// # Errors
///
/// Propagates failures other than an undefined term.
pub fn dirichlet_bc<P: TruthProblem + ?Sized>(problem: &P) -> Result<Option<DirichletBc>, TruthError> {
    let thetas = match problem.compute_theta(&Term::DirichletBc) {
        Ok(thetas) => thetas,
        Err(TruthError::UndefinedTerm(_)) => return Ok(None),
        Err(error) => return Err(error),
    };
    let operators = problem.assemble_operator(&Term::DirichletBc)?;
    if operators.is_empty() {
        return Ok(None);
    }
    Ok(Some(operators.combine(&thetas)?.into_dirichlet_bc()?))
}

/// Returns the dofs not constrained by any Dirichlet operator.
///
/// # Errors
///
/// Propagates failures other than an undefined term.
pub fn free_dofs<P: TruthProblem + ?Sized>(problem: &P) -> Result<Vec<usize>, TruthError> {
    let mut constrained = vec![false; problem.dimension()];
    match problem.assemble_operator(&Term::DirichletBc) {
        Ok(operators) => {
            for operator in &operators {
                for dof in operator.as_dirichlet_bc()?.dofs() {
                    if let Some(flag) = constrained.get_mut(dof) {
                        *flag = true;
                    }
                }
            }
        }
        Err(TruthError::UndefinedTerm(_)) => {}
        Err(error) => return Err(error),
    }
    Ok((0..constrained.len()).filter(|&i| !constrained[i]).collect())
}

/// Returns the inner product matrix `X`.
///
/// # Errors
///
/// Returns [`TruthError::InnerProductCount`] unless exactly one inner product
/// operator is defined.
pub fn inner_product<P: TruthProblem + ?Sized>(problem: &P) -> Result<DMatrix<f64>, TruthError> {
    let operators = problem.assemble_operator(&Term::InnerProduct)?;
    if operators.len() != 1 {
        return Err(TruthError::InnerProductCount(operators.len()));
    }
    let mut operators = operators.into_vec();
    match operators.pop() {
        Some(operator) => Ok(operator.into_matrix()?),
        None => Err(TruthError::InnerProductCount(0)),
    }
}

/// Returns the initial condition, summed over all components.
///
/// Components without an initial-condition term start from zero.
///
/// # Errors
///
/// Propagates failures other than an undefined term.
pub fn initial_condition<P: TruthProblem + ?Sized>(problem: &P) -> Result<DVector<f64>, TruthError> {
    let components = problem.components();
    let mut state = DVector::zeros(problem.dimension());
    for component in &components {
        let term = Term::initial_condition(component, components.len());
        match vector(problem, &term) {
            Ok(values) => state += values,
            Err(TruthError::UndefinedTerm(_)) => {}
            Err(error) => return Err(error),
        }
    }
    Ok(state)
}

/// Solves `a(u, v) = f(v)` subject to the Dirichlet data.
///
/// # Errors
///
/// Propagates assembly and linear-solve failures.
pub fn solve_elliptic<P: TruthProblem + ?Sized>(problem: &P) -> Result<DVector<f64>, TruthError> {
    let a = matrix(problem, &Term::Stiffness)?;
    let f = vector(problem, &Term::Forcing)?;
    let bc = dirichlet_bc(problem)?;
    Ok(linear::solve(&a, &f, bc.as_ref())?)
}

/// Marches `m(du/dt, v) + a(u, v) = f(v)` with implicit Euler.
///
/// Each step solves `(M/dt + A) u_k = M/dt u_{k-1} + f(t_k)` with the
/// Dirichlet data at `t_k`. The problem clock is restored afterwards.
///
/// # Errors
///
/// Returns [`TruthError::Unsupported`] for problems without a time grid, and
/// propagates assembly and linear-solve failures.
pub fn solve_parabolic<P: TruthProblem + ?Sized>(
    problem: &mut P,
) -> Result<Vec<DVector<f64>>, TruthError> {
    let grid = problem
        .time_grid()
        .ok_or(TruthError::Unsupported("time marching"))?;
    let start = problem.time();

    problem.set_time(0.0);
    let mut states = vec![initial_condition(problem)?];
    let result = (1..=grid.steps()).try_for_each(|k| {
        problem.set_time(grid.time(k));
        let mass = matrix(problem, &Term::Mass)? / grid.dt();
        let a = matrix(problem, &Term::Stiffness)?;
        let previous = states.last().map_or_else(|| DVector::zeros(problem.dimension()), Clone::clone);
        let rhs = &mass * previous + vector(problem, &Term::Forcing)?;
        let bc = dirichlet_bc(problem)?;
        states.push(linear::solve(&(mass + a), &rhs, bc.as_ref())?);
        Ok::<(), TruthError>(())
    });
    problem.set_time(start);
    result?;

    Ok(states)
}

/// Evaluates the output on each state of `solution`.
///
/// The output term `s` is used when defined; otherwise the output is
/// compliant and uses `f`. Transient states are evaluated at their own time.
///
/// # Errors
///
/// Propagates assembly failures.
pub fn output<P: TruthProblem + ?Sized>(
    problem: &mut P,
    solution: &TruthSolution,
) -> Result<Vec<f64>, TruthError> {
    let grid = problem.time_grid();
    let start = problem.time();

    let result = solution
        .states()
        .iter()
        .enumerate()
        .map(|(k, state)| {
            if let (TruthSolution::Transient(_), Some(grid)) = (solution, grid) {
                problem.set_time(grid.time(k));
            }
            let functional = match vector(problem, &Term::Output) {
                Err(TruthError::UndefinedTerm(_)) => vector(problem, &Term::Forcing)?,
                other => other?,
            };
            Ok(functional.dot(state))
        })
        .collect();
    problem.set_time(start);
    result
}

/// Solves at the current parameter, importing a stored solution if allowed.
///
/// # Errors
///
/// Propagates truth solve failures.
pub fn solve_or_import<P: TruthProblem + ?Sized>(problem: &mut P) -> Result<TruthSolution, TruthError> {
    let mu = problem.mu().clone();
    if let Some(solution) = problem
        .solution_cache()
        .and_then(|cache| cache.import(&mu).cloned())
    {
        return Ok(solution);
    }

    let solution = problem.solve()?;
    if let Some(cache) = problem.solution_cache() {
        cache.store(mu, solution.clone());
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use approx::assert_relative_eq;

    use crate::{
        affine::AffineExpansion,
        algebra::TruthOperator,
        parameter::{Parameter, ParameterRange},
        problem::{ImportDisabled, PhysicsFamily, SolutionCache, TimeGrid, share},
    };

    /// `mu * (2u_i - u_{i-1} - u_{i+1}) = 1` on three dofs with `u_0 = 1`.
    struct Chain {
        mu: Parameter,
        range: ParameterRange,
        cache: SolutionCache,
        solves: usize,
        grid: Option<TimeGrid>,
        time: f64,
    }

    impl Chain {
        fn new() -> Self {
            Self {
                mu: Parameter::from([1.0]),
                range: ParameterRange::new(vec![(0.5, 2.0)]).expect("valid range"),
                cache: SolutionCache::default(),
                solves: 0,
                grid: None,
                time: 0.0,
            }
        }

        fn stiffness() -> DMatrix<f64> {
            DMatrix::from_fn(3, 3, |i, j| match i.abs_diff(j) {
                0 => 2.0,
                1 => -1.0,
                _ => 0.0,
            })
        }
    }

    impl TruthProblem for Chain {
        fn name(&self) -> &str {
            "chain"
        }

        fn family(&self) -> PhysicsFamily {
            if self.grid.is_some() {
                PhysicsFamily::Parabolic
            } else {
                PhysicsFamily::EllipticCoercive
            }
        }

        fn dimension(&self) -> usize {
            3
        }

        fn mu(&self) -> &Parameter {
            &self.mu
        }

        fn set_mu(&mut self, mu: Parameter) -> Result<(), TruthError> {
            self.range.check(&mu)?;
            self.mu = mu;
            Ok(())
        }

        fn mu_range(&self) -> &ParameterRange {
            &self.range
        }

        fn compute_theta(&self, term: &Term) -> Result<Vec<f64>, TruthError> {
            match term {
                Term::Stiffness => Ok(vec![self.mu[0]]),
                Term::Forcing | Term::DirichletBc | Term::InnerProduct | Term::Mass => Ok(vec![1.0]),
                _ => Err(TruthError::UndefinedTerm(term.clone())),
            }
        }

        fn assemble_operator(&self, term: &Term) -> Result<AffineExpansion<TruthOperator>, TruthError> {
            let operator = match term {
                Term::Stiffness | Term::InnerProduct => TruthOperator::Matrix(Self::stiffness()),
                Term::Mass => TruthOperator::Matrix(DMatrix::identity(3, 3)),
                Term::Forcing => TruthOperator::Vector(DVector::from_element(3, 1.0)),
                Term::DirichletBc => TruthOperator::DirichletBc(DirichletBc::new().with(0, 1.0)),
                _ => return Err(TruthError::UndefinedTerm(term.clone())),
            };
            Ok(AffineExpansion::new(vec![operator]))
        }

        fn solve(&mut self) -> Result<TruthSolution, TruthError> {
            self.solves += 1;
            if self.grid.is_some() {
                Ok(TruthSolution::Transient(solve_parabolic(self)?))
            } else {
                Ok(TruthSolution::Steady(solve_elliptic(self)?))
            }
        }

        fn time_grid(&self) -> Option<TimeGrid> {
            self.grid
        }

        fn time(&self) -> f64 {
            self.time
        }

        fn set_time(&mut self, time: f64) {
            self.time = time;
        }

        fn solution_cache(&mut self) -> Option<&mut SolutionCache> {
            Some(&mut self.cache)
        }
    }

    #[test]
    fn elliptic_solve_honors_dirichlet_data() {
        let chain = Chain::new();

        let u = solve_elliptic(&chain).expect("should solve");

        assert_relative_eq!(u[0], 1.0);
        let residual = Chain::stiffness() * &u - DVector::from_element(3, 1.0);
        assert_relative_eq!(residual[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(residual[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn free_dofs_exclude_constrained_ones() {
        assert_eq!(free_dofs(&Chain::new()).expect("defined"), vec![1, 2]);
    }

    #[test]
    fn compliant_output_uses_the_forcing() {
        let mut chain = Chain::new();
        let u = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let output = output(&mut chain, &TruthSolution::Steady(u)).expect("should evaluate");

        assert_eq!(output, vec![6.0]);
    }

    #[test]
    fn parabolic_march_starts_from_zero_and_restores_the_clock() {
        let mut chain = Chain::new();
        chain.grid = Some(TimeGrid::new(0.5, 1.0).expect("valid grid"));
        chain.time = 0.25;

        let states = solve_parabolic(&mut chain).expect("should march");

        assert_eq!(states.len(), 3);
        assert_relative_eq!(states[0].norm(), 0.0);
        assert_relative_eq!(states[2][0], 1.0);
        assert_relative_eq!(chain.time, 0.25);
    }

    #[test]
    fn import_is_skipped_while_disabled_and_restored_afterwards() {
        let chain = Rc::new(std::cell::RefCell::new(Chain::new()));
        let shared: crate::problem::SharedTruth = chain.clone();

        solve_or_import(&mut *shared.borrow_mut()).expect("first solve");
        solve_or_import(&mut *shared.borrow_mut()).expect("imported");
        assert_eq!(chain.borrow().solves, 1);

        let failing = || -> Result<(), TruthError> {
            let _guard = ImportDisabled::new(&shared);
            solve_or_import(&mut *shared.borrow_mut())?;
            shared.borrow_mut().set_mu(Parameter::from([10.0]))?;
            Ok(())
        };
        assert!(failing().is_err());

        assert_eq!(chain.borrow().solves, 2);
        assert!(chain.borrow().cache.import_enabled());
    }

    #[test]
    fn import_is_restored_while_the_problem_is_borrowed() {
        let chain = Rc::new(std::cell::RefCell::new(Chain::new()));
        let shared: crate::problem::SharedTruth = chain.clone();

        let guard = ImportDisabled::new(&shared);
        assert!(!chain.borrow().cache.import_enabled());

        let borrowed = shared.borrow_mut();
        drop(guard);
        drop(borrowed);

        assert!(chain.borrow().cache.import_enabled());
    }

    #[test]
    fn shared_problems_coerce_to_trait_objects() {
        let shared = share(Chain::new());
        assert_eq!(shared.borrow().name(), "chain");
    }
}
