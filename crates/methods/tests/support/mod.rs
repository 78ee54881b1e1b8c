//! A one-dimensional thermal block shared by the integration tests.
//!
//! The unit interval is split into `blocks` subdomains of equal length, each
//! with its own conductivity `mu[q % 2]`. Linear finite elements, a Dirichlet
//! condition at `x = 0` and a natural condition at `x = 1`.

#![allow(dead_code)]

use std::{cell::Cell, f64::consts::FRAC_PI_2, path::Path, rc::Rc};

use nalgebra::{DMatrix, DVector};
use reduct_core::{
    AffineExpansion, Capability, DirichletBc, EmpiricalInterpolation, Parameter, ParameterRange,
    PhysicsFamily, Sampling, SolutionCache, Term, TimeGrid, TruthError, TruthOperator,
    TruthProblem, TruthSolution, truth,
};
use reduct_methods::{
    Settings,
    method::{GreedyConfig, PodConfig, TrainingConfig},
};

/// Elements in each block.
const ELEMENTS_PER_BLOCK: usize = 8;

/// Name of the non-affine source term.
pub const SOURCE: &str = "source";

pub struct ThermalBlock {
    name: String,
    family: PhysicsFamily,
    blocks: usize,
    mu: Parameter,
    range: ParameterRange,
    nodes: DVector<f64>,
    stiffness: Vec<DMatrix<f64>>,
    loads: Vec<DVector<f64>>,
    mass: DMatrix<f64>,
    lifting: bool,
    output: bool,
    failing_output: bool,
    source: bool,
    interpolation: Option<EmpiricalInterpolation>,
    capabilities: Vec<Capability>,
    grid: Option<TimeGrid>,
    initial: bool,
    time: f64,
    cache: SolutionCache,
    solves: Rc<Cell<usize>>,
}

impl ThermalBlock {
    /// A stationary problem with homogeneous Dirichlet data and a block-wise
    /// constant source of strength `1, mu[0], mu[1], 1, ...`.
    pub fn new(blocks: usize) -> Self {
        let elements = blocks * ELEMENTS_PER_BLOCK;
        let dimension = elements + 1;
        #[allow(clippy::cast_precision_loss)]
        let h = 1.0 / elements as f64;

        let mut stiffness = vec![DMatrix::zeros(dimension, dimension); blocks];
        let mut loads = vec![DVector::zeros(dimension); blocks];
        for element in 0..elements {
            let block = element / ELEMENTS_PER_BLOCK;
            for (i, j, sign) in [(0, 0, 1.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 1.0)] {
                stiffness[block][(element + i, element + j)] += sign / h;
            }
            loads[block][element] += h / 2.0;
            loads[block][element + 1] += h / 2.0;
        }
        let mass = DMatrix::from_diagonal(&DVector::from_fn(dimension, |i, _| {
            if i == 0 || i == elements { h / 2.0 } else { h }
        }));
        #[allow(clippy::cast_precision_loss)]
        let nodes = DVector::from_fn(dimension, |i, _| i as f64 * h);

        Self {
            name: format!("thermal_block_{blocks}"),
            family: PhysicsFamily::EllipticCoercive,
            blocks,
            mu: Parameter::new([1.0, 1.0]),
            range: ParameterRange::new([(0.5, 2.0), (0.5, 2.0)]).expect("valid range"),
            nodes,
            stiffness,
            loads,
            mass,
            lifting: false,
            output: false,
            failing_output: false,
            source: false,
            interpolation: None,
            capabilities: Vec::new(),
            grid: None,
            initial: true,
            time: 0.0,
            cache: SolutionCache::default(),
            solves: Rc::new(Cell::new(0)),
        }
    }

    /// Prescribes `u(0) = mu[1]`.
    pub fn with_lifting(mut self) -> Self {
        self.lifting = true;
        self.name.push_str("_lifted");
        self
    }

    /// Adds the output `s(u) = integral of u over the last block`.
    pub fn with_output(mut self) -> Self {
        self.output = true;
        self.name.push_str("_output");
        self
    }

    /// Declares an output whose coefficients cannot be evaluated.
    pub fn with_failing_output(mut self) -> Self {
        self.failing_output = true;
        self.name.push_str("_failing");
        self
    }

    /// Replaces the block sources by the non-affine `exp(-mu[0] x)`.
    pub fn with_source(mut self) -> Self {
        self.source = true;
        self.name.push_str("_source");
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    /// Makes the problem parabolic with a lumped mass, starting from
    /// `sin(pi x / 2)`.
    pub fn parabolic(mut self, dt: f64, final_time: f64) -> Self {
        self.family = PhysicsFamily::Parabolic;
        self.grid = Some(TimeGrid::new(dt, final_time).expect("valid time grid"));
        self.name.push_str("_parabolic");
        self
    }

    /// Starts a parabolic problem from rest.
    pub fn from_rest(mut self) -> Self {
        self.initial = false;
        self.name.push_str("_rest");
        self
    }

    /// Returns a counter of true (non-imported) truth solves.
    pub fn solve_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.solves)
    }

    fn is_parabolic(&self) -> bool {
        self.family == PhysicsFamily::Parabolic
    }

    fn source_values(&self, mu: &Parameter) -> DVector<f64> {
        let rate = mu.as_slice()[0];
        self.nodes.map(|x| (-rate * x).exp())
    }

    fn initial_values(&self) -> DVector<f64> {
        self.nodes.map(|x| (FRAC_PI_2 * x).sin())
    }

    fn undefined(term: &Term) -> TruthError {
        TruthError::UndefinedTerm(term.clone())
    }
}

fn matrices(matrices: impl IntoIterator<Item = DMatrix<f64>>) -> AffineExpansion<TruthOperator> {
    matrices.into_iter().map(TruthOperator::Matrix).collect()
}

fn vectors(vectors: impl IntoIterator<Item = DVector<f64>>) -> AffineExpansion<TruthOperator> {
    vectors.into_iter().map(TruthOperator::Vector).collect()
}

impl TruthProblem for ThermalBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> PhysicsFamily {
        self.family
    }

    fn dimension(&self) -> usize {
        self.nodes.len()
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
        let mu = self.mu.as_slice();
        match term {
            Term::Stiffness => Ok((0..self.blocks).map(|q| mu[q % 2]).collect()),
            Term::Forcing if self.source => match &self.interpolation {
                Some(interpolation) => interpolation
                    .sample(&self.source_values(&self.mu))
                    .and_then(|values| interpolation.coefficients(&values))
                    .map(|coefficients| coefficients.iter().copied().collect())
                    .ok_or(TruthError::Unsupported("interpolation of the source")),
                None => Ok(vec![1.0]),
            },
            Term::Forcing => Ok((0..self.blocks)
                .map(|q| match q % 4 {
                    1 => mu[0],
                    2 => mu[1],
                    _ => 1.0,
                })
                .collect()),
            Term::Output if self.failing_output => {
                Err(TruthError::Unsupported("output coefficients"))
            }
            Term::Output if self.output => Ok(vec![1.0]),
            Term::DirichletBc if self.lifting => Ok(vec![mu[1]]),
            Term::DirichletBc | Term::InnerProduct => Ok(vec![1.0]),
            Term::Mass if self.is_parabolic() => Ok(vec![1.0]),
            Term::InitialCondition(None) if self.is_parabolic() && self.initial => Ok(vec![1.0]),
            other => Err(Self::undefined(other)),
        }
    }

    fn assemble_operator(&self, term: &Term) -> Result<AffineExpansion<TruthOperator>, TruthError> {
        match term {
            Term::Stiffness => Ok(matrices(self.stiffness.iter().cloned())),
            Term::Forcing if self.source => match &self.interpolation {
                Some(interpolation) => Ok(vectors(
                    interpolation.basis().iter().map(|q| &self.mass * q),
                )),
                None => Ok(vectors([&self.mass * self.source_values(&self.mu)])),
            },
            Term::Forcing => Ok(vectors(self.loads.iter().cloned())),
            Term::Output if self.output => Ok(vectors(self.loads.last().cloned())),
            Term::DirichletBc => {
                let value = if self.lifting { 1.0 } else { 0.0 };
                Ok(AffineExpansion::new(vec![TruthOperator::DirichletBc(
                    DirichletBc::new().with(0, value),
                )]))
            }
            Term::InnerProduct => {
                let x = self
                    .stiffness
                    .iter()
                    .fold(DMatrix::zeros(self.dimension(), self.dimension()), |x, k| x + k);
                Ok(matrices([x]))
            }
            Term::Mass if self.is_parabolic() => Ok(matrices([self.mass.clone()])),
            Term::InitialCondition(None) if self.is_parabolic() && self.initial => {
                Ok(vectors([self.initial_values()]))
            }
            other => Err(Self::undefined(other)),
        }
    }

    fn solve(&mut self) -> Result<TruthSolution, TruthError> {
        self.solves.set(self.solves.get() + 1);
        if self.is_parabolic() {
            Ok(TruthSolution::Transient(truth::solve_parabolic(self)?))
        } else {
            Ok(TruthSolution::Steady(truth::solve_elliptic(self)?))
        }
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.clone()
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

    /// Every block conductivity is at least `min(mu)` in the `sum_q K_q` norm.
    fn stability_factor(&self) -> Result<f64, TruthError> {
        Ok(self.mu.as_slice().iter().copied().fold(f64::INFINITY, f64::min))
    }

    fn parametrized_functions(&self) -> Vec<String> {
        if self.source {
            vec![SOURCE.to_owned()]
        } else {
            Vec::new()
        }
    }

    fn evaluate_parametrized_function(
        &self,
        name: &str,
        mu: &Parameter,
    ) -> Result<DVector<f64>, TruthError> {
        if self.source && name == SOURCE {
            Ok(self.source_values(mu))
        } else {
            Err(TruthError::Unsupported("unknown parametrized function"))
        }
    }

    fn attach_interpolation(
        &mut self,
        name: &str,
        interpolation: EmpiricalInterpolation,
    ) -> Result<(), TruthError> {
        if self.source && name == SOURCE {
            self.interpolation = Some(interpolation);
            Ok(())
        } else {
            Err(TruthError::Unsupported("unknown parametrized function"))
        }
    }

    fn solution_cache(&mut self) -> Option<&mut SolutionCache> {
        Some(&mut self.cache)
    }
}

/// Small training and testing sets stored under `root`.
pub fn settings(root: &Path) -> Settings {
    Settings {
        root: root.to_path_buf(),
        greedy: GreedyConfig::new(10, 1e-9).expect("valid greedy config"),
        pod: PodConfig::new(10, 1e-12).expect("valid POD config"),
        interpolation: GreedyConfig::new(12, 1e-10).expect("valid interpolation config"),
        training: TrainingConfig::new(16, Sampling::Equispaced).expect("valid training config"),
        testing: TrainingConfig::new(5, Sampling::Random { seed: 7 })
            .expect("valid testing config"),
    }
}

/// Returns the truth solution at `mu` for comparisons.
pub fn truth_solution(problem: &mut ThermalBlock, mu: &Parameter) -> TruthSolution {
    problem.set_mu(mu.clone()).expect("mu in range");
    problem.solve().expect("truth solve should succeed")
}
