//! Error and speedup analysis over the testing set.
//!
//! Both analyses run under an [`ImportDisabled`] guard so that truth
//! solutions are recomputed rather than imported from earlier stages.

use std::{
    collections::BTreeMap,
    rc::Rc,
    time::{Duration, Instant},
};

use reduct_core::{Folders, ImportDisabled, Parameter, truth};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DimensionError, Error},
    method::MethodCore,
};

/// Errors of the reduced solution at one testing parameter.
///
/// Each sequence holds one value per state: a single value for stationary
/// problems, one per time step otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub mu: Parameter,
    pub error: Vec<f64>,
    pub relative_error: Vec<f64>,
    pub output_error: Vec<f64>,
    pub relative_output_error: Vec<f64>,
    /// The a posteriori bound, when the problem provides one.
    pub estimate: Option<f64>,
}

/// Result of [`ReductionMethod::error_analysis`](crate::ReductionMethod::error_analysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Basis size used, liftings excluded.
    pub n: usize,
    pub rows: Vec<ErrorRow>,
    /// Maximum-norm interpolation errors per parametrized function, one per
    /// testing parameter.
    pub interpolation_errors: BTreeMap<String, Vec<f64>>,
}

impl ErrorAnalysis {
    /// Returns the largest error over all parameters and states.
    #[must_use]
    pub fn max_error(&self) -> f64 {
        max_of(self.rows.iter().flat_map(|row| row.error.iter()))
    }

    #[must_use]
    pub fn max_relative_error(&self) -> f64 {
        max_of(self.rows.iter().flat_map(|row| row.relative_error.iter()))
    }

    #[must_use]
    pub fn max_output_error(&self) -> f64 {
        max_of(self.rows.iter().flat_map(|row| row.output_error.iter()))
    }

    /// Returns the mean over parameters of the largest error over states.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_error(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let total: f64 = self.rows.iter().map(|row| max_of(row.error.iter())).sum();
        total / self.rows.len() as f64
    }

    /// Returns `true` if every available estimate bounds its error.
    #[must_use]
    pub fn estimates_bound_errors(&self) -> bool {
        self.rows.iter().all(|row| {
            row.estimate
                .is_none_or(|estimate| row.error.iter().all(|error| *error <= estimate))
        })
    }
}

/// Timings at one testing parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedupRow {
    pub mu: Parameter,
    pub truth: Duration,
    pub reduced: Duration,
}

impl SpeedupRow {
    /// Returns `truth / reduced`.
    #[must_use]
    pub fn speedup(&self) -> f64 {
        let reduced = self.reduced.as_secs_f64();
        if reduced > 0.0 {
            self.truth.as_secs_f64() / reduced
        } else {
            f64::INFINITY
        }
    }
}

/// Result of [`ReductionMethod::speedup_analysis`](crate::ReductionMethod::speedup_analysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedupAnalysis {
    pub n: usize,
    pub rows: Vec<SpeedupRow>,
}

impl SpeedupAnalysis {
    /// Returns the smallest speedup over the testing set.
    #[must_use]
    pub fn min_speedup(&self) -> f64 {
        self.rows
            .iter()
            .map(SpeedupRow::speedup)
            .fold(f64::INFINITY, f64::min)
    }
}

fn max_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(0.0, f64::max)
}

fn basis_size(core: &MethodCore, n: Option<usize>) -> Result<usize, Error> {
    let available = core.reduced().borrow().core().n_max();
    let n = n.unwrap_or(available);
    if n > available {
        return Err(DimensionError::Basis {
            requested: n,
            available,
        }
        .into());
    }
    Ok(n)
}

/// Runs the error analysis shared by all base methods.
pub(crate) fn errors(core: &mut MethodCore, n: Option<usize>) -> Result<ErrorAnalysis, Error> {
    let n = basis_size(core, n)?;
    let testing = core.testing_set()?;
    let _guard = ImportDisabled::new(core.truth());

    let mut rows = Vec::with_capacity(testing.len());
    {
        let mut reduced = core.reduced().borrow_mut();
        for mu in testing.iter() {
            reduced.set_mu(mu.clone())?;
            reduced.solve(n)?;
            let row = ErrorRow {
                mu: mu.clone(),
                error: reduced.compute_error()?,
                relative_error: reduced.compute_relative_error()?,
                output_error: reduced.compute_error_output()?,
                relative_output_error: reduced.compute_relative_error_output()?,
                estimate: reduced.estimate_error().ok(),
            };
            log::debug!("N = {n}, mu = {mu}: error {:?}", row.error);
            rows.push(row);
        }
    }

    let analysis = ErrorAnalysis {
        n,
        rows,
        interpolation_errors: BTreeMap::new(),
    };
    log::info!(
        "error analysis with N = {n}: max error {:e}, max relative error {:e}",
        analysis.max_error(),
        analysis.max_relative_error()
    );
    save(core, "error_analysis", &analysis)?;
    Ok(analysis)
}

/// Runs the speedup analysis shared by all base methods.
pub(crate) fn speedup(core: &mut MethodCore, n: Option<usize>) -> Result<SpeedupAnalysis, Error> {
    let n = basis_size(core, n)?;
    let testing = core.testing_set()?;
    let truth = Rc::clone(core.truth());
    let _guard = ImportDisabled::new(&truth);

    let mut rows = Vec::with_capacity(testing.len());
    {
        let mut reduced = core.reduced().borrow_mut();
        for mu in testing.iter() {
            reduced.set_mu(mu.clone())?;

            let start = Instant::now();
            truth::solve_or_import(&mut *truth.borrow_mut())?;
            let truth_time = start.elapsed();

            let start = Instant::now();
            reduced.solve(n)?;
            reduced.output()?;
            let reduced_time = start.elapsed();

            rows.push(SpeedupRow {
                mu: mu.clone(),
                truth: truth_time,
                reduced: reduced_time,
            });
        }
    }

    let analysis = SpeedupAnalysis { n, rows };
    log::info!(
        "speedup analysis with N = {n}: minimum speedup {:.1}",
        analysis.min_speedup()
    );
    save(core, "speedup_analysis", &analysis)?;
    Ok(analysis)
}

fn save<T: Serialize>(core: &MethodCore, name: &str, value: &T) -> Result<(), Error> {
    let folder = core.folders().folder(Folders::POST_PROCESSING);
    folder.create()?;
    folder.save(name, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn row(error: Vec<f64>, estimate: Option<f64>) -> ErrorRow {
        ErrorRow {
            mu: Parameter::new(vec![1.0]),
            relative_error: error.clone(),
            output_error: error.clone(),
            relative_output_error: error.clone(),
            error,
            estimate,
        }
    }

    #[test]
    fn summaries_cover_every_state() {
        let analysis = ErrorAnalysis {
            n: 2,
            rows: vec![row(vec![0.1, 0.4], Some(0.5)), row(vec![0.2], None)],
            interpolation_errors: BTreeMap::new(),
        };

        assert_relative_eq!(analysis.max_error(), 0.4);
        assert_relative_eq!(analysis.mean_error(), 0.3);
        assert!(analysis.estimates_bound_errors());
    }

    #[test]
    fn violated_bounds_are_reported() {
        let analysis = ErrorAnalysis {
            n: 1,
            rows: vec![row(vec![0.3], Some(0.2))],
            interpolation_errors: BTreeMap::new(),
        };
        assert!(!analysis.estimates_bound_errors());
    }

    #[test]
    fn speedup_is_a_time_ratio() {
        let row = SpeedupRow {
            mu: Parameter::new(vec![1.0]),
            truth: Duration::from_millis(50),
            reduced: Duration::from_millis(5),
        };
        assert_relative_eq!(row.speedup(), 10.0, epsilon = 1e-9);
    }
}
