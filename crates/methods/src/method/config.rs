use std::path::PathBuf;

use reduct_core::Sampling;
use thiserror::Error;

/// Errors that can occur when validating a method config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tolerance must be finite and non-negative")]
    Tolerance,

    #[error("set size must be positive")]
    EmptySet,
}

/// Stopping rule of the greedy reduced basis loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreedyConfig {
    n_max: usize,
    tolerance: f64,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            n_max: 20,
            tolerance: 1e-8,
        }
    }
}

impl GreedyConfig {
    /// Creates a config stopping at `n_max` basis functions or once the
    /// largest error estimate falls to `tolerance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tolerance is negative or non-finite.
    pub fn new(n_max: usize, tolerance: f64) -> Result<Self, ConfigError> {
        check_tolerance(tolerance)?;
        Ok(Self { n_max, tolerance })
    }

    /// Returns the maximum basis size.
    #[must_use]
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Returns the error estimate below which the loop stops.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

/// Mode selection of proper orthogonal decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PodConfig {
    n_max: usize,
    tolerance: f64,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            n_max: 20,
            tolerance: 1e-10,
        }
    }
}

impl PodConfig {
    /// Creates a config keeping at most `n_max` modes, fewer once the
    /// discarded relative energy falls to `tolerance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tolerance is negative or non-finite.
    pub fn new(n_max: usize, tolerance: f64) -> Result<Self, ConfigError> {
        check_tolerance(tolerance)?;
        Ok(Self { n_max, tolerance })
    }

    #[must_use]
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Returns the relative energy that may be discarded.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

/// How a training or testing set is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingConfig {
    size: usize,
    sampling: Sampling,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            size: 100,
            sampling: Sampling::Random { seed: 0 },
        }
    }
}

impl TrainingConfig {
    /// Creates a config sampling `size` points.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero.
    pub fn new(size: usize, sampling: Sampling) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::EmptySet);
        }
        Ok(Self { size, sampling })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }
}

/// Everything a composed reduction method needs besides the truth problem.
///
/// Offline data is stored under `root`, in a subfolder named after the truth
/// problem's storage prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: PathBuf,
    pub greedy: GreedyConfig,
    pub pod: PodConfig,
    /// Stopping rule of empirical interpolation training.
    pub interpolation: GreedyConfig,
    pub training: TrainingConfig,
    pub testing: TrainingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("offline_data"),
            greedy: GreedyConfig::default(),
            pod: PodConfig::default(),
            interpolation: GreedyConfig::default(),
            training: TrainingConfig::default(),
            testing: TrainingConfig {
                size: 10,
                sampling: Sampling::Random { seed: 1 },
            },
        }
    }
}

impl Settings {
    /// Returns default settings storing offline data under `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

fn check_tolerance(tolerance: f64) -> Result<(), ConfigError> {
    if tolerance.is_finite() && tolerance >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Tolerance)
    }
}
