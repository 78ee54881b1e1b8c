//! Dense operator algebra shared by truth and reduced operators.
//!
//! Both kinds of operators are combined with the same affine rule,
//! `sum_q theta[q] * operator[q]`, implemented once through
//! [`LinearCombination`] and [`product_sum`].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bc::DirichletBc;

/// Errors raised while combining operators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgebraError {
    #[error("expected {expected} coefficients, got {found}")]
    ThetaCount { expected: usize, found: usize },

    #[error("cannot combine an empty list of operators")]
    Empty,

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("cannot combine a {left} with a {right}")]
    MixedKinds {
        left: &'static str,
        right: &'static str,
    },

    #[error("expected a {expected} operator, found a {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
}

/// Operators that can be scaled and accumulated.
pub trait LinearCombination: Clone {
    /// Returns `theta * self`.
    #[must_use]
    fn scaled(&self, theta: f64) -> Self;

    /// Accumulates `theta * other` into `self`.
    ///
    /// # Errors
    ///
    /// Fails if the two operators have incompatible shapes or kinds.
    fn add_scaled(&mut self, theta: f64, other: &Self) -> Result<(), AlgebraError>;
}

/// Computes `sum_q thetas[q] * operators[q]`.
///
/// # Errors
///
/// Returns [`AlgebraError::ThetaCount`] if the lengths differ,
/// [`AlgebraError::Empty`] for an empty expansion, or the first
/// accumulation failure.
pub fn product_sum<'a, T, I>(thetas: &[f64], operators: I) -> Result<T, AlgebraError>
where
    T: LinearCombination + 'a,
    I: IntoIterator<Item = &'a T>,
    I::IntoIter: ExactSizeIterator,
{
    let mut operators = operators.into_iter();
    if operators.len() != thetas.len() {
        return Err(AlgebraError::ThetaCount {
            expected: operators.len(),
            found: thetas.len(),
        });
    }

    let (first_theta, rest) = thetas.split_first().ok_or(AlgebraError::Empty)?;
    let first = operators.next().ok_or(AlgebraError::Empty)?;
    let mut sum = first.scaled(*first_theta);
    for (theta, operator) in rest.iter().zip(operators) {
        sum.add_scaled(*theta, operator)?;
    }
    Ok(sum)
}

impl LinearCombination for DMatrix<f64> {
    fn scaled(&self, theta: f64) -> Self {
        self * theta
    }

    fn add_scaled(&mut self, theta: f64, other: &Self) -> Result<(), AlgebraError> {
        if self.shape() != other.shape() {
            return Err(AlgebraError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        *self += other * theta;
        Ok(())
    }
}

impl LinearCombination for DVector<f64> {
    fn scaled(&self, theta: f64) -> Self {
        self * theta
    }

    fn add_scaled(&mut self, theta: f64, other: &Self) -> Result<(), AlgebraError> {
        if self.len() != other.len() {
            return Err(AlgebraError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        self.axpy(theta, other, 1.0);
        Ok(())
    }
}

/// A full-order operator as assembled by the truth problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TruthOperator {
    Matrix(DMatrix<f64>),
    Vector(DVector<f64>),
    DirichletBc(DirichletBc),
}

impl TruthOperator {
    fn kind(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "matrix",
            Self::Vector(_) => "vector",
            Self::DirichletBc(_) => "boundary condition",
        }
    }

    /// Returns the matrix, or an error naming the actual kind.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a matrix.
    pub fn as_matrix(&self) -> Result<&DMatrix<f64>, AlgebraError> {
        match self {
            Self::Matrix(matrix) => Ok(matrix),
            other => Err(AlgebraError::UnexpectedKind {
                expected: "matrix",
                found: other.kind(),
            }),
        }
    }

    /// Returns the vector, or an error naming the actual kind.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a vector.
    pub fn as_vector(&self) -> Result<&DVector<f64>, AlgebraError> {
        match self {
            Self::Vector(vector) => Ok(vector),
            other => Err(AlgebraError::UnexpectedKind {
                expected: "vector",
                found: other.kind(),
            }),
        }
    }

    /// Returns the boundary condition set, or an error naming the actual kind.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a Dirichlet set.
    pub fn as_dirichlet_bc(&self) -> Result<&DirichletBc, AlgebraError> {
        match self {
            Self::DirichletBc(bc) => Ok(bc),
            other => Err(AlgebraError::UnexpectedKind {
                expected: "boundary condition",
                found: other.kind(),
            }),
        }
    }

    /// Consumes the operator and returns its matrix.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a matrix.
    pub fn into_matrix(self) -> Result<DMatrix<f64>, AlgebraError> {
        match self {
            Self::Matrix(matrix) => Ok(matrix),
            other => Err(AlgebraError::UnexpectedKind {
                expected: "matrix",
                found: other.kind(),
            }),
        }
    }

    /// Consumes the operator and returns its vector.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a vector.
    pub fn into_vector(self) -> Result<DVector<f64>, AlgebraError> {
        match self {
            Self::Vector(vector) => Ok(vector),
            other => Err(AlgebraError::UnexpectedKind {
                expected: "vector",
                found: other.kind(),
            }),
        }
    }

    /// Consumes the operator and returns its boundary condition set.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a Dirichlet set.
    pub fn into_dirichlet_bc(self) -> Result<DirichletBc, AlgebraError> {
        match self {
            Self::DirichletBc(bc) => Ok(bc),
            other => Err(AlgebraError::UnexpectedKind {
                expected: "boundary condition",
                found: other.kind(),
            }),
        }
    }
}

impl LinearCombination for TruthOperator {
    fn scaled(&self, theta: f64) -> Self {
        match self {
            Self::Matrix(matrix) => Self::Matrix(matrix.scaled(theta)),
            Self::Vector(vector) => Self::Vector(vector.scaled(theta)),
            Self::DirichletBc(bc) => Self::DirichletBc(bc.scaled(theta)),
        }
    }

    fn add_scaled(&mut self, theta: f64, other: &Self) -> Result<(), AlgebraError> {
        match (self, other) {
            (Self::Matrix(left), Self::Matrix(right)) => left.add_scaled(theta, right),
            (Self::Vector(left), Self::Vector(right)) => left.add_scaled(theta, right),
            (Self::DirichletBc(left), Self::DirichletBc(right)) => left.add_scaled(theta, right),
            (left, right) => Err(AlgebraError::MixedKinds {
                left: left.kind(),
                right: right.kind(),
            }),
        }
    }
}

/// A projected operator living in the reduced space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReducedOperator {
    Matrix(DMatrix<f64>),
    Vector(DVector<f64>),
}

impl ReducedOperator {
    /// Returns `(rows, columns)`; vectors have one column.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Matrix(matrix) => matrix.shape(),
            Self::Vector(vector) => vector.shape(),
        }
    }

    /// Returns the leading `rows x cols` block (`rows` entries for vectors).
    ///
    /// Returns `None` if the block exceeds the stored size.
    #[must_use]
    pub fn truncated(&self, rows: usize, cols: usize) -> Option<Self> {
        match self {
            Self::Matrix(matrix) => (rows <= matrix.nrows() && cols <= matrix.ncols())
                .then(|| Self::Matrix(matrix.view((0, 0), (rows, cols)).into_owned())),
            Self::Vector(vector) => {
                (rows <= vector.len()).then(|| Self::Vector(vector.rows(0, rows).into_owned()))
            }
        }
    }

    /// Consumes the operator and returns its matrix.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a matrix.
    pub fn into_matrix(self) -> Result<DMatrix<f64>, AlgebraError> {
        match self {
            Self::Matrix(matrix) => Ok(matrix),
            Self::Vector(_) => Err(AlgebraError::UnexpectedKind {
                expected: "matrix",
                found: "vector",
            }),
        }
    }

    /// Consumes the operator and returns its vector.
    ///
    /// # Errors
    ///
    /// Fails unless the operator is a vector.
    pub fn into_vector(self) -> Result<DVector<f64>, AlgebraError> {
        match self {
            Self::Vector(vector) => Ok(vector),
            Self::Matrix(_) => Err(AlgebraError::UnexpectedKind {
                expected: "vector",
                found: "matrix",
            }),
        }
    }
}

impl LinearCombination for ReducedOperator {
    fn scaled(&self, theta: f64) -> Self {
        match self {
            Self::Matrix(matrix) => Self::Matrix(matrix.scaled(theta)),
            Self::Vector(vector) => Self::Vector(vector.scaled(theta)),
        }
    }

    fn add_scaled(&mut self, theta: f64, other: &Self) -> Result<(), AlgebraError> {
        match (self, other) {
            (Self::Matrix(left), Self::Matrix(right)) => left.add_scaled(theta, right),
            (Self::Vector(left), Self::Vector(right)) => left.add_scaled(theta, right),
            (Self::Matrix(_), Self::Vector(_)) => Err(AlgebraError::MixedKinds {
                left: "matrix",
                right: "vector",
            }),
            (Self::Vector(_), Self::Matrix(_)) => Err(AlgebraError::MixedKinds {
                left: "vector",
                right: "matrix",
            }),
        }
    }
}
