//! Conjugate priors held in natural-parameter form
//!
//! Every prior caches its standard parameters next to its natural
//! parameters. Both are rebuilt together by `set_natural_params`, which
//! rejects vectors outside the family's domain.
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;
use std::fmt;

mod dirichlet;
mod gamma;
mod iso_normal_gamma;
mod matrix_normal;
mod normal_gamma;
mod normal_wishart;

pub use dirichlet::DirichletPrior;
pub use gamma::GammaPrior;
pub use iso_normal_gamma::IsoNormalGammaPrior;
pub use matrix_normal::MatrixNormalPrior;
pub use normal_gamma::NormalGammaPrior;
pub use normal_wishart::NormalWishartPrior;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum PriorError {
    /// The prior has no dimensions
    Empty,
    /// The natural-parameter vector has the wrong length
    DimensionMismatch { expected: usize, found: usize },
    /// A parameter is infinite or NaN
    NotFinite { ix: usize, value: f64 },
    /// A Dirichlet concentration is less than or equal to zero
    AlphaTooLow { ix: usize, alpha: f64 },
    /// A Gamma shape is less than or equal to zero
    ShapeTooLow { shape: f64 },
    /// A Gamma rate is less than or equal to zero
    RateTooLow { ix: usize, rate: f64 },
    /// The mean scale (κ) is less than or equal to zero
    ScaleTooLow { scale: f64 },
    /// Wishart degrees of freedom must be greater than `dim - 1`
    DofTooLow { dof: f64, dim: usize },
    /// A matrix parameter is not symmetric positive definite
    NotPositiveDefinite,
}

impl std::error::Error for PriorError {}

impl fmt::Display for PriorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "prior must have at least one dimension"),
            Self::DimensionMismatch { expected, found } => write!(
                f,
                "expected {expected} natural parameters, found {found}"
            ),
            Self::NotFinite { ix, value } => {
                write!(f, "non-finite parameter at index {ix}: {value}")
            }
            Self::AlphaTooLow { ix, alpha } => write!(
                f,
                "alpha at index {ix} ({alpha}) must be greater than zero"
            ),
            Self::ShapeTooLow { shape } => {
                write!(f, "shape ({shape}) must be greater than zero")
            }
            Self::RateTooLow { ix, rate } => write!(
                f,
                "rate at index {ix} ({rate}) must be greater than zero"
            ),
            Self::ScaleTooLow { scale } => {
                write!(f, "scale ({scale}) must be greater than zero")
            }
            Self::DofTooLow { dof, dim } => write!(
                f,
                "degrees of freedom ({dof}) must be greater than {}",
                *dim as f64 - 1.0
            ),
            Self::NotPositiveDefinite => {
                write!(f, "matrix parameter is not positive definite")
            }
        }
    }
}

/// Checks the length and finiteness of a natural-parameter vector
pub(crate) fn validate_natural_params(
    eta: &DVector<f64>,
    expected: usize,
) -> Result<(), PriorError> {
    if eta.len() != expected {
        return Err(PriorError::DimensionMismatch {
            expected,
            found: eta.len(),
        });
    }
    match eta.iter().enumerate().find(|(_, x)| !x.is_finite()) {
        Some((ix, &value)) => Err(PriorError::NotFinite { ix, value }),
        None => Ok(()),
    }
}

pub(crate) fn check_positive(
    xs: &DVector<f64>,
    err: impl Fn(usize, f64) -> PriorError,
) -> Result<(), PriorError> {
    match xs.iter().enumerate().find(|&(_, &x)| x <= 0.0 || !x.is_finite()) {
        Some((ix, &x)) => Err(err(ix, x)),
        None => Ok(()),
    }
}
