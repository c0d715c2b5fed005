//! Gamma prior over a precision
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;

use super::{validate_natural_params, PriorError};
use crate::impl_display;
use crate::misc::{digamma, ln_gamma};
use crate::traits::ExpFamilyPrior;

/// Gamma(a, b) over a precision λ, with shape `a` and rate `b`.
///
/// The sufficient statistics are `(λ, ln λ)` and the natural parameters
/// `(-b, a - 1)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct GammaPrior {
    eta: DVector<f64>,
    shape: f64,
    rate: f64,
}

impl GammaPrior {
    pub fn new(shape: f64, rate: f64) -> Result<Self, PriorError> {
        Self::from_natural_params(DVector::from_vec(vec![-rate, shape - 1.0]))
    }

    pub fn from_natural_params(eta: DVector<f64>) -> Result<Self, PriorError> {
        validate_natural_params(&eta, 2)?;
        let rate = -eta[0];
        let shape = eta[1] + 1.0;
        if shape <= 0.0 {
            Err(PriorError::ShapeTooLow { shape })
        } else if rate <= 0.0 {
            Err(PriorError::RateTooLow { ix: 0, rate })
        } else {
            Ok(GammaPrior { eta, shape, rate })
        }
    }

    #[inline]
    pub fn shape(&self) -> f64 {
        self.shape
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// E[λ]
    #[inline]
    pub fn expected_value(&self) -> f64 {
        self.shape / self.rate
    }

    /// E[ln λ]
    #[inline]
    pub fn expected_ln_value(&self) -> f64 {
        digamma(self.shape) - self.rate.ln()
    }
}

impl ExpFamilyPrior for GammaPrior {
    fn natural_params(&self) -> &DVector<f64> {
        &self.eta
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        *self = Self::from_natural_params(eta)?;
        Ok(())
    }

    fn log_norm(&self) -> f64 {
        ln_gamma(self.shape) - self.shape * self.rate.ln()
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.expected_value(), self.expected_ln_value()])
    }
}

impl From<&GammaPrior> for String {
    fn from(gam: &GammaPrior) -> String {
        format!("G(α: {}, β: {})", gam.shape, gam.rate)
    }
}

impl_display!(GammaPrior);
