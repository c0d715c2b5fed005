//! Normal-Gamma prior with a single precision shared by every dimension
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;

use super::{validate_natural_params, PriorError};
use crate::consts::HALF_LN_2PI;
use crate::impl_display;
use crate::misc::{digamma, ln_gamma, vec_to_string};
use crate::traits::ExpFamilyPrior;

/// Normal-Gamma prior for a Normal with isotropic covariance, `λ ~ Gamma(a, b)`
/// and `μ ~ N(m, I/(κλ))`.
///
/// Sufficient statistics: `(λ, λμ [D], λ‖μ‖², ln λ)`.
/// Natural parameters: `(-(b + κ‖m‖²/2), κm, -κ/2, a - 1 + D/2)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct IsoNormalGammaPrior {
    eta: DVector<f64>,
    mean: DVector<f64>,
    scale: f64,
    shape: f64,
    rate: f64,
}

impl IsoNormalGammaPrior {
    pub fn new(
        mean: DVector<f64>,
        scale: f64,
        shape: f64,
        rate: f64,
    ) -> Result<Self, PriorError> {
        if mean.is_empty() {
            return Err(PriorError::Empty);
        }
        let dim = mean.len();
        let mut eta = DVector::zeros(dim + 3);
        eta[0] = -(rate + 0.5 * scale * mean.norm_squared());
        eta.rows_mut(1, dim).copy_from(&(&mean * scale));
        eta[dim + 1] = -0.5 * scale;
        eta[dim + 2] = shape - 1.0 + 0.5 * dim as f64;
        Self::from_natural_params(eta)
    }

    pub fn from_natural_params(eta: DVector<f64>) -> Result<Self, PriorError> {
        if eta.len() < 4 {
            return Err(PriorError::DimensionMismatch {
                expected: 4,
                found: eta.len(),
            });
        }
        validate_natural_params(&eta, eta.len())?;
        let dim = eta.len() - 3;
        let scale = -2.0 * eta[dim + 1];
        if scale <= 0.0 {
            return Err(PriorError::ScaleTooLow { scale });
        }
        let shape = eta[dim + 2] + 1.0 - 0.5 * dim as f64;
        if shape <= 0.0 {
            return Err(PriorError::ShapeTooLow { shape });
        }
        let mean = eta.rows(1, dim) / scale;
        let rate = -eta[0] - 0.5 * scale * mean.norm_squared();
        if rate <= 0.0 {
            return Err(PriorError::RateTooLow { ix: 0, rate });
        }
        Ok(IsoNormalGammaPrior {
            eta,
            mean,
            scale,
            shape,
            rate,
        })
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.mean.len()
    }

    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
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
    pub fn expected_precision(&self) -> f64 {
        self.shape / self.rate
    }

    /// E[ln λ]
    #[inline]
    pub fn expected_ln_precision(&self) -> f64 {
        digamma(self.shape) - self.rate.ln()
    }
}

impl ExpFamilyPrior for IsoNormalGammaPrior {
    fn natural_params(&self) -> &DVector<f64> {
        &self.eta
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        validate_natural_params(&eta, self.eta.len())?;
        *self = Self::from_natural_params(eta)?;
        Ok(())
    }

    fn log_norm(&self) -> f64 {
        let half_dim = 0.5 * self.ndim() as f64;
        ln_gamma(self.shape) - self.shape * self.rate.ln()
            - half_dim * self.scale.ln()
            + 2.0 * half_dim * HALF_LN_2PI
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        let dim = self.ndim();
        let prec = self.expected_precision();
        let mut grad = DVector::zeros(dim + 3);
        grad[0] = prec;
        grad.rows_mut(1, dim).copy_from(&(&self.mean * prec));
        grad[dim + 1] =
            dim as f64 / self.scale + prec * self.mean.norm_squared();
        grad[dim + 2] = self.expected_ln_precision();
        grad
    }
}

impl From<&IsoNormalGammaPrior> for String {
    fn from(ng: &IsoNormalGammaPrior) -> String {
        format!(
            "NG(m: {}, κ: {}, a: {}, b: {})",
            vec_to_string(ng.mean.as_slice(), 5),
            ng.scale,
            ng.shape,
            ng.rate
        )
    }
}

impl_display!(IsoNormalGammaPrior);
