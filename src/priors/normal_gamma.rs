//! Normal-Gamma prior over the mean and diagonal precision of a Normal
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;

use super::{check_positive, validate_natural_params, PriorError};
use crate::consts::HALF_LN_2PI;
use crate::impl_display;
use crate::misc::{digamma, ln_gamma, vec_to_string};
use crate::traits::ExpFamilyPrior;

/// Normal-Gamma prior for a Normal with diagonal covariance.
///
/// Given precisions `λ_d ~ Gamma(a, b_d)`, the mean is
/// `μ_d ~ N(m_d, 1/(κλ_d))`. The scale `κ` and the shape `a` are shared by
/// all the dimensions.
///
/// Sufficient statistics: `(λ [D], λμ [D], Σλμ², Σ ln λ)`.
/// Natural parameters: `(-(b + κm²/2), κm, -κ/2, a - ½)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct NormalGammaPrior {
    eta: DVector<f64>,
    mean: DVector<f64>,
    scale: f64,
    shape: f64,
    rates: DVector<f64>,
}

impl NormalGammaPrior {
    /// Create a new Normal-Gamma prior
    ///
    /// # Arguments
    /// - mean: prior mean of μ
    /// - scale: κ, the strength of the mean
    /// - shape: a, shared Gamma shape
    /// - rates: b, one Gamma rate per dimension
    pub fn new(
        mean: DVector<f64>,
        scale: f64,
        shape: f64,
        rates: DVector<f64>,
    ) -> Result<Self, PriorError> {
        if mean.is_empty() {
            return Err(PriorError::Empty);
        }
        if rates.len() != mean.len() {
            return Err(PriorError::DimensionMismatch {
                expected: mean.len(),
                found: rates.len(),
            });
        }
        let dim = mean.len();
        let mut eta = DVector::zeros(2 * dim + 2);
        for d in 0..dim {
            eta[d] = -(rates[d] + 0.5 * scale * mean[d] * mean[d]);
            eta[dim + d] = scale * mean[d];
        }
        eta[2 * dim] = -0.5 * scale;
        eta[2 * dim + 1] = shape - 0.5;
        Self::from_natural_params(eta)
    }

    pub fn from_natural_params(eta: DVector<f64>) -> Result<Self, PriorError> {
        if eta.len() < 4 || eta.len() % 2 != 0 {
            return Err(PriorError::DimensionMismatch {
                expected: 2 * (eta.len() / 2).max(2),
                found: eta.len(),
            });
        }
        validate_natural_params(&eta, eta.len())?;
        let dim = (eta.len() - 2) / 2;
        let scale = -2.0 * eta[2 * dim];
        if scale <= 0.0 {
            return Err(PriorError::ScaleTooLow { scale });
        }
        let shape = eta[2 * dim + 1] + 0.5;
        if shape <= 0.0 {
            return Err(PriorError::ShapeTooLow { shape });
        }
        let mean = eta.rows(dim, dim) / scale;
        let rates = DVector::from_fn(dim, |d, _| {
            -eta[d] - 0.5 * scale * mean[d] * mean[d]
        });
        check_positive(&rates, |ix, rate| PriorError::RateTooLow { ix, rate })?;
        Ok(NormalGammaPrior {
            eta,
            mean,
            scale,
            shape,
            rates,
        })
    }

    /// Dimension of the Normal
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
    pub fn rates(&self) -> &DVector<f64> {
        &self.rates
    }

    /// E[λ_d] = a / b_d
    pub fn expected_precision(&self) -> DVector<f64> {
        self.rates.map(|b| self.shape / b)
    }

    /// E[ln λ_d] = ψ(a) - ln b_d
    pub fn expected_ln_precision(&self) -> DVector<f64> {
        let psi = digamma(self.shape);
        self.rates.map(|b| psi - b.ln())
    }
}

impl ExpFamilyPrior for NormalGammaPrior {
    fn natural_params(&self) -> &DVector<f64> {
        &self.eta
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        validate_natural_params(&eta, self.eta.len())?;
        *self = Self::from_natural_params(eta)?;
        Ok(())
    }

    fn log_norm(&self) -> f64 {
        let dim = self.ndim() as f64;
        dim * (ln_gamma(self.shape) - 0.5 * self.scale.ln() + HALF_LN_2PI)
            - self.shape * self.rates.iter().map(|b| b.ln()).sum::<f64>()
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        let dim = self.ndim();
        let prec = self.expected_precision();
        let mut grad = DVector::zeros(2 * dim + 2);
        grad.rows_mut(0, dim).copy_from(&prec);
        grad.rows_mut(dim, dim)
            .copy_from(&prec.component_mul(&self.mean));
        grad[2 * dim] = dim as f64 / self.scale
            + prec.dot(&self.mean.component_mul(&self.mean));
        grad[2 * dim + 1] = self.expected_ln_precision().sum();
        grad
    }
}

impl From<&NormalGammaPrior> for String {
    fn from(ng: &NormalGammaPrior) -> String {
        format!(
            "NG(m: {}, κ: {}, a: {}, b: {})",
            vec_to_string(ng.mean.as_slice(), 5),
            ng.scale,
            ng.shape,
            vec_to_string(ng.rates.as_slice(), 5)
        )
    }
}

impl_display!(NormalGammaPrior);
