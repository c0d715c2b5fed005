//! Matrix-Normal prior with a row covariance shared by every column
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};

use super::{validate_natural_params, PriorError};
use crate::consts::HALF_LN_2PI;
use crate::impl_display;
use crate::misc::{flatten, spd_inverse, symmetrize, unflatten};
use crate::traits::ExpFamilyPrior;

/// Matrix-Normal prior over a `q × P` matrix `M` whose columns are
/// independent, `M[:, p] ~ N(M₀[:, p], Σ)`.
///
/// Sufficient statistics: `(vec(MMᵀ) [q²], vec M [qP])`.
/// Natural parameters: `(vec(-½Σ⁻¹), vec(Σ⁻¹M₀))`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct MatrixNormalPrior {
    eta: DVector<f64>,
    mean: DMatrix<f64>,
    cov: DMatrix<f64>,
    precision: DMatrix<f64>,
    ln_det_cov: f64,
}

impl MatrixNormalPrior {
    pub fn new(mean: DMatrix<f64>, cov: DMatrix<f64>) -> Result<Self, PriorError> {
        let (q, p) = mean.shape();
        if q == 0 || p == 0 {
            return Err(PriorError::Empty);
        }
        if cov.shape() != (q, q) {
            return Err(PriorError::DimensionMismatch {
                expected: q * q,
                found: cov.len(),
            });
        }
        let (precision, _) =
            spd_inverse(&cov).ok_or(PriorError::NotPositiveDefinite)?;
        let mut eta = DVector::zeros(q * q + q * p);
        eta.rows_mut(0, q * q)
            .copy_from(&flatten(&(&precision * -0.5)));
        eta.rows_mut(q * q, q * p)
            .copy_from(&flatten(&(&precision * &mean)));
        Self::from_natural_params(eta, q, p)
    }

    /// Build from natural parameters for a `q × p` matrix
    pub fn from_natural_params(
        eta: DVector<f64>,
        q: usize,
        p: usize,
    ) -> Result<Self, PriorError> {
        if q == 0 || p == 0 {
            return Err(PriorError::Empty);
        }
        validate_natural_params(&eta, q * q + q * p)?;
        let precision =
            symmetrize(&(unflatten(&eta.as_slice()[..q * q], q, q) * -2.0));
        let (cov, ln_det_precision) =
            spd_inverse(&precision).ok_or(PriorError::NotPositiveDefinite)?;
        let mean = &cov * unflatten(&eta.as_slice()[q * q..], q, p);
        Ok(MatrixNormalPrior {
            eta,
            mean,
            cov,
            precision,
            ln_det_cov: -ln_det_precision,
        })
    }

    /// Shape of the matrix, `(q, P)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.mean.shape()
    }

    #[inline]
    pub fn mean(&self) -> &DMatrix<f64> {
        &self.mean
    }

    /// Shared row covariance, Σ
    #[inline]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    #[inline]
    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    /// E[MMᵀ] = PΣ + M₀M₀ᵀ
    pub fn expected_outer(&self) -> DMatrix<f64> {
        let p = self.mean.ncols() as f64;
        &self.cov * p + &self.mean * self.mean.transpose()
    }
}

impl ExpFamilyPrior for MatrixNormalPrior {
    fn natural_params(&self) -> &DVector<f64> {
        &self.eta
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        let (q, p) = self.shape();
        *self = Self::from_natural_params(eta, q, p)?;
        Ok(())
    }

    fn log_norm(&self) -> f64 {
        let (q, p) = self.shape();
        let quad = (self.mean.transpose() * &self.precision * &self.mean).trace();
        0.5 * quad
            + 0.5 * p as f64 * self.ln_det_cov
            + (q * p) as f64 * HALF_LN_2PI
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        let (q, p) = self.shape();
        let mut grad = DVector::zeros(q * q + q * p);
        grad.rows_mut(0, q * q).copy_from(&flatten(&self.expected_outer()));
        grad.rows_mut(q * q, q * p).copy_from(&flatten(&self.mean));
        grad
    }
}

impl From<&MatrixNormalPrior> for String {
    fn from(mn: &MatrixNormalPrior) -> String {
        let (q, p) = mn.shape();
        format!("MN(M₀: {q}x{p}, Σ: {q}x{q})")
    }
}

impl_display!(MatrixNormalPrior);
