//! Normal-Wishart prior over the mean and full precision matrix of a Normal
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use std::f64::consts::LN_2;

use super::{validate_natural_params, PriorError};
use crate::consts::HALF_LN_2PI;
use crate::impl_display;
use crate::misc::{
    flatten, lnmv_gamma, mv_digamma, spd_inverse, symmetrize, unflatten,
    vec_to_string,
};
use crate::traits::ExpFamilyPrior;

/// Normal-Wishart prior, `Λ ~ W(W, ν)` and `μ ~ N(m, (κΛ)⁻¹)`.
///
/// Sufficient statistics: `(vec Λ, Λμ, μᵀΛμ, ln|Λ|)`.
/// Natural parameters: `(vec(-½W⁻¹ - κ/2 mmᵀ), κm, -κ/2, (ν - D)/2)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct NormalWishartPrior {
    eta: DVector<f64>,
    mean: DVector<f64>,
    scale: f64,
    scale_matrix: DMatrix<f64>,
    dof: f64,
    /// Cached ln|W|
    ln_det_scale_matrix: f64,
}

impl NormalWishartPrior {
    /// Create a new Normal-Wishart prior
    ///
    /// # Arguments
    /// - mean: prior mean of μ
    /// - scale: κ, the strength of the mean
    /// - scale_matrix: W, positive definite D×D
    /// - dof: ν, greater than D - 1
    pub fn new(
        mean: DVector<f64>,
        scale: f64,
        scale_matrix: DMatrix<f64>,
        dof: f64,
    ) -> Result<Self, PriorError> {
        let dim = mean.len();
        if dim == 0 {
            return Err(PriorError::Empty);
        }
        if scale_matrix.shape() != (dim, dim) {
            return Err(PriorError::DimensionMismatch {
                expected: dim * dim,
                found: scale_matrix.len(),
            });
        }
        let (w_inv, _) =
            spd_inverse(&scale_matrix).ok_or(PriorError::NotPositiveDefinite)?;
        let quad = -(w_inv * 0.5) - &mean * mean.transpose() * (0.5 * scale);
        let mut eta = DVector::zeros(dim * dim + dim + 2);
        eta.rows_mut(0, dim * dim).copy_from(&flatten(&quad));
        eta.rows_mut(dim * dim, dim).copy_from(&(&mean * scale));
        eta[dim * dim + dim] = -0.5 * scale;
        eta[dim * dim + dim + 1] = 0.5 * (dof - dim as f64);
        Self::from_natural_params(eta)
    }

    pub fn from_natural_params(eta: DVector<f64>) -> Result<Self, PriorError> {
        // len = D² + D + 2
        let dim = ((((4 * eta.len()) as f64 - 7.0).max(0.0).sqrt() - 1.0) / 2.0)
            .round() as usize;
        if dim == 0 || dim * dim + dim + 2 != eta.len() {
            return Err(PriorError::DimensionMismatch {
                expected: dim.max(1) * dim.max(1) + dim.max(1) + 2,
                found: eta.len(),
            });
        }
        validate_natural_params(&eta, eta.len())?;
        let d2 = dim * dim;
        let scale = -2.0 * eta[d2 + dim];
        if scale <= 0.0 {
            return Err(PriorError::ScaleTooLow { scale });
        }
        let dof = 2.0 * eta[d2 + dim + 1] + dim as f64;
        if dof <= dim as f64 - 1.0 {
            return Err(PriorError::DofTooLow { dof, dim });
        }
        let mean = eta.rows(d2, dim) / scale;
        let w_inv = unflatten(&eta.as_slice()[..d2], dim, dim) * -2.0
            - &mean * mean.transpose() * scale;
        let (scale_matrix, ln_det_w_inv) = spd_inverse(&symmetrize(&w_inv))
            .ok_or(PriorError::NotPositiveDefinite)?;
        Ok(NormalWishartPrior {
            eta,
            mean,
            scale,
            scale_matrix,
            dof,
            ln_det_scale_matrix: -ln_det_w_inv,
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
    pub fn scale_matrix(&self) -> &DMatrix<f64> {
        &self.scale_matrix
    }

    #[inline]
    pub fn dof(&self) -> f64 {
        self.dof
    }

    /// E[Λ] = νW
    pub fn expected_precision(&self) -> DMatrix<f64> {
        &self.scale_matrix * self.dof
    }

    /// E[ln|Λ|]
    pub fn expected_ln_det_precision(&self) -> f64 {
        let dim = self.ndim();
        mv_digamma(dim, 0.5 * self.dof)
            + dim as f64 * LN_2
            + self.ln_det_scale_matrix
    }
}

impl ExpFamilyPrior for NormalWishartPrior {
    fn natural_params(&self) -> &DVector<f64> {
        &self.eta
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        validate_natural_params(&eta, self.eta.len())?;
        *self = Self::from_natural_params(eta)?;
        Ok(())
    }

    fn log_norm(&self) -> f64 {
        let dim = self.ndim();
        let d = dim as f64;
        0.5 * self.dof * self.ln_det_scale_matrix
            + 0.5 * self.dof * d * LN_2
            + lnmv_gamma(dim, 0.5 * self.dof)
            - 0.5 * d * self.scale.ln()
            + d * HALF_LN_2PI
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        let dim = self.ndim();
        let d2 = dim * dim;
        let prec = self.expected_precision();
        let prec_mean = &prec * &self.mean;
        let mut grad = DVector::zeros(d2 + dim + 2);
        grad.rows_mut(0, d2).copy_from(&flatten(&prec));
        grad.rows_mut(d2, dim).copy_from(&prec_mean);
        grad[d2 + dim] = dim as f64 / self.scale + self.mean.dot(&prec_mean);
        grad[d2 + dim + 1] = self.expected_ln_det_precision();
        grad
    }
}

impl From<&NormalWishartPrior> for String {
    fn from(nw: &NormalWishartPrior) -> String {
        format!(
            "NW(m: {}, κ: {}, W: {}x{}, ν: {})",
            vec_to_string(nw.mean.as_slice(), 5),
            nw.scale,
            nw.ndim(),
            nw.ndim(),
            nw.dof
        )
    }
}

impl_display!(NormalWishartPrior);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_basic_impls, test_grad_lognorm, test_self_kl_is_zero};

    const TOL: f64 = 1E-10;

    fn prior() -> NormalWishartPrior {
        NormalWishartPrior::new(
            DVector::from_vec(vec![1.0, -0.5]),
            2.0,
            DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.1, 0.25]),
            4.0,
        )
        .unwrap()
    }

    test_basic_impls!(prior());
    test_self_kl_is_zero!(prior());
    // perturbing a single off-diagonal entry leaves the symmetric family
    test_grad_lognorm!(prior(), (0..2).map(|i| 3 * i).chain(4..8));

    #[test]
    fn standard_params_survive_natural_params() {
        let nw = prior();
        let back =
            NormalWishartPrior::from_natural_params(nw.natural_params().clone())
                .unwrap();
        assert::close(back.scale(), 2.0, TOL);
        assert::close(back.dof(), 4.0, TOL);
        assert!((back.mean() - nw.mean()).norm() < TOL);
        assert!((back.scale_matrix() - nw.scale_matrix()).norm() < TOL);
    }

    #[test]
    fn new_rejects_low_dof() {
        let res = NormalWishartPrior::new(
            DVector::zeros(3),
            1.0,
            DMatrix::identity(3, 3),
            1.5,
        );
        assert_eq!(res.unwrap_err(), PriorError::DofTooLow { dof: 1.5, dim: 3 });
    }

    #[test]
    fn new_rejects_indefinite_scale_matrix() {
        let res = NormalWishartPrior::new(
            DVector::zeros(2),
            1.0,
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]),
            3.0,
        );
        assert_eq!(res.unwrap_err(), PriorError::NotPositiveDefinite);
    }

    #[test]
    fn expected_precision_is_dof_times_scale_matrix() {
        let nw = prior();
        assert::close(nw.expected_precision()[(0, 1)], 0.4, TOL);
        assert::close(nw.expected_precision()[(1, 1)], 1.0, TOL);
    }

    #[test]
    fn one_dimensional_case_matches_normal_gamma() {
        use crate::priors::NormalGammaPrior;
        // W(w, ν) in 1-D is Gamma(ν/2, 1/(2w))
        let nw = NormalWishartPrior::new(
            DVector::from_element(1, 0.3),
            2.0,
            DMatrix::from_element(1, 1, 0.25),
            3.0,
        )
        .unwrap();
        let ng = NormalGammaPrior::new(
            DVector::from_element(1, 0.3),
            2.0,
            1.5,
            DVector::from_element(1, 2.0),
        )
        .unwrap();
        assert::close(nw.log_norm(), ng.log_norm(), TOL);
        let g_nw = nw.grad_lognorm();
        let g_ng = ng.grad_lognorm();
        for i in 0..4 {
            assert::close(g_nw[i], g_ng[i], TOL);
        }
    }
}
