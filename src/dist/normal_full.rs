//! Normal distribution with a full covariance matrix
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;

use crate::consts::HALF_LN_2PI;
use crate::impl_display;
use crate::misc::{flatten, spd_inverse, symmetrize, unflatten, vec_to_string};
use crate::traits::{ExponentialFamily, KlDivergence, Mean, Sampleable, Variance};

/// [Multivariate Normal distribution](https://en.wikipedia.org/wiki/Multivariate_normal_distribution),
/// 𝒩(μ, Σ).
///
/// The sufficient statistics are `(x, vec(xxᵀ))` and the natural parameters
/// `(Σ⁻¹μ, vec(-½Σ⁻¹))`. The precision matrix, the Cholesky factor of the
/// covariance and its log-determinant are cached; they are only ever
/// rebuilt together with the covariance.
///
/// # Example
///
/// ```
/// use beer::dist::NormalFull;
/// use beer::traits::KlDivergence;
/// use nalgebra::{DMatrix, DVector};
///
/// let p = NormalFull::standard(2).unwrap();
/// let q = NormalFull::new(
///     DVector::from_vec(vec![1.0, 0.0]),
///     DMatrix::identity(2, 2),
/// ).unwrap();
///
/// assert!(p.kl(&p).abs() < 1E-12);
/// assert!((p.kl(&q) - 0.5).abs() < 1E-12);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(try_from = "NormalFullParameters"))]
#[cfg_attr(feature = "serde1", serde(into = "NormalFullParameters"))]
pub struct NormalFull {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
    /// Cached Σ⁻¹
    precision: DMatrix<f64>,
    /// Cached lower Cholesky factor of Σ
    cov_chol: DMatrix<f64>,
    /// Cached ln|Σ|
    ln_det_cov: f64,
}

impl PartialEq for NormalFull {
    fn eq(&self, other: &NormalFull) -> bool {
        self.mean == other.mean && self.cov == other.cov
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct NormalFullParameters {
    pub mean: DVector<f64>,
    pub cov: DMatrix<f64>,
}

impl TryFrom<NormalFullParameters> for NormalFull {
    type Error = NormalFullError;

    fn try_from(params: NormalFullParameters) -> Result<Self, Self::Error> {
        NormalFull::new(params.mean, params.cov)
    }
}

impl From<NormalFull> for NormalFullParameters {
    fn from(normal: NormalFull) -> Self {
        NormalFullParameters {
            mean: normal.mean,
            cov: normal.cov,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum NormalFullError {
    /// The mean vector is empty
    MeanEmpty,
    /// The covariance is not square or does not match the mean
    DimensionMismatch { n_mean: usize, nrows: usize, ncols: usize },
    /// The covariance is not positive definite
    CovNotPositiveDefinite,
    /// The natural-parameter vector length is not D + D² for any D
    NaturalParamsLength { len: usize },
}

impl NormalFull {
    /// Create a new Normal with mean `mean` and covariance `cov`
    pub fn new(
        mean: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self, NormalFullError> {
        if mean.is_empty() {
            return Err(NormalFullError::MeanEmpty);
        }
        if !cov.is_square() || cov.nrows() != mean.len() {
            return Err(NormalFullError::DimensionMismatch {
                n_mean: mean.len(),
                nrows: cov.nrows(),
                ncols: cov.ncols(),
            });
        }
        let cov = symmetrize(&cov);
        let (precision, ln_det_cov) =
            spd_inverse(&cov).ok_or(NormalFullError::CovNotPositiveDefinite)?;
        let cov_chol = cov
            .clone()
            .cholesky()
            .ok_or(NormalFullError::CovNotPositiveDefinite)?
            .unpack();
        Ok(NormalFull {
            mean,
            cov,
            precision,
            cov_chol,
            ln_det_cov,
        })
    }

    /// Standard Normal, 𝒩(0, I), in `dim` dimensions
    pub fn standard(dim: usize) -> Result<Self, NormalFullError> {
        NormalFull::new(DVector::zeros(dim), DMatrix::identity(dim, dim))
    }

    /// Get the mean
    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Get the covariance matrix
    #[inline]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Get the precision matrix, Σ⁻¹
    #[inline]
    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    /// ln|Σ|
    #[inline]
    pub fn ln_det_cov(&self) -> f64 {
        self.ln_det_cov
    }

    /// E[xxᵀ] = Σ + μμᵀ
    pub fn second_moment(&self) -> DMatrix<f64> {
        &self.cov + &self.mean * self.mean.transpose()
    }
}

impl ExponentialFamily for NormalFull {
    type Error = NormalFullError;

    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn sufficient_statistics(data: &DMatrix<f64>) -> DMatrix<f64> {
        let dim = data.ncols();
        let mut stats = DMatrix::zeros(data.nrows(), dim + dim * dim);
        stats.columns_mut(0, dim).copy_from(data);
        for (i, row) in data.row_iter().enumerate() {
            let outer = row.transpose() * row;
            for (j, v) in outer.iter().enumerate() {
                stats[(i, dim + j)] = *v;
            }
        }
        stats
    }

    fn natural_parameters(&self) -> DVector<f64> {
        let dim = self.dim();
        let mut eta = DVector::zeros(dim + dim * dim);
        eta.rows_mut(0, dim).copy_from(&(&self.precision * &self.mean));
        eta.rows_mut(dim, dim * dim)
            .copy_from(&flatten(&(&self.precision * -0.5)));
        eta
    }

    fn from_natural_parameters(
        eta: &DVector<f64>,
    ) -> Result<Self, NormalFullError> {
        // len = D + D²
        let dim = ((((4 * eta.len() + 1) as f64).sqrt() - 1.0) / 2.0).round()
            as usize;
        if dim == 0 || dim + dim * dim != eta.len() {
            return Err(NormalFullError::NaturalParamsLength { len: eta.len() });
        }
        let precision = unflatten(&eta.as_slice()[dim..], dim, dim) * -2.0;
        let (cov, _) = spd_inverse(&precision)
            .ok_or(NormalFullError::CovNotPositiveDefinite)?;
        let mean = &cov * eta.rows(0, dim);
        NormalFull::new(mean, cov)
    }

    fn log_norm(&self) -> f64 {
        0.5 * (self.mean.transpose() * &self.precision * &self.mean)[0]
            + 0.5 * self.ln_det_cov
    }

    fn log_base_measure(&self) -> f64 {
        -(self.dim() as f64) * HALF_LN_2PI
    }

    fn expected_sufficient_statistics(&self) -> DVector<f64> {
        let dim = self.dim();
        let mut stats = DVector::zeros(dim + dim * dim);
        stats.rows_mut(0, dim).copy_from(&self.mean);
        stats
            .rows_mut(dim, dim * dim)
            .copy_from(&flatten(&self.second_moment()));
        stats
    }
}

impl KlDivergence for NormalFull {
    fn kl(&self, other: &Self) -> f64 {
        let dim = self.dim() as f64;
        let diff = &other.mean - &self.mean;
        let trace = (&other.precision * &self.cov).trace();
        let maha = (diff.transpose() * &other.precision * &diff)[0];
        0.5 * (trace + maha - dim + other.ln_det_cov - self.ln_det_cov)
    }
}

impl Sampleable<DVector<f64>> for NormalFull {
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        &self.mean + &self.cov_chol * z
    }
}

impl Mean<DVector<f64>> for NormalFull {
    fn mean(&self) -> Option<DVector<f64>> {
        Some(self.mean.clone())
    }
}

impl Variance<DMatrix<f64>> for NormalFull {
    fn variance(&self) -> Option<DMatrix<f64>> {
        Some(self.cov.clone())
    }
}

impl From<&NormalFull> for String {
    fn from(normal: &NormalFull) -> String {
        format!(
            "𝒩(μ: {}, Σ: {}x{})",
            vec_to_string(normal.mean.as_slice(), 5),
            normal.cov.nrows(),
            normal.cov.ncols()
        )
    }
}

impl_display!(NormalFull);

impl std::error::Error for NormalFullError {}

impl fmt::Display for NormalFullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeanEmpty => write!(f, "mean vector was empty"),
            Self::DimensionMismatch {
                n_mean,
                nrows,
                ncols,
            } => write!(
                f,
                "covariance is {nrows}x{ncols} but the mean has {n_mean} dimensions"
            ),
            Self::CovNotPositiveDefinite => {
                write!(f, "covariance matrix is not positive definite")
            }
            Self::NaturalParamsLength { len } => write!(
                f,
                "natural parameters of length {len} do not describe a full-covariance Normal"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_basic_impls;

    const TOL: f64 = 1E-10;

    test_basic_impls!(NormalFull::standard(2).unwrap());

    fn normal() -> NormalFull {
        let cov = DMatrix::from_row_slice(
            3,
            3,
            &[
                1.017_427_88,
                0.365_866_52,
                -0.656_204_86,
                0.365_866_52,
                1.005_645_53,
                -0.425_972_61,
                -0.656_204_86,
                -0.425_972_61,
                1.272_479_72,
            ],
        );
        let mu = DVector::from_vec(vec![0.5, 3.1, -6.2]);
        NormalFull::new(mu, cov).unwrap()
    }

    #[test]
    fn new_should_reject_cov_not_square() {
        let res = NormalFull::new(DVector::zeros(3), DMatrix::identity(3, 2));
        assert!(matches!(res, Err(NormalFullError::DimensionMismatch { .. })));
    }

    #[test]
    fn new_should_reject_cov_not_positive_definite() {
        let res = NormalFull::new(DVector::zeros(2), -DMatrix::identity(2, 2));
        assert_eq!(res.unwrap_err(), NormalFullError::CovNotPositiveDefinite);
    }

    #[test]
    fn ln_f_nonstandard_zeros() {
        let normal = normal();
        let data = DMatrix::zeros(1, 3);
        let llh = normal
            .expected_log_likelihood(&NormalFull::sufficient_statistics(&data));
        assert::close(llh[0], -24.602_370_253_215_66, 1E-6);
    }

    #[test]
    fn ln_f_standard_x_nonzeros() {
        let normal = NormalFull::standard(3).unwrap();
        let data = DMatrix::from_row_slice(1, 3, &[0.5, 3.1, -6.2]);
        let llh = normal
            .expected_log_likelihood(&NormalFull::sufficient_statistics(&data));
        assert::close(llh[0], -26.906_815_599_614_02, TOL);
    }

    #[test]
    fn round_trip_through_natural_parameters() {
        let normal = normal();
        let back =
            NormalFull::from_natural_parameters(&normal.natural_parameters())
                .unwrap();
        assert!((back.mean() - normal.mean()).norm() < 1E-8);
        assert!((back.cov() - normal.cov()).norm() < 1E-8);
    }

    #[test]
    fn from_natural_parameters_rejects_bad_length() {
        let eta = DVector::zeros(5);
        assert_eq!(
            NormalFull::from_natural_parameters(&eta).unwrap_err(),
            NormalFullError::NaturalParamsLength { len: 5 }
        );
    }

    #[test]
    fn kl_of_identical_distributions_should_be_zero() {
        let normal = normal();
        assert::close(normal.kl(&normal.clone()), 0.0, TOL);
    }

    #[test]
    fn kl_is_positive() {
        let p = normal();
        let q = NormalFull::standard(3).unwrap();
        assert!(p.kl(&q) > 0.0);
        assert!(q.kl(&p) > 0.0);
    }
}
