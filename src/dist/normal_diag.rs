//! Normal distribution with a diagonal covariance matrix
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;

use crate::consts::HALF_LN_2PI;
use crate::impl_display;
use crate::misc::vec_to_string;
use crate::traits::{ExponentialFamily, Mean, Sampleable, Variance};

/// [Normal distribution](https://en.wikipedia.org/wiki/Normal_distribution)
/// over ℝ<sup>D</sup> with diagonal covariance, 𝒩(μ, diag(s)).
///
/// The sufficient statistics are `(x, x²)` and the natural parameters
/// `(s⁻¹μ, -½s⁻¹)`.
///
/// # Example
///
/// ```
/// use beer::dist::NormalDiag;
/// use beer::traits::ExponentialFamily;
/// use nalgebra::DVector;
///
/// let normal = NormalDiag::new(
///     DVector::from_vec(vec![1.0, -2.0]),
///     DVector::from_vec(vec![0.5, 3.0]),
/// ).unwrap();
///
/// let eta = normal.natural_parameters();
/// let back = NormalDiag::from_natural_parameters(&eta).unwrap();
///
/// assert!((back.mean() - normal.mean()).norm() < 1E-12);
/// assert!((back.diag_cov() - normal.diag_cov()).norm() < 1E-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct NormalDiag {
    /// Mean
    mean: DVector<f64>,
    /// Diagonal of the covariance matrix
    diag_cov: DVector<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum NormalDiagError {
    /// The mean vector is empty
    MeanEmpty,
    /// The mean and the covariance have different lengths
    DimensionMismatch { n_mean: usize, n_cov: usize },
    /// A mean entry is infinite or NaN
    MeanNotFinite { ix: usize, mean: f64 },
    /// A variance is less than or equal to zero, or not finite
    VarianceInvalid { ix: usize, var: f64 },
    /// The natural-parameter vector does not have an even, non-zero length
    NaturalParamsLength { len: usize },
}

impl NormalDiag {
    /// Create a new diagonal-covariance Normal
    ///
    /// # Arguments
    /// - mean: the mean vector
    /// - diag_cov: the diagonal of the covariance matrix
    pub fn new(
        mean: DVector<f64>,
        diag_cov: DVector<f64>,
    ) -> Result<Self, NormalDiagError> {
        if mean.is_empty() {
            return Err(NormalDiagError::MeanEmpty);
        }
        if mean.len() != diag_cov.len() {
            return Err(NormalDiagError::DimensionMismatch {
                n_mean: mean.len(),
                n_cov: diag_cov.len(),
            });
        }
        if let Some((ix, &mean)) =
            mean.iter().enumerate().find(|(_, m)| !m.is_finite())
        {
            return Err(NormalDiagError::MeanNotFinite { ix, mean });
        }
        if let Some((ix, &var)) = diag_cov
            .iter()
            .enumerate()
            .find(|(_, v)| **v <= 0.0 || !v.is_finite())
        {
            return Err(NormalDiagError::VarianceInvalid { ix, var });
        }
        Ok(NormalDiag { mean, diag_cov })
    }

    /// Creates a new NormalDiag without checking whether the parameters are
    /// valid.
    #[inline]
    pub fn new_unchecked(mean: DVector<f64>, diag_cov: DVector<f64>) -> Self {
        NormalDiag { mean, diag_cov }
    }

    /// Standard Normal in `dim` dimensions
    pub fn standard(dim: usize) -> Result<Self, NormalDiagError> {
        NormalDiag::new(DVector::zeros(dim), DVector::from_element(dim, 1.0))
    }

    /// Get the mean
    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Get the diagonal of the covariance matrix
    #[inline]
    pub fn diag_cov(&self) -> &DVector<f64> {
        &self.diag_cov
    }

    /// Sufficient statistics of a Gaussian-distributed input with mean
    /// `means` and diagonal variance `vars`: `(m, v + m²)`.
    pub fn sufficient_statistics_from_mean_var(
        means: &DMatrix<f64>,
        vars: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let mut stats = DMatrix::zeros(means.nrows(), 2 * means.ncols());
        stats.columns_mut(0, means.ncols()).copy_from(means);
        stats
            .columns_mut(means.ncols(), means.ncols())
            .copy_from(&(vars + means.component_mul(means)));
        stats
    }
}

impl ExponentialFamily for NormalDiag {
    type Error = NormalDiagError;

    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn sufficient_statistics(data: &DMatrix<f64>) -> DMatrix<f64> {
        let mut stats = DMatrix::zeros(data.nrows(), 2 * data.ncols());
        stats.columns_mut(0, data.ncols()).copy_from(data);
        stats
            .columns_mut(data.ncols(), data.ncols())
            .copy_from(&data.component_mul(data));
        stats
    }

    fn natural_parameters(&self) -> DVector<f64> {
        let dim = self.dim();
        let prec = self.diag_cov.map(|s| s.recip());
        let mut eta = DVector::zeros(2 * dim);
        eta.rows_mut(0, dim).copy_from(&prec.component_mul(&self.mean));
        eta.rows_mut(dim, dim).copy_from(&(prec * -0.5));
        eta
    }

    fn from_natural_parameters(
        eta: &DVector<f64>,
    ) -> Result<Self, NormalDiagError> {
        if eta.is_empty() || eta.len() % 2 != 0 {
            return Err(NormalDiagError::NaturalParamsLength { len: eta.len() });
        }
        let dim = eta.len() / 2;
        let np1 = eta.rows(0, dim);
        let np2 = eta.rows(dim, dim);
        let diag_cov = np2.map(|x| (-2.0 * x).recip());
        let mean = diag_cov.component_mul(&np1);
        NormalDiag::new(mean, diag_cov)
    }

    fn log_norm(&self) -> f64 {
        self.mean
            .iter()
            .zip(self.diag_cov.iter())
            .map(|(m, s)| 0.5 * m * m / s + 0.5 * s.ln())
            .sum()
    }

    fn log_base_measure(&self) -> f64 {
        -(self.dim() as f64) * HALF_LN_2PI
    }

    fn expected_sufficient_statistics(&self) -> DVector<f64> {
        let dim = self.dim();
        let mut stats = DVector::zeros(2 * dim);
        stats.rows_mut(0, dim).copy_from(&self.mean);
        stats
            .rows_mut(dim, dim)
            .copy_from(&(&self.diag_cov + self.mean.component_mul(&self.mean)));
        stats
    }
}

impl Sampleable<DVector<f64>> for NormalDiag {
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        DVector::from_iterator(
            self.dim(),
            self.mean.iter().zip(self.diag_cov.iter()).map(|(m, s)| {
                let z: f64 = rng.sample(StandardNormal);
                s.sqrt().mul_add(z, *m)
            }),
        )
    }
}

impl Mean<DVector<f64>> for NormalDiag {
    fn mean(&self) -> Option<DVector<f64>> {
        Some(self.mean.clone())
    }
}

impl Variance<DVector<f64>> for NormalDiag {
    fn variance(&self) -> Option<DVector<f64>> {
        Some(self.diag_cov.clone())
    }
}

impl From<&NormalDiag> for String {
    fn from(normal: &NormalDiag) -> String {
        format!(
            "𝒩(μ: {}, s: {})",
            vec_to_string(normal.mean.as_slice(), 5),
            vec_to_string(normal.diag_cov.as_slice(), 5)
        )
    }
}

impl_display!(NormalDiag);

impl std::error::Error for NormalDiagError {}

impl fmt::Display for NormalDiagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeanEmpty => write!(f, "mean vector was empty"),
            Self::DimensionMismatch { n_mean, n_cov } => write!(
                f,
                "mean has {n_mean} dimensions but covariance has {n_cov}"
            ),
            Self::MeanNotFinite { ix, mean } => {
                write!(f, "non-finite mean at index {ix}: {mean}")
            }
            Self::VarianceInvalid { ix, var } => write!(
                f,
                "variance at index {ix} ({var}) must be finite and greater than zero"
            ),
            Self::NaturalParamsLength { len } => write!(
                f,
                "natural parameters must have a non-zero even length, got {len}"
            ),
        }
    }
}
