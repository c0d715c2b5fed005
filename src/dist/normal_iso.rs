//! Normal distribution with an isotropic covariance matrix
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

/// Normal distribution over ℝ<sup>D</sup> with covariance `vI`.
///
/// The sufficient statistics are `(x, ‖x‖²)` and the natural parameters
/// `(μ/v, -1/(2v))`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct NormalIso {
    mean: DVector<f64>,
    var: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum NormalIsoError {
    /// The mean vector is empty
    MeanEmpty,
    /// A mean entry is infinite or NaN
    MeanNotFinite { ix: usize, mean: f64 },
    /// The variance is less than or equal to zero, or not finite
    VarianceInvalid { var: f64 },
    /// The natural-parameter vector is too short
    NaturalParamsLength { len: usize },
}

impl NormalIso {
    /// Create a new isotropic Normal with mean `mean` and variance `var` in
    /// every direction.
    pub fn new(mean: DVector<f64>, var: f64) -> Result<Self, NormalIsoError> {
        if mean.is_empty() {
            Err(NormalIsoError::MeanEmpty)
        } else if let Some((ix, &m)) =
            mean.iter().enumerate().find(|(_, m)| !m.is_finite())
        {
            Err(NormalIsoError::MeanNotFinite { ix, mean: m })
        } else if var <= 0.0 || !var.is_finite() {
            Err(NormalIsoError::VarianceInvalid { var })
        } else {
            Ok(NormalIso { mean, var })
        }
    }

    /// Creates a new NormalIso without checking whether the parameters are
    /// valid.
    #[inline]
    pub fn new_unchecked(mean: DVector<f64>, var: f64) -> Self {
        NormalIso { mean, var }
    }

    /// Get the mean
    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Get the shared variance
    #[inline]
    pub fn var(&self) -> f64 {
        self.var
    }
}

impl ExponentialFamily for NormalIso {
    type Error = NormalIsoError;

    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn sufficient_statistics(data: &DMatrix<f64>) -> DMatrix<f64> {
        let dim = data.ncols();
        let mut stats = DMatrix::zeros(data.nrows(), dim + 1);
        stats.columns_mut(0, dim).copy_from(data);
        for (i, row) in data.row_iter().enumerate() {
            stats[(i, dim)] = row.norm_squared();
        }
        stats
    }

    fn natural_parameters(&self) -> DVector<f64> {
        let dim = self.dim();
        let mut eta = DVector::zeros(dim + 1);
        eta.rows_mut(0, dim).copy_from(&(&self.mean / self.var));
        eta[dim] = -0.5 / self.var;
        eta
    }

    fn from_natural_parameters(
        eta: &DVector<f64>,
    ) -> Result<Self, NormalIsoError> {
        if eta.len() < 2 {
            return Err(NormalIsoError::NaturalParamsLength { len: eta.len() });
        }
        let dim = eta.len() - 1;
        let var = (-2.0 * eta[dim]).recip();
        let mean = eta.rows(0, dim) * var;
        NormalIso::new(mean, var)
    }

    fn log_norm(&self) -> f64 {
        let dim = self.dim() as f64;
        0.5 * self.mean.norm_squared() / self.var + 0.5 * dim * self.var.ln()
    }

    fn log_base_measure(&self) -> f64 {
        -(self.dim() as f64) * HALF_LN_2PI
    }

    fn expected_sufficient_statistics(&self) -> DVector<f64> {
        let dim = self.dim();
        let mut stats = DVector::zeros(dim + 1);
        stats.rows_mut(0, dim).copy_from(&self.mean);
        stats[dim] = (dim as f64).mul_add(self.var, self.mean.norm_squared());
        stats
    }
}

impl Sampleable<DVector<f64>> for NormalIso {
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let sd = self.var.sqrt();
        self.mean.map(|m| {
            let z: f64 = rng.sample(StandardNormal);
            sd.mul_add(z, m)
        })
    }
}

impl Mean<DVector<f64>> for NormalIso {
    fn mean(&self) -> Option<DVector<f64>> {
        Some(self.mean.clone())
    }
}

impl Variance<f64> for NormalIso {
    fn variance(&self) -> Option<f64> {
        Some(self.var)
    }
}

impl From<&NormalIso> for String {
    fn from(normal: &NormalIso) -> String {
        format!(
            "𝒩(μ: {}, v: {})",
            vec_to_string(normal.mean.as_slice(), 5),
            normal.var
        )
    }
}

impl_display!(NormalIso);

impl std::error::Error for NormalIsoError {}

impl fmt::Display for NormalIsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeanEmpty => write!(f, "mean vector was empty"),
            Self::MeanNotFinite { ix, mean } => {
                write!(f, "non-finite mean at index {ix}: {mean}")
            }
            Self::VarianceInvalid { var } => write!(
                f,
                "variance ({var}) must be finite and greater than zero"
            ),
            Self::NaturalParamsLength { len } => write!(
                f,
                "natural parameters must have at least two entries, got {len}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_basic_impls;

    const TOL: f64 = 1E-12;

    test_basic_impls!(NormalIso::new(DVector::zeros(2), 1.0).unwrap());

    #[test]
    fn round_trip_through_natural_parameters() {
        let normal =
            NormalIso::new(DVector::from_vec(vec![1.0, -3.0, 0.25]), 2.5)
                .unwrap();
        let back =
            NormalIso::from_natural_parameters(&normal.natural_parameters())
                .unwrap();
        assert::close(back.var(), 2.5, TOL);
        assert!((back.mean() - normal.mean()).norm() < TOL);
    }

    #[test]
    fn expected_log_likelihood_matches_closed_form() {
        let normal =
            NormalIso::new(DVector::from_vec(vec![1.0, -1.0]), 0.5).unwrap();
        let data = DMatrix::from_row_slice(1, 2, &[0.3, 0.1]);
        let llh =
            normal.expected_log_likelihood(&NormalIso::sufficient_statistics(&data));
        let sq = (0.3 - 1.0_f64).powi(2) + (0.1 + 1.0_f64).powi(2);
        let expected = -2.0 * HALF_LN_2PI - 0.5_f64.ln() - 0.5 * sq / 0.5;
        assert::close(llh[0], expected, 1E-10);
    }

    #[test]
    fn from_natural_parameters_rejects_positive_precision_term() {
        let eta = DVector::from_vec(vec![0.0, 1.0]);
        assert!(matches!(
            NormalIso::from_natural_parameters(&eta),
            Err(NormalIsoError::VarianceInvalid { .. })
        ));
    }
}
