//! Bayesian Normal with a conjugate prior over its mean and precision
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::debug;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::str::FromStr;

use super::parameter::{BayesianParameter, ParameterError};
use crate::consts::HALF_LN_2PI;
use crate::dist::NormalFull;
use crate::misc::spd_inverse;
use crate::priors::{
    IsoNormalGammaPrior, NormalGammaPrior, NormalWishartPrior, PriorError,
};
use crate::traits::ExpFamilyPrior;

/// Structure of the covariance matrix of a [`Normal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "lowercase"))]
pub enum CovarianceKind {
    Full,
    #[default]
    Diagonal,
    Isotropic,
}

impl CovarianceKind {
    /// Length of the sufficient statistics of `dim`-dimensional data
    pub fn stats_dim(&self, dim: usize) -> usize {
        match self {
            Self::Diagonal => 2 * dim + 2,
            Self::Isotropic => dim + 3,
            Self::Full => dim * dim + dim + 2,
        }
    }

    /// Sufficient statistics of every row of `data`.
    ///
    /// - diagonal: `(-½x², x, -½, ½)`
    /// - isotropic: `(-½‖x‖², x, -½, D/2)`
    /// - full: `(vec(-½xxᵀ), x, -½, ½)`
    pub fn sufficient_statistics(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let (n, dim) = data.shape();
        let mut stats = DMatrix::zeros(n, self.stats_dim(dim));
        for (i, x) in data.row_iter().enumerate() {
            let x = x.transpose();
            self.fill_stats(&mut stats, i, &x, &DVector::zeros(dim));
        }
        stats
    }

    /// Expected sufficient statistics of inputs distributed as
    /// `N(means[i], diag(vars[i]))`.
    pub fn expected_sufficient_statistics(
        &self,
        means: &DMatrix<f64>,
        vars: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let (n, dim) = means.shape();
        let mut stats = DMatrix::zeros(n, self.stats_dim(dim));
        for i in 0..n {
            let m = means.row(i).transpose();
            let v = vars.row(i).transpose();
            self.fill_stats(&mut stats, i, &m, &v);
        }
        stats
    }

    fn fill_stats(
        &self,
        stats: &mut DMatrix<f64>,
        row: usize,
        m: &DVector<f64>,
        v: &DVector<f64>,
    ) {
        let dim = m.len();
        let second = v + m.component_mul(m);
        let offset = match self {
            Self::Diagonal => {
                for d in 0..dim {
                    stats[(row, d)] = -0.5 * second[d];
                }
                dim
            }
            Self::Isotropic => {
                stats[(row, 0)] = -0.5 * second.sum();
                1
            }
            Self::Full => {
                let outer = DMatrix::from_diagonal(v) + m * m.transpose();
                for (j, x) in outer.iter().enumerate() {
                    stats[(row, j)] = -0.5 * x;
                }
                dim * dim
            }
        };
        for d in 0..dim {
            stats[(row, offset + d)] = m[d];
        }
        stats[(row, offset + dim)] = -0.5;
        stats[(row, offset + dim + 1)] = match self {
            Self::Isotropic => 0.5 * dim as f64,
            _ => 0.5,
        };
    }
}

impl FromStr for CovarianceKind {
    type Err = NormalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "diagonal" => Ok(Self::Diagonal),
            "isotropic" => Ok(Self::Isotropic),
            _ => Err(NormalError::UnknownCovarianceKind(s.to_owned())),
        }
    }
}

impl fmt::Display for CovarianceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Full => "full",
            Self::Diagonal => "diagonal",
            Self::Isotropic => "isotropic",
        };
        write!(f, "{s}")
    }
}

/// Conjugate prior of a Bayesian [`Normal`], one variant per covariance
/// kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum NormalPrior {
    Diagonal(NormalGammaPrior),
    Isotropic(IsoNormalGammaPrior),
    Full(NormalWishartPrior),
}

impl NormalPrior {
    pub fn kind(&self) -> CovarianceKind {
        match self {
            Self::Diagonal(_) => CovarianceKind::Diagonal,
            Self::Isotropic(_) => CovarianceKind::Isotropic,
            Self::Full(_) => CovarianceKind::Full,
        }
    }

    /// Dimension of the Normal
    pub fn ndim(&self) -> usize {
        match self {
            Self::Diagonal(p) => p.ndim(),
            Self::Isotropic(p) => p.ndim(),
            Self::Full(p) => p.ndim(),
        }
    }

    /// Prior mean of μ
    pub fn mean(&self) -> &DVector<f64> {
        match self {
            Self::Diagonal(p) => p.mean(),
            Self::Isotropic(p) => p.mean(),
            Self::Full(p) => p.mean(),
        }
    }

    /// E[Λ] as a dense matrix
    pub fn expected_precision(&self) -> DMatrix<f64> {
        match self {
            Self::Diagonal(p) => DMatrix::from_diagonal(&p.expected_precision()),
            Self::Isotropic(p) => {
                DMatrix::from_diagonal_element(p.ndim(), p.ndim(), p.expected_precision())
            }
            Self::Full(p) => p.expected_precision(),
        }
    }

    /// The prior carrying half of the evidence.
    ///
    /// Natural parameters are halved, except for the isotropic family whose
    /// shape would fall below zero for large dimensions: there scale, shape
    /// and rate are halved, which keeps the expected precision.
    pub fn halved(&self) -> Result<Self, PriorError> {
        match self {
            Self::Isotropic(p) => IsoNormalGammaPrior::new(
                p.mean().clone(),
                0.5 * p.scale(),
                0.5 * p.shape(),
                0.5 * p.rate(),
            )
            .map(Self::Isotropic),
            _ => {
                let mut half = self.clone();
                half.set_natural_params(self.natural_params() * 0.5)?;
                Ok(half)
            }
        }
    }

    /// The same prior centered on `mean`
    pub fn with_mean(&self, mean: DVector<f64>) -> Result<Self, PriorError> {
        match self {
            Self::Diagonal(p) => NormalGammaPrior::new(
                mean,
                p.scale(),
                p.shape(),
                p.rates().clone(),
            )
            .map(Self::Diagonal),
            Self::Isotropic(p) => {
                IsoNormalGammaPrior::new(mean, p.scale(), p.shape(), p.rate())
                    .map(Self::Isotropic)
            }
            Self::Full(p) => NormalWishartPrior::new(
                mean,
                p.scale(),
                p.scale_matrix().clone(),
                p.dof(),
            )
            .map(Self::Full),
        }
    }
}

impl ExpFamilyPrior for NormalPrior {
    fn natural_params(&self) -> &DVector<f64> {
        match self {
            Self::Diagonal(p) => p.natural_params(),
            Self::Isotropic(p) => p.natural_params(),
            Self::Full(p) => p.natural_params(),
        }
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        match self {
            Self::Diagonal(p) => p.set_natural_params(eta),
            Self::Isotropic(p) => p.set_natural_params(eta),
            Self::Full(p) => p.set_natural_params(eta),
        }
    }

    fn log_norm(&self) -> f64 {
        match self {
            Self::Diagonal(p) => p.log_norm(),
            Self::Isotropic(p) => p.log_norm(),
            Self::Full(p) => p.log_norm(),
        }
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        match self {
            Self::Diagonal(p) => p.grad_lognorm(),
            Self::Isotropic(p) => p.grad_lognorm(),
            Self::Full(p) => p.grad_lognorm(),
        }
    }

    fn kl_div(&self, other: &Self) -> f64 {
        match (self, other) {
            (Self::Diagonal(p), Self::Diagonal(q)) => p.kl_div(q),
            (Self::Isotropic(p), Self::Isotropic(q)) => p.kl_div(q),
            (Self::Full(p), Self::Full(q)) => p.kl_div(q),
            _ => f64::INFINITY,
        }
    }
}

/// Normal model with a conjugate prior over its mean and precision.
///
/// # Example
///
/// ```
/// use beer::model::{CovarianceKind, Normal};
/// use nalgebra::{DMatrix, DVector};
///
/// let mut normal = Normal::create(
///     &DVector::zeros(2),
///     &DVector::from_element(2, 1.0),
///     1.0,
///     CovarianceKind::Full,
/// )
/// .unwrap();
///
/// let data = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.2, 0.8, 0.9, 1.1]);
/// let stats = normal.sufficient_statistics(&data);
/// let acc = normal.accumulate(&stats, &DVector::from_element(3, 1.0));
/// normal.natural_grad_update(&acc, 1.0, 1.0).unwrap();
///
/// // The posterior mean moves toward the data
/// assert!(normal.mean()[0] > 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Normal {
    mean_precision: BayesianParameter<NormalPrior>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum NormalError {
    /// The covariance kind name is not one of full, diagonal or isotropic
    UnknownCovarianceKind(String),
    /// The mean is empty
    MeanEmpty,
    /// Covariance and mean do not agree
    DimensionMismatch { n_mean: usize, nrows: usize, ncols: usize },
    /// The covariance is not positive definite
    CovNotPositiveDefinite,
    /// The prior strength must be positive
    StrengthTooLow { strength: f64 },
    Prior(PriorError),
    Parameter(ParameterError),
}

impl From<PriorError> for NormalError {
    fn from(err: PriorError) -> Self {
        NormalError::Prior(err)
    }
}

impl From<ParameterError> for NormalError {
    fn from(err: ParameterError) -> Self {
        NormalError::Parameter(err)
    }
}

impl Normal {
    /// Create a Normal from a mean and per-dimension variances
    pub fn create(
        mean: &DVector<f64>,
        var: &DVector<f64>,
        prior_strength: f64,
        kind: CovarianceKind,
    ) -> Result<Self, NormalError> {
        Self::create_with_cov(mean, &DMatrix::from_diagonal(var), prior_strength, kind)
    }

    /// Create a Normal from a mean and a covariance matrix.
    ///
    /// Diagonal and isotropic kinds use Normal-Gamma priors with scale and
    /// shape equal to `prior_strength` and rates `prior_strength` times the
    /// variances (the largest one for isotropic). The full kind uses a
    /// Normal-Wishart with `ν = prior_strength + D - 1` and `W = Σ⁻¹/ν`.
    pub fn create_with_cov(
        mean: &DVector<f64>,
        cov: &DMatrix<f64>,
        prior_strength: f64,
        kind: CovarianceKind,
    ) -> Result<Self, NormalError> {
        let dim = mean.len();
        if dim == 0 {
            return Err(NormalError::MeanEmpty);
        }
        if cov.shape() != (dim, dim) {
            return Err(NormalError::DimensionMismatch {
                n_mean: dim,
                nrows: cov.nrows(),
                ncols: cov.ncols(),
            });
        }
        if prior_strength <= 0.0 || !prior_strength.is_finite() {
            return Err(NormalError::StrengthTooLow {
                strength: prior_strength,
            });
        }
        let variances = cov.diagonal();
        let prior = match kind {
            CovarianceKind::Diagonal => NormalPrior::Diagonal(NormalGammaPrior::new(
                mean.clone(),
                prior_strength,
                prior_strength,
                variances * prior_strength,
            )?),
            CovarianceKind::Isotropic => {
                let variance = variances.max();
                NormalPrior::Isotropic(IsoNormalGammaPrior::new(
                    mean.clone(),
                    prior_strength,
                    prior_strength,
                    prior_strength * variance,
                )?)
            }
            CovarianceKind::Full => {
                let dof = prior_strength + dim as f64 - 1.0;
                let (precision, _) =
                    spd_inverse(cov).ok_or(NormalError::CovNotPositiveDefinite)?;
                NormalPrior::Full(NormalWishartPrior::new(
                    mean.clone(),
                    prior_strength,
                    precision / dof,
                    dof,
                )?)
            }
        };
        Ok(Normal {
            mean_precision: BayesianParameter::from_prior(prior),
        })
    }

    /// Build from an existing parameter
    pub fn from_parameter(mean_precision: BayesianParameter<NormalPrior>) -> Self {
        Normal { mean_precision }
    }

    #[inline]
    pub fn kind(&self) -> CovarianceKind {
        self.mean_precision.prior().kind()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.mean_precision.prior().ndim()
    }

    /// Length of the sufficient statistics
    #[inline]
    pub fn stats_dim(&self) -> usize {
        self.kind().stats_dim(self.dim())
    }

    #[inline]
    pub fn parameter(&self) -> &BayesianParameter<NormalPrior> {
        &self.mean_precision
    }

    #[inline]
    pub fn parameter_mut(&mut self) -> &mut BayesianParameter<NormalPrior> {
        &mut self.mean_precision
    }

    /// Posterior mean of μ
    pub fn mean(&self) -> DVector<f64> {
        self.mean_precision.posterior().mean().clone()
    }

    /// E[Λ]⁻¹ under the posterior
    pub fn cov(&self) -> Result<DMatrix<f64>, NormalError> {
        let precision = self.mean_precision.posterior().expected_precision();
        spd_inverse(&precision)
            .map(|(cov, _)| cov)
            .ok_or(NormalError::CovNotPositiveDefinite)
    }

    /// Point estimate of the density, `N(mean, cov)`
    pub fn point_estimate(&self) -> Result<NormalFull, NormalError> {
        NormalFull::new(self.mean(), self.cov()?)
            .map_err(|_| NormalError::CovNotPositiveDefinite)
    }

    pub fn sufficient_statistics(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        self.kind().sufficient_statistics(data)
    }

    /// Statistics of Gaussian-distributed inputs with diagonal variances
    pub fn expected_sufficient_statistics(
        &self,
        means: &DMatrix<f64>,
        vars: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        self.kind().expected_sufficient_statistics(means, vars)
    }

    /// E[η] under the posterior
    pub fn expected_natural_parameters(&self) -> DVector<f64> {
        self.mean_precision.expected_natural_parameters()
    }

    /// `stats · E[η] - D/2 ln 2π` for every row of `stats`
    pub fn expected_log_likelihood(&self, stats: &DMatrix<f64>) -> DVector<f64> {
        let offset = -(self.dim() as f64) * HALF_LN_2PI;
        (stats * self.expected_natural_parameters()).add_scalar(offset)
    }

    /// Weighted sum of the rows of `stats`
    pub fn accumulate(&self, stats: &DMatrix<f64>, weights: &DVector<f64>) -> DVector<f64> {
        stats.tr_mul(weights)
    }

    pub fn natural_grad_update(
        &mut self,
        acc_stats: &DVector<f64>,
        scale: f64,
        lrate: f64,
    ) -> Result<(), NormalError> {
        self.mean_precision
            .natural_grad_update(acc_stats, scale, lrate)?;
        Ok(())
    }

    pub fn kl_div_posterior_prior(&self) -> f64 {
        self.mean_precision.kl_div_posterior_prior()
    }

    /// Split into two Normals with half of the prior and posterior mass.
    ///
    /// The posterior means are moved by ±½ standard deviation along the
    /// principal axis of the expected covariance.
    pub fn split(&self) -> Result<(Normal, Normal), NormalError> {
        let half = self.mean_precision.shrunk(NormalPrior::halved, 0.5)?;
        let cov = self.cov()?;
        let eig = cov.symmetric_eigen();
        let imax = eig.eigenvalues.imax();
        let mut axis = eig.eigenvectors.column(imax).into_owned();
        // eigenvector signs are arbitrary
        if axis[axis.iamax()] < 0.0 {
            axis.neg_mut();
        }
        let shift = axis * (0.5 * eig.eigenvalues[imax].max(0.0).sqrt());
        debug!("splitting {} Normal, shift norm {}", self.kind(), shift.norm());

        let mean = half.posterior().mean().clone();
        let build = |mean: DVector<f64>| -> Result<Normal, NormalError> {
            let posterior = half.posterior().with_mean(mean)?;
            let mut param = half.clone();
            param.set_posterior(posterior)?;
            Ok(Normal::from_parameter(param))
        };
        Ok((build(&mean + &shift)?, build(&mean - &shift)?))
    }
}

impl std::error::Error for NormalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Prior(err) => Some(err),
            Self::Parameter(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for NormalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCovarianceKind(kind) => {
                write!(f, "unknown covariance type: \"{kind}\"")
            }
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
            Self::StrengthTooLow { strength } => write!(
                f,
                "prior strength ({strength}) must be finite and greater than zero"
            ),
            Self::Prior(err) => write!(f, "{err}"),
            Self::Parameter(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::digamma;

    const TOL: f64 = 1E-10;

    fn create(kind: CovarianceKind) -> Normal {
        Normal::create(
            &DVector::from_vec(vec![1.0, -1.0]),
            &DVector::from_vec(vec![2.0, 0.5]),
            1.0,
            kind,
        )
        .unwrap()
    }

    #[test]
    fn covariance_kind_from_str() {
        assert_eq!("full".parse::<CovarianceKind>().unwrap(), CovarianceKind::Full);
        assert_eq!(
            "diagonal".parse::<CovarianceKind>().unwrap(),
            CovarianceKind::Diagonal
        );
        assert_eq!(
            "isotropic".parse::<CovarianceKind>().unwrap(),
            CovarianceKind::Isotropic
        );
        assert_eq!(
            "spherical".parse::<CovarianceKind>().unwrap_err(),
            NormalError::UnknownCovarianceKind("spherical".into())
        );
    }

    #[test]
    fn stats_layouts() {
        let data = DMatrix::from_row_slice(1, 2, &[2.0, 3.0]);
        let diag = CovarianceKind::Diagonal.sufficient_statistics(&data);
        assert_eq!(diag.row(0).iter().copied().collect::<Vec<_>>(), vec![
            -2.0, -4.5, 2.0, 3.0, -0.5, 0.5
        ]);
        let iso = CovarianceKind::Isotropic.sufficient_statistics(&data);
        assert_eq!(iso.row(0).iter().copied().collect::<Vec<_>>(), vec![
            -6.5, 2.0, 3.0, -0.5, 1.0
        ]);
        let full = CovarianceKind::Full.sufficient_statistics(&data);
        assert_eq!(full.row(0).iter().copied().collect::<Vec<_>>(), vec![
            -2.0, -3.0, -3.0, -4.5, 2.0, 3.0, -0.5, 0.5
        ]);
    }

    #[test]
    fn expected_stats_with_zero_variance_equal_stats() {
        let means = DMatrix::from_row_slice(2, 2, &[2.0, 3.0, -1.0, 0.5]);
        let vars = DMatrix::zeros(2, 2);
        for kind in [
            CovarianceKind::Diagonal,
            CovarianceKind::Isotropic,
            CovarianceKind::Full,
        ] {
            let a = kind.sufficient_statistics(&means);
            let b = kind.expected_sufficient_statistics(&means, &vars);
            assert!((a - b).norm() < TOL);
        }
    }

    #[test]
    fn diagonal_create_uses_strength_for_scale_and_shape() {
        let normal = create(CovarianceKind::Diagonal);
        match normal.parameter().prior() {
            NormalPrior::Diagonal(p) => {
                assert::close(p.scale(), 1.0, TOL);
                assert::close(p.shape(), 1.0, TOL);
                assert::close(p.rates()[0], 2.0, TOL);
            }
            _ => panic!("wrong prior kind"),
        }
    }

    #[test]
    fn isotropic_create_uses_the_largest_variance() {
        let normal = create(CovarianceKind::Isotropic);
        match normal.parameter().prior() {
            NormalPrior::Isotropic(p) => assert::close(p.rate(), 2.0, TOL),
            _ => panic!("wrong prior kind"),
        }
    }

    #[test]
    fn expected_cov_of_created_normals() {
        let diag = create(CovarianceKind::Diagonal).cov().unwrap();
        assert::close(diag[(0, 0)], 2.0, TOL);
        assert::close(diag[(1, 1)], 0.5, TOL);
        let full = create(CovarianceKind::Full).cov().unwrap();
        // E[Λ] = νW = Σ⁻¹
        assert::close(full[(0, 0)], 2.0, TOL);
        assert::close(full[(1, 1)], 0.5, TOL);
        assert::close(full[(0, 1)], 0.0, TOL);
    }

    #[test]
    fn expected_log_likelihood_of_one_dimensional_normal() {
        let normal = Normal::create(
            &DVector::zeros(1),
            &DVector::from_element(1, 1.0),
            1.0,
            CovarianceKind::Diagonal,
        )
        .unwrap();
        let data = DMatrix::from_element(1, 1, 0.5);
        let llh = normal.expected_log_likelihood(&normal.sufficient_statistics(&data));
        // E[ln N(x | μ, 1/λ)] with λ ~ G(1, 1), μ | λ ~ N(0, 1/λ)
        let expected = -0.5 * 0.25 - 0.5 + 0.5 * digamma(1.0) - HALF_LN_2PI;
        assert::close(llh[0], expected, TOL);
    }

    #[test]
    fn create_rejects_bad_input() {
        let res = Normal::create(
            &DVector::zeros(2),
            &DVector::from_element(2, 1.0),
            0.0,
            CovarianceKind::Diagonal,
        );
        assert_eq!(res.unwrap_err(), NormalError::StrengthTooLow { strength: 0.0 });
        let res = Normal::create_with_cov(
            &DVector::zeros(2),
            &DMatrix::identity(3, 3),
            1.0,
            CovarianceKind::Full,
        );
        assert!(matches!(res, Err(NormalError::DimensionMismatch { .. })));
    }

    #[test]
    fn split_halves_mass_and_separates_means() {
        let normal = create(CovarianceKind::Diagonal);
        let (a, b) = normal.split().unwrap();
        let eta = normal.parameter().prior().natural_params();
        assert!((a.parameter().prior().natural_params() - eta * 0.5).norm() < TOL);
        // largest variance is along the first axis
        assert::close(a.mean()[0], 1.0 + 0.5 * 2.0_f64.sqrt(), 1E-8);
        assert::close(b.mean()[0], 1.0 - 0.5 * 2.0_f64.sqrt(), 1E-8);
        assert::close(a.mean()[1], -1.0, 1E-8);
    }

    #[test]
    fn split_of_a_high_dimensional_isotropic_normal() {
        let dim = 39;
        let normal = Normal::create(
            &DVector::zeros(dim),
            &DVector::from_element(dim, 1.5),
            1.0,
            CovarianceKind::Isotropic,
        )
        .unwrap();
        let (a, b) = normal.split().unwrap();
        let (prior, half) = match (normal.parameter().prior(), a.parameter().prior()) {
            (NormalPrior::Isotropic(p), NormalPrior::Isotropic(h)) => (p.clone(), h.clone()),
            _ => panic!("split changed the covariance kind"),
        };
        assert::close(half.shape(), 0.5 * prior.shape(), TOL);
        assert::close(half.scale(), 0.5 * prior.scale(), TOL);
        assert::close(half.expected_precision(), prior.expected_precision(), TOL);
        assert!((a.mean() - b.mean()).norm() > 0.0);
    }

    #[test]
    fn split_after_training_halves_the_statistics() {
        for kind in [
            CovarianceKind::Diagonal,
            CovarianceKind::Isotropic,
            CovarianceKind::Full,
        ] {
            let mut normal = create(kind);
            let data = DMatrix::from_row_slice(2, 2, &[3.0, 3.0, 3.2, 2.8]);
            let stats = normal.sufficient_statistics(&data);
            let acc = normal.accumulate(&stats, &DVector::from_element(2, 1.0));
            normal.natural_grad_update(&acc, 1.0, 1.0).unwrap();
            let (a, _) = normal.split().unwrap();
            let half = a.parameter();
            assert!((half.stats() - normal.parameter().stats() * 0.5).norm() < TOL);
        }
    }

    #[test]
    fn update_with_data_moves_the_posterior() {
        for kind in [
            CovarianceKind::Diagonal,
            CovarianceKind::Isotropic,
            CovarianceKind::Full,
        ] {
            let mut normal = create(kind);
            let data = DMatrix::from_row_slice(2, 2, &[3.0, 3.0, 3.2, 2.8]);
            let stats = normal.sufficient_statistics(&data);
            let acc = normal.accumulate(&stats, &DVector::from_element(2, 1.0));
            normal.natural_grad_update(&acc, 1.0, 1.0).unwrap();
            assert!(normal.mean()[0] > 2.0);
            assert!(normal.kl_div_posterior_prior() > 0.0);
        }
    }
}
