//! Bayesian mixture of Normals
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::distributions::WeightedIndex;
use rand::Rng;
use std::fmt;
use std::ops::AddAssign;

use super::normal::{CovarianceKind, Normal, NormalError};
use super::parameter::{BayesianParameter, ParameterError};
use crate::consts::HALF_LN_2PI;
use crate::misc::{logsumexp_rows, softmax};
use crate::priors::{DirichletPrior, PriorError};
use crate::traits::{ExpFamilyPrior, Sampleable};

/// Accumulated statistics of a [`Mixture`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct MixtureStats {
    /// One row of Normal statistics per component, `respᵀ · stats`
    pub components: DMatrix<f64>,
    /// Expected number of frames per component
    pub weights: DVector<f64>,
}

impl MixtureStats {
    /// Statistics of an empty batch
    pub fn zeros(n_components: usize, stats_dim: usize) -> Self {
        MixtureStats {
            components: DMatrix::zeros(n_components, stats_dim),
            weights: DVector::zeros(n_components),
        }
    }
}

impl AddAssign<&MixtureStats> for MixtureStats {
    fn add_assign(&mut self, rhs: &MixtureStats) {
        self.components += &rhs.components;
        self.weights += &rhs.weights;
    }
}

/// Mixture of Bayesian [`Normal`]s with a Dirichlet prior over the weights.
///
/// Row `k` of the cached matrix is `[E[η_k], E[ln π_k]]`, so the expected
/// log-likelihood of every component is one product of the statistics
/// (with a bias column of ones) against it. The cache is rebuilt after
/// every mutation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(try_from = "MixtureParameters"))]
#[cfg_attr(feature = "serde1", serde(into = "MixtureParameters"))]
pub struct Mixture {
    weights: BayesianParameter<DirichletPrior>,
    components: Vec<Normal>,
    np_matrix: DMatrix<f64>,
}

/// Serialized form of a [`Mixture`], without the cache
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct MixtureParameters {
    pub weights: BayesianParameter<DirichletPrior>,
    pub components: Vec<Normal>,
}

impl TryFrom<MixtureParameters> for Mixture {
    type Error = MixtureError;

    fn try_from(params: MixtureParameters) -> Result<Self, Self::Error> {
        Mixture::from_parts(params.weights, params.components)
    }
}

impl From<Mixture> for MixtureParameters {
    fn from(mixture: Mixture) -> Self {
        MixtureParameters {
            weights: mixture.weights,
            components: mixture.components,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum MixtureError {
    /// A mixture needs at least one component
    NoComponents,
    /// The Dirichlet does not have one category per component
    WeightsMismatch { n_weights: usize, n_components: usize },
    /// A component differs in kind or dimension from the first one
    ComponentMismatch { ix: usize },
    /// Accumulated statistics of the wrong shape
    StatsShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Data of the wrong dimension
    DataDimension { expected: usize, found: usize },
    Normal(NormalError),
    Parameter(ParameterError),
    Prior(PriorError),
}

impl From<NormalError> for MixtureError {
    fn from(err: NormalError) -> Self {
        MixtureError::Normal(err)
    }
}

impl From<ParameterError> for MixtureError {
    fn from(err: ParameterError) -> Self {
        MixtureError::Parameter(err)
    }
}

impl From<PriorError> for MixtureError {
    fn from(err: PriorError) -> Self {
        MixtureError::Prior(err)
    }
}

impl Mixture {
    /// Create a new mixture.
    ///
    /// The posterior over the weights starts as a copy of the prior when
    /// `posterior_weights` is `None`.
    pub fn new(
        prior_weights: DirichletPrior,
        components: Vec<Normal>,
        posterior_weights: Option<DirichletPrior>,
    ) -> Result<Self, MixtureError> {
        let weights = match posterior_weights {
            Some(post) => BayesianParameter::new(prior_weights, post)?,
            None => BayesianParameter::from_prior(prior_weights),
        };
        Self::from_parts(weights, components)
    }

    /// Create a mixture of `n_components` components built by `component`,
    /// with a symmetric Dirichlet prior of concentration `prior_count`.
    pub fn create<F>(
        n_components: usize,
        prior_count: f64,
        component: F,
    ) -> Result<Self, MixtureError>
    where
        F: Fn(usize) -> Result<Normal, NormalError>,
    {
        if n_components == 0 {
            return Err(MixtureError::NoComponents);
        }
        let prior = DirichletPrior::symmetric(prior_count, n_components)?;
        let components = (0..n_components)
            .map(component)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(prior, components, None)
    }

    fn from_parts(
        weights: BayesianParameter<DirichletPrior>,
        components: Vec<Normal>,
    ) -> Result<Self, MixtureError> {
        let first = components.first().ok_or(MixtureError::NoComponents)?;
        if weights.prior().k() != components.len() {
            return Err(MixtureError::WeightsMismatch {
                n_weights: weights.prior().k(),
                n_components: components.len(),
            });
        }
        let (kind, dim) = (first.kind(), first.dim());
        if let Some(ix) = components
            .iter()
            .position(|c| c.kind() != kind || c.dim() != dim)
        {
            return Err(MixtureError::ComponentMismatch { ix });
        }
        let mut mixture = Mixture {
            weights,
            components,
            np_matrix: DMatrix::zeros(0, 0),
        };
        mixture.refresh();
        Ok(mixture)
    }

    /// Rebuild the matrix of expected natural parameters
    fn refresh(&mut self) {
        let k = self.components.len();
        let s = self.stats_dim();
        let ln_weights = self.weights.expected_natural_parameters();
        let mut matrix = DMatrix::zeros(k, s + 1);
        for (i, comp) in self.components.iter().enumerate() {
            matrix
                .view_mut((i, 0), (1, s))
                .copy_from(&comp.expected_natural_parameters().transpose());
            matrix[(i, s)] = ln_weights[i];
        }
        self.np_matrix = matrix;
    }

    #[inline]
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn components(&self) -> &[Normal] {
        &self.components
    }

    #[inline]
    pub fn kind(&self) -> CovarianceKind {
        self.components[0].kind()
    }

    /// Dimension of the data
    #[inline]
    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }

    /// Length of the statistics of one component
    #[inline]
    pub fn stats_dim(&self) -> usize {
        self.components[0].stats_dim()
    }

    #[inline]
    pub fn weights_parameter(&self) -> &BayesianParameter<DirichletPrior> {
        &self.weights
    }

    /// Mutable access to the weights and the components.
    ///
    /// The cache is rebuilt once `f` returns.
    pub fn with_parameters_mut<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut BayesianParameter<DirichletPrior>, &mut [Normal]) -> T,
    {
        let out = f(&mut self.weights, &mut self.components);
        self.refresh();
        out
    }

    /// Expected value of the weights
    pub fn weights(&self) -> DVector<f64> {
        softmax(&self.weights.expected_natural_parameters())
    }

    /// Normal statistics followed by a bias column of ones
    pub fn sufficient_statistics(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let stats = self.kind().sufficient_statistics(data);
        with_bias(stats)
    }

    fn check_data(&self, data: &DMatrix<f64>) -> Result<(), MixtureError> {
        if data.ncols() != self.dim() {
            Err(MixtureError::DataDimension {
                expected: self.dim(),
                found: data.ncols(),
            })
        } else {
            Ok(())
        }
    }

    /// Per-frame, per-component expected log-likelihood, without the
    /// `-D/2 ln 2π` constant.
    fn per_component_llh(&self, stats: &DMatrix<f64>) -> DMatrix<f64> {
        stats * self.np_matrix.transpose()
    }

    fn llh_and_resps(&self, stats: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let per_comp = self.per_component_llh(stats);
        let lse = logsumexp_rows(&per_comp);
        let mut resps = per_comp;
        for (mut row, &norm) in resps.row_iter_mut().zip(lse.iter()) {
            row.apply(|x| *x = (*x - norm).exp());
        }
        let offset = -(self.dim() as f64) * HALF_LN_2PI;
        (lse.add_scalar(offset), resps)
    }

    /// Per-frame expected log-likelihood
    pub fn exp_llh(&self, data: &DMatrix<f64>) -> Result<DVector<f64>, MixtureError> {
        self.check_data(data)?;
        Ok(self.llh_and_resps(&self.sufficient_statistics(data)).0)
    }

    /// Per-frame, per-component responsibilities; every row sums to one
    pub fn responsibilities(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, MixtureError> {
        self.check_data(data)?;
        Ok(self.llh_and_resps(&self.sufficient_statistics(data)).1)
    }

    /// Per-frame expected log-likelihood and the accumulated statistics
    pub fn exp_llh_accumulate(
        &self,
        data: &DMatrix<f64>,
    ) -> Result<(DVector<f64>, MixtureStats), MixtureError> {
        self.check_data(data)?;
        let stats = self.sufficient_statistics(data);
        let (llh, resps) = self.llh_and_resps(&stats);
        Ok((llh, self.accumulate_resps(&stats, &resps)))
    }

    /// Statistics with every frame's responsibilities scaled by
    /// `frame_weights`, e.g. HMM state posteriors.
    pub fn accumulate_weighted(
        &self,
        data: &DMatrix<f64>,
        frame_weights: &DVector<f64>,
    ) -> Result<MixtureStats, MixtureError> {
        self.check_data(data)?;
        if frame_weights.len() != data.nrows() {
            return Err(MixtureError::DataDimension {
                expected: data.nrows(),
                found: frame_weights.len(),
            });
        }
        let stats = self.sufficient_statistics(data);
        let (_, mut resps) = self.llh_and_resps(&stats);
        for (mut row, &w) in resps.row_iter_mut().zip(frame_weights.iter()) {
            row *= w;
        }
        Ok(self.accumulate_resps(&stats, &resps))
    }

    fn accumulate_resps(&self, stats: &DMatrix<f64>, resps: &DMatrix<f64>) -> MixtureStats {
        let s = self.stats_dim();
        let components = resps.tr_mul(&stats.columns(0, s));
        let weights = resps.row_sum().transpose();
        MixtureStats {
            components,
            weights,
        }
    }

    /// Natural-gradient update of the weights and of every component.
    ///
    /// Nothing is modified if `stats` has the wrong shape.
    pub fn natural_grad_update(
        &mut self,
        stats: &MixtureStats,
        scale: f64,
        lrate: f64,
    ) -> Result<(), MixtureError> {
        let expected = (self.n_components(), self.stats_dim());
        if stats.components.shape() != expected || stats.weights.len() != expected.0 {
            return Err(MixtureError::StatsShape {
                expected,
                found: stats.components.shape(),
            });
        }
        let res = self.update_parameters(stats, scale, lrate);
        self.refresh();
        debug!(
            "mixture update: {} components, {:.3} frames, kl = {:.4}",
            self.n_components(),
            stats.weights.sum(),
            self.kl_div_posterior_prior()
        );
        res
    }

    /// Every parameter is updated on a copy, the copies are installed only
    /// once all of them succeeded.
    fn update_parameters(
        &mut self,
        stats: &MixtureStats,
        scale: f64,
        lrate: f64,
    ) -> Result<(), MixtureError> {
        let mut weights = self.weights.clone();
        weights.natural_grad_update(&stats.weights, scale, lrate)?;
        let mut components = self.components.clone();
        for (i, comp) in components.iter_mut().enumerate() {
            let acc = stats.components.row(i).transpose();
            comp.natural_grad_update(&acc, scale, lrate)?;
        }
        self.weights = weights;
        self.components = components;
        Ok(())
    }

    /// A new mixture with every component split in two.
    ///
    /// Each Dirichlet natural parameter is halved and duplicated, so the
    /// total mass is preserved. The weight statistics are split the same
    /// way.
    pub fn split(&self) -> Result<Mixture, MixtureError> {
        let duplicate = |eta: &DVector<f64>| {
            DVector::from_iterator(
                2 * eta.len(),
                eta.iter().flat_map(|&x| [0.5 * x, 0.5 * x]),
            )
        };
        let prior =
            DirichletPrior::from_natural_params(duplicate(self.weights.prior().natural_params()))?;
        let posterior = DirichletPrior::from_natural_params(duplicate(
            self.weights.posterior().natural_params(),
        ))?;
        let mut components = Vec::with_capacity(2 * self.n_components());
        for comp in self.components.iter() {
            let (a, b) = comp.split()?;
            components.push(a);
            components.push(b);
        }
        let mut weights = BayesianParameter::new(prior, posterior)?;
        weights.set_stats(duplicate(self.weights.stats()))?;
        debug!("split mixture into {} components", components.len());
        Self::from_parts(weights, components)
    }

    /// KL divergence between the posteriors and the priors of the weights
    /// and of every component.
    pub fn kl_div_posterior_prior(&self) -> f64 {
        self.weights.kl_div_posterior_prior()
            + self
                .components
                .iter()
                .map(|c| c.kl_div_posterior_prior())
                .sum::<f64>()
    }

    /// Responsibility-weighted expected natural parameters of inputs
    /// distributed as `N(means[i], diag(vars[i]))`, plus the accumulated
    /// statistics.
    pub fn expected_natural_params(
        &self,
        means: &DMatrix<f64>,
        vars: &DMatrix<f64>,
    ) -> Result<(DMatrix<f64>, MixtureStats), MixtureError> {
        self.check_data(means)?;
        if means.shape() != vars.shape() {
            return Err(MixtureError::DataDimension {
                expected: means.nrows(),
                found: vars.nrows(),
            });
        }
        let stats = with_bias(self.kind().expected_sufficient_statistics(means, vars));
        let (_, resps) = self.llh_and_resps(&stats);
        let s = self.stats_dim();
        let matrix = self.np_matrix.columns(0, s);
        Ok((&resps * matrix, self.accumulate_resps(&stats, &resps)))
    }

    /// Draw `n` frames from the point estimates of the components
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Result<DMatrix<f64>, MixtureError> {
        let dist = WeightedIndex::new(self.weights().iter().copied())
            .map_err(|_| MixtureError::NoComponents)?;
        let normals = self
            .components
            .iter()
            .map(|c| c.point_estimate())
            .collect::<Result<Vec<_>, _>>()?;
        let mut data = DMatrix::zeros(n, self.dim());
        for i in 0..n {
            let k = rng.sample(&dist);
            let x = normals[k].draw(rng);
            data.row_mut(i).copy_from(&x.transpose());
        }
        Ok(data)
    }
}

fn with_bias(stats: DMatrix<f64>) -> DMatrix<f64> {
    let ncols = stats.ncols();
    stats.insert_column(ncols, 1.0)
}

impl std::error::Error for MixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Normal(err) => Some(err),
            Self::Parameter(err) => Some(err),
            Self::Prior(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for MixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoComponents => write!(f, "a mixture needs at least one component"),
            Self::WeightsMismatch {
                n_weights,
                n_components,
            } => write!(
                f,
                "{n_weights} weights for {n_components} components"
            ),
            Self::ComponentMismatch { ix } => write!(
                f,
                "component {ix} differs in covariance kind or dimension"
            ),
            Self::StatsShape { expected, found } => write!(
                f,
                "expected statistics of shape {expected:?}, found {found:?}"
            ),
            Self::DataDimension { expected, found } => {
                write!(f, "expected dimension {expected}, found {found}")
            }
            Self::Normal(err) => write!(f, "{err}"),
            Self::Parameter(err) => write!(f, "{err}"),
            Self::Prior(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-10;

    fn two_component_mixture() -> Mixture {
        let var = DVector::from_element(1, 1.0);
        Mixture::create(2, 1.0, |k| {
            let m = DVector::from_element(1, if k == 0 { -2.0 } else { 2.0 });
            Normal::create(&m, &var, 1.0, CovarianceKind::Diagonal)
        })
        .unwrap()
    }

    #[test]
    fn point_at_second_mean_belongs_to_second_component() {
        let mixture = two_component_mixture();
        let data = DMatrix::from_element(1, 1, 2.0);
        let resps = mixture.responsibilities(&data).unwrap();
        assert!(resps[(0, 0)] < 1E-3);
        assert!(resps[(0, 1)] > 1.0 - 1E-3);
    }

    #[test]
    fn responsibilities_sum_to_one() {
        let mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(5, 1, &[-3.0, -0.5, 0.0, 0.1, 10.0]);
        let resps = mixture.responsibilities(&data).unwrap();
        for row in resps.row_iter() {
            assert::close(row.sum(), 1.0, TOL);
            assert!(row.iter().all(|&r| r >= 0.0));
        }
    }

    #[test]
    fn single_component_llh_equals_component_llh() {
        let var = DVector::from_element(2, 0.5);
        let mixture = Mixture::create(1, 1.0, |_| {
            Normal::create(&DVector::zeros(2), &var, 2.0, CovarianceKind::Full)
        })
        .unwrap();
        let data = DMatrix::from_row_slice(2, 2, &[0.1, 0.2, -1.0, 0.5]);
        let llh = mixture.exp_llh(&data).unwrap();
        let comp = &mixture.components()[0];
        let comp_llh = comp.expected_log_likelihood(&comp.sufficient_statistics(&data));
        // E[ln π] of a single category is 0
        for i in 0..2 {
            assert::close(llh[i], comp_llh[i], TOL);
        }
    }

    #[test]
    fn accumulated_weights_count_frames() {
        let mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(4, 1, &[-2.0, -2.1, 1.9, 2.0]);
        let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
        assert::close(stats.weights.sum(), 4.0, TOL);
        assert_eq!(stats.components.shape(), (2, 4));
        // the bias term is not part of the component statistics
        assert::close(stats.components.column(3).sum(), 2.0, TOL);
    }

    #[test]
    fn accumulate_weighted_scales_frames() {
        let mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(2, 1, &[-2.0, 2.0]);
        let fw = DVector::from_vec(vec![0.5, 0.0]);
        let stats = mixture.accumulate_weighted(&data, &fw).unwrap();
        assert::close(stats.weights.sum(), 0.5, TOL);
    }

    #[test]
    fn training_moves_weights_toward_data() {
        let mut mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(4, 1, &[2.1, 1.9, 2.0, 2.2]);
        for _ in 0..5 {
            let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
            mixture.natural_grad_update(&stats, 1.0, 1.0).unwrap();
        }
        let w = mixture.weights();
        assert::close(w.sum(), 1.0, TOL);
        assert!(w[1] > 0.7);
    }

    #[test]
    fn empty_batch_drifts_toward_prior() {
        let mut mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(4, 1, &[2.1, 1.9, 2.0, 2.2]);
        let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
        mixture.natural_grad_update(&stats, 1.0, 1.0).unwrap();
        assert!(mixture.kl_div_posterior_prior() > 0.0);
        let zeros = MixtureStats::zeros(2, mixture.stats_dim());
        mixture.natural_grad_update(&zeros, 1.0, 1.0).unwrap();
        assert::close(mixture.kl_div_posterior_prior(), 0.0, 1E-8);
    }

    #[test]
    fn update_rejects_wrong_stats_shape() {
        let mut mixture = two_component_mixture();
        let before = mixture.clone();
        let stats = MixtureStats::zeros(3, mixture.stats_dim());
        assert!(matches!(
            mixture.natural_grad_update(&stats, 1.0, 1.0),
            Err(MixtureError::StatsShape { .. })
        ));
        assert_eq!(mixture, before);
    }

    #[test]
    fn split_doubles_components_and_keeps_mass() {
        let mixture = two_component_mixture();
        let split = mixture.split().unwrap();
        assert_eq!(split.n_components(), 4);
        let mass = |m: &Mixture| m.weights_parameter().prior().natural_params().sum();
        assert::close(mass(&split), mass(&mixture), TOL);
        assert_eq!(mixture.n_components(), 2);
    }

    #[test]
    fn split_keeps_the_statistics() {
        let mut mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(4, 1, &[-2.0, -1.9, 2.1, 1.8]);
        let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
        mixture.natural_grad_update(&stats, 1.0, 1.0).unwrap();
        let split = mixture.split().unwrap();

        let before = mixture.weights_parameter().stats();
        let after = split.weights_parameter().stats();
        assert_eq!(after.len(), 4);
        assert::close(after.sum(), before.sum(), TOL);
        assert::close(after[0], 0.5 * before[0], TOL);
        assert::close(after[1], 0.5 * before[0], TOL);
        assert::close(after[3], 0.5 * before[1], TOL);

        // weights and components split the same amount of data, the last
        // diagonal statistic being ½ per frame
        let comp_counts: f64 = split
            .components()
            .iter()
            .map(|c| 2.0 * c.parameter().stats()[3])
            .sum();
        assert::close(comp_counts, after.sum(), 1E-8);
    }

    #[test]
    fn failed_update_leaves_the_mixture_untouched() {
        let mut mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(4, 1, &[-2.0, -1.9, 2.1, 1.8]);
        let (_, mut stats) = mixture.exp_llh_accumulate(&data).unwrap();
        stats.components[(1, 0)] = f64::NAN;
        let before = mixture.clone();
        assert!(mixture.natural_grad_update(&stats, 1.0, 1.0).is_err());
        assert_eq!(mixture, before);
        assert::close(
            mixture.components()[0].mean().as_slice().to_vec(),
            vec![-2.0],
            TOL,
        );
    }

    #[test]
    fn split_mass_is_preserved_for_informative_priors() {
        let var = DVector::from_element(1, 1.0);
        let mixture = Mixture::create(3, 5.0, |_| {
            Normal::create(&DVector::zeros(1), &var, 1.0, CovarianceKind::Diagonal)
        })
        .unwrap();
        let split = mixture.split().unwrap();
        let eta = split.weights_parameter().prior().natural_params();
        assert_eq!(eta.len(), 6);
        assert::close(eta.sum(), 12.0, TOL);
        assert::close(eta[0], 2.0, TOL);
    }

    #[test]
    fn create_rejects_mixed_components() {
        let res = Mixture::create(2, 1.0, |k| {
            let kind = if k == 0 {
                CovarianceKind::Diagonal
            } else {
                CovarianceKind::Full
            };
            Normal::create(&DVector::zeros(2), &DVector::from_element(2, 1.0), 1.0, kind)
        });
        assert_eq!(res.unwrap_err(), MixtureError::ComponentMismatch { ix: 1 });
        assert_eq!(
            Mixture::create(0, 1.0, |_| unreachable!()).unwrap_err(),
            MixtureError::NoComponents
        );
    }

    #[test]
    fn expected_natural_params_with_zero_variance() {
        let mixture = two_component_mixture();
        let means = DMatrix::from_column_slice(2, 1, &[2.0, -2.0]);
        let vars = DMatrix::zeros(2, 1);
        let (nparams, stats) = mixture.expected_natural_params(&means, &vars).unwrap();
        assert_eq!(nparams.shape(), (2, 4));
        let resps = mixture.responsibilities(&means).unwrap();
        let expected = &resps * mixture.np_matrix.columns(0, 4);
        assert!((nparams - expected).norm() < TOL);
        assert::close(stats.weights.sum(), 2.0, TOL);
    }

    #[test]
    fn sample_draws_from_the_heavier_component() {
        let mut mixture = two_component_mixture();
        let data = DMatrix::from_column_slice(6, 1, &[2.0; 6]);
        let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
        mixture.natural_grad_update(&stats, 10.0, 1.0).unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
        let xs = mixture.sample(200, &mut rng).unwrap();
        let positive = xs.iter().filter(|&&x| x > 0.0).count();
        assert!(positive > 150);
    }

    #[test]
    fn stats_add_assign() {
        let mut a = MixtureStats::zeros(2, 3);
        let mut b = MixtureStats::zeros(2, 3);
        b.weights[1] = 2.0;
        b.components[(0, 2)] = 1.5;
        a += &b;
        a += &b;
        assert_eq!(a.weights[1], 4.0);
        assert_eq!(a.components[(0, 2)], 3.0);
    }

    proptest! {
        #[test]
        fn responsibilities_are_a_distribution(
            xs in prop::collection::vec(-1E3..1E3_f64, 1..20),
        ) {
            let mixture = two_component_mixture();
            let data = DMatrix::from_column_slice(xs.len(), 1, &xs);
            let resps = mixture.responsibilities(&data).unwrap();
            for row in resps.row_iter() {
                prop_assert!((row.sum() - 1.0).abs() < 1E-9);
                prop_assert!(row.iter().all(|&r| r >= 0.0));
            }
        }
    }
}
