#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use std::ops::AddAssign;

use super::{PdfLayout, SubspaceError};
use crate::consts::HALF_LN_2PI;
use crate::dist::{NormalFull, NormalFullError};
use crate::misc::{flatten, spd_inverse};
use crate::model::{BayesianParameter, Mixture};
use crate::priors::{GammaPrior, MatrixNormalPrior};
use crate::traits::{ExponentialFamily, KlDivergence};

/// Standard deviation of the initial projection
const INIT_PROJECTION_STD: f64 = 1E-2;

/// Accumulated statistics of the units' pdf vectors
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct GsmStats {
    /// Σ E[h̃h̃ᵀ] over the units
    pub latent_outer: DMatrix<f64>,
    /// Σ E[h̃]ψᵀ over the units
    pub latent_pdfvec: DMatrix<f64>,
    /// Σ ψᵀψ over the units
    pub pdfvec_sq_norm: f64,
    pub n_units: usize,
}

impl AddAssign<&GsmStats> for GsmStats {
    fn add_assign(&mut self, rhs: &GsmStats) {
        self.latent_outer += &rhs.latent_outer;
        self.latent_pdfvec += &rhs.latent_pdfvec;
        self.pdfvec_sq_norm += rhs.pdfvec_sq_norm;
        self.n_units += rhs.n_units;
    }
}

/// Generalized subspace model.
///
/// The pdf vector ψ of a unit with embedding h is modeled as
/// `ψ ~ N(Wᵀh + b, λ⁻¹I)`. The augmented projection `W̃ = [W; bᵀ]` has a
/// Matrix-Normal prior and posterior, the noise precision λ a Gamma one, and
/// every unit a Normal latent posterior over h.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Gsm {
    layout: PdfLayout,
    latent_prior: NormalFull,
    projection: BayesianParameter<MatrixNormalPrior>,
    precision: BayesianParameter<GammaPrior>,
}

impl Gsm {
    /// Create a subspace whose bias is the pdf vector of `template`.
    ///
    /// The projection W starts as small Gaussian noise so that units drawn
    /// from the latent prior are close to the template.
    pub fn create<R: Rng>(
        layout: PdfLayout,
        template: &[Mixture],
        latent_dim: usize,
        latent_prior: NormalFull,
        rng: &mut R,
    ) -> Result<Self, SubspaceError> {
        if latent_dim == 0 {
            return Err(SubspaceError::LatentDimZero);
        }
        if latent_prior.dim() != latent_dim {
            return Err(SubspaceError::LatentPriorDimension {
                expected: latent_dim,
                found: latent_prior.dim(),
            });
        }
        let bias = layout.encode(template)?;
        let (q, p) = (latent_dim + 1, layout.len());

        let mut prior_mean: DMatrix<f64> = DMatrix::zeros(q, p);
        prior_mean.row_mut(latent_dim).tr_copy_from(&bias);
        let mut post_mean = prior_mean.clone();
        post_mean.rows_mut(0, latent_dim).apply(|w| {
            *w = INIT_PROJECTION_STD * rng.sample::<f64, _>(StandardNormal)
        });
        let projection = BayesianParameter::new(
            MatrixNormalPrior::new(prior_mean, DMatrix::identity(q, q))?,
            MatrixNormalPrior::new(post_mean, DMatrix::identity(q, q))?,
        )?;
        let precision = BayesianParameter::from_prior(GammaPrior::new(1.0, 1.0)?);

        debug!("created subspace of dimension {latent_dim} for pdf vectors of length {p}");
        Ok(Gsm {
            layout,
            latent_prior,
            projection,
            precision,
        })
    }

    #[inline]
    pub fn layout(&self) -> &PdfLayout {
        &self.layout
    }

    #[inline]
    pub fn latent_dim(&self) -> usize {
        self.projection.prior().shape().0 - 1
    }

    #[inline]
    pub fn latent_prior(&self) -> &NormalFull {
        &self.latent_prior
    }

    /// The augmented projection `[W; bᵀ]`
    #[inline]
    pub fn projection(&self) -> &BayesianParameter<MatrixNormalPrior> {
        &self.projection
    }

    /// The noise precision
    #[inline]
    pub fn precision(&self) -> &BayesianParameter<GammaPrior> {
        &self.precision
    }

    /// `n` latent posteriors, each a copy of the latent prior
    pub fn new_latent_posteriors(&self, n: usize) -> Vec<NormalFull> {
        vec![self.latent_prior.clone(); n]
    }

    /// `E[W̃]ᵀ[μ_u; 1]` for every latent posterior, one unit per row
    pub fn expected_pdfvecs(&self, posts: &[NormalFull]) -> DMatrix<f64> {
        let means = augmented_means(posts, self.latent_dim());
        means * self.projection.posterior().mean()
    }

    /// Pdf vectors of the posterior parameters of every unit of `emissions`
    pub fn unit_pdfvecs(&self, emissions: &[Mixture]) -> Result<DMatrix<f64>, SubspaceError> {
        let n_units = self.layout.n_units(emissions)?;
        let mut pdfvecs = DMatrix::zeros(n_units, self.layout.len());
        for (i, unit) in emissions.chunks(self.layout.n_states()).enumerate() {
            pdfvecs.row_mut(i).tr_copy_from(&self.layout.encode(unit)?);
        }
        Ok(pdfvecs)
    }

    /// Install the priors implied by `pdfvecs` in the units of `emissions`.
    ///
    /// Every posterior becomes its new prior plus the parameter's
    /// statistics, so the statistics should be initialized first (see
    /// [`init_unit_stats`](crate::subspace::init_unit_stats)).
    pub fn update_models(
        &self,
        emissions: &mut [Mixture],
        pdfvecs: &DMatrix<f64>,
    ) -> Result<(), SubspaceError> {
        let n_units = self.layout.n_units(emissions)?;
        self.check_pdfvecs(pdfvecs, n_units)?;
        let n_states = self.layout.n_states();
        for (unit, pdfvec) in emissions.chunks_mut(n_states).zip(pdfvecs.row_iter()) {
            let pdfvec: Vec<f64> = pdfvec.iter().cloned().collect();
            self.layout.decode_into(unit, &pdfvec)?;
        }
        Ok(())
    }

    /// Optimal latent posteriors of the units given the current projection
    /// and noise precision
    pub fn update_latent_posteriors(
        &self,
        posts: &mut [NormalFull],
        pdfvecs: &DMatrix<f64>,
    ) -> Result<(), SubspaceError> {
        self.check_pdfvecs(pdfvecs, posts.len())?;
        let q = self.latent_dim();
        let lambda = self.precision.posterior().expected_value();
        let proj = self.projection.posterior();
        let outer = proj.expected_outer();
        let w_mean = proj.mean().rows(0, q);
        let wb: DVector<f64> = outer.column(q).rows(0, q).into_owned();

        let prior_prec = self.latent_prior.precision();
        let prior_term = prior_prec * self.latent_prior.mean();
        let (cov, _) = spd_inverse(&(prior_prec + outer.view((0, 0), (q, q)) * lambda))
            .ok_or(NormalFullError::CovNotPositiveDefinite)?;
        for (post, pdfvec) in posts.iter_mut().zip(pdfvecs.row_iter()) {
            let rhs = &prior_term + (&w_mean * pdfvec.transpose() - &wb) * lambda;
            *post = NormalFull::new(&cov * rhs, cov.clone())?;
        }
        Ok(())
    }

    pub fn accumulate(
        &self,
        posts: &[NormalFull],
        pdfvecs: &DMatrix<f64>,
    ) -> Result<GsmStats, SubspaceError> {
        self.check_pdfvecs(pdfvecs, posts.len())?;
        let q = self.latent_dim() + 1;
        let mut stats = GsmStats {
            latent_outer: DMatrix::zeros(q, q),
            latent_pdfvec: DMatrix::zeros(q, self.layout.len()),
            pdfvec_sq_norm: 0.0,
            n_units: posts.len(),
        };
        for (post, pdfvec) in posts.iter().zip(pdfvecs.row_iter()) {
            let h = augmented_mean(post);
            stats.latent_outer += augmented_second_moment(post);
            stats.latent_pdfvec += h * pdfvec;
            stats.pdfvec_sq_norm += pdfvec.norm_squared();
        }
        Ok(stats)
    }

    /// Update the projection, then the noise precision with the new
    /// projection
    pub fn natural_grad_update(
        &mut self,
        stats: &GsmStats,
        scale: f64,
        lrate: f64,
    ) -> Result<(), SubspaceError> {
        let lambda = self.precision.posterior().expected_value();
        let proj_stats = flatten(&(&stats.latent_outer * (-0.5 * lambda)))
            .iter()
            .chain(flatten(&(&stats.latent_pdfvec * lambda)).iter())
            .cloned()
            .collect::<Vec<f64>>();
        self.projection
            .natural_grad_update(&DVector::from_vec(proj_stats), scale, lrate)?;

        let sq_err = self.expected_sq_error(stats);
        let n_obs = (stats.n_units * self.layout.len()) as f64;
        let prec_stats = DVector::from_vec(vec![-0.5 * sq_err, 0.5 * n_obs]);
        self.precision.natural_grad_update(&prec_stats, scale, lrate)?;
        debug!(
            "subspace update: E[λ] = {:.4}, kl = {:.4}",
            self.precision.posterior().expected_value(),
            self.kl_div_posterior_prior()
        );
        Ok(())
    }

    /// Σ_u E[ln N(ψ_u | W̃ᵀh̃_u, λ⁻¹I)]
    pub fn exp_llh(
        &self,
        posts: &[NormalFull],
        pdfvecs: &DMatrix<f64>,
    ) -> Result<f64, SubspaceError> {
        let stats = self.accumulate(posts, pdfvecs)?;
        let prec = self.precision.posterior();
        let n_obs = (stats.n_units * self.layout.len()) as f64;
        Ok(n_obs * (0.5 * prec.expected_ln_value() - HALF_LN_2PI)
            - 0.5 * prec.expected_value() * self.expected_sq_error(&stats))
    }

    /// KL divergence of the projection and noise posteriors from their priors
    pub fn kl_div_posterior_prior(&self) -> f64 {
        self.projection.kl_div_posterior_prior() + self.precision.kl_div_posterior_prior()
    }

    /// Σ_u KL(q(h_u) || p(h))
    pub fn latent_kl_div(&self, posts: &[NormalFull]) -> f64 {
        posts.iter().map(|post| post.kl(&self.latent_prior)).sum()
    }

    /// Σ_u E||ψ_u - W̃ᵀh̃_u||² under the current projection posterior
    fn expected_sq_error(&self, stats: &GsmStats) -> f64 {
        let proj = self.projection.posterior();
        stats.pdfvec_sq_norm - 2.0 * proj.mean().dot(&stats.latent_pdfvec)
            + (proj.expected_outer() * &stats.latent_outer).trace()
    }

    fn check_pdfvecs(&self, pdfvecs: &DMatrix<f64>, n_units: usize) -> Result<(), SubspaceError> {
        if pdfvecs.ncols() != self.layout.len() {
            Err(SubspaceError::PdfVecDimension {
                expected: self.layout.len(),
                found: pdfvecs.ncols(),
            })
        } else if pdfvecs.nrows() != n_units {
            Err(SubspaceError::PosteriorCount {
                expected: pdfvecs.nrows(),
                found: n_units,
            })
        } else {
            Ok(())
        }
    }
}

/// `[μ; 1]`
fn augmented_mean(post: &NormalFull) -> DVector<f64> {
    let q = post.mean().len();
    let mut h = DVector::from_element(q + 1, 1.0);
    h.rows_mut(0, q).copy_from(post.mean());
    h
}

/// `[μ_u; 1]ᵀ` for every posterior
fn augmented_means(posts: &[NormalFull], latent_dim: usize) -> DMatrix<f64> {
    let mut means = DMatrix::from_element(posts.len(), latent_dim + 1, 1.0);
    for (i, post) in posts.iter().enumerate() {
        means
            .view_mut((i, 0), (1, latent_dim))
            .tr_copy_from(post.mean());
    }
    means
}

/// `E[h̃h̃ᵀ] = [[Σ + μμᵀ, μ], [μᵀ, 1]]`
fn augmented_second_moment(post: &NormalFull) -> DMatrix<f64> {
    let q = post.mean().len();
    let mut m = DMatrix::from_element(q + 1, q + 1, 1.0);
    m.view_mut((0, 0), (q, q)).copy_from(&post.second_moment());
    m.view_mut((0, q), (q, 1)).copy_from(post.mean());
    m.view_mut((q, 0), (1, q)).tr_copy_from(post.mean());
    m
}
