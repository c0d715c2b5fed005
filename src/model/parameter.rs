//! Prior/posterior pair of a conjugate family
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;
use std::fmt;

use crate::priors::PriorError;
use crate::traits::ExpFamilyPrior;

/// A parameter with a conjugate prior and a variational posterior of the
/// same family.
///
/// `stats` holds the scaled statistics of the last natural-gradient update,
/// so that the posterior can be rebuilt as `prior + stats` whenever the
/// prior is replaced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct BayesianParameter<P> {
    prior: P,
    posterior: P,
    stats: DVector<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum ParameterError {
    /// Prior and posterior have different numbers of natural parameters
    DimensionMismatch { prior: usize, posterior: usize },
    /// The statistics do not match the natural parameters
    StatsDimension { expected: usize, found: usize },
    /// The updated posterior is outside of its family
    Prior(PriorError),
}

impl From<PriorError> for ParameterError {
    fn from(err: PriorError) -> Self {
        ParameterError::Prior(err)
    }
}

impl<P: ExpFamilyPrior> BayesianParameter<P> {
    pub fn new(prior: P, posterior: P) -> Result<Self, ParameterError> {
        if prior.dim() != posterior.dim() {
            return Err(ParameterError::DimensionMismatch {
                prior: prior.dim(),
                posterior: posterior.dim(),
            });
        }
        let stats = DVector::zeros(prior.dim());
        Ok(BayesianParameter {
            prior,
            posterior,
            stats,
        })
    }

    /// A parameter whose posterior starts as a copy of the prior
    pub fn from_prior(prior: P) -> Self {
        let stats = DVector::zeros(prior.dim());
        BayesianParameter {
            posterior: prior.clone(),
            prior,
            stats,
        }
    }

    #[inline]
    pub fn prior(&self) -> &P {
        &self.prior
    }

    #[inline]
    pub fn posterior(&self) -> &P {
        &self.posterior
    }

    /// Statistics of the last update
    #[inline]
    pub fn stats(&self) -> &DVector<f64> {
        &self.stats
    }

    /// Overwrite the stored statistics without touching the posterior
    pub fn set_stats(&mut self, stats: DVector<f64>) -> Result<(), ParameterError> {
        self.check_stats(&stats)?;
        self.stats = stats;
        Ok(())
    }

    /// E[η] under the posterior
    pub fn expected_natural_parameters(&self) -> DVector<f64> {
        self.posterior.grad_lognorm()
    }

    /// One natural-gradient step,
    /// `post.η += lrate * (prior.η + scale * acc_stats - post.η)`.
    ///
    /// The posterior is left unchanged if the step leaves its family.
    pub fn natural_grad_update(
        &mut self,
        acc_stats: &DVector<f64>,
        scale: f64,
        lrate: f64,
    ) -> Result<(), ParameterError> {
        self.check_stats(acc_stats)?;
        let scaled = acc_stats * scale;
        let grad = self.prior.natural_params() + &scaled
            - self.posterior.natural_params();
        let eta = self.posterior.natural_params() + grad * lrate;
        self.posterior.set_natural_params(eta)?;
        self.stats = scaled;
        Ok(())
    }

    /// Install a new prior and rebuild the posterior as `prior + stats`
    pub fn replace_prior(&mut self, prior: P) -> Result<(), ParameterError> {
        if prior.dim() != self.prior.dim() {
            return Err(ParameterError::DimensionMismatch {
                prior: prior.dim(),
                posterior: self.posterior.dim(),
            });
        }
        let mut posterior = prior.clone();
        posterior.set_natural_params(prior.natural_params() + &self.stats)?;
        self.prior = prior;
        self.posterior = posterior;
        Ok(())
    }

    /// Set the stats to `post.η - prior.η`, the statistics that explain the
    /// current posterior.
    pub fn init_stats_from_posterior(&mut self) {
        self.stats =
            self.posterior.natural_params() - self.prior.natural_params();
    }

    /// A copy whose prior and posterior are mapped by `shrink` and whose
    /// statistics are multiplied by `factor`
    pub fn shrunk<F>(&self, shrink: F, factor: f64) -> Result<Self, ParameterError>
    where
        F: Fn(&P) -> Result<P, PriorError>,
    {
        let prior = shrink(&self.prior)?;
        let posterior = shrink(&self.posterior)?;
        let mut param = Self::new(prior, posterior)?;
        param.set_stats(&self.stats * factor)?;
        Ok(param)
    }

    /// Replace the posterior, keeping prior and statistics
    pub fn set_posterior(&mut self, posterior: P) -> Result<(), ParameterError> {
        if posterior.dim() != self.prior.dim() {
            return Err(ParameterError::DimensionMismatch {
                prior: self.prior.dim(),
                posterior: posterior.dim(),
            });
        }
        self.posterior = posterior;
        Ok(())
    }

    /// KL(posterior || prior)
    pub fn kl_div_posterior_prior(&self) -> f64 {
        self.posterior.kl_div(&self.prior)
    }

    fn check_stats(&self, stats: &DVector<f64>) -> Result<(), ParameterError> {
        if stats.len() != self.prior.dim() {
            Err(ParameterError::StatsDimension {
                expected: self.prior.dim(),
                found: stats.len(),
            })
        } else {
            Ok(())
        }
    }
}

impl std::error::Error for ParameterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Prior(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { prior, posterior } => write!(
                f,
                "prior has {prior} natural parameters but the posterior has {posterior}"
            ),
            Self::StatsDimension { expected, found } => write!(
                f,
                "expected statistics of length {expected}, found {found}"
            ),
            Self::Prior(err) => write!(f, "invalid posterior: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priors::{DirichletPrior, GammaPrior};

    const TOL: f64 = 1E-12;

    fn param() -> BayesianParameter<DirichletPrior> {
        BayesianParameter::from_prior(DirichletPrior::symmetric(1.0, 3).unwrap())
    }

    #[test]
    fn new_rejects_mismatched_dims() {
        let res = BayesianParameter::new(
            DirichletPrior::symmetric(1.0, 3).unwrap(),
            DirichletPrior::symmetric(1.0, 2).unwrap(),
        );
        assert_eq!(
            res.unwrap_err(),
            ParameterError::DimensionMismatch {
                prior: 3,
                posterior: 2
            }
        );
    }

    #[test]
    fn full_step_lands_on_prior_plus_stats() {
        let mut p = param();
        let acc = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        p.natural_grad_update(&acc, 2.0, 1.0).unwrap();
        assert_eq!(p.posterior().alphas().as_slice(), &[3.0, 5.0, 7.0]);
        assert_eq!(p.stats().as_slice(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn damped_step_moves_part_of_the_way() {
        let mut p = param();
        let acc = DVector::from_vec(vec![4.0, 0.0, 0.0]);
        p.natural_grad_update(&acc, 1.0, 0.5).unwrap();
        assert::close(p.posterior().alphas()[0], 3.0, TOL);
        assert::close(p.posterior().alphas()[1], 1.0, TOL);
    }

    #[test]
    fn zero_stats_drift_toward_prior() {
        let mut p = param();
        let acc = DVector::from_vec(vec![10.0, 0.0, 0.0]);
        p.natural_grad_update(&acc, 1.0, 1.0).unwrap();
        let zeros = DVector::zeros(3);
        for _ in 0..50 {
            p.natural_grad_update(&zeros, 1.0, 0.5).unwrap();
        }
        assert!(p.kl_div_posterior_prior() < 1E-10);
    }

    #[test]
    fn failed_update_keeps_posterior() {
        let mut p =
            BayesianParameter::from_prior(GammaPrior::new(1.0, 1.0).unwrap());
        // pushes the rate below zero
        let acc = DVector::from_vec(vec![5.0, 0.0]);
        assert!(p.natural_grad_update(&acc, 1.0, 1.0).is_err());
        assert_eq!(p.posterior(), p.prior());
        assert_eq!(p.stats().as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn replace_prior_adds_stored_stats() {
        let mut p = param();
        let acc = DVector::from_vec(vec![1.0, 0.0, 2.0]);
        p.natural_grad_update(&acc, 1.0, 1.0).unwrap();
        p.replace_prior(DirichletPrior::symmetric(3.0, 3).unwrap())
            .unwrap();
        assert_eq!(p.posterior().alphas().as_slice(), &[4.0, 3.0, 5.0]);
    }

    #[test]
    fn stats_from_posterior_rebuild_the_same_posterior() {
        let mut p = BayesianParameter::new(
            DirichletPrior::symmetric(1.0, 2).unwrap(),
            DirichletPrior::new(vec![4.0, 2.0]).unwrap(),
        )
        .unwrap();
        p.init_stats_from_posterior();
        let post = p.posterior().clone();
        p.replace_prior(DirichletPrior::symmetric(1.0, 2).unwrap())
            .unwrap();
        assert_eq!(p.posterior(), &post);
    }

    #[test]
    fn update_rejects_wrong_stats_length() {
        let mut p = param();
        let res = p.natural_grad_update(&DVector::zeros(2), 1.0, 1.0);
        assert_eq!(
            res.unwrap_err(),
            ParameterError::StatsDimension {
                expected: 3,
                found: 2
            }
        );
    }
}
