//! Trait definitions
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::priors::PriorError;

/// Can be sampled
pub trait Sampleable<X> {
    /// Single draw
    fn draw<R: Rng>(&self, rng: &mut R) -> X;

    /// Multiple draws
    fn sample<R: Rng>(&self, n: usize, mut rng: &mut R) -> Vec<X> {
        (0..n).map(|_| self.draw(&mut rng)).collect()
    }
}

/// Has a mean
pub trait Mean<M> {
    fn mean(&self) -> Option<M>;
}

/// Has a variance (or covariance)
pub trait Variance<V> {
    fn variance(&self) -> Option<V>;
}

/// Kullback-Leibler divergence between two distributions of the same kind
pub trait KlDivergence {
    /// The KL divergence, KL(self || other)
    fn kl(&self, other: &Self) -> f64;

    /// Symmetrised divergence, KL(self || other) + KL(other || self)
    fn kl_sym(&self, other: &Self) -> f64 {
        self.kl(other) + other.kl(self)
    }
}

/// A density in the exponential family,
/// `ln p(x) = T(x)·η - A(η) + ln h(x)`.
///
/// Rows of the data and statistics matrices are observations.
pub trait ExponentialFamily: Sized {
    /// The error returned when a natural-parameter vector is invalid
    type Error;

    /// Dimension of the observations
    fn dim(&self) -> usize;

    /// Sufficient statistics T(x) of every row of `data`
    fn sufficient_statistics(data: &DMatrix<f64>) -> DMatrix<f64>;

    /// The natural parameters, η
    fn natural_parameters(&self) -> DVector<f64>;

    /// Build the density from natural parameters
    fn from_natural_parameters(eta: &DVector<f64>) -> Result<Self, Self::Error>;

    /// The log-normalizer, A(η)
    fn log_norm(&self) -> f64;

    /// The log base measure, ln h(x). Constant for every family of the crate.
    fn log_base_measure(&self) -> f64;

    /// E[T(x)]
    fn expected_sufficient_statistics(&self) -> DVector<f64>;

    /// Replace the parameters in place
    fn update_from_natural_parameters(
        &mut self,
        eta: &DVector<f64>,
    ) -> Result<(), Self::Error> {
        *self = Self::from_natural_parameters(eta)?;
        Ok(())
    }

    /// Log-likelihood of every row of `stats`
    fn expected_log_likelihood(&self, stats: &DMatrix<f64>) -> DVector<f64> {
        let offset = self.log_base_measure() - self.log_norm();
        (stats * self.natural_parameters()).add_scalar(offset)
    }
}

/// A conjugate prior held in natural-parameter form.
///
/// The gradient of the log-normalizer is the expectation of the prior's
/// sufficient statistics, which is what the likelihood models consume.
pub trait ExpFamilyPrior: Clone {
    /// Length of the natural-parameter vector
    fn dim(&self) -> usize {
        self.natural_params().len()
    }

    /// The natural parameters, η
    fn natural_params(&self) -> &DVector<f64>;

    /// Replace the natural parameters.
    ///
    /// The prior is left untouched if `eta` does not describe a valid
    /// member of the family.
    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError>;

    /// The log-normalizer, A(η)
    fn log_norm(&self) -> f64;

    /// ∇A(η), the expected sufficient statistics
    fn grad_lognorm(&self) -> DVector<f64>;

    /// KL(self || other)
    ///
    /// # Example
    ///
    /// ```rust
    /// use beer::priors::DirichletPrior;
    /// use beer::traits::ExpFamilyPrior;
    ///
    /// let p = DirichletPrior::new(vec![1.0, 2.0, 3.0]).unwrap();
    /// let q = DirichletPrior::new(vec![3.0, 2.0, 1.0]).unwrap();
    ///
    /// assert!(p.kl_div(&p).abs() < 1E-12);
    /// assert!(p.kl_div(&q) > 0.0);
    /// ```
    fn kl_div(&self, other: &Self) -> f64 {
        let diff = self.natural_params() - other.natural_params();
        diff.dot(&self.grad_lognorm()) - self.log_norm() + other.log_norm()
    }
}
