//! Dirichlet prior over mixture weights
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;

use super::{check_positive, validate_natural_params, PriorError};
use crate::impl_display;
use crate::misc::{digamma, ln_gamma, vec_to_string};
use crate::traits::ExpFamilyPrior;

/// [Dirichlet distribution](https://en.wikipedia.org/wiki/Dirichlet_distribution)
/// over the weights of a mixture, Dir(α).
///
/// Natural parameters are `α - 1` and the expected sufficient statistics
/// are `E[ln π] = ψ(α) - ψ(Σα)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct DirichletPrior {
    eta: DVector<f64>,
    alphas: DVector<f64>,
}

impl DirichletPrior {
    /// Create a new Dirichlet from its concentrations
    ///
    /// # Example
    ///
    /// ```rust
    /// # use beer::priors::DirichletPrior;
    /// assert!(DirichletPrior::new(vec![1.0, 2.0]).is_ok());
    /// assert!(DirichletPrior::new(vec![1.0, 0.0]).is_err());
    /// assert!(DirichletPrior::new(vec![]).is_err());
    /// ```
    pub fn new(alphas: Vec<f64>) -> Result<Self, PriorError> {
        let alphas = DVector::from_vec(alphas);
        Self::from_natural_params(alphas.add_scalar(-1.0))
    }

    /// Symmetric Dirichlet with `k` categories of concentration `alpha`
    pub fn symmetric(alpha: f64, k: usize) -> Result<Self, PriorError> {
        Self::new(vec![alpha; k])
    }

    /// Build from natural parameters, `α - 1`
    pub fn from_natural_params(eta: DVector<f64>) -> Result<Self, PriorError> {
        if eta.is_empty() {
            return Err(PriorError::Empty);
        }
        validate_natural_params(&eta, eta.len())?;
        let alphas = eta.add_scalar(1.0);
        check_positive(&alphas, |ix, alpha| PriorError::AlphaTooLow {
            ix,
            alpha,
        })?;
        Ok(DirichletPrior { eta, alphas })
    }

    /// Number of categories
    #[inline]
    pub fn k(&self) -> usize {
        self.alphas.len()
    }

    /// The concentrations, α
    #[inline]
    pub fn alphas(&self) -> &DVector<f64> {
        &self.alphas
    }

    /// E[π] = α / Σα
    pub fn expected_weights(&self) -> DVector<f64> {
        &self.alphas / self.alphas.sum()
    }
}

impl ExpFamilyPrior for DirichletPrior {
    fn natural_params(&self) -> &DVector<f64> {
        &self.eta
    }

    fn set_natural_params(&mut self, eta: DVector<f64>) -> Result<(), PriorError> {
        validate_natural_params(&eta, self.eta.len())?;
        *self = Self::from_natural_params(eta)?;
        Ok(())
    }

    fn log_norm(&self) -> f64 {
        self.alphas.iter().map(|&a| ln_gamma(a)).sum::<f64>()
            - ln_gamma(self.alphas.sum())
    }

    fn grad_lognorm(&self) -> DVector<f64> {
        let psi_sum = digamma(self.alphas.sum());
        self.alphas.map(|a| digamma(a) - psi_sum)
    }
}

impl From<&DirichletPrior> for String {
    fn from(dir: &DirichletPrior) -> String {
        format!("Dir(α: {})", vec_to_string(dir.alphas.as_slice(), 5))
    }
}

impl_display!(DirichletPrior);
