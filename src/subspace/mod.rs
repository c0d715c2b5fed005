//! Generalized subspace model
//!
//! Every unit of a phone-loop group is summarized by its pdf vector, the
//! concatenation of its parameters in a [`PdfLayout`]. The [`Gsm`] ties the
//! pdf vectors to low-dimensional unit embeddings through an affine
//! projection, so that the units are trained in a shared subspace.
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::dist::{NormalFull, NormalFullError};
use crate::model::ParameterError;
use crate::priors::PriorError;

mod gsm;
mod layout;
mod stats;

pub use gsm::{Gsm, GsmStats};
pub use layout::{
    dirichlet_from_pdfvec, normal_pdfvec, normal_prior_from_pdfvec,
    weights_pdfvec, PdfLayout, Slot, SlotKind,
};
pub use stats::{
    init_means_precisions_stats, init_param_stats, init_unit_stats,
    init_weights_stats,
};

/// Latent posteriors of the units of a group
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct UnitLatentPosteriors {
    pub posteriors: Vec<NormalFull>,
    pub n_units: usize,
    pub n_states: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum SubspaceError {
    /// A unit must have at least one state
    NoStates,
    /// The emissions are not `n_units` runs of `n_states` mixtures
    UnitStateMismatch {
        n_emissions: usize,
        n_units: usize,
        n_states: usize,
    },
    /// A unit's parameters do not follow the shared layout
    LayoutMismatch { unit: usize },
    /// The latent space must have at least one dimension
    LatentDimZero,
    /// The latent prior does not match the latent dimension
    LatentPriorDimension { expected: usize, found: usize },
    /// A pdf vector has the wrong length
    PdfVecDimension { expected: usize, found: usize },
    /// One latent posterior is needed per pdf vector
    PosteriorCount { expected: usize, found: usize },
    Latent(NormalFullError),
    Parameter(ParameterError),
    Prior(PriorError),
}

impl From<NormalFullError> for SubspaceError {
    fn from(err: NormalFullError) -> Self {
        SubspaceError::Latent(err)
    }
}

impl From<ParameterError> for SubspaceError {
    fn from(err: ParameterError) -> Self {
        SubspaceError::Parameter(err)
    }
}

impl From<PriorError> for SubspaceError {
    fn from(err: PriorError) -> Self {
        SubspaceError::Prior(err)
    }
}

impl std::error::Error for SubspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Latent(err) => Some(err),
            Self::Parameter(err) => Some(err),
            Self::Prior(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for SubspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStates => write!(f, "unit has no state"),
            Self::UnitStateMismatch {
                n_emissions,
                n_units,
                n_states,
            } => write!(
                f,
                "{n_units} units of {n_states} states do not match \
                {n_emissions} emissions"
            ),
            Self::LayoutMismatch { unit } => write!(
                f,
                "parameters of unit {unit} do not match the shared layout"
            ),
            Self::LatentDimZero => {
                write!(f, "latent dimension must be at least one")
            }
            Self::LatentPriorDimension { expected, found } => write!(
                f,
                "latent prior has dimension {found}, expected {expected}"
            ),
            Self::PdfVecDimension { expected, found } => write!(
                f,
                "pdf vector has length {found}, expected {expected}"
            ),
            Self::PosteriorCount { expected, found } => write!(
                f,
                "{found} latent posteriors given for {expected} units"
            ),
            Self::Latent(err) => write!(f, "{err}"),
            Self::Parameter(err) => write!(f, "{err}"),
            Self::Prior(err) => write!(f, "{err}"),
        }
    }
}
