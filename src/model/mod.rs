//! Bayesian models trained by natural-gradient updates
//!
//! A [`BayesianParameter`] pairs a conjugate prior with its posterior. The
//! models of this module compose them: a [`Normal`] holds one, a
//! [`Mixture`] holds a Dirichlet over Normals, and the [`Hmm`] and
//! [`PhoneLoop`] use mixtures as their emissions.
mod hmm;
mod mixture;
mod normal;
mod parameter;
mod phone_loop;
mod topology;

pub use hmm::{forward_backward, viterbi, ForwardBackward, Hmm, HmmError, HmmStats};
pub use mixture::{Mixture, MixtureError, MixtureParameters, MixtureStats};
pub use normal::{CovarianceKind, Normal, NormalError, NormalPrior};
pub use parameter::{BayesianParameter, ParameterError};
pub use phone_loop::{
    PhoneLoop, PhoneLoopError, PhoneLoopParameters, PhoneLoopStats, UnitGroup,
};
pub use topology::{Topology, TopologyError, Transitions};
