//! Normal densities in standard parameterization
//!
//! Every density of this module is an
//! [`ExponentialFamily`](crate::traits::ExponentialFamily): it converts to and
//! from natural parameters and evaluates log-likelihoods through a single
//! dot product with the sufficient statistics.
mod normal_diag;
mod normal_full;
mod normal_iso;

pub use normal_diag::{NormalDiag, NormalDiagError};
pub use normal_full::{NormalFull, NormalFullError, NormalFullParameters};
pub use normal_iso::{NormalIso, NormalIsoError};
