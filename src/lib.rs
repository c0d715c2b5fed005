//! Bayesian models for acoustic unit discovery.
//!
//! The crate is organized leaf-first:
//!
//! - [`dist`]: Normal densities in standard parameterization, each an
//!   exponential family.
//! - [`priors`]: conjugate priors held in natural-parameter form.
//! - [`model`]: Bayesian parameters, Normal models, mixtures, HMMs and the
//!   phone loop, all trained by natural-gradient updates.
//! - [`subspace`]: the generalized subspace model (GSM) tying many unit
//!   models to a shared low-dimensional latent space.
//! - [`config`]: unit-group configuration.
//!
//! # Example
//!
//! Fit a two-component mixture with a few natural-gradient steps.
//!
//! ```
//! use beer::model::{CovarianceKind, Mixture, Normal};
//! use nalgebra::{DMatrix, DVector};
//!
//! let var = DVector::from_element(1, 1.0);
//!
//! let mut mixture = Mixture::create(2, 1.0, |k| {
//!     let m = DVector::from_element(1, if k == 0 { -1.0 } else { 1.0 });
//!     Normal::create(&m, &var, 1.0, CovarianceKind::Diagonal)
//! })
//! .unwrap();
//!
//! let data = DMatrix::from_column_slice(4, 1, &[-2.1, -1.9, 2.0, 2.2]);
//! for _ in 0..10 {
//!     let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
//!     mixture.natural_grad_update(&stats, 1.0, 1.0).unwrap();
//! }
//!
//! let weights = mixture.weights();
//! assert!((weights.sum() - 1.0).abs() < 1E-12);
//! ```
#![warn(clippy::all)]
#![allow(clippy::many_single_char_names)]

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

pub mod config;
pub mod consts;
pub mod dist;
pub mod misc;
pub mod model;
pub mod prelude;
pub mod priors;
pub mod subspace;
pub mod traits;

#[cfg(test)]
mod test;

#[macro_export]
macro_rules! impl_display {
    ($kind: ty) => {
        impl ::std::fmt::Display for $kind {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", String::from(self))
            }
        }
    };
}
