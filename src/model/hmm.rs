//! Hidden Markov models with mixture emissions
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::debug;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::ops::AddAssign;

use super::mixture::{Mixture, MixtureError, MixtureStats};
use super::topology::{Topology, Transitions};
use crate::misc::logsumexp;

/// Result of the forward-backward recursions, all in the log domain
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardBackward {
    /// N x S forward variables
    pub log_alpha: DMatrix<f64>,
    /// N x S backward variables
    pub log_beta: DMatrix<f64>,
    /// Log-likelihood of the whole sequence
    pub loglik: f64,
}

impl ForwardBackward {
    /// State posteriors; every row sums to one
    pub fn posteriors(&self) -> DMatrix<f64> {
        (&self.log_alpha + &self.log_beta).map(|x| (x - self.loglik).exp())
    }
}

/// Forward-backward over the emitting states of `trans`.
///
/// `llhs` is the N x S matrix of per-frame emission log-likelihoods.
pub fn forward_backward(
    trans: &Transitions,
    llhs: &DMatrix<f64>,
) -> Result<ForwardBackward, HmmError> {
    let (n, s) = llhs.shape();
    check_llhs(trans, llhs)?;

    let mut log_alpha = DMatrix::from_element(n, s, f64::NEG_INFINITY);
    for j in 0..s {
        log_alpha[(0, j)] = trans.log_init[j] + llhs[(0, j)];
    }
    let mut buf = vec![0.0; s];
    for t in 1..n {
        for j in 0..s {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = log_alpha[(t - 1, i)] + trans.log_trans[(i, j)];
            }
            log_alpha[(t, j)] = logsumexp(&buf) + llhs[(t, j)];
        }
    }

    let mut log_beta = DMatrix::from_element(n, s, f64::NEG_INFINITY);
    for i in 0..s {
        log_beta[(n - 1, i)] = trans.log_final[i];
    }
    for t in (0..n - 1).rev() {
        for i in 0..s {
            for (j, b) in buf.iter_mut().enumerate() {
                *b = trans.log_trans[(i, j)] + llhs[(t + 1, j)] + log_beta[(t + 1, j)];
            }
            log_beta[(t, i)] = logsumexp(&buf);
        }
    }

    let last: Vec<f64> = (0..s)
        .map(|j| log_alpha[(n - 1, j)] + trans.log_final[j])
        .collect();
    let loglik = logsumexp(&last);
    if !loglik.is_finite() {
        return Err(HmmError::ImpossibleSequence { n_frames: n });
    }
    Ok(ForwardBackward {
        log_alpha,
        log_beta,
        loglik,
    })
}

/// Most likely sequence of emitting states
pub fn viterbi(trans: &Transitions, llhs: &DMatrix<f64>) -> Result<Vec<usize>, HmmError> {
    let (n, s) = llhs.shape();
    check_llhs(trans, llhs)?;

    let mut omega = DMatrix::from_element(n, s, f64::NEG_INFINITY);
    let mut backptrs = vec![vec![0_usize; s]; n];
    for j in 0..s {
        omega[(0, j)] = trans.log_init[j] + llhs[(0, j)];
    }
    for t in 1..n {
        for j in 0..s {
            let (best, score) = argmax((0..s).map(|i| omega[(t - 1, i)] + trans.log_trans[(i, j)]));
            omega[(t, j)] = score + llhs[(t, j)];
            backptrs[t][j] = best;
        }
    }
    let (mut state, score) =
        argmax((0..s).map(|j| omega[(n - 1, j)] + trans.log_final[j]));
    if !score.is_finite() {
        return Err(HmmError::ImpossibleSequence { n_frames: n });
    }
    let mut path = vec![0; n];
    for t in (0..n).rev() {
        path[t] = state;
        state = backptrs[t][state];
    }
    Ok(path)
}

fn argmax(xs: impl Iterator<Item = f64>) -> (usize, f64) {
    xs.enumerate()
        .fold((0, f64::NEG_INFINITY), |(ix, best), (i, x)| {
            if x > best {
                (i, x)
            } else {
                (ix, best)
            }
        })
}

fn check_llhs(trans: &Transitions, llhs: &DMatrix<f64>) -> Result<(), HmmError> {
    if llhs.nrows() == 0 {
        return Err(HmmError::EmptySequence);
    }
    if llhs.ncols() != trans.n_states() {
        return Err(HmmError::StateCount {
            expected: trans.n_states(),
            found: llhs.ncols(),
        });
    }
    Ok(())
}

/// Accumulated statistics of an [`Hmm`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct HmmStats {
    /// Statistics of the emission of every state
    pub emissions: Vec<MixtureStats>,
    /// Log-likelihood of the accumulated sequences
    pub loglik: f64,
}

impl AddAssign<&HmmStats> for HmmStats {
    fn add_assign(&mut self, rhs: &HmmStats) {
        for (lhs, rhs) in self.emissions.iter_mut().zip(rhs.emissions.iter()) {
            *lhs += rhs;
        }
        self.loglik += rhs.loglik;
    }
}

/// Hidden Markov model with one [`Mixture`] emission per emitting state.
///
/// Transition probabilities are fixed by the [`Topology`]; only the
/// emissions are trained.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Hmm {
    topology: Topology,
    emissions: Vec<Mixture>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum HmmError {
    /// The sequence has no frame
    EmptySequence,
    /// The number of emissions does not match the number of states
    StateCount { expected: usize, found: usize },
    /// The sequence cannot be generated by the model
    ImpossibleSequence { n_frames: usize },
    /// Statistics for a different number of states
    StatsShape { expected: usize, found: usize },
    Mixture(MixtureError),
}

impl From<MixtureError> for HmmError {
    fn from(err: MixtureError) -> Self {
        HmmError::Mixture(err)
    }
}

impl Hmm {
    pub fn new(topology: Topology, emissions: Vec<Mixture>) -> Result<Self, HmmError> {
        if topology.n_states() != emissions.len() {
            return Err(HmmError::StateCount {
                expected: topology.n_states(),
                found: emissions.len(),
            });
        }
        Ok(Hmm {
            topology,
            emissions,
        })
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    pub fn emissions(&self) -> &[Mixture] {
        &self.emissions
    }

    #[inline]
    pub fn emissions_mut(&mut self) -> &mut [Mixture] {
        &mut self.emissions
    }

    /// N x S matrix of per-frame, per-state expected log-likelihoods
    pub fn emissions_llh(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, HmmError> {
        emissions_llh(&self.emissions, data)
    }

    pub fn forward_backward(&self, llhs: &DMatrix<f64>) -> Result<ForwardBackward, HmmError> {
        forward_backward(&self.topology.log_transitions(), llhs)
    }

    /// State posteriors of every frame of `data`
    pub fn posteriors(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, HmmError> {
        let llhs = self.emissions_llh(data)?;
        Ok(self.forward_backward(&llhs)?.posteriors())
    }

    pub fn viterbi(&self, llhs: &DMatrix<f64>) -> Result<Vec<usize>, HmmError> {
        viterbi(&self.topology.log_transitions(), llhs)
    }

    /// Log-likelihood of the sequence
    pub fn exp_llh(&self, data: &DMatrix<f64>) -> Result<f64, HmmError> {
        let llhs = self.emissions_llh(data)?;
        Ok(self.forward_backward(&llhs)?.loglik)
    }

    /// Best state sequence of `data`
    pub fn decode(&self, data: &DMatrix<f64>) -> Result<Vec<usize>, HmmError> {
        let llhs = self.emissions_llh(data)?;
        self.viterbi(&llhs)
    }

    /// Statistics of every emission weighted by the state posteriors
    pub fn accumulate(&self, data: &DMatrix<f64>) -> Result<HmmStats, HmmError> {
        let llhs = self.emissions_llh(data)?;
        let fb = self.forward_backward(&llhs)?;
        let emissions = accumulate_emissions(&self.emissions, data, &fb.posteriors())?;
        Ok(HmmStats {
            emissions,
            loglik: fb.loglik,
        })
    }

    pub fn natural_grad_update(
        &mut self,
        stats: &HmmStats,
        scale: f64,
        lrate: f64,
    ) -> Result<(), HmmError> {
        update_emissions(&mut self.emissions, &stats.emissions, scale, lrate)?;
        debug!("hmm update, loglik = {:.3}", stats.loglik);
        Ok(())
    }

    pub fn kl_div_posterior_prior(&self) -> f64 {
        self.emissions
            .iter()
            .map(|m| m.kl_div_posterior_prior())
            .sum()
    }
}

pub(crate) fn emissions_llh(
    emissions: &[Mixture],
    data: &DMatrix<f64>,
) -> Result<DMatrix<f64>, HmmError> {
    let mut llhs = DMatrix::zeros(data.nrows(), emissions.len());
    for (j, mixture) in emissions.iter().enumerate() {
        llhs.set_column(j, &mixture.exp_llh(data)?);
    }
    Ok(llhs)
}

pub(crate) fn accumulate_emissions(
    emissions: &[Mixture],
    data: &DMatrix<f64>,
    posts: &DMatrix<f64>,
) -> Result<Vec<MixtureStats>, HmmError> {
    emissions
        .iter()
        .enumerate()
        .map(|(j, mixture)| {
            let weights: DVector<f64> = posts.column(j).into_owned();
            mixture
                .accumulate_weighted(data, &weights)
                .map_err(HmmError::from)
        })
        .collect()
}

/// Update every emission, or none of them if one update fails
pub(crate) fn update_emissions(
    emissions: &mut [Mixture],
    stats: &[MixtureStats],
    scale: f64,
    lrate: f64,
) -> Result<(), HmmError> {
    if stats.len() != emissions.len() {
        return Err(HmmError::StatsShape {
            expected: emissions.len(),
            found: stats.len(),
        });
    }
    let mut updated = emissions.to_vec();
    for (mixture, stats) in updated.iter_mut().zip(stats.iter()) {
        mixture.natural_grad_update(stats, scale, lrate)?;
    }
    emissions.clone_from_slice(&updated);
    Ok(())
}

impl std::error::Error for HmmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mixture(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for HmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySequence => write!(f, "sequence has no frame"),
            Self::StateCount { expected, found } => {
                write!(f, "expected {expected} states, found {found}")
            }
            Self::ImpossibleSequence { n_frames } => write!(
                f,
                "no path of {n_frames} frames reaches the final state"
            ),
            Self::StatsShape { expected, found } => write!(
                f,
                "expected statistics for {expected} states, found {found}"
            ),
            Self::Mixture(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArcConfig;
    use crate::model::{CovarianceKind, Normal};

    const TOL: f64 = 1E-9;

    fn left_to_right() -> Topology {
        Topology::from_arcs(&[
            ArcConfig::new(0, 1, 1.0),
            ArcConfig::new(1, 1, 0.5),
            ArcConfig::new(1, 2, 0.5),
            ArcConfig::new(2, 2, 0.5),
            ArcConfig::new(2, 3, 0.5),
        ])
        .unwrap()
    }

    fn hmm() -> Hmm {
        let var = DVector::from_element(1, 0.25);
        let emissions = [-2.0, 2.0]
            .iter()
            .map(|&m| {
                Mixture::create(1, 1.0, |_| {
                    Normal::create(
                        &DVector::from_element(1, m),
                        &var,
                        1.0,
                        CovarianceKind::Diagonal,
                    )
                })
                .unwrap()
            })
            .collect();
        Hmm::new(left_to_right(), emissions).unwrap()
    }

    #[test]
    fn posteriors_sum_to_one() {
        let hmm = hmm();
        let data = DMatrix::from_column_slice(5, 1, &[-2.0, -1.0, 0.0, 1.5, 2.0]);
        let posts = hmm.posteriors(&data).unwrap();
        for row in posts.row_iter() {
            assert::close(row.sum(), 1.0, TOL);
        }
    }

    #[test]
    fn first_frame_is_always_in_the_first_state() {
        let hmm = hmm();
        let data = DMatrix::from_column_slice(3, 1, &[2.0, 2.0, 2.0]);
        let posts = hmm.posteriors(&data).unwrap();
        assert::close(posts[(0, 0)], 1.0, TOL);
        assert::close(posts[(2, 1)], 1.0, TOL);
    }

    #[test]
    fn loglik_matches_brute_force() {
        let hmm = hmm();
        let data = DMatrix::from_column_slice(3, 1, &[-1.0, 0.5, 1.0]);
        let llhs = hmm.emissions_llh(&data).unwrap();
        // paths 0-0-1 and 0-1-1, each of probability 1 * 0.5 * 0.5 * 0.5
        let path = |s: [usize; 3]| {
            (0..3).map(|t| llhs[(t, s[t])]).sum::<f64>() + 3.0 * 0.5_f64.ln()
        };
        let expected = logsumexp(&[path([0, 0, 1]), path([0, 1, 1])]);
        let fb = hmm.forward_backward(&llhs).unwrap();
        assert::close(fb.loglik, expected, TOL);
    }

    #[test]
    fn viterbi_respects_topology() {
        let hmm = hmm();
        let data = DMatrix::from_column_slice(6, 1, &[-2.0, -2.0, -2.1, 2.0, 1.9, 2.0]);
        let path = hmm.decode(&data).unwrap();
        assert_eq!(path, vec![0, 0, 0, 1, 1, 1]);

        // data that would prefer the second state first still starts in 0
        let data = DMatrix::from_column_slice(2, 1, &[2.0, -2.0]);
        let path = hmm.decode(&data).unwrap();
        assert_eq!(path, vec![0, 1]);
    }

    #[test]
    fn single_frame_cannot_reach_final_state() {
        let hmm = hmm();
        let data = DMatrix::from_element(1, 1, 0.0);
        assert_eq!(
            hmm.exp_llh(&data).unwrap_err(),
            HmmError::ImpossibleSequence { n_frames: 1 }
        );
    }

    #[test]
    fn empty_sequence_is_an_error() {
        let hmm = hmm();
        assert_eq!(
            hmm.exp_llh(&DMatrix::zeros(0, 1)).unwrap_err(),
            HmmError::EmptySequence
        );
    }

    #[test]
    fn accumulate_and_update() {
        let mut hmm = hmm();
        let data = DMatrix::from_column_slice(4, 1, &[-2.0, -1.8, 2.2, 2.0]);
        let mut stats = hmm.accumulate(&data).unwrap();
        let frames: f64 = stats.emissions.iter().map(|s| s.weights.sum()).sum();
        assert::close(frames, 4.0, TOL);
        let copy = stats.clone();
        stats += &copy;
        assert::close(stats.loglik, 2.0 * copy.loglik, TOL);

        let before = hmm.exp_llh(&data).unwrap();
        hmm.natural_grad_update(&copy, 1.0, 1.0).unwrap();
        assert!(hmm.exp_llh(&data).unwrap() > before);
        assert!(hmm.kl_div_posterior_prior() > 0.0);
    }

    #[test]
    fn failed_update_leaves_every_emission_untouched() {
        let mut hmm = hmm();
        let data = DMatrix::from_column_slice(4, 1, &[-2.0, -1.8, 2.2, 2.0]);
        let mut stats = hmm.accumulate(&data).unwrap();
        stats.emissions[1].components[(0, 0)] = f64::NAN;
        let before = hmm.clone();
        assert!(matches!(
            hmm.natural_grad_update(&stats, 1.0, 1.0),
            Err(HmmError::Mixture(_))
        ));
        assert_eq!(hmm, before);
    }
}
