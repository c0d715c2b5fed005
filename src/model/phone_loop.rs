//! Phone loop: every unit of every group can follow any other unit
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use itertools::Itertools;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;
use std::ops::AddAssign;

use super::hmm::{
    accumulate_emissions, emissions_llh, forward_backward, update_emissions, viterbi,
    ForwardBackward, HmmError,
};
use super::mixture::{Mixture, MixtureError, MixtureStats};
use super::normal::{Normal, NormalError};
use super::parameter::{BayesianParameter, ParameterError};
use super::topology::{Topology, TopologyError, Transitions};
use crate::config::{DataStats, PhoneLoopConfig};
use crate::misc::logsumexp;
use crate::priors::{DirichletPrior, PriorError};
use crate::traits::ExpFamilyPrior;

/// A group of units sharing a topology
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct UnitGroup {
    pub name: String,
    pub n_units: usize,
    pub topology: Topology,
    /// Index of the first unit of the group among all the units
    pub first_unit: usize,
    /// Index of the first emission of the group
    pub first_emission: usize,
}

impl UnitGroup {
    /// Number of emitting states per unit
    #[inline]
    pub fn n_states(&self) -> usize {
        self.topology.n_states()
    }

    #[inline]
    pub fn n_emissions(&self) -> usize {
        self.n_units * self.n_states()
    }
}

/// Accumulated statistics of a [`PhoneLoop`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct PhoneLoopStats {
    pub emissions: Vec<MixtureStats>,
    /// Expected number of times each unit is entered
    pub units: DVector<f64>,
    pub loglik: f64,
}

impl AddAssign<&PhoneLoopStats> for PhoneLoopStats {
    fn add_assign(&mut self, rhs: &PhoneLoopStats) {
        for (lhs, rhs) in self.emissions.iter_mut().zip(rhs.emissions.iter()) {
            *lhs += rhs;
        }
        self.units += &rhs.units;
        self.loglik += rhs.loglik;
    }
}

/// HMM looping over units.
///
/// Emission `group.first_emission + unit * n_states + state` models the
/// `state`-th state of `unit` in `group`. A unit is entered with the
/// probability given by the expected unit weights, and any unit can follow
/// the exit of any unit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(try_from = "PhoneLoopParameters"))]
#[cfg_attr(feature = "serde1", serde(into = "PhoneLoopParameters"))]
pub struct PhoneLoop {
    groups: Vec<UnitGroup>,
    emissions: Vec<Mixture>,
    unit_weights: BayesianParameter<DirichletPrior>,
    transitions: Transitions,
}

/// Serialized form of a [`PhoneLoop`], without the transition cache
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct PhoneLoopParameters {
    pub groups: Vec<UnitGroup>,
    pub emissions: Vec<Mixture>,
    pub unit_weights: BayesianParameter<DirichletPrior>,
}

impl TryFrom<PhoneLoopParameters> for PhoneLoop {
    type Error = PhoneLoopError;

    fn try_from(params: PhoneLoopParameters) -> Result<Self, Self::Error> {
        PhoneLoop::new(params.groups, params.emissions, params.unit_weights)
    }
}

impl From<PhoneLoop> for PhoneLoopParameters {
    fn from(ploop: PhoneLoop) -> Self {
        PhoneLoopParameters {
            groups: ploop.groups,
            emissions: ploop.emissions,
            unit_weights: ploop.unit_weights,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum PhoneLoopError {
    /// The loop has no unit
    NoUnits,
    /// Emissions do not match the groups
    EmissionCount { expected: usize, found: usize },
    /// The unit weights do not match the groups
    UnitCount { expected: usize, found: usize },
    /// No group with that index
    NoSuchGroup { idx: usize },
    /// The data statistics do not have matching mean and variance
    DataStatsDimension { n_mean: usize, n_var: usize },
    Topology(TopologyError),
    Normal(NormalError),
    Mixture(MixtureError),
    Hmm(HmmError),
    Parameter(ParameterError),
    Prior(PriorError),
}

macro_rules! impl_from_error {
    ($variant: ident, $err: ty) => {
        impl From<$err> for PhoneLoopError {
            fn from(err: $err) -> Self {
                PhoneLoopError::$variant(err)
            }
        }
    };
}

impl_from_error!(Topology, TopologyError);
impl_from_error!(Normal, NormalError);
impl_from_error!(Mixture, MixtureError);
impl_from_error!(Hmm, HmmError);
impl_from_error!(Parameter, ParameterError);
impl_from_error!(Prior, PriorError);

impl PhoneLoop {
    pub fn new(
        groups: Vec<UnitGroup>,
        emissions: Vec<Mixture>,
        unit_weights: BayesianParameter<DirichletPrior>,
    ) -> Result<Self, PhoneLoopError> {
        let n_units: usize = groups.iter().map(|g| g.n_units).sum();
        if n_units == 0 {
            return Err(PhoneLoopError::NoUnits);
        }
        let n_emissions: usize = groups.iter().map(|g| g.n_emissions()).sum();
        if n_emissions != emissions.len() {
            return Err(PhoneLoopError::EmissionCount {
                expected: n_emissions,
                found: emissions.len(),
            });
        }
        if unit_weights.prior().k() != n_units {
            return Err(PhoneLoopError::UnitCount {
                expected: n_units,
                found: unit_weights.prior().k(),
            });
        }
        let mut ploop = PhoneLoop {
            groups,
            emissions,
            unit_weights,
            transitions: Transitions {
                log_init: DVector::zeros(0),
                log_trans: DMatrix::zeros(0, 0),
                log_final: DVector::zeros(0),
            },
        };
        ploop.refresh();
        Ok(ploop)
    }

    /// Create a phone loop from a configuration and global data statistics.
    ///
    /// Every Normal is centered on the data mean plus `noise_std` standard
    /// deviations of Gaussian noise, with the data variance.
    pub fn create<R: Rng>(
        config: &PhoneLoopConfig,
        data_stats: &DataStats,
        prior_strength: f64,
        noise_std: f64,
        rng: &mut R,
    ) -> Result<Self, PhoneLoopError> {
        let mean = DVector::from_column_slice(&data_stats.mean);
        let var = DVector::from_column_slice(&data_stats.var);
        if mean.len() != var.len() {
            return Err(PhoneLoopError::DataStatsDimension {
                n_mean: mean.len(),
                n_var: var.len(),
            });
        }
        let std = var.map(f64::sqrt);

        let mut groups = Vec::with_capacity(config.groups.len());
        let mut emissions = Vec::new();
        let mut first_unit = 0;
        for group_conf in config.groups.iter() {
            let topology = Topology::from_arcs(&group_conf.topology)?;
            let group = UnitGroup {
                name: group_conf.group_name.clone(),
                n_units: group_conf.n_units,
                topology,
                first_unit,
                first_emission: emissions.len(),
            };
            for _ in 0..group.n_emissions() {
                let n_comps = group_conf.n_normal_per_state;
                let means: Vec<DVector<f64>> = (0..n_comps)
                    .map(|_| {
                        let noise = DVector::from_fn(mean.len(), |_, _| {
                            rng.sample::<f64, _>(StandardNormal)
                        });
                        &mean + noise.component_mul(&std) * noise_std
                    })
                    .collect();
                let mixture = Mixture::create(n_comps, 1.0, |k| {
                    Normal::create(&means[k], &var, prior_strength, group_conf.cov_type)
                })?;
                emissions.push(mixture);
            }
            debug!(
                "group \"{}\": {} units of {} states",
                group.name,
                group.n_units,
                group.n_states()
            );
            first_unit += group.n_units;
            groups.push(group);
        }
        let unit_weights =
            BayesianParameter::from_prior(DirichletPrior::symmetric(1.0, first_unit)?);
        let ploop = PhoneLoop::new(groups, emissions, unit_weights)?;
        info!(
            "created phone loop with {} units and {} emissions",
            ploop.n_units(),
            ploop.emissions.len()
        );
        Ok(ploop)
    }

    /// Probability of ending the sequence at the loop junction, the end
    /// being chosen like one more unit
    fn end_prob(&self) -> f64 {
        1.0 / (self.n_units() as f64 + 1.0)
    }

    /// ln of the odds of looping back rather than ending at the junction
    fn ln_loop_odds(&self) -> f64 {
        let p_end = self.end_prob();
        (1.0 - p_end).ln() - p_end.ln()
    }

    /// Rebuild the dense log transitions over every emitting state.
    ///
    /// The exit probability of a unit is shared between looping back into
    /// any unit and ending the sequence, so that the outgoing probabilities
    /// of every state sum to one.
    fn refresh(&mut self) {
        let n = self.emissions.len();
        let p_end = self.end_prob();
        let (ln_loop, ln_end) = ((1.0 - p_end).ln(), p_end.ln());
        let ln_weights = self.expected_ln_unit_weights();
        let mut log_init = DVector::from_element(n, f64::NEG_INFINITY);
        let mut log_final = DVector::from_element(n, f64::NEG_INFINITY);
        let mut log_trans = DMatrix::from_element(n, n, f64::NEG_INFINITY);

        // entry probabilities shared by the start state and every exit
        for group in self.groups.iter() {
            let trans = group.topology.log_transitions();
            for u in 0..group.n_units {
                let offset = group.first_emission + u * group.n_states();
                let ln_w = ln_weights[group.first_unit + u];
                for s in 0..group.n_states() {
                    log_init[offset + s] = ln_w + trans.log_init[s];
                    log_final[offset + s] = trans.log_final[s];
                    for s2 in 0..group.n_states() {
                        log_trans[(offset + s, offset + s2)] = trans.log_trans[(s, s2)];
                    }
                }
            }
        }
        for i in 0..n {
            if log_final[i] == f64::NEG_INFINITY {
                continue;
            }
            for j in 0..n {
                let into = log_final[i] + ln_loop + log_init[j];
                log_trans[(i, j)] = logsumexp(&[log_trans[(i, j)], into]);
            }
            log_final[i] += ln_end;
        }
        self.transitions = Transitions {
            log_init,
            log_trans,
            log_final,
        };
    }

    /// ln of the expected unit weights, normalized
    fn expected_ln_unit_weights(&self) -> DVector<f64> {
        let ln_w = self.unit_weights.expected_natural_parameters();
        let norm = logsumexp(ln_w.as_slice());
        ln_w.add_scalar(-norm)
    }

    #[inline]
    pub fn groups(&self) -> &[UnitGroup] {
        &self.groups
    }

    /// Total number of units
    pub fn n_units(&self) -> usize {
        self.groups.iter().map(|g| g.n_units).sum()
    }

    #[inline]
    pub fn emissions(&self) -> &[Mixture] {
        &self.emissions
    }

    #[inline]
    pub fn unit_weights_parameter(&self) -> &BayesianParameter<DirichletPrior> {
        &self.unit_weights
    }

    /// Expected value of the unit weights
    pub fn unit_weights(&self) -> DVector<f64> {
        self.expected_ln_unit_weights().map(f64::exp)
    }

    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    fn group(&self, idx: usize) -> Result<&UnitGroup, PhoneLoopError> {
        self.groups.get(idx).ok_or(PhoneLoopError::NoSuchGroup { idx })
    }

    /// Emissions of every unit of the group `idx`
    pub fn group_emissions(&self, idx: usize) -> Result<&[Mixture], PhoneLoopError> {
        let group = self.group(idx)?;
        let start = group.first_emission;
        Ok(&self.emissions[start..start + group.n_emissions()])
    }

    /// Mutable emissions of every unit of the group `idx`
    pub fn group_emissions_mut(&mut self, idx: usize) -> Result<&mut [Mixture], PhoneLoopError> {
        let group = self.group(idx)?;
        let (start, len) = (group.first_emission, group.n_emissions());
        Ok(&mut self.emissions[start..start + len])
    }

    /// Unit (across all the groups) of every emission
    pub fn emission_units(&self) -> Vec<usize> {
        self.groups
            .iter()
            .flat_map(|g| {
                (0..g.n_emissions()).map(move |e| g.first_unit + e / g.n_states())
            })
            .collect()
    }

    pub fn emissions_llh(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, PhoneLoopError> {
        Ok(emissions_llh(&self.emissions, data)?)
    }

    pub fn forward_backward(&self, llhs: &DMatrix<f64>) -> Result<ForwardBackward, PhoneLoopError> {
        Ok(forward_backward(&self.transitions, llhs)?)
    }

    pub fn posteriors(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, PhoneLoopError> {
        let llhs = self.emissions_llh(data)?;
        Ok(self.forward_backward(&llhs)?.posteriors())
    }

    pub fn viterbi(&self, llhs: &DMatrix<f64>) -> Result<Vec<usize>, PhoneLoopError> {
        Ok(viterbi(&self.transitions, llhs)?)
    }

    pub fn exp_llh(&self, data: &DMatrix<f64>) -> Result<f64, PhoneLoopError> {
        let llhs = self.emissions_llh(data)?;
        Ok(self.forward_backward(&llhs)?.loglik)
    }

    /// Best unit of every frame
    pub fn decode(&self, data: &DMatrix<f64>) -> Result<Vec<usize>, PhoneLoopError> {
        let llhs = self.emissions_llh(data)?;
        let units = self.emission_units();
        Ok(self.viterbi(&llhs)?.into_iter().map(|s| units[s]).collect())
    }

    /// Runs of frames assigned to the same unit as `(unit, n_frames)`
    pub fn segments(
        &self,
        data: &DMatrix<f64>,
    ) -> Result<Vec<(usize, usize)>, PhoneLoopError> {
        Ok(self
            .decode(data)?
            .into_iter()
            .dedup_with_count()
            .map(|(n, unit)| (unit, n))
            .collect())
    }

    /// Expected number of entries in every unit
    fn unit_entry_counts(&self, llhs: &DMatrix<f64>, fb: &ForwardBackward) -> DVector<f64> {
        let n_frames = llhs.nrows();
        let n = self.emissions.len();
        let trans = &self.transitions;
        let units = self.emission_units();
        let mut counts = DVector::zeros(self.n_units());
        let ln_loop_odds = self.ln_loop_odds();

        let mut exit_buf = vec![0.0; n];
        for t in 0..n_frames {
            // log probability of standing at the loop junction before frame t
            let junction = if t == 0 {
                0.0
            } else {
                for (i, b) in exit_buf.iter_mut().enumerate() {
                    *b = fb.log_alpha[(t - 1, i)] + trans.log_final[i] + ln_loop_odds;
                }
                logsumexp(&exit_buf)
            };
            if junction == f64::NEG_INFINITY {
                continue;
            }
            for j in 0..n {
                let u = units[j];
                // ln π_u is part of log_init
                let entry = junction + trans.log_init[j] + llhs[(t, j)] + fb.log_beta[(t, j)]
                    - fb.loglik;
                if entry > f64::NEG_INFINITY {
                    counts[u] += entry.exp();
                }
            }
        }
        debug!("expected unit entries: {:.3}", counts.sum());
        counts
    }

    /// Statistics of every emission and of the unit weights
    pub fn accumulate(&self, data: &DMatrix<f64>) -> Result<PhoneLoopStats, PhoneLoopError> {
        let llhs = self.emissions_llh(data)?;
        let fb = self.forward_backward(&llhs)?;
        let emissions = accumulate_emissions(&self.emissions, data, &fb.posteriors())?;
        let units = self.unit_entry_counts(&llhs, &fb);
        Ok(PhoneLoopStats {
            emissions,
            units,
            loglik: fb.loglik,
        })
    }

    pub fn natural_grad_update(
        &mut self,
        stats: &PhoneLoopStats,
        scale: f64,
        lrate: f64,
    ) -> Result<(), PhoneLoopError> {
        let res = self.update_parameters(stats, scale, lrate);
        self.refresh();
        debug!(
            "phone loop update, loglik = {:.3}, kl = {:.4}",
            stats.loglik,
            self.kl_div_posterior_prior()
        );
        res
    }

    fn update_parameters(
        &mut self,
        stats: &PhoneLoopStats,
        scale: f64,
        lrate: f64,
    ) -> Result<(), PhoneLoopError> {
        let mut unit_weights = self.unit_weights.clone();
        unit_weights.natural_grad_update(&stats.units, scale, lrate)?;
        update_emissions(&mut self.emissions, &stats.emissions, scale, lrate)?;
        self.unit_weights = unit_weights;
        Ok(())
    }

    pub fn kl_div_posterior_prior(&self) -> f64 {
        self.unit_weights.kl_div_posterior_prior()
            + self
                .emissions
                .iter()
                .map(|m| m.kl_div_posterior_prior())
                .sum::<f64>()
    }

    /// Replace the prior over the unit weights, keeping its statistics
    pub fn replace_unit_weights_prior(&mut self, prior: DirichletPrior) -> Result<(), PhoneLoopError> {
        if prior.dim() != self.n_units() {
            return Err(PhoneLoopError::UnitCount {
                expected: self.n_units(),
                found: prior.dim(),
            });
        }
        let res = self.unit_weights.replace_prior(prior);
        self.refresh();
        Ok(res?)
    }
}

impl std::error::Error for PhoneLoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Topology(err) => Some(err),
            Self::Normal(err) => Some(err),
            Self::Mixture(err) => Some(err),
            Self::Hmm(err) => Some(err),
            Self::Parameter(err) => Some(err),
            Self::Prior(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for PhoneLoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUnits => write!(f, "phone loop has no unit"),
            Self::EmissionCount { expected, found } => {
                write!(f, "expected {expected} emissions, found {found}")
            }
            Self::UnitCount { expected, found } => {
                write!(f, "expected {expected} unit weights, found {found}")
            }
            Self::NoSuchGroup { idx } => write!(f, "no unit group at index {idx}"),
            Self::DataStatsDimension { n_mean, n_var } => write!(
                f,
                "data statistics have {n_mean} means but {n_var} variances"
            ),
            Self::Topology(err) => write!(f, "{err}"),
            Self::Normal(err) => write!(f, "{err}"),
            Self::Mixture(err) => write!(f, "{err}"),
            Self::Hmm(err) => write!(f, "{err}"),
            Self::Parameter(err) => write!(f, "{err}"),
            Self::Prior(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArcConfig, UnitGroupConfig};
    use crate::model::CovarianceKind;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-9;

    fn config(n_units: usize, n_states: usize) -> PhoneLoopConfig {
        let mut topology = vec![ArcConfig::new(0, 1, 1.0)];
        for s in 1..=n_states {
            topology.push(ArcConfig::new(s, s, 0.5));
            topology.push(ArcConfig::new(s, s + 1, 0.5));
        }
        PhoneLoopConfig {
            groups: vec![
                UnitGroupConfig {
                    group_name: "speech-unit".into(),
                    n_units,
                    n_normal_per_state: 2,
                    cov_type: CovarianceKind::Diagonal,
                    topology: topology.clone(),
                },
                UnitGroupConfig {
                    group_name: "non-speech-unit".into(),
                    n_units: 1,
                    n_normal_per_state: 1,
                    cov_type: CovarianceKind::Diagonal,
                    topology,
                },
            ],
        }
    }

    fn data_stats() -> DataStats {
        DataStats {
            mean: vec![0.0, 1.0],
            var: vec![1.0, 2.0],
        }
    }

    fn ploop() -> PhoneLoop {
        let mut rng = Xoshiro256Plus::seed_from_u64(17);
        PhoneLoop::create(&config(3, 2), &data_stats(), 1.0, 0.1, &mut rng).unwrap()
    }

    #[test]
    fn create_lays_out_groups() {
        let ploop = ploop();
        assert_eq!(ploop.n_units(), 4);
        assert_eq!(ploop.emissions().len(), 8);
        assert_eq!(ploop.group_emissions(0).unwrap().len(), 6);
        assert_eq!(ploop.group_emissions(1).unwrap().len(), 2);
        assert_eq!(ploop.group_emissions(0).unwrap()[0].n_components(), 2);
        assert_eq!(ploop.group_emissions(1).unwrap()[0].n_components(), 1);
        assert_eq!(ploop.emission_units(), vec![0, 0, 1, 1, 2, 2, 3, 3]);
        assert!(matches!(
            ploop.group_emissions(2),
            Err(PhoneLoopError::NoSuchGroup { idx: 2 })
        ));
    }

    #[test]
    fn create_is_deterministic_for_a_seed() {
        assert_eq!(ploop(), ploop());
    }

    #[test]
    fn transitions_are_normalized_with_the_loop() {
        let ploop = ploop();
        let trans = ploop.transitions();
        let init: f64 = trans.log_init.iter().map(|x| x.exp()).sum();
        assert::close(init, 1.0, TOL);
        // every state either moves on or ends the sequence
        for (row, ln_end) in trans.log_trans.row_iter().zip(trans.log_final.iter()) {
            let out: f64 = row.iter().map(|x| x.exp()).sum::<f64>() + ln_end.exp();
            assert::close(out, 1.0, TOL);
        }
        // non-exit states keep their unit's transitions
        assert_eq!(trans.log_final[0], f64::NEG_INFINITY);
        // 4 units, the end is chosen at the junction with probability 1/5
        assert::close(trans.log_final[1].exp(), 0.5 * 0.2, TOL);
    }

    #[test]
    fn sequence_probabilities_of_single_state_units_sum_to_one() {
        let topology = vec![
            ArcConfig::new(0, 1, 1.0),
            ArcConfig::new(1, 1, 0.5),
            ArcConfig::new(1, 2, 0.5),
        ];
        let config = PhoneLoopConfig {
            groups: vec![UnitGroupConfig {
                group_name: "unit".into(),
                n_units: 2,
                n_normal_per_state: 1,
                cov_type: CovarianceKind::Diagonal,
                topology,
            }],
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let ploop = PhoneLoop::create(&config, &data_stats(), 1.0, 0.1, &mut rng).unwrap();
        // with flat emissions the likelihood of a sequence is the probability
        // of its length, and those add up to one
        let total: f64 = (1..200)
            .map(|n| {
                let llhs = DMatrix::zeros(n, 2);
                ploop.forward_backward(&llhs).unwrap().loglik.exp()
            })
            .sum();
        assert::close(total, 1.0, 1E-9);
    }

    #[test]
    fn failed_update_leaves_the_loop_untouched() {
        let mut ploop = ploop();
        let data = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 0.1, 1.2, -0.3, 0.9, 0.2, 0.5]);
        let mut stats = ploop.accumulate(&data).unwrap();
        stats.units[2] = f64::NAN;
        let before = ploop.clone();
        assert!(ploop.natural_grad_update(&stats, 1.0, 1.0).is_err());
        assert_eq!(ploop, before);

        let mut stats = ploop.accumulate(&data).unwrap();
        stats.emissions[3].components[(0, 0)] = f64::NAN;
        assert!(ploop.natural_grad_update(&stats, 1.0, 1.0).is_err());
        assert_eq!(ploop, before);
    }

    #[test]
    fn posteriors_sum_to_one() {
        let ploop = ploop();
        let data = DMatrix::from_row_slice(5, 2, &[0.0, 1.0, 0.1, 1.2, -0.3, 0.9, 0.2, 0.5, 0.0, 1.0]);
        let posts = ploop.posteriors(&data).unwrap();
        for row in posts.row_iter() {
            assert::close(row.sum(), 1.0, TOL);
        }
    }

    #[test]
    fn entry_counts_of_a_two_frame_sequence() {
        // with two-state units, two frames fit in exactly one unit
        let ploop = ploop();
        let data = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.1, 1.2]);
        let stats = ploop.accumulate(&data).unwrap();
        assert::close(stats.units.sum(), 1.0, TOL);
    }

    #[test]
    fn training_updates_unit_weights() {
        let mut ploop = ploop();
        let data = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 0.1, 1.2, -0.3, 0.9, 0.2, 0.5]);
        let stats = ploop.accumulate(&data).unwrap();
        let before = ploop.unit_weights_parameter().posterior().clone();
        ploop.natural_grad_update(&stats, 1.0, 1.0).unwrap();
        assert_ne!(&before, ploop.unit_weights_parameter().posterior());
        assert::close(ploop.unit_weights().sum(), 1.0, TOL);
        assert!(ploop.kl_div_posterior_prior() > 0.0);
    }

    #[test]
    fn decode_returns_units() {
        let ploop = ploop();
        let data = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 0.1, 1.2, -0.3, 0.9, 0.2, 0.5]);
        let units = ploop.decode(&data).unwrap();
        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|&u| u < 4));
        // units last two frames each
        assert_eq!(units[0], units[1]);
        assert_eq!(units[2], units[3]);
    }

    #[test]
    fn segments_cover_every_frame() {
        let ploop = ploop();
        let data = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 0.1, 1.2, -0.3, 0.9, 0.2, 0.5]);
        let segments = ploop.segments(&data).unwrap();
        assert_eq!(segments.iter().map(|(_, n)| n).sum::<usize>(), 4);
        assert!(segments.windows(2).all(|w| w[0].0 != w[1].0));
    }

    #[test]
    fn mismatched_data_stats() {
        let mut rng = Xoshiro256Plus::seed_from_u64(17);
        let stats = DataStats {
            mean: vec![0.0],
            var: vec![1.0, 1.0],
        };
        assert!(matches!(
            PhoneLoop::create(&config(1, 1), &stats, 1.0, 0.1, &mut rng),
            Err(PhoneLoopError::DataStatsDimension { .. })
        ));
    }
}
