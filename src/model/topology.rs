//! Left-to-right state graphs of the HMM units
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use std::fmt;

use crate::config::ArcConfig;

/// Transition structure of a unit.
///
/// State 0 is the non-emitting start state and the largest state id is the
/// non-emitting final state; every state in between emits. The outgoing
/// probabilities of each state are normalized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Topology {
    /// Number of emitting states
    n_states: usize,
    /// start -> emitting state
    init: DVector<f64>,
    /// emitting state -> emitting state
    trans: DMatrix<f64>,
    /// emitting state -> final
    exit: DVector<f64>,
}

/// Log-domain transitions between emitting states
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Transitions {
    pub log_init: DVector<f64>,
    pub log_trans: DMatrix<f64>,
    pub log_final: DVector<f64>,
}

impl Transitions {
    #[inline]
    pub fn n_states(&self) -> usize {
        self.log_init.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum TopologyError {
    /// The topology has no arcs
    NoArcs,
    /// The topology has no emitting state
    NoEmittingStates,
    /// A transition probability is negative or not finite
    InvalidProbability { start: usize, end: usize, prob: f64 },
    /// A non-final state has no outgoing probability mass
    NoOutgoingArcs { state: usize },
    /// An arc ends in the start state
    ArcIntoStart { start: usize },
    /// An arc leaves the final state
    ArcFromFinal { end: usize },
    /// An arc skips every emitting state
    StartToFinal,
}

impl Topology {
    /// Build the topology from its arcs
    ///
    /// # Example
    ///
    /// ```
    /// use beer::config::ArcConfig;
    /// use beer::model::Topology;
    ///
    /// let arcs = [
    ///     ArcConfig::new(0, 1, 1.0),
    ///     ArcConfig::new(1, 1, 0.5),
    ///     ArcConfig::new(1, 2, 0.5),
    ///     ArcConfig::new(2, 2, 0.5),
    ///     ArcConfig::new(2, 3, 0.5),
    /// ];
    /// let topo = Topology::from_arcs(&arcs).unwrap();
    /// assert_eq!(topo.n_states(), 2);
    /// ```
    pub fn from_arcs(arcs: &[ArcConfig]) -> Result<Self, TopologyError> {
        let final_id = arcs
            .iter()
            .map(|arc| arc.end_id)
            .max()
            .ok_or(TopologyError::NoArcs)?;
        if final_id < 2 {
            return Err(TopologyError::NoEmittingStates);
        }
        let n_states = final_id - 1;

        // dense (start + emitting) x (emitting + final) weights
        let mut weights = DMatrix::zeros(final_id, final_id);
        for arc in arcs {
            let (start, end, prob) = (arc.start_id, arc.end_id, arc.trans_prob);
            if !prob.is_finite() || prob < 0.0 {
                return Err(TopologyError::InvalidProbability { start, end, prob });
            }
            if end == 0 {
                return Err(TopologyError::ArcIntoStart { start });
            }
            if start >= final_id {
                return Err(TopologyError::ArcFromFinal { end });
            }
            if start == 0 && end == final_id {
                return Err(TopologyError::StartToFinal);
            }
            weights[(start, end - 1)] += prob;
        }
        for (state, mut row) in weights.row_iter_mut().enumerate() {
            let total = row.sum();
            if total <= 0.0 {
                return Err(TopologyError::NoOutgoingArcs { state });
            }
            row /= total;
        }

        Ok(Topology {
            n_states,
            init: weights.row(0).columns(0, n_states).transpose(),
            trans: weights.view((1, 0), (n_states, n_states)).into_owned(),
            exit: weights.column(n_states).rows(1, n_states).into_owned(),
        })
    }

    /// Number of emitting states
    #[inline]
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Probabilities of entering each emitting state from the start state
    #[inline]
    pub fn init(&self) -> &DVector<f64> {
        &self.init
    }

    /// Transition probabilities between emitting states
    #[inline]
    pub fn trans(&self) -> &DMatrix<f64> {
        &self.trans
    }

    /// Probabilities of leaving the unit from each emitting state
    #[inline]
    pub fn exit(&self) -> &DVector<f64> {
        &self.exit
    }

    /// The transitions in the log domain
    pub fn log_transitions(&self) -> Transitions {
        Transitions {
            log_init: self.init.map(f64::ln),
            log_trans: self.trans.map(f64::ln),
            log_final: self.exit.map(f64::ln),
        }
    }
}

impl std::error::Error for TopologyError {}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoArcs => write!(f, "topology has no arcs"),
            Self::NoEmittingStates => {
                write!(f, "topology has no emitting state")
            }
            Self::InvalidProbability { start, end, prob } => write!(
                f,
                "invalid probability {prob} on arc {start} -> {end}"
            ),
            Self::NoOutgoingArcs { state } => {
                write!(f, "state {state} has no outgoing arcs")
            }
            Self::ArcIntoStart { start } => {
                write!(f, "arc from state {start} ends in the start state")
            }
            Self::ArcFromFinal { end } => {
                write!(f, "arc to state {end} leaves the final state")
            }
            Self::StartToFinal => {
                write!(f, "arc from the start state to the final state")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-12;

    fn three_state_arcs() -> Vec<ArcConfig> {
        vec![
            ArcConfig::new(0, 1, 1.0),
            ArcConfig::new(1, 1, 0.5),
            ArcConfig::new(1, 2, 0.5),
            ArcConfig::new(2, 2, 0.5),
            ArcConfig::new(2, 3, 0.5),
            ArcConfig::new(3, 3, 0.5),
            ArcConfig::new(3, 4, 0.5),
        ]
    }

    #[test]
    fn three_state_left_to_right() {
        let topo = Topology::from_arcs(&three_state_arcs()).unwrap();
        assert_eq!(topo.n_states(), 3);
        assert_eq!(topo.init().as_slice(), &[1.0, 0.0, 0.0]);
        assert::close(topo.trans()[(0, 1)], 0.5, TOL);
        assert::close(topo.trans()[(1, 0)], 0.0, TOL);
        assert_eq!(topo.exit().as_slice(), &[0.0, 0.0, 0.5]);
    }

    #[test]
    fn outgoing_probabilities_are_normalized() {
        let arcs = vec![
            ArcConfig::new(0, 1, 2.0),
            ArcConfig::new(1, 1, 3.0),
            ArcConfig::new(1, 2, 1.0),
        ];
        let topo = Topology::from_arcs(&arcs).unwrap();
        assert::close(topo.init()[0], 1.0, TOL);
        assert::close(topo.trans()[(0, 0)], 0.75, TOL);
        assert::close(topo.exit()[0], 0.25, TOL);
    }

    #[test]
    fn invalid_topologies() {
        assert_eq!(Topology::from_arcs(&[]).unwrap_err(), TopologyError::NoArcs);
        assert_eq!(
            Topology::from_arcs(&[ArcConfig::new(0, 1, 1.0)]).unwrap_err(),
            TopologyError::NoEmittingStates
        );
        let mut arcs = three_state_arcs();
        arcs[1] = ArcConfig::new(1, 1, -0.5);
        assert!(matches!(
            Topology::from_arcs(&arcs),
            Err(TopologyError::InvalidProbability { .. })
        ));
        let mut arcs = three_state_arcs();
        arcs.remove(4);
        arcs.remove(3);
        assert_eq!(
            Topology::from_arcs(&arcs).unwrap_err(),
            TopologyError::NoOutgoingArcs { state: 2 }
        );
        let mut arcs = three_state_arcs();
        arcs.push(ArcConfig::new(2, 0, 0.1));
        assert_eq!(
            Topology::from_arcs(&arcs).unwrap_err(),
            TopologyError::ArcIntoStart { start: 2 }
        );
    }

    #[test]
    fn log_transitions_of_forbidden_moves_are_neg_infinity() {
        let topo = Topology::from_arcs(&three_state_arcs()).unwrap();
        let trans = topo.log_transitions();
        assert_eq!(trans.n_states(), 3);
        assert_eq!(trans.log_trans[(2, 0)], f64::NEG_INFINITY);
        assert::close(trans.log_final[2], 0.5_f64.ln(), TOL);
    }
}
