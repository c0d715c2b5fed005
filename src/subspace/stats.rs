//! Statistics initialization before a subspace takes over the unit priors
//!
//! Once the priors are produced by a subspace, each posterior is rebuilt as
//! `prior + stats`. These functions set the statistics so that the rebuilt
//! posteriors keep what the units learned so far.
use nalgebra::DVector;

use super::SubspaceError;
use crate::model::Mixture;

/// Set every parameter's statistics to `post.η - prior.η`
pub fn init_param_stats(emissions: &mut [Mixture]) {
    for mixture in emissions.iter_mut() {
        mixture.with_parameters_mut(|weights, components| {
            weights.init_stats_from_posterior();
            for comp in components.iter_mut() {
                comp.parameter_mut().init_stats_from_posterior();
            }
        });
    }
}

/// Spread the unit's total weight count evenly over its components.
///
/// With `C` the count of the unit, every component of every state gets
/// `C / (n_states * n_components)`, so that each state holds `C / n_states`
/// and the unit keeps `C`.
pub fn init_weights_stats(unit: &mut [Mixture]) -> Result<(), SubspaceError> {
    let total: f64 = unit
        .iter()
        .map(|m| m.weights_parameter().stats().sum())
        .sum();
    let n_states = unit.len() as f64;
    for mixture in unit.iter_mut() {
        let k = mixture.n_components();
        let count = total / (n_states * k as f64);
        mixture.with_parameters_mut(|weights, _| {
            weights.set_stats(DVector::from_element(k, count))
        })?;
    }
    Ok(())
}

/// Give every component of `state` the average of the components' statistics
/// weighted by the expected mixture weights
pub fn init_means_precisions_stats(state: &mut Mixture) -> Result<(), SubspaceError> {
    let weights = state.weights_parameter().posterior().expected_weights();
    let mut avg = DVector::zeros(state.stats_dim());
    for (w, comp) in weights.iter().zip(state.components()) {
        avg += comp.parameter().stats() * *w;
    }
    state.with_parameters_mut(|_, components| {
        components
            .iter_mut()
            .try_for_each(|comp| comp.parameter_mut().set_stats(avg.clone()))
    })?;
    Ok(())
}

/// Run the three initializations over the units of `emissions`, each made
/// of `n_states` consecutive mixtures
pub fn init_unit_stats(
    emissions: &mut [Mixture],
    n_states: usize,
) -> Result<(), SubspaceError> {
    init_param_stats(emissions);
    for unit in emissions.chunks_mut(n_states.max(1)) {
        init_weights_stats(unit)?;
        for state in unit.iter_mut() {
            init_means_precisions_stats(state)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CovarianceKind, Normal};
    use crate::traits::ExpFamilyPrior;
    use nalgebra::DMatrix;

    const TOL: f64 = 1E-10;

    fn trained_unit(n_components: usize) -> Vec<Mixture> {
        let var = DVector::from_element(2, 1.0);
        let data = DMatrix::from_row_slice(
            4,
            2,
            &[-1.0, 0.5, -0.8, 0.2, 1.2, -0.3, 0.9, 0.1],
        );
        (0..3)
            .map(|s| {
                let mut mixture = Mixture::create(n_components, 1.0, |k| {
                    let mean = DVector::from_element(2, k as f64 - 1.0 + s as f64);
                    Normal::create(&mean, &var, 1.0, CovarianceKind::Diagonal)
                })
                .unwrap();
                let (_, stats) = mixture.exp_llh_accumulate(&data).unwrap();
                mixture.natural_grad_update(&stats, 1.0, 0.5).unwrap();
                mixture
            })
            .collect()
    }

    #[test]
    fn param_stats_explain_the_posterior() {
        let mut unit = trained_unit(2);
        init_param_stats(&mut unit);
        for mixture in unit.iter() {
            let w = mixture.weights_parameter();
            let rebuilt = w.prior().natural_params() + w.stats();
            assert::close(
                rebuilt.as_slice().to_vec(),
                w.posterior().natural_params().as_slice().to_vec(),
                TOL,
            );
        }
    }

    #[test]
    fn weights_stats_with_three_components_sum_to_the_unit_count() {
        let mut unit = trained_unit(3);
        init_param_stats(&mut unit);
        let total: f64 = unit
            .iter()
            .map(|m| m.weights_parameter().stats().sum())
            .sum();
        init_weights_stats(&mut unit).unwrap();
        let new_total: f64 = unit
            .iter()
            .map(|m| m.weights_parameter().stats().sum())
            .sum();
        assert::close(new_total, total, TOL);
        for mixture in unit.iter() {
            let stats = mixture.weights_parameter().stats();
            assert::close(stats.sum(), total / 3.0, TOL);
            assert::close(stats[0], total / 9.0, TOL);
        }
    }

    #[test]
    fn means_precisions_stats_are_shared() {
        let mut unit = trained_unit(2);
        init_param_stats(&mut unit);
        let state = &mut unit[0];
        let w = state.weights_parameter().posterior().expected_weights();
        let expected = state.components()[0].parameter().stats() * w[0]
            + state.components()[1].parameter().stats() * w[1];
        init_means_precisions_stats(state).unwrap();
        for comp in state.components() {
            assert::close(
                comp.parameter().stats().as_slice().to_vec(),
                expected.as_slice().to_vec(),
                TOL,
            );
        }
    }
}
