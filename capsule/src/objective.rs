use crate::params::ParameterStore;

/// `Σ_families [log q(x) + log p(x)]` at the current means
///
/// Added to the held-out log-likelihood as the objective proxy of the
/// convergence log.
pub fn variational_terms(store: &ParameterStore) -> f64 {
    store
        .enabled()
        .into_iter()
        .map(|(name, param)| {
            let log_q = param.log_q();
            let log_p = param.log_prior();
            log::debug!("{}: log q = {:.4}, log p = {:.4}", name, log_q, log_p);
            log_q + log_p
        })
        .sum()
}

/// Held-out log-likelihood plus [`variational_terms`]
pub fn objective_proxy(store: &ParameterStore, log_likelihood: f64) -> f64 {
    log_likelihood + variational_terms(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CapsuleOptions, ModelMode};
    use approx::assert_abs_diff_eq;
    use matrix_param::density::{log_gamma_density, GammaArg};
    use matrix_param::traits::Inference;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn only_enabled_families_contribute() -> anyhow::Result<()> {
        let opts = CapsuleOptions {
            mode: ModelMode::EntityOnly,
            k: 2,
            ..Default::default()
        };
        let mut store = ParameterStore::new(&opts, (3, 4, 5))?;
        store.initialize(&mut SmallRng::seed_from_u64(1));

        let (a, b) = (opts.a_phi, opts.b_phi);
        let phi = store.entity_topic.posterior_mean().view();
        // with reset statistics, q and p coincide
        let phi_part = 2.0 * log_gamma_density(phi, GammaArg::Scalar(a), GammaArg::Scalar(b));
        let theta = store.topic_term.posterior_mean().view();
        let theta_part = 2.0
            * log_gamma_density(
                theta,
                GammaArg::Scalar(opts.a_theta),
                GammaArg::Scalar(opts.b_theta),
            );

        assert_abs_diff_eq!(variational_terms(&store), phi_part + theta_part, epsilon = 1e-9);
        assert_abs_diff_eq!(
            objective_proxy(&store, -3.0),
            phi_part + theta_part - 3.0,
            epsilon = 1e-9
        );
        Ok(())
    }
}
