//! Allocation of one observed count across its latent causes.
//!
//! For a count `y` of `term` in a document of `entity` on `date`:
//!
//! ```text
//! omega[k] = exp(E[log phi_k(k, entity)] + E[log theta(k, term)])
//! omega[s] = exp(E[log phi_d(s, entity)] + E[log pi(s, term)] + log f(date, s))
//!            for s in (date - window, date]
//! ```
//!
//! and `y * scale * omega / Σ omega` is added to the shape of each
//! factor pair. Responsibilities are computed after shifting by the
//! largest log-omega.

use crate::common::*;
use crate::params::ParameterStore;

/// Outcome of [`ShapeAccumulator::accumulate`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Allocation {
    /// pseudo-count mass added to each of the two factors of a cause
    Allocated(f64),
    /// every responsibility vanished; nothing was added
    Skipped,
}

/// Adds pseudo-counts of observations into the shape statistics
pub struct ShapeAccumulator {
    scale: f64,
    log_omega_topic: Vec<f64>,
    log_omega_event: Vec<f64>,
    num_skipped: usize,
}

impl ShapeAccumulator {
    /// * `scale` - 1 in batch mode, `#training docs / sample size` in SVI
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            log_omega_topic: vec![],
            log_omega_event: vec![],
            num_skipped: 0,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    /// Number of observations skipped since the last call
    pub fn take_num_skipped(&mut self) -> usize {
        std::mem::take(&mut self.num_skipped)
    }

    /// Distribute `count` of `term` in a document of `entity` on
    /// `date` over topics and event dates
    pub fn accumulate(
        &mut self,
        store: &mut ParameterStore,
        entity: usize,
        date: usize,
        term: usize,
        count: u32,
    ) -> Allocation {
        let mode = store.mode();
        self.log_omega_topic.clear();
        self.log_omega_event.clear();

        if mode.has_entity_factors() {
            let log_phi = store.entity_topic.posterior_log_mean().column(entity);
            let log_theta = store.topic_term.posterior_log_mean().column(term);
            self.log_omega_topic
                .extend(log_phi.iter().zip(log_theta.iter()).map(|(a, b)| a + b));
        }

        let events = store.decay.events_seen_from(date);
        if mode.has_event_factors() {
            let log_phi = store.entity_event.posterior_log_mean();
            let log_pi = store.event_term.posterior_log_mean();
            for s in events.clone() {
                self.log_omega_event.push(
                    log_phi[(s, entity)] + log_pi[(s, term)] + store.decay.log_weight(date, s),
                );
            }
        }

        let max_log = self
            .log_omega_topic
            .iter()
            .chain(self.log_omega_event.iter())
            .fold(f64::NEG_INFINITY, |m, &x| m.max(x));

        if !max_log.is_finite() {
            self.num_skipped += 1;
            return Allocation::Skipped;
        }

        for x in self
            .log_omega_topic
            .iter_mut()
            .chain(self.log_omega_event.iter_mut())
        {
            *x = (*x - max_log).exp();
        }

        let omega_sum: f64 = self
            .log_omega_topic
            .iter()
            .chain(self.log_omega_event.iter())
            .sum();

        if omega_sum == 0.0 || !omega_sum.is_finite() {
            self.num_skipped += 1;
            return Allocation::Skipped;
        }

        let mass = count as f64 * self.scale;
        let weight = mass / omega_sum;

        for (k, &omega) in self.log_omega_topic.iter().enumerate() {
            let x = omega * weight;
            store.entity_topic.add_shape((k, entity), x);
            store.topic_term.add_shape((k, term), x);
        }

        for (s, &omega) in events.zip(self.log_omega_event.iter()) {
            let x = omega * weight;
            store.entity_event.add_shape((s, entity), x);
            store.event_term.add_shape((s, term), x);
        }

        Allocation::Allocated(mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CapsuleOptions, ModelMode};
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn store(mode: ModelMode) -> ParameterStore {
        let opts = CapsuleOptions {
            mode,
            k: 3,
            event_dur: 3,
            ..Default::default()
        };
        let mut store = ParameterStore::new(&opts, (2, 5, 4)).unwrap();
        store.initialize(&mut SmallRng::seed_from_u64(17));
        store.reset_accumulators();
        store
    }

    fn total_shape(param: &GammaMatrix) -> f64 {
        param.shape().sum()
    }

    #[test]
    fn allocation_conserves_count() {
        for mode in [ModelMode::Full, ModelMode::EntityOnly, ModelMode::EventOnly] {
            let mut store = store(mode);
            let before: Vec<f64> = store.enabled().iter().map(|(_, p)| total_shape(p)).collect();

            let mut acc = ShapeAccumulator::new(2.5);
            let ret = acc.accumulate(&mut store, 1, 4, 2, 3);
            assert_eq!(ret, Allocation::Allocated(7.5));

            let after: Vec<f64> = store.enabled().iter().map(|(_, p)| total_shape(p)).collect();
            // each cause adds the same mass to both of its factors
            let added: Vec<f64> = after.iter().zip(before.iter()).map(|(a, b)| a - b).collect();
            let total_added: f64 = added.iter().sum();
            assert_abs_diff_eq!(total_added, 2.0 * 7.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn shapes_never_decrease() {
        let mut store = store(ModelMode::Full);
        let mut acc = ShapeAccumulator::new(1.0);

        for (entity, date, term, count) in [(0, 0, 0, 1), (1, 3, 2, 5), (0, 4, 3, 2), (1, 1, 1, 1)] {
            let before: Vec<Mat> = store.enabled().iter().map(|(_, p)| p.shape().clone()).collect();
            acc.accumulate(&mut store, entity, date, term, count);
            for (prev, (_, param)) in before.iter().zip(store.enabled()) {
                assert!(prev.iter().zip(param.shape().iter()).all(|(a, b)| b >= a));
            }
        }
        assert_eq!(acc.take_num_skipped(), 0);
    }

    #[test]
    fn only_window_dates_receive_mass() {
        let mut store = store(ModelMode::EventOnly);
        let mut acc = ShapeAccumulator::new(1.0);
        acc.accumulate(&mut store, 0, 3, 1, 4);

        let (a0, _) = store.event_term.prior();
        for s in 0..5 {
            let touched = store.event_term.shape()[(s, 1)] > a0;
            assert_eq!(touched, (1..=3).contains(&s), "date {}", s);
        }
        // the other entity is untouched
        let (a_phi, _) = store.entity_event.prior();
        assert!(store.entity_event.shape().column(1).iter().all(|&a| a == a_phi));
    }

    #[test]
    fn vanishing_responsibilities_are_skipped() {
        let mut store = store(ModelMode::EntityOnly);
        let dims = (store.topic_term.nrows(), store.topic_term.ncols());
        store.topic_term.initialize_mean(Mat::zeros(dims));

        let before = total_shape(&store.entity_topic);
        let mut acc = ShapeAccumulator::new(1.0);
        assert_eq!(acc.accumulate(&mut store, 0, 0, 0, 1), Allocation::Skipped);
        assert_eq!(total_shape(&store.entity_topic), before);
        assert_eq!(acc.take_num_skipped(), 1);
        assert_eq!(acc.take_num_skipped(), 0);
    }
}
