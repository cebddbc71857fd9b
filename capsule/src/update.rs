//! Closed-form coordinate-ascent updates of the touched rows and
//! columns, after every observation of the batch was accumulated.
//!
//! Within one iteration:
//! 1. topics: `b_theta[k,:] += Σ_e phi_k[k,e]`, then each touched term
//! 2. `b_phi_k[k,:] += Σ_v theta[k,v]`
//! 3. event descriptions: `b_pi[s,:] += Σ_t Σ_e f(t,s) phi_d[s,e] n(e,t)`,
//!    then each touched date, renormalized to sum to one
//! 4. `b_phi_d[s,e] += Σ_t f(t,s) (Σ_v pi[s,v]) n(e,t)`
//! 5. each touched entity (phi_k and phi_d columns)
//!
//! where `n(e,t)` is the number of documents of entity `e` on date `t`.
//! In stochastic mode each touched lane's shape is blended with its
//! previous value before calibration.

use crate::common::*;
use crate::data::CapsuleData;
use crate::params::ParameterStore;
use fnv::FnvHashMap as HashMap;
use std::collections::BTreeSet;

/// Robbins-Monro step size `max(visits + delay, 1)^(-forget)`
#[inline]
pub fn learning_rate(visits: usize, delay: f64, forget: f64) -> f64 {
    (visits as f64 + delay).max(1.0).powf(-forget)
}

/// How many batches have touched each coordinate (zero until first
/// touched)
#[derive(Default, Debug)]
pub struct VisitCounts {
    counts: HashMap<usize, usize>,
}

impl VisitCounts {
    /// Count one more visit and return the new count
    pub fn visit(&mut self, id: usize) -> usize {
        let c = self.counts.entry(id).or_default();
        *c += 1;
        *c
    }

    pub fn get(&self, id: usize) -> usize {
        self.counts.get(&id).copied().unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug)]
struct SviSchedule {
    delay: f64,
    forget: f64,
}

/// Per-coordinate updates with optional SVI smoothing
pub struct UpdateRules {
    schedule: Option<SviSchedule>,
    term_visits: VisitCounts,
    entity_visits: VisitCounts,
    date_visits: VisitCounts,
}

impl UpdateRules {
    /// * `svi` - `Some((delay, forget))` to smooth shapes across batches
    pub fn new(svi: Option<(f64, f64)>) -> Self {
        Self {
            schedule: svi.map(|(delay, forget)| SviSchedule { delay, forget }),
            term_visits: VisitCounts::default(),
            entity_visits: VisitCounts::default(),
            date_visits: VisitCounts::default(),
        }
    }

    pub fn is_stochastic(&self) -> bool {
        self.schedule.is_some()
    }

    /// Plain coordinate ascent from now on
    pub fn disable_stochastic(&mut self) {
        self.schedule = None;
    }

    pub fn term_visits(&self) -> &VisitCounts {
        &self.term_visits
    }

    pub fn entity_visits(&self) -> &VisitCounts {
        &self.entity_visits
    }

    pub fn date_visits(&self) -> &VisitCounts {
        &self.date_visits
    }

    fn step_size(&self, visits: usize) -> Option<f64> {
        self.schedule
            .map(|svi| learning_rate(visits, svi.delay, svi.forget))
    }

    /// Topic-term columns of the touched terms, then the entity-topic
    /// rate
    pub fn update_topics(&mut self, store: &mut ParameterStore, terms: &BTreeSet<usize>) {
        let usage = store.entity_topic.posterior_mean().sum_axis(Axis(1));
        store.topic_term.add_rate_by_row(&usage);

        for &term in terms {
            let visits = self.term_visits.visit(term);
            if let Some(rho) = self.step_size(visits) {
                store.topic_term.blend_lane(Axis(1), term, rho);
            }
            store.topic_term.calibrate_lane(Axis(1), term);
        }

        let usage = store.topic_term.posterior_mean().sum_axis(Axis(1));
        store.entity_topic.add_rate_by_row(&usage);
    }

    /// Event-description rows of the touched dates, then the
    /// entity-event rate
    pub fn update_events<D: CapsuleData + ?Sized>(
        &mut self,
        store: &mut ParameterStore,
        data: &D,
        dates: &BTreeSet<usize>,
        entities: &BTreeSet<usize>,
    ) {
        for &date in dates {
            let mut rate = 0.0;
            {
                let phi_d = store.entity_event.posterior_mean();
                for t in store.decay.dates_influenced_by(date) {
                    let f = store.decay.weight(t, date);
                    for &e in entities {
                        rate += f * phi_d[(date, e)] * data.doc_count(e, t) as f64;
                    }
                }
            }
            store.event_term.add_rate_lane(Axis(0), date, rate);

            let visits = self.date_visits.visit(date);
            if let Some(rho) = self.step_size(visits) {
                store.event_term.blend_lane(Axis(0), date, rho);
            }
            store.event_term.calibrate_lane(Axis(0), date);
            store.event_term.normalize_lane(Axis(0), date);
            debug!("updated event description {}", date);
        }

        for &date in dates {
            let mass = store.event_term.posterior_mean().row(date).sum();
            for t in store.decay.dates_influenced_by(date) {
                let f = store.decay.weight(t, date);
                for &e in entities {
                    let n = data.doc_count(e, t) as f64;
                    if n > 0.0 {
                        store.entity_event.add_rate((date, e), f * mass * n);
                    }
                }
            }
        }
    }

    /// Entity-topic and entity-event columns of the touched entities
    pub fn update_entities(&mut self, store: &mut ParameterStore, entities: &BTreeSet<usize>) {
        let mode = store.mode();
        for &entity in entities {
            let visits = self.entity_visits.visit(entity);
            let rho = self.step_size(visits);

            if mode.has_entity_factors() {
                if let Some(rho) = rho {
                    store.entity_topic.blend_lane(Axis(1), entity, rho);
                }
                store.entity_topic.calibrate_lane(Axis(1), entity);
            }

            if mode.has_event_factors() {
                if let Some(rho) = rho {
                    store.entity_event.blend_lane(Axis(1), entity, rho);
                }
                store.entity_event.calibrate_lane(Axis(1), entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulate::ShapeAccumulator;
    use crate::data::{Corpus, Observation};
    use crate::options::{CapsuleOptions, ModelMode};
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn learning_rate_in_unit_interval_and_decreasing() {
        for &delay in &[0.0, 0.5, 1.0, 16.0, 1024.0] {
            for &forget in &[0.51, 0.75, 1.0] {
                let mut prev = learning_rate(0, delay, forget);
                assert!(prev > 0.0 && prev <= 1.0);
                for visits in 1..200 {
                    let rho = learning_rate(visits, delay, forget);
                    assert!(rho > 0.0 && rho <= 1.0);
                    if visits >= 2 || delay > 0.0 {
                        assert!(rho < prev, "delay {} forget {} visits {}", delay, forget, visits);
                    }
                    prev = rho;
                }
            }
        }
    }

    #[test]
    fn visits_start_at_zero() {
        let mut counts = VisitCounts::default();
        assert_eq!(counts.get(7), 0);
        assert_eq!(counts.visit(7), 1);
        assert_eq!(counts.visit(7), 2);
        assert_eq!(counts.get(7), 2);
        assert_eq!(counts.get(3), 0);
    }

    fn toy() -> (Corpus, ParameterStore) {
        let obs = |doc, term, count| Observation { doc, term, count };
        let corpus = Corpus::new(
            vec![(0, 0), (1, 1), (0, 2), (1, 2)],
            vec![obs(0, 0, 2), obs(0, 1, 1), obs(1, 2, 3), obs(2, 0, 1), obs(3, 3, 2)],
            vec![],
            vec![],
        )
        .unwrap();
        let opts = CapsuleOptions {
            k: 2,
            event_dur: 2,
            mode: ModelMode::Full,
            ..Default::default()
        };
        let dims = (corpus.entity_count(), corpus.date_count(), corpus.term_count());
        let mut store = ParameterStore::new(&opts, dims).unwrap();
        store.initialize(&mut SmallRng::seed_from_u64(5));
        (corpus, store)
    }

    fn full_sweep(corpus: &Corpus, store: &mut ParameterStore, rules: &mut UpdateRules) {
        store.reset_accumulators();
        let mut acc = ShapeAccumulator::new(1.0);
        for doc in 0..corpus.train_doc_count() {
            for &(term, count) in corpus.doc_terms(doc) {
                acc.accumulate(store, corpus.entity(doc), corpus.date(doc), term, count);
            }
        }
        let terms: BTreeSet<usize> = (0..corpus.term_count()).collect();
        let dates: BTreeSet<usize> = (0..corpus.date_count()).collect();
        let entities: BTreeSet<usize> = (0..corpus.entity_count()).collect();

        rules.update_topics(store, &terms);
        rules.update_events(store, corpus, &dates, &entities);
        rules.update_entities(store, &entities);
    }

    #[test]
    fn event_descriptions_sum_to_one() {
        let (corpus, mut store) = toy();
        let mut rules = UpdateRules::new(None);
        for _ in 0..3 {
            full_sweep(&corpus, &mut store, &mut rules);
            for row in store.event_term.posterior_mean().rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            }
        }
        assert_eq!(rules.date_visits().get(0), 3);
        assert_eq!(rules.term_visits().get(3), 3);
    }

    #[test]
    fn rates_stay_above_prior() {
        let (corpus, mut store) = toy();
        let mut rules = UpdateRules::new(None);
        full_sweep(&corpus, &mut store, &mut rules);
        for (_, param) in store.enabled() {
            let (_, b0) = param.prior();
            assert!(param.rate().iter().all(|&b| b >= b0));
            assert!(param.posterior_mean().iter().all(|&x| x > 0.0));
        }
    }

    #[test]
    fn stochastic_first_touch_matches_blend() {
        let (corpus, mut store) = toy();
        store.enable_stochastic();
        let mut rules = UpdateRules::new(Some((1.0, 0.75)));
        assert!(rules.is_stochastic());
        full_sweep(&corpus, &mut store, &mut rules);

        // rho = 2^-0.75 on the first visit: a = (1 - rho) a0 + rho a_batch
        let rho = learning_rate(1, 1.0, 0.75);
        let (a0, _) = store.entity_topic.prior();
        assert!(store.entity_topic.shape().iter().all(|&a| a >= a0 * (1.0 - rho)));

        rules.disable_stochastic();
        assert!(!rules.is_stochastic());
        full_sweep(&corpus, &mut store, &mut rules);
    }
}
