use crate::common::*;
use crate::data::{CapsuleData, Observation};
use crate::decay::DecayKernel;
use crate::options::ModelMode;

use rayon::prelude::*;

/// Posterior means of the four factor families
///
/// A family disabled by the model mode may be a zero-sized matrix.
pub trait FactorMeans: Sync {
    /// `K x entities`
    fn entity_topic(&self) -> &Mat;
    /// `K x terms`
    fn topic_term(&self) -> &Mat;
    /// `dates x entities`
    fn entity_event(&self) -> &Mat;
    /// `dates x terms`
    fn event_term(&self) -> &Mat;
}

/// Expected count of a term in a training document
pub trait PointPredict: Sync {
    fn predict(&self, doc: usize, term: usize) -> f64;
}

/// Unnormalized Poisson log-likelihood `y log(pred) - pred`
#[inline]
pub fn point_likelihood(pred: f64, count: u32) -> f64 {
    if count == 0 {
        // avoid 0 * ln(0)
        return -pred;
    }
    count as f64 * pred.ln() - pred
}

/// Predictions from a set of factor means
pub struct Predictor<'a, F: ?Sized, D: ?Sized> {
    factors: &'a F,
    decay: &'a DecayKernel,
    mode: ModelMode,
    data: &'a D,
}

impl<'a, F, D> Predictor<'a, F, D>
where
    F: FactorMeans + ?Sized,
    D: CapsuleData + ?Sized,
{
    pub fn new(factors: &'a F, decay: &'a DecayKernel, mode: ModelMode, data: &'a D) -> Self {
        Self {
            factors,
            decay,
            mode,
            data,
        }
    }

    /// ```text
    /// Σ_k phi_k[k,e] theta[k,v] + Σ_s f(date,s) phi_d[s,e] pi[s,v]
    /// ```
    pub fn score(&self, entity: usize, date: usize, term: usize) -> f64 {
        let mut ret = 0.0;

        if self.mode.has_entity_factors() {
            let phi = self.factors.entity_topic().column(entity);
            let theta = self.factors.topic_term().column(term);
            ret += phi.dot(&theta);
        }

        if self.mode.has_event_factors() {
            let phi = self.factors.entity_event();
            let pi = self.factors.event_term();
            for s in self.decay.events_seen_from(date) {
                ret += self.decay.weight(date, s) * phi[(s, entity)] * pi[(s, term)];
            }
        }

        ret
    }
}

impl<F, D> PointPredict for Predictor<'_, F, D>
where
    F: FactorMeans + ?Sized,
    D: CapsuleData + ?Sized,
{
    fn predict(&self, doc: usize, term: usize) -> f64 {
        self.score(self.data.entity(doc), self.data.date(doc), term)
    }
}

/// `Σ point_likelihood(predict(doc, term), count)` over held-out
/// observations
pub fn heldout_log_likelihood<P>(predictor: &P, heldout: &[Observation]) -> f64
where
    P: PointPredict + ?Sized,
{
    heldout
        .par_iter()
        .map(|obs| point_likelihood(predictor.predict(obs.doc, obs.term), obs.count))
        .sum()
}
