use crate::common::*;
use crate::decay::DecayKernel;
use crate::options::{CapsuleOptions, ModelMode};
use crate::predict::FactorMeans;

use matrix_util::traits::{MatOps, SampleOps};
use rand::Rng;

/// Variational parameters of the four factor families
///
/// * `entity_topic` (phi_k): `K x entities`
/// * `topic_term` (theta): `K x terms`
/// * `entity_event` (phi_d): `dates x entities`
/// * `event_term` (pi): `dates x terms`, rows sum to one
pub struct ParameterStore {
    pub(crate) mode: ModelMode,
    pub(crate) entity_topic: GammaMatrix,
    pub(crate) topic_term: GammaMatrix,
    pub(crate) entity_event: GammaMatrix,
    pub(crate) event_term: GammaMatrix,
    pub(crate) decay: DecayKernel,
}

impl ParameterStore {
    /// Allocate every matrix once
    ///
    /// * `dims` - (entities, dates, terms)
    pub fn new(opts: &CapsuleOptions, dims: (usize, usize, usize)) -> anyhow::Result<Self> {
        let (n_entities, n_dates, n_terms) = dims;
        let mode = opts.mode;

        // disabled families keep zero-sized matrices
        let k = if mode.has_entity_factors() { opts.k } else { 0 };
        let d = if mode.has_event_factors() { n_dates } else { 0 };

        info!("initializing entity concerns (phi)");
        let entity_topic = GammaMatrix::new((k, n_entities), opts.a_phi, opts.b_phi);
        let entity_event = GammaMatrix::new((d, n_entities), opts.a_phi, opts.b_phi);

        info!("initializing topics (theta)");
        let topic_term = GammaMatrix::new((k, n_terms), opts.a_theta, opts.b_theta);

        info!("initializing event descriptions (pi)");
        let event_term = GammaMatrix::new((d, n_terms), opts.a_pi, opts.b_pi);

        let decay = DecayKernel::new(n_dates, opts.event_dur)?;

        Ok(Self {
            mode,
            entity_topic,
            topic_term,
            entity_event,
            event_term,
            decay,
        })
    }

    pub fn mode(&self) -> ModelMode {
        self.mode
    }

    pub fn decay(&self) -> &DecayKernel {
        &self.decay
    }

    /// Keep previous-shape shadows for the moving-average update
    pub fn enable_stochastic(&mut self) {
        for param in self.enabled_mut() {
            param.enable_stochastic();
        }
    }

    /// Seed the means: `a0/b0` everywhere, except topics which get
    /// `(a0 + U(0,1)) / b0` normalized to sum to one per topic
    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.mode.has_entity_factors() {
            let (a0, b0) = self.entity_topic.prior();
            let dims = (self.entity_topic.nrows(), self.entity_topic.ncols());
            self.entity_topic.initialize_mean(Mat::from_elem(dims, a0 / b0));

            let (a0, b0) = self.topic_term.prior();
            let dims = (self.topic_term.nrows(), self.topic_term.ncols());
            let mut theta = Mat::runif_open(dims.0, dims.1, rng);
            theta.mapv_inplace(|u| (a0 + u) / b0);
            theta.sum_to_one_rows_inplace();
            self.topic_term.initialize_mean(theta);
        }

        if self.mode.has_event_factors() {
            let (a0, b0) = self.entity_event.prior();
            let dims = (self.entity_event.nrows(), self.entity_event.ncols());
            self.entity_event.initialize_mean(Mat::from_elem(dims, a0 / b0));

            let (a0, b0) = self.event_term.prior();
            let dims = (self.event_term.nrows(), self.event_term.ncols());
            self.event_term.initialize_mean(Mat::from_elem(dims, a0 / b0));
        }
    }

    /// Shape and rate back to their priors, for the enabled families
    pub fn reset_accumulators(&mut self) {
        for param in self.enabled_mut() {
            param.reset_stat();
        }
    }

    /// `Σ_entity mean_entity_event[date, entity]`
    pub fn event_strength(&self, date: usize) -> f64 {
        if !self.mode.has_event_factors() {
            return 0.0;
        }
        self.entity_event.posterior_mean().row(date).sum()
    }

    /// Every enabled family, in a fixed order
    pub(crate) fn enabled(&self) -> Vec<(&'static str, &GammaMatrix)> {
        let mut ret = vec![];
        if self.mode.has_event_factors() {
            ret.push(("pi", &self.event_term));
            ret.push(("phi_d", &self.entity_event));
        }
        if self.mode.has_entity_factors() {
            ret.push(("phi_k", &self.entity_topic));
            ret.push(("theta", &self.topic_term));
        }
        ret
    }

    fn enabled_mut(&mut self) -> Vec<&mut GammaMatrix> {
        let mut ret = vec![];
        if self.mode.has_event_factors() {
            ret.push(&mut self.event_term);
            ret.push(&mut self.entity_event);
        }
        if self.mode.has_entity_factors() {
            ret.push(&mut self.entity_topic);
            ret.push(&mut self.topic_term);
        }
        ret
    }
}

impl FactorMeans for ParameterStore {
    fn entity_topic(&self) -> &Mat {
        self.entity_topic.posterior_mean()
    }

    fn topic_term(&self) -> &Mat {
        self.topic_term.posterior_mean()
    }

    fn entity_event(&self) -> &Mat {
        self.entity_event.posterior_mean()
    }

    fn event_term(&self) -> &Mat {
        self.event_term.posterior_mean()
    }
}
