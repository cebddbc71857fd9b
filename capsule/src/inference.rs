use crate::accumulate::ShapeAccumulator;
use crate::common::*;
use crate::data::CapsuleData;
use crate::eval::{evaluate_ranking, EvalSummary};
use crate::objective::objective_proxy;
use crate::options::CapsuleOptions;
use crate::params::ParameterStore;
use crate::persist::{iteration_label, log_convergence, log_time, save_parameters};
use crate::predict::{heldout_log_likelihood, PointPredict, Predictor};
use crate::update::UpdateRules;

use matrix_util::common_io::mkdir_all;
use matrix_util::utils::sample_with_replacement;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::time::Instant;

/// Held-out log-likelihood before the first checkpoint
const INITIAL_LOG_LIKELIHOOD: f64 = -1e10;

/// Number of consecutive decreasing checkpoints that stops the run
const MAX_DECREASING_CHECKPOINTS: usize = 2;

/// Why the iterations stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// relative change in held-out likelihood fell below the threshold
    LikelihoodConverged,
    /// held-out likelihood decreased on consecutive checkpoints
    LikelihoodDecreasing,
    /// `max_iter` reached first
    MaxIterations,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::LikelihoodConverged => write!(f, "model converged"),
            Termination::LikelihoodDecreasing => write!(f, "likelihood decreasing"),
            Termination::MaxIterations => write!(f, "reached maximum number of iterations"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Running,
    /// one deterministic pass over all documents after `Termination`
    FinalPass(Termination),
}

/// Outcome of [`Capsule::learn`]
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub iterations: usize,
    pub termination: Termination,
    /// held-out log-likelihood at the last checkpoint
    pub log_likelihood: f64,
    /// observations whose responsibilities all vanished
    pub dropped_observations: usize,
    /// `(iteration, held-out log-likelihood)` at every checkpoint
    pub checkpoints: Vec<(usize, f64)>,
}

struct ConvergenceTracker {
    log_likelihood: f64,
    delta: f64,
    num_decreasing: usize,
}

impl ConvergenceTracker {
    fn new() -> Self {
        Self {
            log_likelihood: INITIAL_LOG_LIKELIHOOD,
            delta: f64::INFINITY,
            num_decreasing: 0,
        }
    }

    /// Record a new value and return `(old, |(old - new) / old|)`
    fn update(&mut self, log_likelihood: f64, count_decrease: bool) -> (f64, f64) {
        let old = self.log_likelihood;
        self.log_likelihood = log_likelihood;
        if count_decrease {
            if log_likelihood < old {
                self.num_decreasing += 1;
            } else {
                self.num_decreasing = 0;
            }
        }
        self.delta = ((old - log_likelihood) / old).abs();
        (old, self.delta)
    }

    /// Stop once `iteration >= min_iter` and either the last relative
    /// change is below `likelihood_delta` or the likelihood kept
    /// decreasing
    fn stop_reason(
        &self,
        iteration: usize,
        min_iter: usize,
        likelihood_delta: f64,
    ) -> Option<Termination> {
        if iteration < min_iter {
            None
        } else if self.delta < likelihood_delta {
            Some(Termination::LikelihoodConverged)
        } else if self.num_decreasing >= MAX_DECREASING_CHECKPOINTS {
            Some(Termination::LikelihoodDecreasing)
        } else {
            None
        }
    }
}

/// Capsule variational inference over one data set
pub struct Capsule<'a, D: CapsuleData + ?Sized> {
    opts: CapsuleOptions,
    data: &'a D,
    store: ParameterStore,
    accumulator: ShapeAccumulator,
    rules: UpdateRules,
    rng: SmallRng,
    phase: Phase,
    sample_size: usize,
}

impl<'a, D: CapsuleData + ?Sized> Capsule<'a, D> {
    /// Validate options, create the output directory, write
    /// `settings.dat` and initialize every factor
    pub fn new(opts: CapsuleOptions, data: &'a D) -> anyhow::Result<Self> {
        opts.validate()?;

        let ntrain = data.train_doc_count();
        if ntrain == 0 {
            anyhow::bail!("no training documents");
        }
        if data.num_validation() == 0 {
            warn!("no validation observations; convergence is decided by max_iter only");
        }

        mkdir_all(&opts.outdir)?;
        opts.save(&format!("{}/settings.dat", opts.outdir))?;

        let dims = (data.entity_count(), data.date_count(), data.term_count());
        let mut store = ParameterStore::new(&opts, dims)?;

        let mut rng = SmallRng::seed_from_u64(opts.seed);
        store.initialize(&mut rng);

        let (scale, sample_size, rules) = if opts.svi {
            store.enable_stochastic();
            (
                ntrain as f64 / opts.sample_size as f64,
                opts.sample_size,
                UpdateRules::new(Some((opts.delay, opts.forget))),
            )
        } else {
            (1.0, ntrain, UpdateRules::new(None))
        };

        info!("{}", opts.mode);
        info!("sample size {}, scale {:.4}", sample_size, scale);

        Ok(Self {
            opts,
            data,
            store,
            accumulator: ShapeAccumulator::new(scale),
            rules,
            rng,
            phase: Phase::Running,
            sample_size,
        })
    }

    pub fn options(&self) -> &CapsuleOptions {
        &self.opts
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn predictor(&self) -> Predictor<'_, ParameterStore, D> {
        Predictor::new(&self.store, self.store.decay(), self.store.mode(), self.data)
    }

    /// Expected count of `term` in training document `doc`
    pub fn predict(&self, doc: usize, term: usize) -> f64 {
        self.predictor().predict(doc, term)
    }

    /// Held-out log-likelihood of the validation split
    pub fn validation_log_likelihood(&self) -> f64 {
        heldout_log_likelihood(&self.predictor(), self.data.validation())
    }

    /// Iterate until convergence, `max_iter`, or the end of the final
    /// pass, then save the `final` snapshot
    pub fn learn(&mut self) -> anyhow::Result<FitSummary> {
        let mut tracker = ConvergenceTracker::new();
        let mut checkpoints = vec![];
        let mut dropped_observations = 0;
        let mut iteration = 0;

        let termination = loop {
            let start = Instant::now();
            iteration += 1;
            info!("iteration {}", iteration);

            dropped_observations += self.run_epoch();

            let stop = match self.phase {
                Phase::FinalPass(reason) => {
                    info!("final pass complete");
                    let ll = self.checkpoint(iteration, &mut tracker, false)?;
                    checkpoints.push((iteration, ll));
                    Some(reason)
                }
                Phase::Running if iteration >= self.opts.max_iter => {
                    info!("{}", Termination::MaxIterations);
                    let ll = self.checkpoint(iteration, &mut tracker, false)?;
                    checkpoints.push((iteration, ll));
                    Some(Termination::MaxIterations)
                }
                Phase::Running if iteration % self.opts.conv_freq == 0 => {
                    let ll = self.checkpoint(iteration, &mut tracker, true)?;
                    checkpoints.push((iteration, ll));
                    tracker.stop_reason(iteration, self.opts.min_iter, self.opts.likelihood_delta)
                }
                Phase::Running => None,
            };

            if stop.is_none() {
                if self.opts.save_freq > 0 && iteration % self.opts.save_freq == 0 {
                    save_parameters(&self.store, &self.opts.outdir, &iteration_label(iteration))?;
                }
                if self.opts.eval_freq > 0 && iteration % self.opts.eval_freq == 0 {
                    self.evaluate(&iteration_label(iteration))?;
                }
            }

            log_time(
                &self.opts.outdir,
                iteration as i64,
                start.elapsed().as_secs_f64(),
            )?;

            match (stop, self.phase) {
                (Some(reason), Phase::Running) if self.opts.final_pass => {
                    info!("{}", reason);
                    self.begin_final_pass(reason);
                }
                (Some(reason), _) => break reason,
                (None, _) => {}
            }
        };

        info!("{} after {} iterations", termination, iteration);
        save_parameters(&self.store, &self.opts.outdir, "final")?;

        Ok(FitSummary {
            iterations: iteration,
            termination,
            log_likelihood: tracker.log_likelihood,
            dropped_observations,
            checkpoints,
        })
    }

    /// Ranking evaluation of the test split under the current means;
    /// `None` when there is no test split
    pub fn evaluate(&self, label: &str) -> anyhow::Result<Option<EvalSummary>> {
        if self.data.test().is_empty() {
            info!("no test observations; skipping evaluation");
            return Ok(None);
        }
        let start = Instant::now();
        let summary = evaluate_ranking(&self.predictor(), self.data, &self.opts.outdir, label)?;
        log_time(&self.opts.outdir, -1, start.elapsed().as_secs_f64())?;
        Ok(Some(summary))
    }

    /// One pass of accumulation and updates over a batch of documents;
    /// returns the number of skipped observations
    fn run_epoch(&mut self) -> usize {
        self.store.reset_accumulators();

        let ntrain = self.data.train_doc_count();
        let docs: Vec<usize> = if self.rules.is_stochastic() {
            sample_with_replacement(ntrain, self.sample_size, &mut self.rng)
        } else {
            (0..ntrain).collect()
        };

        let mut terms = BTreeSet::new();
        let mut entities = BTreeSet::new();
        let mut dates = BTreeSet::new();

        for doc in docs {
            let entity = self.data.entity(doc);
            let date = self.data.date(doc);
            entities.insert(entity);
            dates.extend(date.saturating_sub(self.opts.event_dur)..=date);

            for &(term, count) in self.data.doc_terms(doc) {
                terms.insert(term);
                self.accumulator
                    .accumulate(&mut self.store, entity, date, term, count);
            }
        }

        let mode = self.store.mode();
        if mode.has_entity_factors() {
            self.rules.update_topics(&mut self.store, &terms);
        }
        if mode.has_event_factors() {
            self.rules
                .update_events(&mut self.store, self.data, &dates, &entities);
        }
        self.rules.update_entities(&mut self.store, &entities);

        let skipped = self.accumulator.take_num_skipped();
        if skipped > 0 {
            warn!("{} observations with vanishing responsibilities skipped", skipped);
        }
        skipped
    }

    /// Compute and log the held-out likelihood and the objective proxy
    fn checkpoint(
        &self,
        iteration: usize,
        tracker: &mut ConvergenceTracker,
        count_decrease: bool,
    ) -> anyhow::Result<f64> {
        let ll = self.validation_log_likelihood();
        let (old, delta) = tracker.update(ll, count_decrease);
        let total = objective_proxy(&self.store, ll);

        log_convergence(&self.opts.outdir, iteration, total, ll, delta)?;
        info!("log-likelihood {:.4}, objective {:.4}", ll, total);
        if self.opts.verbose {
            info!("delta: {:.6e}, old: {:.4}, new: {:.4}", delta, old, ll);
        }
        Ok(ll)
    }

    /// Switch to plain coordinate ascent over every document
    fn begin_final_pass(&mut self, reason: Termination) {
        info!("final pass on all documents");
        self.phase = Phase::FinalPass(reason);
        self.rules.disable_stochastic();
        self.sample_size = self.data.train_doc_count();
        self.accumulator.set_scale(1.0);
    }
}
