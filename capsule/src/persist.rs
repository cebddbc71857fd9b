//! Factor snapshots and run logs under the output directory.
//!
//! | file | rows | columns |
//! |---|---|---|
//! | `phi-k-{label}.dat` | entities | topics |
//! | `theta-{label}.dat` | terms | topics |
//! | `phi-d-{label}.dat` | entities | dates |
//! | `pi-{label}.dat` | dates | terms |
//! | `event-strength-{label}.dat` | dates | 1 |
//!
//! Each line starts with the integer row id. Only the families of the
//! model mode are written.

use crate::common::*;
use crate::options::ModelMode;
use crate::params::ParameterStore;
use crate::predict::FactorMeans;

use matrix_param::io::{mean_from_tsv, FileLayout, ParamIo};
use matrix_util::common_io::append_line;
use matrix_util::traits::IoOps;

/// Snapshot label of an iteration, e.g. `0042`
pub fn iteration_label(iteration: usize) -> Box<str> {
    format!("{:04}", iteration).into_boxed_str()
}

fn factor_file(outdir: &str, name: &str, label: &str) -> String {
    format!("{}/{}-{}.dat", outdir, name, label)
}

/// Write the means of every enabled family and the event strengths
pub fn save_parameters(store: &ParameterStore, outdir: &str, label: &str) -> anyhow::Result<()> {
    let mode = store.mode();

    if mode.has_entity_factors() {
        store
            .entity_topic
            .mean_to_tsv(&factor_file(outdir, "phi-k", label), FileLayout::Transposed)?;
        store
            .topic_term
            .mean_to_tsv(&factor_file(outdir, "theta", label), FileLayout::Transposed)?;
    }

    if mode.has_event_factors() {
        store
            .entity_event
            .mean_to_tsv(&factor_file(outdir, "phi-d", label), FileLayout::Transposed)?;
        store
            .event_term
            .mean_to_tsv(&factor_file(outdir, "pi", label), FileLayout::AsIs)?;

        let num_dates = store.entity_event.nrows();
        let strength = Mat::from_shape_fn((num_dates, 1), |(d, _)| store.event_strength(d));
        strength.to_id_tsv(&factor_file(outdir, "event-strength", label))?;
    }

    info!("saved parameters: {}/*-{}.dat", outdir, label);
    Ok(())
}

/// Factor means read back from a snapshot
pub struct LoadedFactors {
    entity_topic: Mat,
    topic_term: Mat,
    entity_event: Mat,
    event_term: Mat,
}

impl LoadedFactors {
    /// Read the snapshot `label` under `dir`
    ///
    /// * `mode` - which families to expect
    /// * `dims` - (entities, dates, terms); the number of topics is
    ///   taken from the files
    pub fn load(
        dir: &str,
        label: &str,
        mode: ModelMode,
        dims: (usize, usize, usize),
    ) -> anyhow::Result<Self> {
        let (n_entities, n_dates, n_terms) = dims;

        let (entity_topic, topic_term) = if mode.has_entity_factors() {
            let file = factor_file(dir, "phi-k", label);
            let phi = Mat::from_id_tsv(&file)?.reversed_axes();
            let k = phi.nrows();
            if phi.ncols() != n_entities {
                anyhow::bail!("{}: expected {} entities, found {}", file, n_entities, phi.ncols());
            }
            let theta = mean_from_tsv(
                &factor_file(dir, "theta", label),
                FileLayout::Transposed,
                (k, n_terms),
            )?;
            (phi, theta)
        } else {
            (Mat::zeros((0, n_entities)), Mat::zeros((0, n_terms)))
        };

        let (entity_event, event_term) = if mode.has_event_factors() {
            let phi = mean_from_tsv(
                &factor_file(dir, "phi-d", label),
                FileLayout::Transposed,
                (n_dates, n_entities),
            )?;
            let pi = mean_from_tsv(
                &factor_file(dir, "pi", label),
                FileLayout::AsIs,
                (n_dates, n_terms),
            )?;
            (phi, pi)
        } else {
            (Mat::zeros((0, n_entities)), Mat::zeros((0, n_terms)))
        };

        info!("loaded parameters: {}/*-{}.dat", dir, label);
        Ok(Self {
            entity_topic,
            topic_term,
            entity_event,
            event_term,
        })
    }
}

impl FactorMeans for LoadedFactors {
    fn entity_topic(&self) -> &Mat {
        &self.entity_topic
    }

    fn topic_term(&self) -> &Mat {
        &self.topic_term
    }

    fn entity_event(&self) -> &Mat {
        &self.entity_event
    }

    fn event_term(&self) -> &Mat {
        &self.event_term
    }
}

/// Append `iteration total loglik delta` to `log_likelihood.dat`
pub fn log_convergence(
    outdir: &str,
    iteration: usize,
    total: f64,
    log_likelihood: f64,
    delta: f64,
) -> anyhow::Result<()> {
    append_line(
        &format!("{}\t{:.6}\t{:.6}\t{:.6e}", iteration, total, log_likelihood, delta),
        &format!("{}/log_likelihood.dat", outdir),
    )
}

/// Append `iteration seconds` to `time_log.dat`; `-1` marks evaluation
pub fn log_time(outdir: &str, iteration: i64, seconds: f64) -> anyhow::Result<()> {
    append_line(
        &format!("{}\t{:.3}", iteration, seconds),
        &format!("{}/time_log.dat", outdir),
    )
}
