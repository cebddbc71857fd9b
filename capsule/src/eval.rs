//! Ranking evaluation on the test split.
//!
//! Every term a test document did not use in training is a candidate.
//! Candidates are ranked by predicted count; ties go to the more
//! frequent term in training, then to the lower term id. The
//! document's test terms are the relevant items.

use crate::common::*;
use crate::data::CapsuleData;
use crate::predict::PointPredict;

use fnv::FnvHashMap as HashMap;
use indicatif::ParallelProgressIterator;
use matrix_util::common_io::write_lines;
use rayon::prelude::*;

/// Scores of one test document
#[derive(Clone, Debug, PartialEq)]
pub struct DocMetrics {
    pub doc: usize,
    pub rmse: f64,
    pub mae: f64,
    /// mean 1-based rank of the relevant terms
    pub mean_rank: f64,
    /// rank of the best-ranked relevant term
    pub first: usize,
    /// `Σ 1/rank`
    pub crr: f64,
    /// `crr` divided by its ideal value
    pub ncrr: f64,
    pub ndcg: f64,
}

impl std::fmt::Display for DocMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{:.6}\t{:.6}\t{:.6}\t{}\t{:.6}\t{:.6}\t{:.6}",
            self.doc, self.rmse, self.mae, self.mean_rank, self.first, self.crr, self.ncrr, self.ndcg
        )
    }
}

/// Means of [`DocMetrics`] over the evaluated documents
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvalSummary {
    pub num_docs: usize,
    pub rmse: f64,
    pub mae: f64,
    pub mean_rank: f64,
    pub first: f64,
    pub crr: f64,
    pub ncrr: f64,
    pub ndcg: f64,
}

impl EvalSummary {
    fn from_docs(docs: &[DocMetrics]) -> Self {
        let n = docs.len();
        if n == 0 {
            return Self::default();
        }
        let mean = |f: fn(&DocMetrics) -> f64| docs.iter().map(f).sum::<f64>() / n as f64;
        Self {
            num_docs: n,
            rmse: mean(|x| x.rmse),
            mae: mean(|x| x.mae),
            mean_rank: mean(|x| x.mean_rank),
            first: mean(|x| x.first as f64),
            crr: mean(|x| x.crr),
            ncrr: mean(|x| x.ncrr),
            ndcg: mean(|x| x.ndcg),
        }
    }

    fn to_lines(&self) -> Vec<Box<str>> {
        [
            ("num_docs", self.num_docs as f64),
            ("rmse", self.rmse),
            ("mae", self.mae),
            ("rank", self.mean_rank),
            ("first", self.first),
            ("crr", self.crr),
            ("ncrr", self.ncrr),
            ("ndcg", self.ndcg),
        ]
        .iter()
        .map(|(name, x)| format!("{}\t{:.6}", name, x).into_boxed_str())
        .collect()
    }
}

/// Score one document
///
/// * `heldout` - `(term, count)` test observations of `doc`
///
/// Returns `None` if none of the held-out terms is a candidate.
pub fn score_document<P, D>(
    predictor: &P,
    data: &D,
    doc: usize,
    heldout: &[(usize, u32)],
) -> Option<DocMetrics>
where
    P: PointPredict + ?Sized,
    D: CapsuleData + ?Sized,
{
    let relevant: HashMap<usize, u32> = heldout
        .iter()
        .filter(|&&(term, _)| !data.has_train_term(doc, term))
        .copied()
        .collect();

    if relevant.is_empty() {
        return None;
    }

    let mut candidates: Vec<(f64, u64, usize)> = (0..data.term_count())
        .filter(|&term| !data.has_train_term(doc, term))
        .map(|term| (predictor.predict(doc, term), data.term_frequency(term), term))
        .collect();

    candidates.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let (mut rank_sum, mut first, mut crr, mut dcg) = (0.0, usize::MAX, 0.0, 0.0);
    for (i, &(_, _, term)) in candidates.iter().enumerate() {
        if let Some(&count) = relevant.get(&term) {
            let rank = i + 1;
            rank_sum += rank as f64;
            first = first.min(rank);
            crr += 1.0 / rank as f64;
            dcg += count as f64 / (rank as f64 + 1.0).log2();
        }
    }

    let num_relevant = relevant.len();
    let ideal_crr: f64 = (1..=num_relevant).map(|r| 1.0 / r as f64).sum();

    let mut gains: Vec<u32> = relevant.values().copied().collect();
    gains.sort_unstable_by(|a, b| b.cmp(a));
    let ideal_dcg: f64 = gains
        .iter()
        .enumerate()
        .map(|(i, &g)| g as f64 / (i as f64 + 2.0).log2())
        .sum();

    let (sse, sae) = heldout.iter().fold((0.0, 0.0), |(sse, sae), &(term, count)| {
        let err = predictor.predict(doc, term) - count as f64;
        (sse + err * err, sae + err.abs())
    });
    let n = heldout.len() as f64;

    Some(DocMetrics {
        doc,
        rmse: (sse / n).sqrt(),
        mae: sae / n,
        mean_rank: rank_sum / num_relevant as f64,
        first,
        crr,
        ncrr: crr / ideal_crr,
        ndcg: dcg / ideal_dcg,
    })
}

/// Score every test document in parallel, write
/// `{outdir}/eval-{label}.dat` and `{outdir}/eval-summary-{label}.dat`
pub fn evaluate_ranking<P, D>(
    predictor: &P,
    data: &D,
    outdir: &str,
    label: &str,
) -> anyhow::Result<EvalSummary>
where
    P: PointPredict + ?Sized,
    D: CapsuleData + ?Sized,
{
    let mut by_doc: HashMap<usize, Vec<(usize, u32)>> = HashMap::default();
    for obs in data.test() {
        by_doc.entry(obs.doc).or_default().push((obs.term, obs.count));
    }
    let mut jobs: Vec<(usize, Vec<(usize, u32)>)> = by_doc.into_iter().collect();
    jobs.sort_by_key(|(doc, _)| *doc);

    info!("evaluating {} test documents", jobs.len());

    let scored: Vec<DocMetrics> = jobs
        .par_iter()
        .progress_count(jobs.len() as u64)
        .filter_map(|(doc, heldout)| score_document(predictor, data, *doc, heldout))
        .collect();

    if scored.len() < jobs.len() {
        warn!(
            "{} test documents had no held-out term outside their training terms",
            jobs.len() - scored.len()
        );
    }

    let lines: Vec<Box<str>> = scored
        .iter()
        .map(|x| x.to_string().into_boxed_str())
        .collect();
    write_lines(&lines, &format!("{}/eval-{}.dat", outdir, label))?;

    let summary = EvalSummary::from_docs(&scored);
    write_lines(
        &summary.to_lines(),
        &format!("{}/eval-summary-{}.dat", outdir, label),
    )?;

    info!(
        "evaluation {}: rmse {:.4}, mean rank {:.2}, ncrr {:.4}, ndcg {:.4}",
        label, summary.rmse, summary.mean_rank, summary.ncrr, summary.ndcg
    );
    Ok(summary)
}
