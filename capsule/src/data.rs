//! Documents indexed by entity, date and term.
//!
//! Files read by [`Corpus::from_dir`] (plain or `.gz`, `#` comments
//! allowed):
//!
//! * `meta.tsv`: `doc entity date`, one line per document
//! * `train.tsv`: `doc term count`
//! * `validation.tsv`: `doc term count`
//! * `test.tsv` (optional): `doc term count`

use crate::common::*;
use matrix_util::common_io::{find_plain_or_gz, read_lines_of_types};

/// One held-out or training count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub doc: usize,
    pub term: usize,
    pub count: u32,
}

/// What inference needs to know about the data
pub trait CapsuleData: Sync {
    fn entity_count(&self) -> usize;
    fn date_count(&self) -> usize;
    fn term_count(&self) -> usize;

    /// Training documents are `0..train_doc_count()`
    fn train_doc_count(&self) -> usize;

    fn entity(&self, doc: usize) -> usize;
    fn date(&self, doc: usize) -> usize;

    /// `(term, count)` pairs of a training document, sorted by term
    fn doc_terms(&self, doc: usize) -> &[(usize, u32)];

    fn num_terms(&self, doc: usize) -> usize {
        self.doc_terms(doc).len()
    }

    /// Number of documents of `entity` dated on `date`
    fn doc_count(&self, entity: usize, date: usize) -> usize;

    fn validation(&self) -> &[Observation];

    fn num_validation(&self) -> usize {
        self.validation().len()
    }

    fn test(&self) -> &[Observation];

    /// Total training count of a term
    fn term_frequency(&self, term: usize) -> u64;

    fn has_train_term(&self, doc: usize, term: usize) -> bool {
        self.doc_terms(doc)
            .binary_search_by_key(&term, |&(t, _)| t)
            .is_ok()
    }
}

/// In-memory corpus
pub struct Corpus {
    num_entities: usize,
    num_dates: usize,
    num_terms: usize,
    doc_entity: Vec<usize>,
    doc_date: Vec<usize>,
    doc_terms: Vec<Vec<(usize, u32)>>,
    entity_date_docs: ndarray::Array2<usize>,
    term_freq: Vec<u64>,
    validation: Vec<Observation>,
    test: Vec<Observation>,
}

impl Corpus {
    /// Build a corpus; cardinalities are `max id + 1`
    ///
    /// * `meta` - `(entity, date)` of each document
    /// * `train` - training counts
    /// * `validation` - held-out counts for the convergence check
    /// * `test` - held-out counts for ranking evaluation
    pub fn new(
        meta: Vec<(usize, usize)>,
        train: Vec<Observation>,
        validation: Vec<Observation>,
        test: Vec<Observation>,
    ) -> anyhow::Result<Self> {
        if meta.is_empty() {
            anyhow::bail!("no documents");
        }

        let num_docs = meta.len();
        let num_entities = meta.iter().map(|&(e, _)| e).max().map_or(0, |m| m + 1);
        let num_dates = meta.iter().map(|&(_, d)| d).max().map_or(0, |m| m + 1);
        let num_terms = train
            .iter()
            .chain(validation.iter())
            .chain(test.iter())
            .map(|x| x.term)
            .max()
            .map_or(0, |m| m + 1);

        for obs in train.iter().chain(validation.iter()).chain(test.iter()) {
            if obs.doc >= num_docs {
                anyhow::bail!(
                    "document {} has no entity/date (only {} documents)",
                    obs.doc,
                    num_docs
                );
            }
        }

        let mut doc_terms: Vec<Vec<(usize, u32)>> = vec![vec![]; num_docs];
        let mut term_freq = vec![0_u64; num_terms];
        for obs in train.iter().filter(|x| x.count > 0) {
            doc_terms[obs.doc].push((obs.term, obs.count));
            term_freq[obs.term] += obs.count as u64;
        }
        for terms in doc_terms.iter_mut() {
            terms.sort_by_key(|&(t, _)| t);
            terms.dedup_by(|next, kept| {
                if next.0 == kept.0 {
                    kept.1 += next.1;
                    true
                } else {
                    false
                }
            });
        }

        let mut entity_date_docs = ndarray::Array2::<usize>::zeros((num_entities, num_dates));
        for &(e, d) in meta.iter() {
            entity_date_docs[(e, d)] += 1;
        }

        let (doc_entity, doc_date) = meta.into_iter().unzip();

        Ok(Self {
            num_entities,
            num_dates,
            num_terms,
            doc_entity,
            doc_date,
            doc_terms,
            entity_date_docs,
            term_freq,
            // a zero count still scores `-pred` in the held-out likelihood
            validation,
            // ranking only looks at terms that occur
            test: test.into_iter().filter(|x| x.count > 0).collect(),
        })
    }

    /// Read `meta.tsv`, `train.tsv`, `validation.tsv` and (if present)
    /// `test.tsv` under `dir`
    pub fn from_dir(dir: &str) -> anyhow::Result<Self> {
        let require = |base: &str| -> anyhow::Result<Box<str>> {
            find_plain_or_gz(dir, base)
                .ok_or_else(|| anyhow::anyhow!("missing {}/{}", dir, base))
        };

        let meta_file = require("meta.tsv")?;
        let mut meta_lines = read_lines_of_types::<usize>(&meta_file, -1)?.lines;
        for words in meta_lines.iter() {
            if words.len() != 3 {
                anyhow::bail!("{}: expected `doc entity date`", meta_file);
            }
        }
        meta_lines.sort_by_key(|w| w[0]);
        for (i, words) in meta_lines.iter().enumerate() {
            if words[0] != i {
                anyhow::bail!("{}: document ids must be 0..{}", meta_file, meta_lines.len());
            }
        }
        let meta = meta_lines.iter().map(|w| (w[1], w[2])).collect();

        let train = read_observations(&require("train.tsv")?)?;
        let validation = read_observations(&require("validation.tsv")?)?;
        let test = match find_plain_or_gz(dir, "test.tsv") {
            Some(file) => read_observations(&file)?,
            None => vec![],
        };

        let corpus = Self::new(meta, train, validation, test)?;
        info!(
            "{} documents, {} entities, {} dates, {} terms ({} validation, {} test)",
            corpus.train_doc_count(),
            corpus.num_entities,
            corpus.num_dates,
            corpus.num_terms,
            corpus.validation.len(),
            corpus.test.len()
        );
        Ok(corpus)
    }
}

fn read_observations(file: &str) -> anyhow::Result<Vec<Observation>> {
    read_lines_of_types::<usize>(file, -1)?
        .lines
        .into_iter()
        .map(|words| match words.as_slice() {
            &[doc, term, count] => Ok(Observation {
                doc,
                term,
                count: u32::try_from(count)?,
            }),
            _ => Err(anyhow::anyhow!("{}: expected `doc term count`", file)),
        })
        .collect()
}

impl CapsuleData for Corpus {
    fn entity_count(&self) -> usize {
        self.num_entities
    }

    fn date_count(&self) -> usize {
        self.num_dates
    }

    fn term_count(&self) -> usize {
        self.num_terms
    }

    fn train_doc_count(&self) -> usize {
        self.doc_entity.len()
    }

    fn entity(&self, doc: usize) -> usize {
        self.doc_entity[doc]
    }

    fn date(&self, doc: usize) -> usize {
        self.doc_date[doc]
    }

    fn doc_terms(&self, doc: usize) -> &[(usize, u32)] {
        &self.doc_terms[doc]
    }

    fn doc_count(&self, entity: usize, date: usize) -> usize {
        self.entity_date_docs[(entity, date)]
    }

    fn validation(&self) -> &[Observation] {
        &self.validation
    }

    fn test(&self) -> &[Observation] {
        &self.test
    }

    fn term_frequency(&self, term: usize) -> u64 {
        self.term_freq[term]
    }
}
