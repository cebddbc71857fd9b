//! Capsule: hierarchical Poisson factorization of dated documents.
//!
//! Each document belongs to an entity and a date. A term count is
//! explained by the entity's general concerns over `K` topics plus its
//! involvement in events of the preceding days, where each event date
//! has its own term distribution and its influence decays linearly
//! over a fixed window.
//!
//! Inference is coordinate-ascent variational Bayes with Gamma
//! posteriors, optionally stochastic over mini-batches of documents.
//!
//! # References
//!
//! Chaney, Wallach, Connelly & Blei (2016). "Detecting and
//! characterizing events." EMNLP.

mod common;

/// Command-line and library options
pub mod options;

/// Triangular time-decay kernel
pub mod decay;

/// Data collaborator and the in-memory corpus
pub mod data;

/// Gamma variational parameters of the four factor families
pub mod params;

/// Allocation of observed counts to topics and events
pub mod accumulate;

/// Rate coupling, SVI smoothing and calibration of touched coordinates
pub mod update;

/// Point predictions and held-out likelihood
pub mod predict;

/// Variational terms of the objective proxy
pub mod objective;

/// Factor snapshots and run logs
pub mod persist;

/// Ranking evaluation on the test split
pub mod eval;

/// Outer loop: batches, convergence and the final pass
pub mod inference;

pub use data::{CapsuleData, Corpus, Observation};
pub use inference::{Capsule, FitSummary, Termination};
pub use options::{CapsuleOptions, ModelMode};
