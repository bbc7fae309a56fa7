//! Gene Set Enrichment Analysis engine.
//!
//! Computes weighted Kolmogorov-Smirnov running-sum enrichment scores for a
//! collection of gene sets against a ranked list, builds permutation null
//! distributions (gene set shuffling or phenotype shuffling) and calibrates
//! the real scores into NES, nominal p-values, FDR q-values and FWER p-values.
pub mod data;
pub mod methods;
pub mod readers;
pub mod stat;
pub mod writers;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A caller supplied parameter is out of range or inconsistent.
    #[error("bad parameter: {0}")]
    BadParam(String),
    /// No gene set survived size filtering. Usually a chip/platform mismatch
    /// between the gene set database and the ranked list.
    #[error(
        "no gene sets passed size filtering ({total} loaded, min size {min_size}, max size {max_size}); check that gene identifiers match the ranked list"
    )]
    NoGeneSetsAfterFiltering {
        total: usize,
        min_size: usize,
        max_size: usize,
    },
    /// The template cannot be used with the requested metric.
    #[error("template `{template}` cannot be used with metric {metric}: {reason}")]
    MismatchedTemplate {
        template: String,
        metric: String,
        reason: String,
    },
    /// A class of the template has fewer samples than the metric requires.
    #[error("class `{class}` has {found} samples but metric {metric} requires at least {required}")]
    InsufficientSamples {
        class: String,
        metric: String,
        found: usize,
        required: usize,
    },
    /// Internal consistency check failed. Indicates a bug, not bad input.
    #[error("mismatched sizes in {context}: expected {expected}, found {found}")]
    MismatchedSize {
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("malformed file: {0}")]
    Malformed(#[from] MalformedError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MalformedError {
    #[error("line {line}: expected at least {expected} columns, found {found}")]
    NoColumnsFound {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: could not parse `{value}` as a number")]
    WrongFormat { line: usize, value: String },
    #[error("duplicate feature `{0}`")]
    DuplicateFeature(String),
}

pub type Result<T> = std::result::Result<T, Error>;
