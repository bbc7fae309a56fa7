//! Turns real scores plus permutation nulls into NES, nominal p-values,
//! FDR q-values and FWER p-values.
use ndarray::{Array2, Axis};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{info, warn};

use super::results::{EnrichmentResult, Significance};
use crate::stat::{cmp_ascending_nan_last, cmp_descending_nan_last, SignedMeans};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Positive,
    Negative,
}

impl Tail {
    fn of(value: f64) -> Tail {
        if value >= 0.0 {
            Tail::Positive
        } else {
            Tail::Negative
        }
    }

    fn in_tail(&self, v: f64) -> bool {
        v.is_finite() && Tail::of(v) == *self
    }

    /// `v` is at least as extreme as `reference` in this tail.
    fn as_extreme(&self, v: f64, reference: f64) -> bool {
        match self {
            Tail::Positive => v >= reference,
            Tail::Negative => v <= reference,
        }
    }
}

/// Builds the gene set by permutation matrix of null scores.
fn null_matrix(results: &[EnrichmentResult], n_perm: usize) -> Result<Array2<f64>> {
    for r in results {
        if r.num_permutations() != n_perm {
            return Err(Error::MismatchedSize {
                context: format!("null distribution of gene set `{}`", r.gene_set.name),
                expected: n_perm,
                found: r.num_permutations(),
            });
        }
    }
    Ok(Array2::from_shape_fn((results.len(), n_perm), |(g, p)| {
        results[g].null_es[p]
    }))
}

/// Fraction of the values in `tail` that are at least as extreme as
/// `reference`. `None` when the tail is empty.
fn tail_fraction<'a>(
    values: impl Iterator<Item = &'a f64>,
    tail: Tail,
    reference: f64,
) -> Option<f64> {
    let mut total = 0usize;
    let mut hits = 0usize;
    for &v in values.filter(|v| tail.in_tail(**v)) {
        total += 1;
        if tail.as_extreme(v, reference) {
            hits += 1;
        }
    }
    (total > 0).then(|| hits as f64 / total as f64)
}

/// Finite values of a pooled distribution split by tail and sorted, so a
/// tail fraction costs one binary search.
struct PooledTails {
    positive: Vec<f64>,
    negative: Vec<f64>,
}

impl PooledTails {
    fn new(values: impl Iterator<Item = f64>) -> PooledTails {
        let (mut positive, mut negative): (Vec<f64>, Vec<f64>) = values
            .filter(|v| v.is_finite())
            .partition(|&v| Tail::of(v) == Tail::Positive);
        positive.sort_by(|a, b| a.total_cmp(b));
        negative.sort_by(|a, b| a.total_cmp(b));
        PooledTails { positive, negative }
    }

    /// Same as [`tail_fraction`] over the pooled values.
    fn fraction(&self, tail: Tail, reference: f64) -> Option<f64> {
        let (values, hits) = match tail {
            Tail::Positive => (
                &self.positive,
                self.positive.len() - self.positive.partition_point(|&v| v < reference),
            ),
            Tail::Negative => (
                &self.negative,
                self.negative.partition_point(|&v| v <= reference),
            ),
        };
        (!values.is_empty()).then(|| hits as f64 / values.len() as f64)
    }
}

/// Calibrates every result against its own null and against the pooled
/// nulls of all results. Returns new results; `results` is left untouched.
///
/// # Parameters
/// - `results` - one entry per gene set, all with the same number of
///   permutations
///
/// # Returns
///
/// A copy of `results` carrying a [`Significance`], or no significance at
/// all when there are zero permutations.
///
/// # Errors
///
/// [`Error::MismatchedSize`] if the null distributions differ in length.
pub fn calc_np_values_and_fdr(results: &[EnrichmentResult]) -> Result<Vec<EnrichmentResult>> {
    let Some(first) = results.first() else {
        return Ok(Vec::new());
    };
    let n_perm = first.num_permutations();
    let null = null_matrix(results, n_perm)?;
    if n_perm == 0 {
        info!("No permutations; significance not computed");
        return Ok(results.iter().map(|r| r.with_significance(None)).collect());
    }

    let dropped = null.iter().filter(|v| !v.is_finite()).count();
    if dropped > 0 {
        warn!("Ignoring {} non-finite null scores", dropped);
    }

    // normalize each row by the same-sign means of that row
    let means: Vec<SignedMeans> = null
        .axis_iter(Axis(0))
        .map(|row| SignedMeans::of(&row.to_vec()))
        .collect();
    let mut null_nes = null.clone();
    for (mut row, m) in null_nes.axis_iter_mut(Axis(0)).zip(means.iter()) {
        row.mapv_inplace(|v| {
            if v.is_finite() {
                m.normalize(v).unwrap_or(f64::NAN)
            } else {
                f64::NAN
            }
        });
    }
    let real_es: Vec<f64> = results.iter().map(|r| r.score.es).collect();
    let real_nes: Vec<Option<f64>> = real_es
        .iter()
        .zip(means.iter())
        .map(|(&es, m)| if es.is_finite() { m.normalize(es) } else { None })
        .collect();
    for (r, nes) in results.iter().zip(real_nes.iter()) {
        if nes.is_none() {
            warn!(
                "Gene set `{}` has no usable null scores of the sign of its ES ({}); NES undefined",
                r.gene_set.name, r.score.es
            );
        }
    }

    let nominal_p: Vec<Option<f64>> = real_es
        .iter()
        .zip(null.axis_iter(Axis(0)))
        .zip(real_nes.iter())
        .map(|((&es, row), nes)| {
            nes.as_ref()?;
            tail_fraction(row.iter(), Tail::of(es), es)
        })
        .collect();

    let pooled_null = PooledTails::new(null_nes.iter().copied());
    let pooled_obs = PooledTails::new(real_nes.iter().flatten().copied());
    let raw_fdr: Vec<Option<f64>> = real_nes
        .iter()
        .map(|nes| {
            let nes = (*nes)?;
            let tail = Tail::of(nes);
            let phi_null = pooled_null.fraction(tail, nes)?;
            let phi_obs = pooled_obs.fraction(tail, nes)?;
            Some((phi_null / phi_obs).min(1.0))
        })
        .collect();
    let fdr = monotone_fdr(&real_nes, &raw_fdr);

    let mut col_max = Vec::with_capacity(n_perm);
    let mut col_min = Vec::with_capacity(n_perm);
    for col in null_nes.axis_iter(Axis(1)) {
        let finite = col.iter().copied().filter(|v| v.is_finite());
        col_max.push(finite.clone().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        }));
        col_min.push(finite.fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.min(v)))
        }));
    }
    let fwer = |nes: f64| -> f64 {
        let extremes = match Tail::of(nes) {
            Tail::Positive => &col_max,
            Tail::Negative => &col_min,
        };
        let count = extremes
            .iter()
            .flatten()
            .filter(|&&e| Tail::of(nes).as_extreme(e, nes))
            .count();
        count as f64 / n_perm as f64
    };

    Ok(results
        .iter()
        .enumerate()
        .map(|(g, r)| {
            let es = real_es[g];
            let significance = match real_nes[g] {
                Some(nes) => {
                    let sign_mismatch =
                        nes != 0.0 && es != 0.0 && nes.signum() != es.signum();
                    Significance {
                        nes: Some(nes),
                        nominal_p: nominal_p[g],
                        fdr_q: if sign_mismatch { 1.0 } else { fdr[g].unwrap_or(1.0) },
                        fwer_p: fwer(nes),
                    }
                }
                None => Significance {
                    nes: None,
                    nominal_p: None,
                    fdr_q: 1.0,
                    fwer_p: 1.0,
                },
            };
            r.with_significance(Some(significance))
        })
        .collect())
}

/// Makes q-values monotone within each tail: a more extreme NES never gets
/// a larger q-value than a less extreme one.
fn monotone_fdr(nes: &[Option<f64>], raw: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = raw.to_vec();
    for tail in [Tail::Positive, Tail::Negative] {
        let mut idx: Vec<usize> = (0..nes.len())
            .filter(|&g| matches!(nes[g], Some(v) if Tail::of(v) == tail) && raw[g].is_some())
            .collect();
        // least extreme first
        idx.sort_by(|&a, &b| {
            let (a, b) = (nes[a].unwrap_or(0.0).abs(), nes[b].unwrap_or(0.0).abs());
            cmp_ascending_nan_last(a, b)
        });
        let mut running = f64::INFINITY;
        for g in idx {
            if let Some(q) = raw[g] {
                running = running.min(q);
                out[g] = Some(running);
            }
        }
    }
    out
}

/// Vectors over all gene sets, in result order, for global plots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub es: Vec<f64>,
    pub nes: Vec<Option<f64>>,
    pub fdr: Vec<Option<f64>>,
}

impl Aggregates {
    pub fn from_results(results: &[EnrichmentResult]) -> Aggregates {
        Aggregates {
            es: results.iter().map(|r| r.score.es).collect(),
            nes: results
                .iter()
                .map(|r| r.significance().and_then(|s| s.nes))
                .collect(),
            fdr: results
                .iter()
                .map(|r| r.significance().map(|s| s.fdr_q))
                .collect(),
        }
    }

    /// Number of gene sets with a defined NES at or below `fdr_cutoff`.
    pub fn significant(&self, fdr_cutoff: f64) -> usize {
        self.fdr
            .iter()
            .zip(self.nes.iter())
            .filter(|(q, nes)| nes.is_some() && q.map_or(false, |q| q <= fdr_cutoff))
            .count()
    }
}

/// Orders results by NES, highest first; undefined or NaN NES last.
pub fn cmp_by_nes(a: &EnrichmentResult, b: &EnrichmentResult) -> Ordering {
    let nes = |r: &EnrichmentResult| r.significance().and_then(|s| s.nes).unwrap_or(f64::NAN);
    cmp_descending_nan_last(nes(a), nes(b))
}
