use serde::Serialize;
use std::sync::Arc;

use crate::data::{GeneSet, RankedList, Template};
use crate::stat::MannWhitney;

/// A running-sum value and the rank it was reached at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deviation {
    pub score: f64,
    pub rank: usize,
}

/// Extremes of the running sum restricted to each side of the crossover
/// rank. Diagnostic only, never used for the ES itself.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SideDeviations {
    /// Highest value on the upper side.
    pub upper_max: Option<Deviation>,
    /// Largest magnitude on the upper side, signed.
    pub upper_abs: Option<Deviation>,
    /// Lowest value on the lower side.
    pub lower_min: Option<Deviation>,
    /// Largest magnitude on the lower side, signed.
    pub lower_abs: Option<Deviation>,
}

/// Calibrated significance of one real enrichment score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Significance {
    /// `None` when the gene set's null distribution has no usable values of
    /// the same sign as the ES.
    pub nes: Option<f64>,
    pub nominal_p: Option<f64>,
    pub fdr_q: f64,
    pub fwer_p: f64,
}

/// Result of one running-sum walk of one gene set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentScore {
    /// Signed value of the largest-magnitude running sum.
    pub es: f64,
    pub rank_at_es: usize,
    /// Ranked list score at `rank_at_es`.
    pub score_at_es: f64,
    pub num_hits: usize,
    pub hit_indices: Option<Vec<usize>>,
    /// Running sum right after each hit, aligned with `hit_indices`.
    pub hit_profile: Option<Vec<f64>>,
    /// Running sum at every rank.
    pub running_profile: Option<Vec<f64>>,
    pub side_deviations: Option<SideDeviations>,
    pub mann_whitney: Option<MannWhitney>,
    pub significance: Option<Significance>,
}

/// One gene set's real score, its permutation null and what it was computed
/// against.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    pub gene_set: GeneSet,
    pub score: EnrichmentScore,
    pub null_es: Vec<f64>,
    #[serde(skip)]
    pub ranked_list: Arc<RankedList>,
    #[serde(skip)]
    pub template: Option<Arc<Template>>,
    pub chip: Option<String>,
}

impl EnrichmentResult {
    pub fn num_permutations(&self) -> usize {
        self.null_es.len()
    }

    pub fn significance(&self) -> Option<&Significance> {
        self.score.significance.as_ref()
    }

    /// Copy of this result carrying `significance`.
    pub fn with_significance(&self, significance: Option<Significance>) -> EnrichmentResult {
        let mut out = self.clone();
        out.score.significance = significance;
        out
    }

    /// Hits at or before the ES rank for a positive ES, at or after it for a
    /// negative one. `None` unless hit indices were kept.
    pub fn leading_edge(&self) -> Option<Vec<&str>> {
        let hits = self.score.hit_indices.as_ref()?;
        let at = self.score.rank_at_es;
        let in_edge = |r: usize| {
            if self.score.es >= 0.0 {
                r <= at
            } else {
                r >= at
            }
        };
        Some(
            hits.iter()
                .filter(|&&r| in_edge(r))
                .map(|&r| self.ranked_list.name_at(r))
                .collect(),
        )
    }
}
