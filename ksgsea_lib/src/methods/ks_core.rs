//! Weighted Kolmogorov-Smirnov running sum.
//!
//! The ranked list is walked once per cohort. Only gene sets containing the
//! feature at the current rank are touched; the misses since a set's
//! previous hit are applied in bulk, which keeps the work per gene set
//! proportional to its number of hits rather than to the list length.
use super::cohort::GeneSetCohort;
use super::results::{Deviation, EnrichmentScore, SideDeviations};
use super::scoring::ScoringTable;
use crate::data::{CrossoverRank, ListSide, RankedList};
use crate::stat::MannWhitney;
use crate::{Error, Result};

/// Substitute for a hit score that came out NaN or infinite (zero or
/// non-finite weight mass).
pub const HIT_SCORE_FALLBACK: f64 = 0.000001;

/// What a walk keeps besides the ES. Every caller states its own needs:
/// permutation runs should keep nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOptions {
    /// Hit indices, the running sum at each hit and the Mann-Whitney U.
    pub store_deep: bool,
    /// The running sum at every rank.
    pub store_point_by_point: bool,
    /// Per-side extremes of the running sum.
    pub track_side_deviations: bool,
}

impl StorageOptions {
    pub fn real_run(point_by_point: bool) -> StorageOptions {
        StorageOptions {
            store_deep: true,
            store_point_by_point: point_by_point,
            track_side_deviations: true,
        }
    }

    pub fn es_only() -> StorageOptions {
        StorageOptions {
            store_deep: false,
            store_point_by_point: false,
            track_side_deviations: false,
        }
    }
}

struct Walk<'a> {
    table: &'a ScoringTable,
    crossover: CrossoverRank,
    opts: StorageOptions,
    running: f64,
    /// First rank whose contribution has not been applied yet.
    next_rank: usize,
    es: f64,
    rank_at_es: usize,
    hits: Vec<usize>,
    hit_profile: Vec<f64>,
    profile: Vec<f64>,
    sides: SideDeviations,
    rank_sum: f64,
    num_hits: usize,
}

impl<'a> Walk<'a> {
    fn new(
        table: &'a ScoringTable,
        crossover: CrossoverRank,
        opts: StorageOptions,
        n: usize,
    ) -> Walk<'a> {
        Walk {
            table,
            crossover,
            opts,
            running: 0.0,
            next_rank: 0,
            es: 0.0,
            rank_at_es: 0,
            hits: Vec::new(),
            hit_profile: Vec::new(),
            profile: if opts.store_point_by_point {
                Vec::with_capacity(n)
            } else {
                Vec::new()
            },
            sides: SideDeviations::default(),
            rank_sum: 0.0,
            num_hits: 0,
        }
    }

    fn checkpoint(&mut self, rank: usize, value: f64) {
        // strict: the first rank reaching a magnitude keeps it
        if self.es.abs() < value.abs() {
            self.es = value;
            self.rank_at_es = rank;
        }
        if !self.opts.track_side_deviations {
            return;
        }
        let here = Deviation { score: value, rank };
        let s = &mut self.sides;
        match self.crossover.side(rank) {
            ListSide::Upper => {
                if s.upper_max.map_or(true, |d| d.score < value) {
                    s.upper_max = Some(here);
                }
                if s.upper_abs.map_or(true, |d| d.score.abs() < value.abs()) {
                    s.upper_abs = Some(here);
                }
            }
            ListSide::Lower => {
                if s.lower_min.map_or(true, |d| d.score > value) {
                    s.lower_min = Some(here);
                }
                if s.lower_abs.map_or(true, |d| d.score.abs() < value.abs()) {
                    s.lower_abs = Some(here);
                }
            }
        }
    }

    /// Applies the miss penalty for every rank from `next_rank` through
    /// `end`. The gap is split at the crossover since the two sides may carry
    /// different miss scores; each piece ends with a checkpoint, which is
    /// where a run of misses reaches its extreme.
    fn miss_through(&mut self, end: usize) {
        let mut start = self.next_rank;
        while start <= end {
            let side = self.crossover.side(start);
            let seg_end = match side {
                ListSide::Upper => end.min(self.crossover.0 - 1),
                ListSide::Lower => end,
            };
            let len = seg_end - start + 1;
            let miss = self.table.miss_score(side);
            let base = self.running;
            if self.opts.store_point_by_point {
                self.profile
                    .extend((1..=len).map(|i| base - i as f64 * miss));
            }
            self.running = base - len as f64 * miss;
            self.checkpoint(seg_end, self.running);
            start = seg_end + 1;
        }
        self.next_rank = self.next_rank.max(end + 1);
    }

    fn hit(&mut self, rank: usize, feature: &str) {
        if rank > self.next_rank {
            self.miss_through(rank - 1);
        }
        // the value reached by the misses was checked in miss_through
        let mut h = self.table.hit_score(feature);
        if !h.is_finite() {
            h = HIT_SCORE_FALLBACK;
        }
        self.running += h;
        self.next_rank = rank + 1;
        self.rank_sum += (rank + 1) as f64;
        self.num_hits += 1;
        if self.opts.store_deep {
            self.hits.push(rank);
            self.hit_profile.push(self.running);
        }
        if self.opts.store_point_by_point {
            self.profile.push(self.running);
        }
        self.checkpoint(rank, self.running);
    }

    fn finish(self, list: &RankedList, gene_set: &str) -> Result<EnrichmentScore> {
        let n = list.len();
        let deep = self.opts.store_deep;
        if deep && self.hits.len() != self.table.num_members() {
            return Err(Error::MismatchedSize {
                context: format!("hit indices of gene set `{}`", gene_set),
                expected: self.table.num_members(),
                found: self.hits.len(),
            });
        }
        if deep && self.hit_profile.len() != self.hits.len() {
            return Err(Error::MismatchedSize {
                context: format!("ES profile of gene set `{}`", gene_set),
                expected: self.hits.len(),
                found: self.hit_profile.len(),
            });
        }
        if self.opts.store_point_by_point && self.profile.len() != n {
            return Err(Error::MismatchedSize {
                context: format!("running profile of gene set `{}`", gene_set),
                expected: n,
                found: self.profile.len(),
            });
        }
        Ok(EnrichmentScore {
            es: self.es,
            rank_at_es: self.rank_at_es,
            score_at_es: list.score_at(self.rank_at_es),
            num_hits: self.num_hits,
            mann_whitney: if deep {
                MannWhitney::from_rank_sum(self.rank_sum, self.num_hits, n)
            } else {
                None
            },
            hit_indices: deep.then_some(self.hits),
            hit_profile: deep.then_some(self.hit_profile),
            running_profile: self.opts.store_point_by_point.then_some(self.profile),
            side_deviations: self.opts.track_side_deviations.then_some(self.sides),
            significance: None,
        })
    }
}

/// Score of a gene set with no members in the list: a flat walk at 0.
fn empty_score(list: &RankedList, opts: StorageOptions) -> EnrichmentScore {
    EnrichmentScore {
        es: 0.0,
        rank_at_es: 0,
        score_at_es: list.score_at(0),
        num_hits: 0,
        hit_indices: opts.store_deep.then(Vec::new),
        hit_profile: opts.store_deep.then(Vec::new),
        running_profile: opts
            .store_point_by_point
            .then(|| vec![0.0; list.len()]),
        side_deviations: opts.track_side_deviations.then(SideDeviations::default),
        mann_whitney: None,
        significance: None,
    }
}

/// Walks the cohort's ranked list once and returns one score per gene set,
/// in cohort order.
///
/// # Errors
///
/// [`Error::MismatchedSize`] if the stored detail disagrees with the gene
/// set membership. That is an internal inconsistency, not a user error.
pub fn calc_scores(cohort: &GeneSetCohort, opts: StorageOptions) -> Result<Vec<EnrichmentScore>> {
    let list = cohort.ranked_list();
    let n = list.len();
    if n == 0 {
        return Err(Error::BadParam(format!(
            "ranked list `{}` is empty",
            list.name()
        )));
    }
    let crossover = cohort.crossover();
    let mut walks: Vec<Option<Walk>> = (0..cohort.len())
        .map(|g| cohort.table(g).map(|t| Walk::new(t, crossover, opts, n)))
        .collect();

    for rank in 0..n {
        let feature = list.name_at(rank);
        for &g in cohort.genesets_for_gene(feature) {
            if let Some(walk) = walks[g].as_mut() {
                walk.hit(rank, feature);
            }
        }
    }

    // The last rank touches every set so that trailing misses are applied.
    walks
        .into_iter()
        .enumerate()
        .map(|(g, walk)| match walk {
            Some(mut walk) => {
                walk.miss_through(n - 1);
                walk.finish(list, &cohort.gene_set(g).name)
            }
            None => Ok(empty_score(list, opts)),
        })
        .collect()
}
