use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::data::{CrossoverRank, GeneSet, ListSide, RankedList};
use crate::{Error, Result};

/// How hit weight is distributed over the members of a gene set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoringScheme {
    /// Uniform hits, ignores the ranking scores.
    #[serde(rename = "classic")]
    Classic,
    /// Hits proportional to |score|.
    #[default]
    #[serde(rename = "weighted")]
    Weighted,
    /// Hits proportional to score².
    #[serde(rename = "weighted_p2")]
    WeightedP2,
    /// Hits proportional to |score|^1.5.
    #[serde(rename = "weighted_p1.5")]
    WeightedP1_5,
    /// Each side of the crossover rank is normalized on its own, both hits
    /// and misses.
    #[serde(rename = "weighted_as")]
    WeightedAs,
    /// Hits are normalized over the whole set; misses on each side carry
    /// that side's share of the hit mass.
    #[serde(rename = "weighted_as_1")]
    WeightedAs1,
}

impl ScoringScheme {
    pub const ALL: [ScoringScheme; 6] = [
        ScoringScheme::Classic,
        ScoringScheme::Weighted,
        ScoringScheme::WeightedP2,
        ScoringScheme::WeightedP1_5,
        ScoringScheme::WeightedAs,
        ScoringScheme::WeightedAs1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringScheme::Classic => "classic",
            ScoringScheme::Weighted => "weighted",
            ScoringScheme::WeightedP2 => "weighted_p2",
            ScoringScheme::WeightedP1_5 => "weighted_p1.5",
            ScoringScheme::WeightedAs => "weighted_as",
            ScoringScheme::WeightedAs1 => "weighted_as_1",
        }
    }

    /// Asymmetric schemes depend on the crossover rank of the real list.
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, ScoringScheme::WeightedAs | ScoringScheme::WeightedAs1)
    }

    fn weight(&self, score: f64) -> f64 {
        match self {
            ScoringScheme::Classic => 1.0,
            ScoringScheme::Weighted | ScoringScheme::WeightedAs | ScoringScheme::WeightedAs1 => {
                score.abs()
            }
            ScoringScheme::WeightedP2 => score * score,
            ScoringScheme::WeightedP1_5 => score.abs().powf(1.5),
        }
    }

    /// Precomputes hit and miss scores for `gene_set` against `list`.
    ///
    /// `crossover` must come from the real (unpermuted) ranked list. It only
    /// affects the asymmetric schemes.
    ///
    /// # Errors
    ///
    /// [`Error::BadParam`] when no member of `gene_set` is in `list`.
    pub fn create_table(
        &self,
        gene_set: &GeneSet,
        list: &RankedList,
        crossover: CrossoverRank,
    ) -> Result<ScoringTable> {
        let members: Vec<(usize, &str)> = gene_set
            .members()
            .iter()
            .filter_map(|m| list.rank(m).map(|r| (r, m.as_str())))
            .collect();
        if members.is_empty() {
            return Err(Error::BadParam(format!(
                "gene set `{}` has no members in ranked list `{}`",
                gene_set.name,
                list.name()
            )));
        }
        let n = list.len();
        let k = members.len();
        let weights: Vec<f64> = members
            .iter()
            .map(|&(r, _)| self.weight(list.score_at(r)))
            .collect();
        // non-finite weights are left out of the mass; their own hit turns
        // non-finite and is clamped by the walk
        let finite_sum = |pred: &dyn Fn(usize) -> bool| -> f64 {
            members
                .iter()
                .zip(weights.iter())
                .filter(|((r, _), w)| pred(*r) && w.is_finite())
                .map(|(_, w)| w)
                .sum()
        };
        let mut hits = AHashMap::with_capacity(k);
        let (upper_miss, lower_miss) = if self.is_asymmetric() {
            let n_upper = crossover.0.min(n);
            let n_lower = n - n_upper;
            let k_upper = members
                .iter()
                .filter(|(r, _)| crossover.side(*r) == ListSide::Upper)
                .count();
            let k_lower = k - k_upper;
            let miss_upper_count = n_upper - k_upper;
            let miss_lower_count = n_lower - k_lower;
            let upper_mass = finite_sum(&|r| crossover.side(r) == ListSide::Upper);
            let lower_mass = finite_sum(&|r| crossover.side(r) == ListSide::Lower);
            let total_mass = upper_mass + lower_mass;
            for (&(r, name), &w) in members.iter().zip(weights.iter()) {
                let denom = match self {
                    ScoringScheme::WeightedAs => match crossover.side(r) {
                        ListSide::Upper => upper_mass,
                        ListSide::Lower => lower_mass,
                    },
                    _ => total_mass,
                };
                hits.insert(name.to_owned(), w / denom);
            }
            let miss = |members_on_side: usize, misses_on_side: usize, share: f64| {
                if members_on_side == 0 || misses_on_side == 0 {
                    0.0
                } else {
                    share / misses_on_side as f64
                }
            };
            match self {
                ScoringScheme::WeightedAs => (
                    miss(k_upper, miss_upper_count, 1.0),
                    miss(k_lower, miss_lower_count, 1.0),
                ),
                _ => {
                    let (upper_share, lower_share) = if total_mass > 0.0 {
                        (upper_mass / total_mass, lower_mass / total_mass)
                    } else {
                        (0.0, 0.0)
                    };
                    (
                        miss(k_upper, miss_upper_count, upper_share),
                        miss(k_lower, miss_lower_count, lower_share),
                    )
                }
            }
        } else {
            let total = finite_sum(&|_| true);
            for (&(_, name), &w) in members.iter().zip(weights.iter()) {
                let hit = match self {
                    ScoringScheme::Classic => 1.0 / k as f64,
                    _ => w / total,
                };
                hits.insert(name.to_owned(), hit);
            }
            let miss = if n > k { 1.0 / (n - k) as f64 } else { 0.0 };
            (miss, miss)
        };
        Ok(ScoringTable {
            hits,
            upper_miss,
            lower_miss,
            crossover,
        })
    }
}

impl fmt::Display for ScoringScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<ScoringScheme> {
        ScoringScheme::ALL
            .iter()
            .find(|scheme| scheme.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::BadParam(format!("unknown scoring scheme `{}`", s)))
    }
}

/// Hit and miss scores of one gene set against one ranked list. Built fresh
/// for every (gene set, ranked list) pair, permutations included.
#[derive(Debug, Clone)]
pub struct ScoringTable {
    hits: AHashMap<String, f64>,
    upper_miss: f64,
    lower_miss: f64,
    crossover: CrossoverRank,
}

impl ScoringTable {
    /// Hit score of `feature`, 0 for non-members. May be non-finite when the
    /// weight mass is degenerate.
    pub fn hit_score(&self, feature: &str) -> f64 {
        self.hits.get(feature).copied().unwrap_or(0.0)
    }

    /// Penalty applied for a non-member on `side` of the crossover.
    pub fn miss_score(&self, side: ListSide) -> f64 {
        match side {
            ListSide::Upper => self.upper_miss,
            ListSide::Lower => self.lower_miss,
        }
    }

    pub fn miss_score_at(&self, rank: usize) -> f64 {
        self.miss_score(self.crossover.side(rank))
    }

    pub fn num_members(&self) -> usize {
        self.hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SortOrder;
    use statrs::assert_almost_eq;

    fn ten_feature_list() -> RankedList {
        let names = (0..10).map(|i| format!("g{}", i)).collect();
        let scores = vec![5.0, 4.0, 3.0, 2.0, 1.0, -1.0, -2.0, -3.0, -4.0, -5.0];
        RankedList::new("rl", names, scores, SortOrder::Descending).unwrap()
    }

    fn set(names: &[&str]) -> GeneSet {
        GeneSet::new("gs", names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn classic_is_uniform() {
        let rl = ten_feature_list();
        let t = ScoringScheme::Classic
            .create_table(&set(&["g0", "g1", "g2"]), &rl, rl.crossover_rank())
            .unwrap();
        assert_almost_eq!(t.hit_score("g1"), 1.0 / 3.0, 1e-12);
        assert_almost_eq!(t.miss_score_at(9), 1.0 / 7.0, 1e-12);
        assert_eq!(t.hit_score("g9"), 0.0);
    }

    #[test]
    fn weighted_exponents() {
        let rl = ten_feature_list();
        let gs = set(&["g0", "g4"]);
        let cross = rl.crossover_rank();
        let w = ScoringScheme::Weighted.create_table(&gs, &rl, cross).unwrap();
        assert_almost_eq!(w.hit_score("g0"), 5.0 / 6.0, 1e-12);
        let w2 = ScoringScheme::WeightedP2.create_table(&gs, &rl, cross).unwrap();
        assert_almost_eq!(w2.hit_score("g0"), 25.0 / 26.0, 1e-12);
        let w15 = ScoringScheme::WeightedP1_5.create_table(&gs, &rl, cross).unwrap();
        let a = 5f64.powf(1.5);
        assert_almost_eq!(w15.hit_score("g4"), 1.0 / (a + 1.0), 1e-12);
    }

    #[test]
    fn symmetric_schemes_balance_hits_and_misses() {
        let rl = ten_feature_list();
        let gs = set(&["g1", "g5", "g8"]);
        for scheme in [
            ScoringScheme::Classic,
            ScoringScheme::Weighted,
            ScoringScheme::WeightedP2,
            ScoringScheme::WeightedP1_5,
        ] {
            let t = scheme.create_table(&gs, &rl, rl.crossover_rank()).unwrap();
            let hit_mass: f64 = gs.members().iter().map(|m| t.hit_score(m)).sum();
            let miss_mass = 7.0 * t.miss_score_at(0);
            assert_almost_eq!(hit_mass, miss_mass, 1e-12);
        }
    }

    #[test]
    fn asymmetric_sides_normalize_independently() {
        let rl = ten_feature_list();
        let gs = set(&["g0", "g1", "g7"]);
        let t = ScoringScheme::WeightedAs
            .create_table(&gs, &rl, rl.crossover_rank())
            .unwrap();
        assert_almost_eq!(t.hit_score("g0") + t.hit_score("g1"), 1.0, 1e-12);
        assert_almost_eq!(t.hit_score("g7"), 1.0, 1e-12);
        assert_almost_eq!(t.miss_score(ListSide::Upper), 1.0 / 3.0, 1e-12);
        assert_almost_eq!(t.miss_score(ListSide::Lower), 1.0 / 4.0, 1e-12);

        let t1 = ScoringScheme::WeightedAs1
            .create_table(&gs, &rl, rl.crossover_rank())
            .unwrap();
        assert_almost_eq!(t1.hit_score("g7"), 3.0 / 12.0, 1e-12);
        assert_almost_eq!(t1.miss_score(ListSide::Upper), (9.0 / 12.0) / 3.0, 1e-12);
    }

    #[test]
    fn asymmetric_uses_supplied_crossover() {
        let rl = ten_feature_list();
        let gs = set(&["g0", "g7"]);
        // crossover of some other (real) list, not of `rl`
        let t = ScoringScheme::WeightedAs
            .create_table(&gs, &rl, CrossoverRank(8))
            .unwrap();
        assert_almost_eq!(t.hit_score("g7"), 3.0 / 8.0, 1e-12);
        assert_almost_eq!(t.miss_score(ListSide::Lower), 0.0, 1e-12);
    }

    #[test]
    fn zero_members_is_an_error() {
        let rl = ten_feature_list();
        let res = ScoringScheme::Classic.create_table(&set(&["nope"]), &rl, rl.crossover_rank());
        assert!(matches!(res, Err(Error::BadParam(_))));
    }

    #[test]
    fn scheme_names_round_trip() {
        for scheme in ScoringScheme::ALL {
            assert_eq!(scheme.as_str().parse::<ScoringScheme>().unwrap(), scheme);
        }
        assert!("bogus".parse::<ScoringScheme>().is_err());
    }
}
