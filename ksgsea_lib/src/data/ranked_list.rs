use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::stat::{cmp_ascending_nan_last, cmp_descending_nan_last};
use crate::{Error, MalformedError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

/// Which side of the crossover rank a position falls on. For a descending
/// list the upper side holds the positive scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSide {
    Upper,
    Lower,
}

/// Rank at which the scores of a ranked list change sign, i.e. the number of
/// leading ranks on the upper side. Captured from the real (unpermuted) list
/// and handed to every permutation run that needs it. Non-finite scores are
/// never on the upper side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverRank(pub usize);

impl CrossoverRank {
    pub fn of(list: &RankedList) -> CrossoverRank {
        let upper = |s: f64| {
            s.is_finite()
                && match list.order {
                    SortOrder::Descending => s >= 0.0,
                    SortOrder::Ascending => s < 0.0,
                }
        };
        let rank = list
            .scores
            .iter()
            .position(|&s| !upper(s))
            .unwrap_or(list.scores.len());
        CrossoverRank(rank)
    }

    pub fn side(&self, rank: usize) -> ListSide {
        if rank < self.0 {
            ListSide::Upper
        } else {
            ListSide::Lower
        }
    }
}

/// Features ordered by score with O(1) lookup of rank and score by name.
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct RankedList {
    name: String,
    names: Vec<String>,
    scores: Vec<f64>,
    order: SortOrder,
    index: AHashMap<String, usize>,
}

impl RankedList {
    /// Sorts `names`/`scores` by `order`. Ties keep their input order and NaN
    /// scores go to the bottom regardless of order.
    pub fn new(
        name: impl Into<String>,
        names: Vec<String>,
        scores: Vec<f64>,
        order: SortOrder,
    ) -> Result<RankedList> {
        if names.len() != scores.len() {
            return Err(Error::BadParam(format!(
                "ranked list has {} names but {} scores",
                names.len(),
                scores.len()
            )));
        }
        let mut idx: Vec<usize> = (0..names.len()).collect();
        match order {
            SortOrder::Descending => {
                idx.sort_by(|&a, &b| cmp_descending_nan_last(scores[a], scores[b]))
            }
            SortOrder::Ascending => {
                idx.sort_by(|&a, &b| cmp_ascending_nan_last(scores[a], scores[b]))
            }
        }
        let mut names = names.into_iter().map(Some).collect::<Vec<Option<String>>>();
        let mut sorted_names = Vec::with_capacity(idx.len());
        let mut sorted_scores = Vec::with_capacity(idx.len());
        for i in idx {
            if let Some(n) = names[i].take() {
                sorted_names.push(n);
                sorted_scores.push(scores[i]);
            }
        }
        Self::from_sorted(name, sorted_names, sorted_scores, order)
    }

    /// Builds a list whose entries are already in rank order.
    pub fn from_sorted(
        name: impl Into<String>,
        names: Vec<String>,
        scores: Vec<f64>,
        order: SortOrder,
    ) -> Result<RankedList> {
        if names.len() != scores.len() {
            return Err(Error::BadParam(format!(
                "ranked list has {} names but {} scores",
                names.len(),
                scores.len()
            )));
        }
        let mut index = AHashMap::with_capacity(names.len());
        for (i, n) in names.iter().enumerate() {
            if index.insert(n.clone(), i).is_some() {
                return Err(MalformedError::DuplicateFeature(n.clone()).into());
            }
        }
        Ok(RankedList {
            name: name.into(),
            names,
            scores,
            order,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn rank(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.rank(name).map(|r| self.scores[r])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn name_at(&self, rank: usize) -> &str {
        &self.names[rank]
    }

    pub fn score_at(&self, rank: usize) -> f64 {
        self.scores[rank]
    }

    pub fn crossover_rank(&self) -> CrossoverRank {
        CrossoverRank::of(self)
    }
}
