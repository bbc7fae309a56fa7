use ahash::AHashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::scoring::{ScoringScheme, ScoringTable};
use crate::data::{CrossoverRank, GeneSet, RankedList};
use crate::{Error, Result};

/// Gene to gene-set-index map. Depends only on gene set membership, so one
/// index serves every permutation that re-ranks the same collection.
#[derive(Debug, Default)]
pub struct InverseIndex {
    map: AHashMap<String, Vec<usize>>,
}

impl InverseIndex {
    pub fn build(gene_sets: &[GeneSet]) -> InverseIndex {
        let mut map: AHashMap<String, Vec<usize>> = AHashMap::default();
        for (i, gs) in gene_sets.iter().enumerate() {
            for m in gs.members() {
                map.entry(m.clone()).or_default().push(i);
            }
        }
        InverseIndex { map }
    }

    /// Indices (ascending) of the gene sets containing `gene`.
    pub fn gene_sets_for(&self, gene: &str) -> &[usize] {
        self.map.get(gene).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Whether a cohort scores the real ranked list or a permutation of it.
/// Permutation runs must carry the crossover rank of the real list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Real,
    Permutation(CrossoverRank),
}

/// Gene sets that passed size filtering, plus how many did not.
#[derive(Debug, Clone)]
pub struct FilteredGeneSets {
    pub kept: Vec<GeneSet>,
    pub removed: usize,
}

/// Builds cohorts with a fixed scoring scheme and size limits.
#[derive(Debug, Clone, Copy)]
pub struct Generator {
    pub scheme: ScoringScheme,
    pub min_size: usize,
    pub max_size: usize,
}

impl Generator {
    pub fn new(scheme: ScoringScheme, min_size: usize, max_size: usize) -> Generator {
        Generator {
            scheme,
            min_size,
            max_size,
        }
    }

    /// Qualifies each gene set against `list` and keeps those whose qualified
    /// size is in `[min_size, max_size]`. Zero-member sets are always removed.
    ///
    /// # Errors
    ///
    /// [`Error::BadParam`] for `min_size > max_size`,
    /// [`Error::NoGeneSetsAfterFiltering`] when nothing survives.
    pub fn filter_gene_sets_by_members_and_size(
        &self,
        list: &RankedList,
        gene_sets: &[GeneSet],
    ) -> Result<FilteredGeneSets> {
        if self.min_size > self.max_size {
            return Err(Error::BadParam(format!(
                "min size {} is larger than max size {}",
                self.min_size, self.max_size
            )));
        }
        let kept: Vec<GeneSet> = gene_sets
            .iter()
            .map(|gs| gs.qualified(list))
            .filter(|q| {
                let size = q.num_members();
                size > 0 && size >= self.min_size && size <= self.max_size
            })
            .collect();
        let removed = gene_sets.len() - kept.len();
        if kept.is_empty() {
            return Err(Error::NoGeneSetsAfterFiltering {
                total: gene_sets.len(),
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        debug!(
            "Kept {} of {} gene sets (size {}..={})",
            kept.len(),
            gene_sets.len(),
            self.min_size,
            self.max_size
        );
        Ok(FilteredGeneSets { kept, removed })
    }

    /// Builds scoring tables for every gene set. A real-phase cohort captures
    /// the crossover rank of `list`; a permutation-phase cohort uses the one
    /// it was given.
    pub fn create_gene_set_cohort(
        &self,
        list: Arc<RankedList>,
        gene_sets: Vec<GeneSet>,
        phase: RunPhase,
    ) -> Result<GeneSetCohort> {
        let crossover = match phase {
            RunPhase::Real => list.crossover_rank(),
            RunPhase::Permutation(c) => c,
        };
        let gene_sets = Arc::new(gene_sets);
        let inverse = Arc::new(InverseIndex::build(&gene_sets));
        GeneSetCohort::assemble(self.scheme, crossover, list, gene_sets, inverse)
    }
}

/// A batch of gene sets scored together against one ranked list.
#[derive(Debug, Clone)]
pub struct GeneSetCohort {
    scheme: ScoringScheme,
    crossover: CrossoverRank,
    list: Arc<RankedList>,
    gene_sets: Arc<Vec<GeneSet>>,
    /// `None` for a gene set with no members in `list`; it scores 0.
    tables: Vec<Option<ScoringTable>>,
    inverse: Arc<InverseIndex>,
}

impl GeneSetCohort {
    fn assemble(
        scheme: ScoringScheme,
        crossover: CrossoverRank,
        list: Arc<RankedList>,
        gene_sets: Arc<Vec<GeneSet>>,
        inverse: Arc<InverseIndex>,
    ) -> Result<GeneSetCohort> {
        if list.is_empty() {
            return Err(Error::BadParam(format!(
                "ranked list `{}` is empty",
                list.name()
            )));
        }
        let mut tables = Vec::with_capacity(gene_sets.len());
        let mut empty = 0;
        for gs in gene_sets.iter() {
            if gs.members().iter().any(|m| list.contains(m)) {
                tables.push(Some(scheme.create_table(gs, &list, crossover)?));
            } else {
                empty += 1;
                tables.push(None);
            }
        }
        if !gene_sets.is_empty() && empty == gene_sets.len() {
            warn!(
                "None of the {} gene sets has a member in ranked list `{}`; all scores will be 0",
                gene_sets.len(),
                list.name()
            );
        }
        Ok(GeneSetCohort {
            scheme,
            crossover,
            list,
            gene_sets,
            tables,
            inverse,
        })
    }

    /// Same recipe and ranked list against a different gene set collection.
    /// Used by gene set shuffling, where only the sets change.
    pub fn with_gene_sets(&self, gene_sets: Vec<GeneSet>) -> Result<GeneSetCohort> {
        let gene_sets = Arc::new(gene_sets);
        let inverse = Arc::new(InverseIndex::build(&gene_sets));
        GeneSetCohort::assemble(
            self.scheme,
            self.crossover,
            self.list.clone(),
            gene_sets,
            inverse,
        )
    }

    /// Same gene sets against a re-ranked list. The inverse index is shared
    /// and the crossover rank stays that of the real list.
    pub fn with_ranked_list(&self, list: Arc<RankedList>) -> Result<GeneSetCohort> {
        if list.len() != self.list.len() {
            return Err(Error::MismatchedSize {
                context: format!("re-ranked list `{}`", list.name()),
                expected: self.list.len(),
                found: list.len(),
            });
        }
        GeneSetCohort::assemble(
            self.scheme,
            self.crossover,
            list,
            self.gene_sets.clone(),
            self.inverse.clone(),
        )
    }

    pub fn len(&self) -> usize {
        self.gene_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gene_sets.is_empty()
    }

    pub fn crossover(&self) -> CrossoverRank {
        self.crossover
    }

    pub fn ranked_list(&self) -> &Arc<RankedList> {
        &self.list
    }

    pub fn gene_sets(&self) -> &[GeneSet] {
        &self.gene_sets
    }

    pub fn gene_set(&self, index: usize) -> &GeneSet {
        &self.gene_sets[index]
    }

    pub fn table(&self, index: usize) -> Option<&ScoringTable> {
        self.tables[index].as_ref()
    }

    pub fn genesets_for_gene(&self, gene: &str) -> &[usize] {
        self.inverse.gene_sets_for(gene)
    }

    pub fn is_member(&self, index: usize, gene: &str) -> bool {
        self.genesets_for_gene(gene).binary_search(&index).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SortOrder;
    use pretty_assertions::assert_eq;

    fn list(n: usize) -> Arc<RankedList> {
        let names = (0..n).map(|i| format!("g{}", i)).collect();
        let scores = (0..n).map(|i| (n / 2) as f64 - i as f64 - 0.5).collect();
        Arc::new(RankedList::new("rl", names, scores, SortOrder::Descending).unwrap())
    }

    fn set(name: &str, members: &[usize]) -> GeneSet {
        GeneSet::new(name, members.iter().map(|i| format!("g{}", i)).collect())
    }

    #[test]
    fn inverse_index_maps_genes_to_sets() {
        let gen = Generator::new(ScoringScheme::Classic, 1, 100);
        let cohort = gen
            .create_gene_set_cohort(
                list(10),
                vec![set("a", &[0, 1]), set("b", &[1, 2]), set("c", &[9])],
                RunPhase::Real,
            )
            .unwrap();
        assert_eq!(cohort.genesets_for_gene("g1"), &[0, 1]);
        assert_eq!(cohort.genesets_for_gene("g5"), &[] as &[usize]);
        assert!(cohort.is_member(2, "g9"));
        assert!(!cohort.is_member(0, "g9"));
    }

    #[test]
    fn real_phase_captures_crossover_and_permutations_reuse_it() {
        let gen = Generator::new(ScoringScheme::WeightedAs, 1, 100);
        let real = gen
            .create_gene_set_cohort(list(10), vec![set("a", &[0, 7])], RunPhase::Real)
            .unwrap();
        assert_eq!(real.crossover(), CrossoverRank(5));

        let names: Vec<String> = (0..10).map(|i| format!("g{}", i)).collect();
        let shifted = Arc::new(
            RankedList::new("perm", names, (0..10).map(|i| 8.0 - i as f64).collect(), SortOrder::Descending)
                .unwrap(),
        );
        let perm = gen
            .create_gene_set_cohort(
                shifted.clone(),
                vec![set("a", &[0, 7])],
                RunPhase::Permutation(real.crossover()),
            )
            .unwrap();
        assert_eq!(perm.crossover(), CrossoverRank(5));
        let rescored = real.with_ranked_list(shifted).unwrap();
        assert_eq!(rescored.crossover(), CrossoverRank(5));
        assert!(Arc::ptr_eq(&rescored.inverse, &real.inverse));
    }

    #[test]
    fn with_gene_sets_rebuilds_index() {
        let gen = Generator::new(ScoringScheme::Classic, 1, 100);
        let real = gen
            .create_gene_set_cohort(list(10), vec![set("a", &[0, 1])], RunPhase::Real)
            .unwrap();
        let other = real.with_gene_sets(vec![set("r", &[4, 5])]).unwrap();
        assert!(!Arc::ptr_eq(&other.inverse, &real.inverse));
        assert_eq!(other.genesets_for_gene("g4"), &[0]);
        assert!(Arc::ptr_eq(other.ranked_list(), real.ranked_list()));
    }

    #[test]
    fn zero_member_sets_get_no_table() {
        let gen = Generator::new(ScoringScheme::Classic, 1, 100);
        let cohort = gen
            .create_gene_set_cohort(list(10), vec![set("ghost", &[])], RunPhase::Real)
            .unwrap();
        assert!(cohort.table(0).is_none());
    }

    #[test]
    fn filtering_reports_removed_count() {
        let gen = Generator::new(ScoringScheme::Classic, 2, 3);
        let sets = vec![
            set("one", &[0]),
            set("two", &[0, 1]),
            set("three", &[0, 1, 2]),
            set("four", &[0, 1, 2, 3]),
            GeneSet::new("foreign", vec!["x".into(), "y".into()]),
        ];
        let filtered = gen.filter_gene_sets_by_members_and_size(&list(10), &sets).unwrap();
        let names: Vec<&str> = filtered.kept.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["two", "three"]);
        assert_eq!(filtered.removed, 3);
        assert!(filtered.kept.iter().all(|g| g.is_qualified()));
    }

    #[test]
    fn nothing_left_is_fatal() {
        let gen = Generator::new(ScoringScheme::Classic, 5, 10);
        let res = gen.filter_gene_sets_by_members_and_size(&list(10), &[set("tiny", &[0])]);
        assert!(matches!(res, Err(Error::NoGeneSetsAfterFiltering { total: 1, .. })));
    }
}
