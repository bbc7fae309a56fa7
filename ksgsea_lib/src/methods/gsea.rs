use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::cohort::Generator;
use super::ks_tests::KsTests;
use super::metric::{Metric, MetricParams, Ranker};
use super::pvalue::{calc_np_values_and_fdr, cmp_by_nes, Aggregates};
use super::results::EnrichmentResult;
use super::scoring::ScoringScheme;
use crate::data::{Dataset, GeneSet, RankedList, SortOrder, Template};
use crate::Result;

pub struct RankListItem {
    pub analyte: String,
    pub rank: f64,
}

impl RankListItem {
    pub fn to_vecs(input: Vec<RankListItem>) -> (Vec<String>, Vec<f64>) {
        let mut analytes: Vec<String> = Vec::with_capacity(input.len());
        let mut ranks: Vec<f64> = Vec::with_capacity(input.len());
        for item in input {
            analytes.push(item.analyte);
            ranks.push(item.rank)
        }
        (analytes, ranks)
    }
}

/// What gets permuted to build the null distributions of a phenotype run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermutationType {
    /// Shuffle sample labels and re-rank the dataset.
    #[default]
    Phenotype,
    /// Keep the ranking and compare against random gene sets.
    GeneSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Options for a GSEA run. Missing keys in a JSON config take the defaults.
pub struct GSEAConfig {
    /// Smallest qualified gene set size kept (default: 15)
    pub min_size: usize,
    /// Largest qualified gene set size kept (default: 500)
    pub max_size: usize,
    /// Number of permutations; 0 skips significance (default: 1000)
    pub permutations: usize,
    pub seed: u64,
    pub scoring_scheme: ScoringScheme,
    /// Metric used to rank a dataset. Ignored for preranked runs.
    pub metric: Metric,
    pub metric_params: MetricParams,
    pub sort_order: SortOrder,
    /// Ignored for preranked runs, which always shuffle gene sets.
    pub permutation_type: PermutationType,
    /// Report the running sum at every rank.
    pub keep_running_profile: bool,
    pub chip: Option<String>,
}

impl Default for GSEAConfig {
    fn default() -> Self {
        GSEAConfig {
            min_size: 15,
            max_size: 500,
            permutations: 1000,
            seed: 149,
            scoring_scheme: ScoringScheme::Weighted,
            metric: Metric::SignalToNoise,
            metric_params: MetricParams::default(),
            sort_order: SortOrder::Descending,
            permutation_type: PermutationType::Phenotype,
            keep_running_profile: true,
            chip: None,
        }
    }
}

impl GSEAConfig {
    pub fn generator(&self) -> Generator {
        Generator::new(self.scoring_scheme, self.min_size, self.max_size)
    }

    pub fn ranker(&self) -> Ranker {
        Ranker::new(self.metric, self.metric_params, self.sort_order)
    }

    pub fn ks_tests(&self) -> KsTests {
        let tests = KsTests::new(self.generator(), self.permutations, self.seed)
            .keep_running_profile(self.keep_running_profile);
        match &self.chip {
            Some(chip) => tests.with_chip(chip.clone()),
            None => tests,
        }
    }
}

/// One report row per gene set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GSEAResult {
    pub set: String,
    pub description: Option<String>,
    /// Members present in the ranked list.
    pub size: usize,
    /// Members as loaded.
    pub original_size: usize,
    pub es: f64,
    pub nes: Option<f64>,
    pub p: Option<f64>,
    pub fdr: Option<f64>,
    pub fwer: Option<f64>,
    pub rank_at_max: usize,
    pub score_at_max: f64,
    /// Number of leading edge hits.
    pub leading_edge: usize,
    pub leading_edge_genes: Vec<String>,
    pub mann_whitney_p: Option<f64>,
    pub running_sum: Option<Vec<f64>>,
}

impl GSEAResult {
    pub fn from_enrichment(result: &EnrichmentResult) -> GSEAResult {
        let significance = result.significance();
        let leading_edge_genes: Vec<String> = result
            .leading_edge()
            .unwrap_or_default()
            .into_iter()
            .map(str::to_owned)
            .collect();
        GSEAResult {
            set: result.gene_set.name.clone(),
            description: result.gene_set.description.clone(),
            size: result.gene_set.num_members(),
            original_size: result.gene_set.original_size(),
            es: result.score.es,
            nes: significance.and_then(|s| s.nes),
            p: significance.and_then(|s| s.nominal_p),
            fdr: significance.map(|s| s.fdr_q),
            fwer: significance.map(|s| s.fwer_p),
            rank_at_max: result.score.rank_at_es,
            score_at_max: result.score.score_at_es,
            leading_edge: leading_edge_genes.len(),
            leading_edge_genes,
            mann_whitney_p: result.score.mann_whitney.map(|m| m.p_value),
            running_sum: result.score.running_profile.clone(),
        }
    }
}

/// Report rows, sorted by NES, plus the global vectors behind them.
#[derive(Debug, Clone, Serialize)]
pub struct GSEAOutput {
    pub ranked_list: String,
    pub permutations: usize,
    pub results: Vec<GSEAResult>,
    pub aggregates: Aggregates,
}

fn finish(list: &RankedList, results: Vec<EnrichmentResult>) -> Result<GSEAOutput> {
    let permutations = results.first().map_or(0, |r| r.num_permutations());
    let mut calibrated = calc_np_values_and_fdr(&results)?;
    let aggregates = Aggregates::from_results(&calibrated);
    calibrated.sort_by(cmp_by_nes);
    info!(
        "Scored {} gene sets against `{}` with {} permutations",
        calibrated.len(),
        list.name(),
        permutations
    );
    Ok(GSEAOutput {
        ranked_list: list.name().to_owned(),
        permutations,
        results: calibrated.iter().map(GSEAResult::from_enrichment).collect(),
        aggregates,
    })
}

/// Runs GSEA on a preranked list, shuffling gene sets for the null.
///
/// # Parameters
/// - `rank_list` - analytes and their scores, in any order
/// - `gene_sets` - gene sets as loaded; they are qualified and size filtered
/// - `config` - a [`GSEAConfig`]
///
/// # Returns
///
/// A [`GSEAOutput`] that is [serde](https://serde.rs/) compatible.
pub fn gsea(
    rank_list: Vec<RankListItem>,
    gene_sets: Vec<GeneSet>,
    config: &GSEAConfig,
) -> Result<GSEAOutput> {
    let (analytes, ranks) = RankListItem::to_vecs(rank_list);
    let list = Arc::new(RankedList::new("preranked", analytes, ranks, config.sort_order)?);
    info!(
        "Starting preranked GSEA: {} features, {} gene sets",
        list.len(),
        gene_sets.len()
    );
    let results = config
        .ks_tests()
        .shuffle_gene_set_precanned_ranked_list(list.clone(), &gene_sets)?;
    finish(&list, results)
}

/// Runs GSEA on an expression dataset ranked against `template`.
/// `config.permutation_type` picks between label and gene set shuffling.
pub fn gsea_phenotype(
    dataset: &Dataset,
    template: Template,
    gene_sets: Vec<GeneSet>,
    config: &GSEAConfig,
) -> Result<GSEAOutput> {
    let ranker = config.ranker();
    ranker.validate(&template)?;
    let template = Arc::new(template);
    info!(
        "Starting GSEA on `{}`: {} features, {} samples, {} gene sets, {:?} permutations",
        dataset.name,
        dataset.num_features(),
        dataset.num_samples(),
        gene_sets.len(),
        config.permutation_type
    );
    let tests = config.ks_tests();
    let results = match config.permutation_type {
        PermutationType::Phenotype => {
            tests.shuffle_template(dataset, template, &ranker, &gene_sets)?
        }
        PermutationType::GeneSet => {
            tests.shuffle_gene_set(dataset, template, &ranker, &gene_sets)?
        }
    };
    match results.first() {
        Some(first) => {
            let list = first.ranked_list.clone();
            finish(&list, results)
        }
        None => Ok(GSEAOutput {
            ranked_list: dataset.name.clone(),
            permutations: 0,
            results: Vec::new(),
            aggregates: Aggregates::from_results(&[]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_keys() {
        let config: GSEAConfig =
            serde_json::from_str(r#"{"permutations": 10, "scoring_scheme": "weighted_p1.5"}"#)
                .unwrap();
        assert_eq!(config.permutations, 10);
        assert_eq!(config.scoring_scheme, ScoringScheme::WeightedP1_5);
        assert_eq!(config.min_size, 15);
        assert_eq!(config.metric, Metric::SignalToNoise);
        assert_eq!(config.permutation_type, PermutationType::Phenotype);
    }

    #[test]
    fn preranked_rows_sorted_by_nes() {
        let items: Vec<RankListItem> = (0..100)
            .map(|i| RankListItem {
                analyte: format!("g{}", i),
                rank: 50.0 - i as f64,
            })
            .collect();
        let sets = vec![
            GeneSet::new("bottom", (85..100).map(|i| format!("g{}", i)).collect()),
            GeneSet::new("top", (0..15).map(|i| format!("g{}", i)).collect()),
        ];
        let config = GSEAConfig {
            permutations: 100,
            ..GSEAConfig::default()
        };
        let out = gsea(items, sets, &config).unwrap();
        assert_eq!(out.permutations, 100);
        assert_eq!(out.results[0].set, "top");
        assert!(out.results[0].nes.unwrap() > 0.0);
        assert!(out.results[1].nes.unwrap() < 0.0);
        assert_eq!(out.results[0].leading_edge, 15);
        assert_eq!(out.results[0].running_sum.as_ref().unwrap().len(), 100);
        assert!(out.results[0].fdr.unwrap() < 0.05);
    }
}
