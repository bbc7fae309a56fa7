use pretty_assertions::assert_eq;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use statrs::assert_almost_eq;
use std::sync::Arc;

use ksgsea_lib::data::{GeneSet, RankedList, SortOrder, Template};
use ksgsea_lib::methods::cohort::Generator;
use ksgsea_lib::methods::gsea::{gsea, gsea_phenotype, GSEAConfig, PermutationType, RankListItem};
use ksgsea_lib::methods::ks_tests::KsTests;
use ksgsea_lib::methods::pvalue::calc_np_values_and_fdr;
use ksgsea_lib::methods::scoring::ScoringScheme;
use ksgsea_lib::Error;

const THRESHOLD: f64 = 0.0001;

fn small_config(permutations: usize) -> GSEAConfig {
    GSEAConfig {
        permutations,
        ..GSEAConfig::default()
    }
}

#[test]
fn prerank_small() {
    let rank_list = ksgsea_lib::readers::read_rank_file("data/small.rnk").unwrap();
    let gmt = ksgsea_lib::readers::read_gmt_file("data/small.gmt").unwrap();
    let out = gsea(rank_list, gmt, &small_config(200)).unwrap();

    let names: Vec<&str> = out.results.iter().map(|r| r.set.as_str()).collect();
    assert_eq!(out.results.len(), 4);
    assert!(!names.contains(&"TINY"));
    assert!(!names.contains(&"FOREIGN"));

    let top = out.results.iter().find(|r| r.set == "TOP_SET").unwrap();
    assert_almost_eq!(top.es, 1.0, THRESHOLD);
    assert_eq!(top.rank_at_max, 19);
    assert_eq!(top.leading_edge, 20);
    assert!(top.nes.unwrap() > 1.0);
    assert!(top.fdr.unwrap() < 0.05);

    let bottom = out.results.iter().find(|r| r.set == "BOTTOM_SET").unwrap();
    assert_almost_eq!(bottom.es, -1.0, THRESHOLD);
    assert!(bottom.nes.unwrap() < -1.0);
    assert_eq!(names.last(), Some(&"BOTTOM_SET"));

    let partial = out.results.iter().find(|r| r.set == "PARTIAL").unwrap();
    assert_eq!(partial.size, 15);
    assert_eq!(partial.original_size, 20);
    assert_eq!(out.aggregates.es.len(), 4);
}

#[test]
fn prerank_is_reproducible() {
    let run = |seed| {
        let config = GSEAConfig {
            seed,
            ..small_config(50)
        };
        gsea(
            ksgsea_lib::readers::read_rank_file("data/small.rnk").unwrap(),
            ksgsea_lib::readers::read_gmt_file("data/small.gmt").unwrap(),
            &config,
        )
        .unwrap()
    };
    assert_eq!(run(11).results, run(11).results);
}

#[test]
fn asymmetric_schemes_run_end_to_end() {
    for scheme in [ScoringScheme::WeightedAs, ScoringScheme::WeightedAs1] {
        let config = GSEAConfig {
            scoring_scheme: scheme,
            ..small_config(30)
        };
        let out = gsea(
            ksgsea_lib::readers::read_rank_file("data/small.rnk").unwrap(),
            ksgsea_lib::readers::read_gmt_file("data/small.gmt").unwrap(),
            &config,
        )
        .unwrap();
        let top = out.results.iter().find(|r| r.set == "TOP_SET").unwrap();
        assert!(top.es > 0.0);
        assert!(out.results.iter().all(|r| r.es.is_finite()));
    }
}

#[test]
fn ten_feature_classic_scenario() {
    let items: Vec<RankListItem> = [5.0, 4.0, 3.0, 2.0, 1.0, -1.0, -2.0, -3.0, -4.0, -5.0]
        .iter()
        .enumerate()
        .map(|(i, &rank)| RankListItem {
            analyte: format!("f{}", i),
            rank,
        })
        .collect();
    let sets = vec![GeneSet::new(
        "top3",
        vec!["f0".into(), "f1".into(), "f2".into()],
    )];
    let config = GSEAConfig {
        min_size: 1,
        permutations: 0,
        scoring_scheme: ScoringScheme::Classic,
        ..GSEAConfig::default()
    };
    let out = gsea(items, sets, &config).unwrap();
    let r = &out.results[0];
    assert_almost_eq!(r.es, 1.0, 1e-12);
    assert_eq!(r.rank_at_max, 2);
    assert_eq!(r.nes, None);
    assert_eq!(r.fdr, None);
    let running = r.running_sum.as_ref().unwrap();
    assert_almost_eq!(running[0], 1.0 / 3.0, 1e-12);
    assert_almost_eq!(running[1], 2.0 / 3.0, 1e-12);
    assert_almost_eq!(running[2], 1.0, 1e-12);
    assert_almost_eq!(running[9], 0.0, 1e-12);
}

#[test]
fn zero_sum_for_symmetric_schemes() {
    let n = 200;
    let items: Vec<RankListItem> = (0..n)
        .map(|i| RankListItem {
            analyte: format!("g{}", i),
            rank: ((i * 37) % 101) as f64 / 10.0 - 5.0,
        })
        .collect();
    let members: Vec<String> = (0..n).step_by(9).map(|i| format!("g{}", i)).collect();
    for scheme in [
        ScoringScheme::Classic,
        ScoringScheme::Weighted,
        ScoringScheme::WeightedP2,
        ScoringScheme::WeightedP1_5,
    ] {
        let config = GSEAConfig {
            min_size: 1,
            permutations: 0,
            scoring_scheme: scheme,
            ..GSEAConfig::default()
        };
        let items = items
            .iter()
            .map(|i| RankListItem {
                analyte: i.analyte.clone(),
                rank: i.rank,
            })
            .collect();
        let out = gsea(items, vec![GeneSet::new("s", members.clone())], &config).unwrap();
        let running = out.results[0].running_sum.as_ref().unwrap();
        assert_almost_eq!(*running.last().unwrap(), 0.0, 1e-9);
    }
}

#[test]
fn negative_maximum_is_reported_negative() {
    // one early hit, then the walk sinks well below its peak
    let items: Vec<RankListItem> = (0..20)
        .map(|i| RankListItem {
            analyte: format!("g{}", i),
            rank: 10.0 - i as f64,
        })
        .collect();
    let sets = vec![GeneSet::new(
        "late",
        vec!["g1".into(), "g17".into(), "g18".into(), "g19".into()],
    )];
    let config = GSEAConfig {
        min_size: 1,
        permutations: 0,
        scoring_scheme: ScoringScheme::Classic,
        ..GSEAConfig::default()
    };
    let out = gsea(items, sets, &config).unwrap();
    let r = &out.results[0];
    // one miss, the hit at g1, then 15 more misses of 1/16 each
    assert_almost_eq!(r.es, 0.25 - 16.0 / 16.0, 1e-12);
    assert_eq!(r.rank_at_max, 16);
    assert!(r.es < 0.0);
}

#[test]
fn size_filter_counts_removed_sets() {
    let names: Vec<String> = (0..1000).map(|i| format!("g{}", i)).collect();
    let scores: Vec<f64> = (0..1000).map(|i| 500.0 - i as f64).collect();
    let list = RankedList::new("rl", names, scores, SortOrder::Descending).unwrap();
    let mut rng = SmallRng::seed_from_u64(7);
    let sets: Vec<GeneSet> = (0..100)
        .map(|i| {
            let size = rng.gen_range(1..=500);
            let offset = rng.gen_range(0..500);
            GeneSet::new(
                format!("set{}", i),
                (offset..offset + size).map(|j| format!("g{}", j)).collect(),
            )
        })
        .collect();
    let expected_removed = sets
        .iter()
        .filter(|s| s.num_members() < 15 || s.num_members() > 500)
        .count();
    let filtered = Generator::new(ScoringScheme::Weighted, 15, 500)
        .filter_gene_sets_by_members_and_size(&list, &sets)
        .unwrap();
    assert_eq!(filtered.removed, expected_removed);
    assert_eq!(filtered.kept.len(), 100 - expected_removed);
    assert!(filtered
        .kept
        .iter()
        .all(|s| (15..=500).contains(&s.num_members())));
}

#[test]
fn nan_feature_does_not_poison_other_sets() {
    let names: Vec<String> = (0..40).map(|i| format!("g{}", i)).collect();
    let mut scores: Vec<f64> = (0..40).map(|i| 20.0 - i as f64).collect();
    scores[7] = f64::NAN;
    let list = Arc::new(RankedList::new("rl", names, scores, SortOrder::Descending).unwrap());
    let sets = vec![
        GeneSet::new("nan_only", vec!["g7".into()]),
        GeneSet::new("top", (0..6).map(|i| format!("g{}", i)).collect()),
    ];
    let tests = KsTests::new(Generator::new(ScoringScheme::Weighted, 1, 100), 40, 3);
    let raw = tests
        .shuffle_gene_set_precanned_ranked_list(list, &sets)
        .unwrap();
    assert!(raw[0].score.es.is_finite());
    let calibrated = calc_np_values_and_fdr(&raw).unwrap();
    let top = calibrated[1].significance().unwrap();
    assert!(top.nes.unwrap().is_finite());
    assert!(top.fdr_q.is_finite() && top.fdr_q <= 1.0);
    let degenerate = calibrated[0].significance().unwrap();
    assert!(degenerate.fdr_q <= 1.0);
}

#[test]
fn phenotype_small() {
    let dataset = ksgsea_lib::readers::read_expression_file("data/small_expr.tsv").unwrap();
    let template = ksgsea_lib::readers::read_class_file("data/small_classes.txt", false).unwrap();
    let gmt = ksgsea_lib::readers::read_gmt_file("data/small_expr.gmt").unwrap();
    for permutation_type in [PermutationType::Phenotype, PermutationType::GeneSet] {
        let config = GSEAConfig {
            min_size: 5,
            permutation_type,
            ..small_config(40)
        };
        let out = gsea_phenotype(&dataset, template.clone(), gmt.clone(), &config).unwrap();
        assert_eq!(out.permutations, 40);
        assert_eq!(out.results[0].set, "UP");
        assert!(out.results[0].es > 0.5);
        assert_eq!(out.ranked_list, "small_expr_small_classes");
    }
}

#[test]
fn phenotype_rejects_small_classes_up_front() {
    let dataset = ksgsea_lib::readers::read_expression_file("data/small_expr.tsv").unwrap();
    let template =
        Template::categorical("lopsided", &["A", "A", "A", "A", "A", "A", "B", "B"]).unwrap();
    let gmt = ksgsea_lib::readers::read_gmt_file("data/small_expr.gmt").unwrap();
    let res = gsea_phenotype(&dataset, template, gmt, &small_config(1000));
    assert!(matches!(
        res,
        Err(Error::InsufficientSamples {
            found: 2,
            required: 3,
            ..
        })
    ));
}

#[test]
fn foreign_gene_sets_are_a_configuration_error() {
    let rank_list = ksgsea_lib::readers::read_rank_file("data/small.rnk").unwrap();
    let foreign = vec![GeneSet::new(
        "FOREIGN",
        (1..=20).map(|i| format!("OTHER{}", i)).collect(),
    )];
    let res = gsea(rank_list, foreign, &small_config(10));
    assert!(matches!(res, Err(Error::NoGeneSetsAfterFiltering { .. })));
}

#[test]
fn infinite_prerank_score_ranks_last() {
    let mut rank_list = ksgsea_lib::readers::read_rank_file("data/small.rnk").unwrap();
    rank_list.push(RankListItem {
        analyte: "DEGENERATE".into(),
        rank: f64::INFINITY,
    });
    let config = GSEAConfig {
        min_size: 1,
        permutations: 0,
        scoring_scheme: ScoringScheme::Classic,
        ..GSEAConfig::default()
    };
    let sets = vec![GeneSet::new("degenerate", vec!["DEGENERATE".into()])];
    let out = gsea(rank_list, sets, &config).unwrap();
    let r = &out.results[0];
    // 60 misses of 1/60 come before the lone hit at the bottom
    assert_almost_eq!(r.es, -1.0, THRESHOLD);
    assert_eq!(r.rank_at_max, 59);
}
