use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use ksgsea_lib::data::SortOrder;
use ksgsea_lib::methods::gsea::{GSEAConfig, GSEAOutput, PermutationType};
use ksgsea_lib::methods::metric::Metric;
use ksgsea_lib::methods::scoring::ScoringScheme;
use owo_colors::{OwoColorize, Stream::Stdout};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// ksgsea CLI.
/// Gene Set Enrichment Analysis with permutation-based significance.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with a GSEA config. Flags given on the command line win.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for permutations (0 = one per core)
    #[arg(long, global = true, default_value_t = 0)]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run on a preranked list, shuffling gene sets
    Prerank(PrerankArgs),
    /// Run on an expression matrix ranked against sample classes
    Phenotype(PhenotypeArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Gene set file (.gmt)
    #[arg(long)]
    gmt: PathBuf,

    /// Where to write the JSON results
    #[arg(short, long, default_value = "gsea_results.json")]
    out: PathBuf,

    #[arg(short, long)]
    permutations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    min_size: Option<usize>,

    #[arg(long)]
    max_size: Option<usize>,

    /// classic, weighted, weighted_p2, weighted_p1.5, weighted_as or weighted_as_1
    #[arg(long)]
    scoring_scheme: Option<ScoringScheme>,

    /// Sort the ranked list ascending instead of descending
    #[arg(long, default_value_t = false)]
    ascending: bool,

    /// Do not report the running sum at every rank
    #[arg(long, default_value_t = false)]
    no_running_sum: bool,

    /// Number of top gene sets shown in the summary
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Args, Debug)]
struct PrerankArgs {
    /// Ranked list (.rnk)
    #[arg(long)]
    rnk: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct PhenotypeArgs {
    /// Expression matrix, tab-delimited
    #[arg(long)]
    expr: PathBuf,

    /// Sample labels, one per sample in matrix order
    #[arg(long)]
    classes: PathBuf,

    /// Treat labels as a numeric phenotype
    #[arg(long, default_value_t = false)]
    continuous: bool,

    /// signal_to_noise, t_test, ratio_of_classes, log2_ratio_of_classes,
    /// diff_of_classes or pearson
    #[arg(long)]
    metric: Option<Metric>,

    /// Shuffle gene sets instead of sample labels
    #[arg(long, default_value_t = false)]
    gene_set_permutation: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn load_config(path: Option<&PathBuf>) -> ksgsea_lib::Result<GSEAConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(GSEAConfig::default()),
    }
}

fn apply_common(config: &mut GSEAConfig, args: &CommonArgs) {
    if let Some(p) = args.permutations {
        config.permutations = p;
    }
    if let Some(s) = args.seed {
        config.seed = s;
    }
    if let Some(m) = args.min_size {
        config.min_size = m;
    }
    if let Some(m) = args.max_size {
        config.max_size = m;
    }
    if let Some(s) = args.scoring_scheme {
        config.scoring_scheme = s;
    }
    if args.ascending {
        config.sort_order = SortOrder::Ascending;
    }
    if args.no_running_sum {
        config.keep_running_profile = false;
    }
}

fn print_summary(output: &GSEAOutput, top: usize) {
    println!(
        "{} {} gene sets, {} permutations, ranked list `{}`",
        "GSEA".if_supports_color(Stdout, |t| t.bold()),
        output.results.len(),
        output.permutations,
        output.ranked_list
    );
    println!(
        "{:<40} {:>8} {:>8} {:>8} {:>8}",
        "set", "ES", "NES", "p", "FDR"
    );
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_owned(), |v| format!("{:.4}", v));
    for r in output.results.iter().take(top) {
        let line = format!(
            "{:<40} {:>8.4} {:>8} {:>8} {:>8}",
            r.set,
            r.es,
            fmt(r.nes),
            fmt(r.p),
            fmt(r.fdr)
        );
        if r.fdr.map_or(false, |q| q <= 0.25) {
            println!("{}", line.if_supports_color(Stdout, |t| t.green()));
        } else {
            println!("{}", line);
        }
    }
    println!(
        "{} gene sets at FDR <= 0.25",
        output.aggregates.significant(0.25)
    );
}

fn run(cli: Cli) -> ksgsea_lib::Result<()> {
    let mut config = load_config(cli.config.as_ref())?;
    let start = Instant::now();
    let (output, common) = match &cli.command {
        Commands::Prerank(args) => {
            apply_common(&mut config, &args.common);
            let rank_list = ksgsea_lib::readers::read_rank_file(&args.rnk)?;
            let gene_sets = ksgsea_lib::readers::read_gmt_file(&args.common.gmt)?;
            (
                ksgsea_lib::methods::gsea::gsea(rank_list, gene_sets, &config)?,
                &args.common,
            )
        }
        Commands::Phenotype(args) => {
            apply_common(&mut config, &args.common);
            if let Some(m) = args.metric {
                config.metric = m;
            }
            if args.gene_set_permutation {
                config.permutation_type = PermutationType::GeneSet;
            }
            let dataset = ksgsea_lib::readers::read_expression_file(&args.expr)?;
            let template = ksgsea_lib::readers::read_class_file(&args.classes, args.continuous)?;
            let gene_sets = ksgsea_lib::readers::read_gmt_file(&args.common.gmt)?;
            (
                ksgsea_lib::methods::gsea::gsea_phenotype(&dataset, template, gene_sets, &config)?,
                &args.common,
            )
        }
    };
    info!("Analysis took {:?}", start.elapsed());
    ksgsea_lib::writers::save_gsea(&common.out, &output)?;
    info!("Results written to {}", common.out.display());
    print_summary(&output, common.top);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    if cli.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
        {
            error!("Could not size thread pool: {}", e);
        }
    }
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
