use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use narrativas::{
    config::{CONFIG_FILE_NAME, Settings, get_or_create_user_config_path},
    display::{ReportWriter, Summary},
    narr::{
        NewsItem, Pipeline, QualityEvaluator,
        cluster::{ClusterSelectionMethod, DistanceMetric},
        optimize::{ParameterRanges, optimize_parameters},
        sink::TracingSink,
    },
    store,
};
use tracing_subscriber::{EnvFilter, fmt};

/// nr: extract the day's news narratives
#[derive(Parser)]
#[command(name = "nr")]
#[command(about = "Cluster news items into narratives", long_about = None)]
struct Cli {
    /// Config file. Defaults to ~/.config/narrativas/config.toml.
    #[arg(short, long, global = true, env = "NR_CONFIG")]
    config: Option<PathBuf>,

    /// More output; repeat for more. RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a batch of news items and write a report.
    Analyze {
        /// JSON array or JSON lines file of news items.
        #[arg(short, long)]
        input: PathBuf,

        /// Reports dir, overriding the config.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip clustering quality evaluation.
        #[arg(long = "no-quality")]
        no_quality: bool,

        /// Analyze every item regardless of publication time.
        #[arg(long = "all-dates")]
        all_dates: bool,
    },

    /// Grid search clustering parameters on a batch of news items.
    Optimize {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long = "min-cluster-size", value_delimiter = ',')]
        min_cluster_size: Vec<usize>,

        #[arg(long = "min-samples", value_delimiter = ',')]
        min_samples: Vec<usize>,

        #[arg(long, value_enum, value_delimiter = ',')]
        metric: Vec<DistanceMetric>,

        #[arg(long, value_enum, value_delimiter = ',')]
        method: Vec<ClusterSelectionMethod>,
    },

    /// Print the effective configuration as TOML.
    Config {
        /// Write the defaults to the user config dir if no config exists there.
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            input,
            out,
            no_quality,
            all_dates,
        } => handle_analyze(cli.config.as_deref(), &input, out, no_quality, all_dates),
        Commands::Optimize {
            input,
            min_cluster_size,
            min_samples,
            metric,
            method,
        } => handle_optimize(
            cli.config.as_deref(),
            &input,
            ParameterRanges {
                min_cluster_size,
                min_samples,
                metric,
                cluster_selection_method: method,
            },
        ),
        Commands::Config { init } => handle_config(cli.config.as_deref(), init),
    }
}

/// Load items, keeping only the configured time window unless told otherwise.
fn load_items(settings: &Settings, input: &Path, all_dates: bool) -> Result<Vec<NewsItem>> {
    let items = store::load_items(input)?;
    Ok(if all_dates {
        items
    } else {
        store::within_window(items, settings.analysis.time_window_hours)
    })
}

fn handle_analyze(
    config: Option<&Path>,
    input: &Path,
    out: Option<PathBuf>,
    no_quality: bool,
    all_dates: bool,
) -> Result<()> {
    let mut settings = Settings::load(config)?;
    if no_quality {
        settings.analysis.evaluate_quality = false;
    }
    if out.is_some() {
        settings.output.reports_dir = out;
    }

    let items = load_items(&settings, input, all_dates)?;
    let report = Pipeline::new(settings.clone())
        .run(&items, &TracingSink)
        .context("Analysis failed")?;

    let reports_dir = settings.output.reports_dir()?;
    let path = ReportWriter::new(reports_dir, settings.output.date_format.as_str()).save(&report)?;
    println!("{}", Summary(&report));
    println!("Report: {}", path.display());
    Ok(())
}

fn handle_optimize(config: Option<&Path>, input: &Path, ranges: ParameterRanges) -> Result<()> {
    let settings = Settings::load(config)?;
    let items = load_items(&settings, input, false)?;
    if items.is_empty() {
        bail!("No news items in {}", input.display());
    }

    let pipeline = Pipeline::new(settings.clone());
    let vectors = pipeline
        .vectorize(pipeline.limit(&items), &TracingSink)
        .context("Vectorization failed")?
        .to_feature_vectors();
    let result = optimize_parameters(
        &vectors,
        &settings.clustering.hdbscan,
        &ranges,
        &QualityEvaluator::new(settings.quality.clone()),
    );

    match &result.best_params {
        Some(params) => {
            println!("# best score: {:.4}", result.best_score);
            if let Some(report) = &result.best_metrics {
                println!(
                    "# {} clusters, {} noise, grade {}",
                    report.n_clusters, report.n_noise, report.quality_grade
                );
            }
            println!(
                "# {} combinations evaluated, {} skipped",
                result.evaluated, result.skipped
            );
            println!("[clustering]");
            print!("{}", toml::to_string_pretty(params)?);
        }
        None => bail!(
            "No parameter combination produced a usable clustering ({} skipped)",
            result.skipped
        ),
    }
    Ok(())
}

fn handle_config(config: Option<&Path>, init: bool) -> Result<()> {
    let settings = Settings::load(config)?;
    let rendered = settings.to_toml()?;
    if init {
        let path = get_or_create_user_config_path(None::<&Path>)?.join(CONFIG_FILE_NAME);
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        std::fs::write(&path, &rendered)
            .with_context(|| format!("Unable to write {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
    }
    print!("{}", rendered);
    Ok(())
}
