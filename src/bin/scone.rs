//! scone - normalization pipeline evaluation CLI
//!
//! Enumerates normalization pipelines, scores each one and writes the ranked
//! comparison table.

use clap::{Args, Parser, Subcommand, ValueEnum};
use composable_scone::data::{CountMatrix, FactorVector, FeatureSet, Metadata, QcMatrix};
use composable_scone::error::{Result, SconeError};
use composable_scone::filter::{filter_expressed, filter_library_size};
use composable_scone::pipeline::{
    run, Aggregation, CancelToken, ConfigurationEnumerator, EvaluationInputs, RunConfig,
    StepCatalog,
};
use log::{info, warn};
use std::path::PathBuf;

/// Ranked output format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Tsv,
    Json,
}

/// CLI-friendly aggregation policy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAggregation {
    Mean,
    Median,
}

impl From<CliAggregation> for Aggregation {
    fn from(a: CliAggregation) -> Self {
        match a {
            CliAggregation::Mean => Aggregation::Mean,
            CliAggregation::Median => Aggregation::Median,
        }
    }
}

/// Evaluate and rank count-data normalization pipelines
#[derive(Parser)]
#[command(name = "scone")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configuration and write the ranked table
    Run {
        #[command(flatten)]
        inputs: InputArgs,

        /// Run settings YAML (metrics, rezero, threads, timeout, aggregation)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of principal components for the metrics
        #[arg(long)]
        pcs: Option<usize>,

        /// Number of QC principal components for EXP_QC_COR (0 disables it)
        #[arg(long)]
        qc_pcs: Option<usize>,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Stop dispatching configurations after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Restore zeros of the input after scaling
        #[arg(long)]
        rezero: bool,

        /// Composite aggregation policy
        #[arg(long, value_enum)]
        aggregation: Option<CliAggregation>,

        /// Output path for the ranked table
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "tsv")]
        format: OutputFormat,

        /// Number of top configurations to print
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Write the default step catalog as YAML
    Catalog {
        /// Largest factor count for ruv_k= and qc_k= options
        #[arg(long, default_value = "2")]
        max_k: usize,

        /// Output YAML path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List configuration labels without running them
    Enumerate {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

/// Data inputs shared by `run` and `enumerate`.
#[derive(Args)]
struct InputArgs {
    /// Path to count matrix TSV (features x samples)
    #[arg(short = 'c', long)]
    counts: PathBuf,

    /// Path to sample metadata TSV
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Metadata column with the biological factor
    #[arg(long)]
    bio: Option<String>,

    /// Metadata column with the batch factor
    #[arg(long)]
    batch: Option<String>,

    /// File listing negative control features, one per line
    #[arg(long)]
    negative_controls: Option<PathBuf>,

    /// File listing positive control features, one per line
    #[arg(long)]
    positive_controls: Option<PathBuf>,

    /// Comma-separated numeric metadata columns used as QC covariates
    #[arg(long, value_delimiter = ',')]
    qc: Vec<String>,

    /// Step catalog YAML (default: built-in catalog gated by the inputs)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Largest factor count for the built-in catalog
    #[arg(long, default_value = "2")]
    max_k: usize,

    /// Minimum count for a feature to count as expressed in a sample
    #[arg(long, default_value = "1")]
    min_count: u64,

    /// Minimum fraction of samples expressing a feature (0 keeps all)
    #[arg(long, default_value = "0.0")]
    min_prevalence: f64,

    /// Minimum library size for a sample
    #[arg(long, default_value = "0")]
    min_reads: u64,
}

fn main() {
    let cli = Cli::parse();

    let log_level = cli.log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!(
            "Warning: Invalid log level '{}' provided. Defaulting to Info.",
            cli.log_level
        );
        log::LevelFilter::Info
    });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    let result = match cli.command {
        Commands::Run {
            inputs,
            config,
            pcs,
            qc_pcs,
            threads,
            timeout_secs,
            rezero,
            aggregation,
            output,
            format,
            top,
        } => {
            let overrides = RunOverrides {
                pcs,
                qc_pcs,
                threads,
                timeout_secs,
                rezero,
                aggregation,
            };
            cmd_run(&inputs, config.as_ref(), overrides, &output, format, top)
        }
        Commands::Catalog { max_k, output } => cmd_catalog(max_k, output.as_ref()),
        Commands::Enumerate { inputs } => cmd_enumerate(&inputs),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Flags that override the run settings file.
struct RunOverrides {
    pcs: Option<usize>,
    qc_pcs: Option<usize>,
    threads: Option<usize>,
    timeout_secs: Option<u64>,
    rezero: bool,
    aggregation: Option<CliAggregation>,
}

/// Run all configurations and write the ranked table
fn cmd_run(
    args: &InputArgs,
    config_path: Option<&PathBuf>,
    overrides: RunOverrides,
    output_path: &PathBuf,
    format: OutputFormat,
    top: usize,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(pcs) = overrides.pcs {
        config.metrics.n_pcs = pcs;
    }
    if let Some(qc_pcs) = overrides.qc_pcs {
        config.metrics.n_qc_pcs = qc_pcs;
    }
    if overrides.threads.is_some() {
        config.threads = overrides.threads;
    }
    if overrides.timeout_secs.is_some() {
        config.timeout_secs = overrides.timeout_secs;
    }
    config.rezero |= overrides.rezero;
    if let Some(aggregation) = overrides.aggregation {
        config.aggregation = aggregation.into();
    }

    let inputs = load_inputs(args)?;
    let catalog = load_catalog(args, &inputs)?;

    let output = run(&inputs, &catalog, &config, &CancelToken::new())?;

    eprintln!("Writing results to {:?}...", output_path);
    match format {
        OutputFormat::Tsv => output.ranked.to_tsv_file(output_path)?,
        OutputFormat::Json => std::fs::write(output_path, output.ranked.to_json()?)?,
    }

    eprintln!("Done! {}", output.report);
    if top > 0 && !output.ranked.is_empty() {
        eprintln!("\nTop {} configurations:", top.min(output.ranked.len()));
        for (rank, entry) in output.ranked.top(top).iter().enumerate() {
            let composite = entry
                .composite
                .map_or_else(|| "NA".to_string(), |c| format!("{:.3}", c));
            eprintln!("  {:>3}. {:<45} {}", rank + 1, entry.label, composite);
        }
    }
    Ok(())
}

/// Write the default step catalog
fn cmd_catalog(max_k: usize, output_path: Option<&PathBuf>) -> Result<()> {
    let catalog = StepCatalog::default_for(max_k);
    match output_path {
        Some(path) => {
            catalog.to_yaml_file(path)?;
            eprintln!("Catalog written to {:?}", path);
        }
        None => print!("{}", catalog.to_yaml()?),
    }
    Ok(())
}

/// Print the configuration labels that a run would evaluate
fn cmd_enumerate(args: &InputArgs) -> Result<()> {
    let inputs = load_inputs(args)?;
    let catalog = load_catalog(args, &inputs)?;
    let enumerator = ConfigurationEnumerator::new(catalog)?;
    let configurations = enumerator.enumerate(&inputs)?;
    for configuration in &configurations {
        println!("{}", configuration.label());
    }
    eprintln!(
        "{} configurations ({} combinations before filtering)",
        configurations.len(),
        enumerator.catalog().n_combinations()
    );
    Ok(())
}

fn load_catalog(args: &InputArgs, inputs: &EvaluationInputs) -> Result<StepCatalog> {
    match &args.catalog {
        Some(path) => {
            info!("Loading step catalog from {:?}", path);
            StepCatalog::from_yaml_file(path)
        }
        None => Ok(StepCatalog::default_for(args.max_k).gated(inputs)),
    }
}

/// Load, filter and assemble the evaluation inputs.
fn load_inputs(args: &InputArgs) -> Result<EvaluationInputs> {
    info!("Loading counts from {:?}", args.counts);
    let mut counts = CountMatrix::from_tsv(&args.counts)?;
    info!(
        "Loaded {} features x {} samples",
        counts.n_features(),
        counts.n_samples()
    );

    let negative = args
        .negative_controls
        .as_ref()
        .map(|p| FeatureSet::from_file("negative_controls", p))
        .transpose()?;
    let positive = args
        .positive_controls
        .as_ref()
        .map(|p| FeatureSet::from_file("positive_controls", p))
        .transpose()?;

    let (filtered, dropped_samples) = filter_library_size(&counts, args.min_reads)?;
    if !dropped_samples.is_empty() {
        warn!(
            "Removed {} samples below {} reads",
            dropped_samples.len(),
            args.min_reads
        );
    }
    counts = filtered;

    if args.min_prevalence > 0.0 {
        let mut keep: Vec<String> = Vec::new();
        for set in negative.iter().chain(positive.iter()) {
            keep.extend(set.ids().iter().cloned());
        }
        let (filtered, removed) = filter_expressed(&counts, args.min_count, args.min_prevalence, &keep)?;
        info!("Removed {} lowly expressed features", removed);
        counts = filtered;
    }

    let sample_ids = counts.sample_ids().to_vec();
    let mut inputs = EvaluationInputs::new(&counts)?;

    let needs_metadata = args.bio.is_some() || args.batch.is_some() || !args.qc.is_empty();
    let metadata = match &args.metadata {
        Some(path) => {
            let metadata = Metadata::from_tsv(path)?;
            let unused = metadata
                .sample_ids()
                .iter()
                .filter(|sid| !sample_ids.contains(*sid))
                .count();
            info!(
                "Loaded metadata: {} samples, {} columns",
                metadata.n_samples(),
                metadata.column_names().len()
            );
            if unused > 0 {
                warn!("{} metadata samples are not columns of the count matrix", unused);
            }
            Some(metadata)
        }
        None if needs_metadata => {
            return Err(SconeError::InvalidParameter(
                "--bio, --batch and --qc require --metadata".to_string(),
            ))
        }
        None => None,
    };

    if let Some(metadata) = &metadata {
        if let Some(column) = &args.bio {
            inputs = inputs.with_bio(FactorVector::from_metadata(metadata, column, &sample_ids)?)?;
        }
        if let Some(column) = &args.batch {
            inputs = inputs.with_batch(FactorVector::from_metadata(metadata, column, &sample_ids)?)?;
        }
        if !args.qc.is_empty() {
            inputs = inputs.with_qc(QcMatrix::from_metadata(metadata, &args.qc, &sample_ids)?)?;
        }
    }

    if let Some(set) = negative {
        let (set, dropped) = set.restrict_to(counts.feature_ids())?;
        if dropped > 0 {
            warn!("{} negative controls are not rows of the count matrix", dropped);
        }
        inputs = inputs.with_negative_controls(set)?;
    }
    if let Some(set) = positive {
        let (set, dropped) = set.restrict_to(counts.feature_ids())?;
        if dropped > 0 {
            warn!("{} positive controls are not rows of the count matrix", dropped);
        }
        inputs = inputs.with_positive_controls(set)?;
    }

    Ok(inputs)
}
