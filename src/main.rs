// 🧮 Registry Harmonizer CLI
//
// normalize         run one (registry, date) batch from raw CSV exports
// inspect-protocol  show how one raw protocol string normalizes

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use registry_harmonizer::config::HarmonizerConfig;
use registry_harmonizer::output::{load_summary, write_batch, write_json, SUMMARY_FILE};
use registry_harmonizer::protocol::ProtocolNormalizer;
use registry_harmonizer::{check_regression, run_batch, BatchInput, DownloadKind, Registry, Summary};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "registry-harmonizer")]
#[command(version)]
#[command(about = "Normalize carbon-offset registry exports into canonical projects and credits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (mapping_dir, output_dir, processing_date, regression_threshold)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harmonize one registry batch
    Normalize {
        /// verra, gold-standard, american-carbon-registry, climate-action-reserve, art-trees, global-carbon-council
        #[arg(long, short)]
        registry: Registry,

        /// Raw project export
        #[arg(long)]
        projects: PathBuf,

        /// Verra combined transactions export
        #[arg(long)]
        transactions: Option<PathBuf>,

        #[arg(long)]
        issuances: Option<PathBuf>,

        #[arg(long)]
        retirements: Option<PathBuf>,

        #[arg(long)]
        cancellations: Option<PathBuf>,

        /// ARB issuance table
        #[arg(long)]
        arb: Option<PathBuf>,

        /// Overrides the configured output directory
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Processing date (YYYY-MM-DD), overrides the config
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Summary of a previous run to check for regressions
        #[arg(long)]
        previous_summary: Option<PathBuf>,
    },

    /// Print the normalization of one raw protocol string
    InspectProtocol {
        /// Raw protocol text, e.g. "ACM0001 v19.0 and ACM0022"
        text: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => HarmonizerConfig::load(path)?,
        None => HarmonizerConfig::default(),
    };

    match cli.command {
        Commands::Normalize {
            registry,
            projects,
            transactions,
            issuances,
            retirements,
            cancellations,
            arb,
            output,
            date,
            previous_summary,
        } => {
            let partitions: Vec<(DownloadKind, PathBuf)> = [
                (DownloadKind::Transactions, transactions),
                (DownloadKind::Issuances, issuances),
                (DownloadKind::Retirements, retirements),
                (DownloadKind::Cancellations, cancellations),
            ]
            .into_iter()
            .filter_map(|(kind, path)| path.map(|p| (kind, p)))
            .collect();

            run_normalize(NormalizeArgs {
                config,
                registry,
                projects,
                partitions,
                arb,
                output,
                date,
                previous_summary,
            })
        }
        Commands::InspectProtocol { text } => run_inspect(&config, &text),
    }
}

struct NormalizeArgs {
    config: HarmonizerConfig,
    registry: Registry,
    projects: PathBuf,
    partitions: Vec<(DownloadKind, PathBuf)>,
    arb: Option<PathBuf>,
    output: Option<PathBuf>,
    date: Option<NaiveDate>,
    previous_summary: Option<PathBuf>,
}

fn run_normalize(args: NormalizeArgs) -> Result<()> {
    let tables = args.config.mapping_tables()?;
    let processing_date = args.date.unwrap_or_else(|| args.config.processing_date());
    let out_dir = args.output.unwrap_or_else(|| args.config.output_dir.clone());

    println!("🌍 {} batch for {}", args.registry.display_name(), processing_date);

    let credit_paths: Vec<(DownloadKind, &std::path::Path)> = args
        .partitions
        .iter()
        .map(|(kind, path)| (*kind, path.as_path()))
        .collect();
    let input = BatchInput::from_files(
        args.registry,
        processing_date,
        &args.projects,
        &credit_paths,
        args.arb.as_deref(),
    )?;

    let batch = run_batch(&tables, input).context("Batch failed, nothing written")?;
    let summary = Summary::from_datasets(&batch.projects, &batch.credits);

    if let Some(path) = &args.previous_summary {
        let previous = load_summary(path)?;
        check_regression(&summary, &previous, args.config.regression_threshold)
            .context("Batch output regressed, nothing written")?;
    }

    let dir = write_batch(&out_dir, &batch)?;
    write_json(&dir.join(SUMMARY_FILE), &summary)?;

    println!("✓ {} projects, {} credits", batch.projects.len(), batch.credits.len());
    println!("✓ {} duplicates dropped", batch.duplicates.len());
    println!("✓ {}", batch.quality.summary());
    println!("📂 {}", dir.display());
    info!(batch_id = %batch.report.batch_id, "done");
    Ok(())
}

fn run_inspect(config: &HarmonizerConfig, text: &str) -> Result<()> {
    let tables = config.mapping_tables()?;
    let normalized = ProtocolNormalizer::new(&tables.protocols).normalize(Some(text));
    println!("{}", serde_json::to_string_pretty(&normalized)?);
    Ok(())
}
