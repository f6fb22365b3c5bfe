use anyhow::{Context, Result};
use catalog_canon::{
    Catalog, IntegrityVerifier, Pipeline, PipelineConfig, RunLedger, TransactionLog, VERSION,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Catalog Canon - collapse duplicate catalog items and remap transactions
#[derive(Parser)]
#[command(name = "catalog-canon", version, about, long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: normalize, resolve, consolidate, remap, verify
    Run {
        /// Item catalog CSV
        #[arg(long)]
        items: PathBuf,
        /// Transaction log CSV
        #[arg(long)]
        transactions: PathBuf,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        /// JSON pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite run ledger
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Keep the annotated catalog even after a clean verification
        #[arg(long)]
        keep_intermediates: bool,
    },

    /// Print barcode → normalized description
    Normalize {
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Verify already-consolidated files
    Verify {
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        transactions: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List ledger events
    History {
        #[arg(long)]
        ledger: PathBuf,
        /// Only events of this run
        #[arg(long)]
        run: Option<String>,
        /// Only events about this item barcode
        #[arg(long, conflicts_with = "run")]
        item: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match execute(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn execute(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            items,
            transactions,
            out,
            config,
            ledger,
            keep_intermediates,
        } => run_pipeline(&items, &transactions, &out, config.as_deref(), ledger.as_deref(), keep_intermediates),
        Commands::Normalize { items, config } => normalize(&items, config.as_deref()),
        Commands::Verify {
            items,
            transactions,
            config,
        } => verify(&items, &transactions, config.as_deref()),
        Commands::History { ledger, run, item } => history(&ledger, run.as_deref(), item.as_deref()),
    }
}

fn run_pipeline(
    items: &Path,
    transactions: &Path,
    out: &Path,
    config: Option<&Path>,
    ledger: Option<&Path>,
    keep_intermediates: bool,
) -> Result<i32> {
    println!("🧭 Catalog Canon v{} - duplicate consolidation", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = load_config(config)?;
    config.keep_intermediates |= keep_intermediates;

    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;

    let mut ledger = match ledger {
        Some(path) => Some(
            RunLedger::open(path)
                .with_context(|| format!("Failed to open ledger {}", path.display()))?,
        ),
        None => None,
    };

    let run = pipeline
        .run_files(items, transactions, out, ledger.as_mut())
        .context("Pipeline run failed")?;

    println!("\n{}", run.summary.render());

    if !run.findings.is_empty() {
        println!("\n⚠️  {} data-quality finding(s) in the item table", run.findings.len());
    }
    if !run.map.conflicts().is_empty() {
        println!("⚠️  {} repeated barcode(s) with conflicting canonicals", run.map.conflicts().len());
    }
    if !run.report.is_clean() {
        println!("\n🔍 Unresolved references (sample):");
        for barcode in run.report.sample(10) {
            println!("   - {}", barcode);
        }
        println!("   Intermediate artifacts kept in {}", out.display());
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    Ok(if run.summary.is_complete() { 0 } else { 2 })
}

fn normalize(items: &Path, config: Option<&Path>) -> Result<i32> {
    let config = load_config(config)?;
    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;

    let catalog = Catalog::from_path(items, &pipeline.config().item_columns)
        .with_context(|| format!("Failed to load items {}", items.display()))?;

    for item in &catalog.items {
        let key = pipeline.normalizer().normalize_item(item).unwrap_or_default();
        println!("{}\t{}", item.barcode, key);
    }
    Ok(0)
}

fn verify(items: &Path, transactions: &Path, config: Option<&Path>) -> Result<i32> {
    let config = load_config(config)?;

    let catalog = Catalog::from_path(items, &config.item_columns)
        .with_context(|| format!("Failed to load items {}", items.display()))?;
    let log = TransactionLog::from_path(transactions, &config.transaction_columns)
        .with_context(|| format!("Failed to load transactions {}", transactions.display()))?;

    let report = IntegrityVerifier::new().verify(&log, &catalog);
    println!("{}", report.summary());

    if report.is_clean() {
        println!("✅ Every transaction resolves to a catalog item");
        Ok(0)
    } else {
        for barcode in report.sample(10) {
            println!("   - {}", barcode);
        }
        Ok(2)
    }
}

fn history(ledger: &Path, run: Option<&str>, item: Option<&str>) -> Result<i32> {
    let ledger = RunLedger::open(ledger)
        .with_context(|| format!("Failed to open ledger {}", ledger.display()))?;

    let events = match (run, item) {
        (Some(run_id), _) => ledger.events_for_run(run_id)?,
        (None, Some(barcode)) => ledger.events_for_entity("item", barcode)?,
        (None, None) => ledger.all_events()?,
    };

    println!("📜 {} of {} event(s)", events.len(), ledger.count()?);
    for event in &events {
        println!(
            "{}  {:<24} {}:{}  {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.data
        );
    }
    Ok(0)
}
