use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikietl::import::ImportConfig;
use wikietl::store::Store;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "wikietl")]
#[command(about = "Import denormalized Wikipedia page CSVs into normalized tables")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file of pages
    Import(ImportArgs),
    /// Print page statistics from an existing database
    Stats(StatsArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Path to the denormalized CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// SQLite database file (created if missing)
    #[arg(long, default_value = wikietl::config::DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Milliseconds to wait for a lock held by another run
    #[arg(long, default_value_t = wikietl::config::DEFAULT_BUSY_TIMEOUT_MS)]
    busy_timeout_ms: u64,

    /// Link each category once per page even if it is listed repeatedly
    #[arg(long)]
    dedup_categories: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// SQLite database file
    #[arg(long, default_value = wikietl::config::DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Number of most viewed pages to list (0 to skip)
    #[arg(long, default_value_t = wikietl::config::DEFAULT_TOP_VIEWED)]
    top: u32,
}

fn run_import(args: ImportArgs) -> Result<()> {
    let config = ImportConfig {
        input: args.input,
        db_path: args.db,
        busy_timeout: Duration::from_millis(args.busy_timeout_ms),
        dedup_categories: args.dedup_categories,
        show_progress: !args.no_progress,
    };

    let start = Instant::now();
    let stats = wikietl::import::run_import(&config)?;
    let summary = stats.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", start.elapsed().as_secs_f64());
    println!();
    println!("Rows read:          {}", summary.total_rows);
    println!("Pages created:      {}", summary.pages_created);
    println!("Pages skipped:      {}", summary.pages_skipped);
    println!("  blank title:      {}", stats.blank_titles);
    println!("  already present:  {}", stats.duplicate_titles);
    println!("  lost insert race: {}", stats.rejected_creates);
    println!("  storage failure:  {}", stats.storage_failures);
    println!("Category links:     {}", stats.categories_linked);
    println!("Link failures:      {}", stats.category_failures);
    if config.dedup_categories {
        println!("Duplicate tokens:   {}", stats.categories_deduplicated);
    }
    println!("New references:     {}", stats.references_created);

    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let store = Store::open(
        &args.db,
        Duration::from_millis(wikietl::config::DEFAULT_BUSY_TIMEOUT_MS),
    )
    .with_context(|| format!("Failed to open database: {}", args.db.display()))?;

    let statistics = store.page_statistics()?;
    let categories = store.category_count()?;
    let top = if args.top > 0 {
        store.top_viewed(args.top)?
    } else {
        Vec::new()
    };

    let report = json!({
        "pages": statistics,
        "categories": categories,
        "top_viewed": top,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Import(args) => run_import(args),
        Commands::Stats(args) => run_stats(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
