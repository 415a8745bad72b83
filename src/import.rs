use crate::config::{DEFAULT_BUSY_TIMEOUT_MS, PROGRESS_INTERVAL};
use crate::models::ReferenceTable;
use crate::processor::{ProcessOptions, RowProcessor};
use crate::repository::Repository;
use crate::source;
use crate::stats::RunStats;
use crate::store::Store;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

pub struct ImportConfig {
    pub input: PathBuf,
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub dedup_categories: bool,
    pub show_progress: bool,
}

impl ImportConfig {
    pub fn new(input: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            db_path: db_path.into(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            dedup_categories: false,
            show_progress: false,
        }
    }

    fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            dedup_categories: self.dedup_categories,
        }
    }
}

/// Opens the database named in `config` and imports the source file into it.
pub fn run_import(config: &ImportConfig) -> Result<RunStats> {
    let store = Store::open(&config.db_path, config.busy_timeout)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    run_with_repository(
        &config.input,
        store,
        config.process_options(),
        config.show_progress,
    )
}

/// Imports `source` through any repository, in file order.
///
/// The whole file is read before the first row is processed; a malformed
/// file aborts here without touching storage. Once processing starts, row
/// failures are counted, never propagated. Re-running over the same file
/// only creates what is still missing.
pub fn run_with_repository<R: Repository>(
    source: &Path,
    repo: R,
    options: ProcessOptions,
    show_progress: bool,
) -> Result<RunStats> {
    let start = Instant::now();
    let records = source::read_records(source)?;

    let mut processor =
        RowProcessor::new(repo, options).context("Failed to load existing references")?;
    let mut stats = RunStats::new(records.len() as u64);

    info!(rows = records.len(), path = %source.display(), "Starting import");

    let pb = if show_progress {
        make_progress_bar(records.len() as u64)
    } else {
        ProgressBar::hidden()
    };

    for (idx, record) in records.iter().enumerate() {
        let outcome = processor.process(record);
        stats.record(&outcome);

        let done = idx as u64 + 1;
        if done % PROGRESS_INTERVAL == 0 {
            pb.set_position(done);
        }
    }
    pb.finish_and_clear();

    let cache = processor.cache();
    stats.references_created = cache.created();

    info!(
        total = stats.total_rows,
        created = stats.pages_created,
        skipped = stats.pages_skipped(),
        projects = cache.len(ReferenceTable::Project),
        namespaces = cache.len(ReferenceTable::Namespace),
        duration_secs = start.elapsed().as_secs_f64(),
        "Import complete"
    );

    Ok(stats)
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("    {spinner:.cyan} Rows           [{bar:30.cyan/blue}] {pos}/{len} ({eta})")
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
