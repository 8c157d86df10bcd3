//! Pipeline functions for programmatic use by the CLI.
//!
//! These wrap the controller around CSV snapshots of the listing table,
//! returning summaries instead of printing to stdout.

use crate::controller::{Controller, RefreshConfig, RefreshOutcome};
use crate::score::{evaluate, BondFields, ScoreConfig};
use crate::sort::SortDirection;
use crate::table::{MemoryTable, TableAccess};
use crate::watcher::{ChangeWatcher, MonotonicClock, WatchConfig, WatchPhase};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

// ============================================================================
// Snapshots
// ============================================================================

/// Load a CSV snapshot: the first record is the header row, the rest are rows.
pub fn load_snapshot(path: &Path) -> Result<MemoryTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open snapshot {}", path.display()))?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.context("Failed to read header row")?,
        None => return Ok(MemoryTable::new()),
    };

    let mut table = MemoryTable::new();
    table.push_header(header.iter().map(str::to_string));
    for (row_num, result) in records.enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_num + 2))?;
        table.push_row(record.iter().map(str::to_string));
    }
    Ok(table)
}

/// Write every row of `table`, injected cells included, in current order.
pub fn save_snapshot(table: &MemoryTable, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in table.to_records() {
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Annotate
// ============================================================================

/// Configuration for the annotate operation.
pub struct AnnotateConfig {
    /// Input snapshot path
    pub input: PathBuf,
    /// Output snapshot path
    pub output: PathBuf,
    pub score: ScoreConfig,
    pub refresh: RefreshConfig,
    /// Sort by score after annotating
    pub sort: Option<SortDirection>,
}

/// Score and rank a snapshot, optionally sort it, and write the result.
pub fn annotate_file(config: &AnnotateConfig) -> Result<String> {
    let mut table = load_snapshot(&config.input)?;
    let mut controller = Controller::new(config.score.clone(), config.refresh.clone())
        .with_direction(config.sort.unwrap_or_default());

    let outcome = controller.refresh(&mut table);
    let RefreshOutcome::Ready { rows, disqualified } = outcome else {
        return Err(anyhow::anyhow!("{}: {}", config.input.display(), outcome));
    };

    if config.sort.is_some() {
        controller.sort(&mut table);
    }

    save_snapshot(&table, &config.output)?;
    Ok(format!(
        "Done! Annotated {} rows ({} disqualified) -> {}",
        rows,
        disqualified,
        config.output.display()
    ))
}

// ============================================================================
// Explain
// ============================================================================

/// One row of the explain report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainRow {
    pub rank: usize,
    pub bond: String,
    pub price: f64,
    pub premium: f64,
    pub scale: f64,
    pub score: String,
    pub reason: String,
}

/// Per-row score breakdown for every data row, in table order.
///
/// Empty until the controller has completed a refresh.
pub fn explain_rows<T: TableAccess>(controller: &Controller, table: &T) -> Vec<ExplainRow> {
    let Some(fields) = controller.fields() else {
        return Vec::new();
    };
    controller
        .current_rows(table)
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = table.data_cells(row);
            let bond = BondFields::extract(&cells, fields);
            let (score, reason) = evaluate(&cells, fields, controller.score_config());
            ExplainRow {
                rank: i + 1,
                bond: cells.first().cloned().unwrap_or_default(),
                price: bond.price,
                premium: bond.premium,
                scale: bond.scale,
                score: score.to_string(),
                reason: reason.map(|r| r.to_string()).unwrap_or_default(),
            }
        })
        .collect()
}

/// Format explain rows as a text table.
pub fn format_explain(rows: &[ExplainRow]) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "{:>5} {:<16} {:>9} {:>9} {:>8} {:>9}  {}",
        "Rank", "Bond", "Price", "Premium", "Scale", "Score", "Reason"
    )?;
    writeln!(out, "{:-<80}", "")?;
    for row in rows {
        writeln!(
            out,
            "{:>5} {:<16} {:>9.3} {:>8.2}% {:>8.2} {:>9}  {}",
            row.rank, row.bond, row.price, row.premium, row.scale, row.score, row.reason
        )?;
    }
    Ok(out)
}

/// Configuration for the explain operation.
pub struct ExplainConfig {
    pub input: PathBuf,
    /// Write the report as CSV here instead of returning a text table
    pub output: Option<PathBuf>,
    pub score: ScoreConfig,
    pub refresh: RefreshConfig,
}

/// Explain why each row in a snapshot scored the way it did.
pub fn explain_file(config: &ExplainConfig) -> Result<String> {
    let mut table = load_snapshot(&config.input)?;
    let mut controller = Controller::new(config.score.clone(), config.refresh.clone());

    let outcome = controller.refresh(&mut table);
    if !outcome.is_ready() {
        return Err(anyhow::anyhow!("{}: {}", config.input.display(), outcome));
    }

    let rows = explain_rows(&controller, &table);
    match &config.output {
        Some(output) => {
            let mut writer = csv::Writer::from_path(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
            Ok(format!("Wrote {} rows to {}", rows.len(), output.display()))
        }
        None => format_explain(&rows),
    }
}

// ============================================================================
// Watch
// ============================================================================

/// Configuration for the watch operation.
pub struct WatchFileConfig {
    /// Snapshot rewritten by the host
    pub input: PathBuf,
    /// Annotated copy kept up to date
    pub output: PathBuf,
    pub score: ScoreConfig,
    pub refresh: RefreshConfig,
    pub watch: WatchConfig,
    /// How often to check the input for changes
    pub check_interval: Duration,
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn reload(path: &Path) -> MemoryTable {
    load_snapshot(path).unwrap_or_else(|e| {
        log::debug!("Snapshot not loadable yet: {:#}", e);
        MemoryTable::new()
    })
}

/// Keep `output` annotated while `input` is rewritten.
///
/// Each rewrite of the input counts as a structural mutation. Calls
/// `on_refresh` after every refresh attempt; return `false` to stop. Also
/// stops when the startup poll gives up. Returns a summary string.
pub fn watch_file(
    config: &WatchFileConfig,
    mut on_refresh: impl FnMut(&RefreshOutcome) -> bool,
) -> Result<String> {
    let mut controller = Controller::new(config.score.clone(), config.refresh.clone());
    let mut watcher = ChangeWatcher::new(MonotonicClock::new(), &config.watch);
    let mut table = reload(&config.input);
    let mut last_modified = modified_time(&config.input);
    let mut refreshes = 0usize;

    loop {
        let modified = modified_time(&config.input);
        if modified != last_modified {
            last_modified = modified;
            table = reload(&config.input);
            watcher.notify_mutation();
        }

        if let Some(outcome) = watcher.tick(&mut controller, &mut table) {
            if outcome.is_ready() {
                save_snapshot(&table, &config.output)?;
                refreshes += 1;
            }
            if !on_refresh(&outcome) {
                return Ok(format!("Stopped after {} refreshes", refreshes));
            }
        }

        if watcher.phase() == WatchPhase::GaveUp {
            return Ok(format!(
                "Gave up: {} never became ready after {} attempts",
                config.input.display(),
                config.watch.max_attempts
            ));
        }

        std::thread::sleep(config.check_interval);
    }
}
