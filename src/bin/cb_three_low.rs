//! Three-low CLI - Score, rank and filter convertible-bond listing snapshots
//!
//! Works on CSV snapshots of the listing table: the first record is the
//! header row, every following record is a bond.

use anyhow::Result;
use cb_three_low::pipeline::{
    annotate_file, explain_file, watch_file, AnnotateConfig, ExplainConfig, WatchFileConfig,
};
use cb_three_low::{RefreshConfig, ScoreConfig, SortDirection, WatchConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cb-three-low")]
#[command(about = "Three-low scoring for convertible-bond listing tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ScoringArgs {
    /// Bonds priced above this score 9999
    #[arg(long, default_value = "150", env = "CB_PRICE_THRESHOLD")]
    threshold: f64,

    /// Minimum rendered rows before the table counts as ready
    #[arg(long, default_value = "50")]
    min_rows: usize,
}

impl ScoringArgs {
    fn score_config(&self) -> ScoreConfig {
        ScoreConfig::default().with_price_threshold(self.threshold)
    }

    fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig::default().with_min_rows(self.min_rows)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortDirection {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortDirection::Ascending,
            SortArg::Desc => SortDirection::Descending,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add score and rank columns to a snapshot
    Annotate {
        /// Input CSV snapshot
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV snapshot
        #[arg(short, long)]
        output: PathBuf,

        /// Sort rows by score
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// Show each bond's score and why it was disqualified
    Explain {
        /// Input CSV snapshot
        #[arg(short, long)]
        input: PathBuf,

        /// Write the report as CSV instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// Keep an annotated copy of a snapshot up to date as it is rewritten
    Watch {
        /// Input CSV snapshot, rewritten by another process
        #[arg(short, long)]
        input: PathBuf,

        /// Annotated output CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Quiet period after a change before refreshing, in milliseconds
        #[arg(long, default_value = "300")]
        debounce_ms: u64,

        /// Gap between startup attempts in milliseconds
        #[arg(long, default_value = "1000")]
        poll_ms: u64,

        /// Startup attempts before giving up
        #[arg(long, default_value = "30")]
        max_attempts: u32,

        #[command(flatten)]
        scoring: ScoringArgs,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Annotate {
            input,
            output,
            sort,
            scoring,
        } => {
            let summary = annotate_file(&AnnotateConfig {
                input,
                output,
                score: scoring.score_config(),
                refresh: scoring.refresh_config(),
                sort: sort.map(SortDirection::from),
            })?;
            println!("{}", summary);
        }
        Commands::Explain {
            input,
            output,
            scoring,
        } => {
            let report = explain_file(&ExplainConfig {
                input,
                output,
                score: scoring.score_config(),
                refresh: scoring.refresh_config(),
            })?;
            println!("{}", report);
        }
        Commands::Watch {
            input,
            output,
            debounce_ms,
            poll_ms,
            max_attempts,
            scoring,
        } => {
            let config = WatchFileConfig {
                input,
                output,
                score: scoring.score_config(),
                refresh: scoring.refresh_config(),
                watch: WatchConfig::default()
                    .with_debounce(Duration::from_millis(debounce_ms))
                    .with_poll_interval(Duration::from_millis(poll_ms))
                    .with_max_attempts(max_attempts),
                check_interval: Duration::from_millis(50),
            };
            let summary = watch_file(&config, |outcome| {
                if outcome.is_ready() {
                    println!("{}", outcome);
                }
                true
            })?;
            println!("{}", summary);
        }
    }

    Ok(())
}
