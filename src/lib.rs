//! Convertible-bond "three-low" table annotation
//!
//! Scores each row of a convertible-bond listing table by price, conversion
//! premium and outstanding scale, excludes bonds that fail any
//! disqualification rule, and keeps injected score and rank columns in sync
//! while the host re-renders the table.
//!
//! This library provides:
//! - `columns`: header label to field position resolution
//! - `score`: the three-low score and disqualification rules
//! - `table`: the `TableAccess` abstraction and an in-memory table
//! - `annotate`, `sort`: score/rank cells and click-to-sort
//! - `controller`: the refresh cycle and its state
//! - `watcher`: debounced mutation handling and startup polling
//! - `pipeline`: CSV snapshot operations used by the CLI
//!
//! Binaries:
//! - `cb-three-low`: annotate, explain and watch CSV snapshots

pub mod annotate;
pub mod columns;
pub mod controller;
pub mod pipeline;
pub mod score;
pub mod sort;
pub mod table;
pub mod watcher;

pub use columns::{resolve_columns, Field, FieldIndexMap, MissingColumns};
pub use controller::{Controller, NotReady, RefreshConfig, RefreshOutcome};
pub use score::{calculate_score, Disqualification, Score, ScoreConfig, SENTINEL};
pub use sort::SortDirection;
pub use table::{MemoryTable, TableAccess};
pub use watcher::{ChangeWatcher, Clock, ManualClock, MonotonicClock, WatchConfig};
