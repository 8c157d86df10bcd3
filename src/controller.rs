//! The refresh cycle and the state it carries between cycles.
//!
//! [`Controller`] owns the field index map, price threshold and sort
//! direction. Every operation takes the table explicitly.

use crate::annotate::{update_ranks, update_scores};
use crate::columns::{resolve_columns, FieldIndexMap, MissingColumns};
use crate::score::{parse_decimal, ScoreConfig};
use crate::sort::{sort_by_score, SortDirection};
use crate::table::{HeaderControls, RowId, TableAccess};
use std::fmt;

/// Text of the injected rank header.
pub const RANK_LABEL: &str = "排名";

/// Tooltip on the injected score header.
pub const SCORE_TITLE: &str = "按价格 + 溢价率 + 剩余规模*10 排序";

/// Readiness thresholds for the rendered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Fewer rows than this (of any kind) means the host is still rendering
    pub min_rows: usize,
    /// Header and data rows must have more cells than this
    pub min_cells: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_rows: 50,
            min_cells: 10,
        }
    }
}

impl RefreshConfig {
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }
}

/// Why the table is not ready for a refresh yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReady {
    TooFewRows { found: usize, required: usize },
    NoHeader,
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReady::TooFewRows { found, required } => {
                write!(f, "only {} rows rendered, need {}", found, required)
            }
            NotReady::NoHeader => write!(f, "no header row found"),
        }
    }
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Rows were scored and ranked
    Ready { rows: usize, disqualified: usize },
    NotReady(NotReady),
    MissingColumns(MissingColumns),
}

impl RefreshOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, RefreshOutcome::Ready { .. })
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::Ready { rows, disqualified } => {
                write!(f, "annotated {} rows ({} disqualified)", rows, disqualified)
            }
            RefreshOutcome::NotReady(reason) => write!(f, "not ready: {}", reason),
            RefreshOutcome::MissingColumns(missing) => write!(f, "{}", missing),
        }
    }
}

/// Scoring state shared across refresh cycles and user actions.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    score_config: ScoreConfig,
    refresh_config: RefreshConfig,
    fields: Option<FieldIndexMap>,
    header: Option<RowId>,
    direction: SortDirection,
}

impl Controller {
    pub fn new(score_config: ScoreConfig, refresh_config: RefreshConfig) -> Self {
        Self {
            score_config,
            refresh_config,
            ..Self::default()
        }
    }

    /// Direction the first sort will use.
    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn score_config(&self) -> &ScoreConfig {
        &self.score_config
    }

    pub fn price_threshold(&self) -> f64 {
        self.score_config.price_threshold
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Field positions from the last successful column resolution.
    pub fn fields(&self) -> Option<&FieldIndexMap> {
        self.fields.as_ref()
    }

    /// Header row found by the last successful refresh.
    pub fn header(&self) -> Option<RowId> {
        self.header
    }

    /// Controls installed on the header on the first successful refresh.
    pub fn header_controls(&self) -> HeaderControls {
        HeaderControls {
            sort_label: self.direction.label(),
            title: SCORE_TITLE.to_string(),
            threshold: self.price_threshold(),
            rank_label: RANK_LABEL.to_string(),
        }
    }

    fn find_header<T: TableAccess>(&self, table: &T, rows: &[RowId]) -> Option<RowId> {
        rows.iter()
            .copied()
            .find(|&row| table.header_cells(row).len() > self.refresh_config.min_cells)
    }

    fn data_rows<T: TableAccess>(&self, table: &T, rows: &[RowId], header: RowId) -> Vec<RowId> {
        rows.iter()
            .copied()
            .filter(|&row| row != header && table.data_cells(row).len() > self.refresh_config.min_cells)
            .collect()
    }

    /// Data rows of the table in its current order.
    pub fn current_rows<T: TableAccess>(&self, table: &T) -> Vec<RowId> {
        match self.header {
            Some(header) => self.data_rows(table, &table.rows(), header),
            None => Vec::new(),
        }
    }

    /// Run one full refresh cycle.
    ///
    /// Leaves the table untouched unless it is fully rendered and every
    /// required column resolves.
    pub fn refresh<T: TableAccess>(&mut self, table: &mut T) -> RefreshOutcome {
        let rows = table.rows();
        if rows.len() < self.refresh_config.min_rows {
            return RefreshOutcome::NotReady(NotReady::TooFewRows {
                found: rows.len(),
                required: self.refresh_config.min_rows,
            });
        }

        let Some(header) = self.find_header(table, &rows) else {
            return RefreshOutcome::NotReady(NotReady::NoHeader);
        };

        let fields = match resolve_columns(&table.header_cells(header)) {
            Ok(fields) => fields,
            Err(missing) => {
                log::debug!("Skipping refresh: {}", missing);
                self.fields = None;
                return RefreshOutcome::MissingColumns(missing);
            }
        };
        self.fields = Some(fields);
        self.header = Some(header);

        let data_rows = self.data_rows(table, &rows, header);

        if !table.has_header_controls(header) {
            table.install_header_controls(header, &self.header_controls());
        }

        let scores = update_scores(table, &data_rows, &fields, &self.score_config);
        update_ranks(table, &data_rows);

        let disqualified = scores.iter().filter(|s| s.is_disqualified()).count();
        log::debug!(
            "Refreshed {} rows, {} disqualified",
            data_rows.len(),
            disqualified
        );
        RefreshOutcome::Ready {
            rows: data_rows.len(),
            disqualified,
        }
    }

    /// Apply a new price threshold and rescore the current rows.
    ///
    /// Accepts only finite values above zero. Rows are rescored in place, not
    /// re-sorted. Returns whether the threshold changed.
    pub fn set_price_threshold<T: TableAccess>(&mut self, table: &mut T, threshold: f64) -> bool {
        if !threshold.is_finite() || threshold <= 0.0 {
            log::debug!("Ignoring price threshold {}", threshold);
            return false;
        }
        self.score_config.price_threshold = threshold;
        log::info!("Price threshold set to {}", threshold);
        if let Some(header) = self.header {
            table.set_threshold_input(header, threshold);
        }

        if let Some(fields) = self.fields {
            let rows = self.current_rows(table);
            update_scores(table, &rows, &fields, &self.score_config);
        }
        true
    }

    /// Handle an edit of the threshold input field.
    pub fn threshold_input<T: TableAccess>(&mut self, table: &mut T, input: &str) -> bool {
        match parse_decimal(input) {
            Some(value) => self.set_price_threshold(table, value),
            None => false,
        }
    }

    /// Handle a click on the sort label.
    ///
    /// Returns the new row order, or `None` before the first successful
    /// refresh.
    pub fn sort<T: TableAccess>(&mut self, table: &mut T) -> Option<Vec<RowId>> {
        let fields = self.fields?;
        let header = self.header?;
        let rows = self.current_rows(table);
        Some(sort_by_score(
            table,
            header,
            &rows,
            &fields,
            &self.score_config,
            &mut self.direction,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CellMarker, MemoryTable};

    const HEADERS: [&str; 12] = [
        "代码", "转债名称", "现价", "正股价", "正股PB", "转股溢价率", "强赎状态",
        "剩余年限", "剩余规模", "评级", "成交额", "换手率",
    ];

    fn bond(name: &str, price: &str) -> Vec<String> {
        [
            "110001", name, price, "8.5", "1.6", "20%", "", "3.5", "1.0", "AA", "1", "2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn small_config() -> RefreshConfig {
        RefreshConfig::default().with_min_rows(4)
    }

    fn table(prices: &[&str]) -> MemoryTable {
        MemoryTable::from_records(
            HEADERS.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            prices.iter().enumerate().map(|(i, p)| bond(&format!("bond{}", i), p)),
        )
    }

    #[test]
    fn test_refresh_not_ready_without_rows() {
        let mut t = table(&["100", "110"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        let outcome = controller.refresh(&mut t);
        assert_eq!(
            outcome,
            RefreshOutcome::NotReady(NotReady::TooFewRows { found: 3, required: 4 })
        );
        assert!(!t.has_header_controls(t.rows()[0]));
        assert!(controller.fields().is_none());
    }

    #[test]
    fn test_refresh_without_header() {
        let mut t = MemoryTable::new();
        t.push_header(vec!["a", "b"]);
        for i in 0..5 {
            t.push_row(bond(&i.to_string(), "100"));
        }
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        assert_eq!(controller.refresh(&mut t), RefreshOutcome::NotReady(NotReady::NoHeader));
    }

    #[test]
    fn test_refresh_missing_columns_leaves_table() {
        let mut headers: Vec<String> = HEADERS.iter().map(|s| s.to_string()).collect();
        headers[4] = "PB".to_string();
        let mut t = MemoryTable::from_records(headers, (0..4).map(|i| bond(&i.to_string(), "100")));
        let before = t.to_records();

        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        assert!(matches!(controller.refresh(&mut t), RefreshOutcome::MissingColumns(_)));
        assert_eq!(t.to_records(), before);
    }

    #[test]
    fn test_refresh_annotates_rows() {
        let mut t = table(&["100", "160", "120", "130"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        let outcome = controller.refresh(&mut t);
        assert_eq!(outcome, RefreshOutcome::Ready { rows: 4, disqualified: 1 });

        let rows = controller.current_rows(&t);
        assert_eq!(t.marked_text(rows[0], CellMarker::Score), Some("130.00"));
        assert_eq!(t.marked_text(rows[1], CellMarker::Score), Some("9999"));
        assert_eq!(t.marked_text(rows[3], CellMarker::Rank), Some("4"));

        let header = controller.header().unwrap();
        assert!(t.has_header_controls(header));
        assert_eq!(t.header_cells(header).len(), HEADERS.len() + 2);
    }

    #[test]
    fn test_refresh_installs_controls_once() {
        let mut t = table(&["100", "110", "120"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        controller.refresh(&mut t);
        let first = t.to_records();
        controller.refresh(&mut t);
        assert_eq!(t.to_records(), first);
    }

    #[test]
    fn test_threshold_input_rescores() {
        let mut t = table(&["100", "160", "120"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        controller.refresh(&mut t);
        let rows = controller.current_rows(&t);
        assert_eq!(t.marked_text(rows[1], CellMarker::Score), Some("9999"));

        assert!(controller.threshold_input(&mut t, "9999"));
        assert_eq!(controller.price_threshold(), 9999.0);
        assert_eq!(t.marked_text(rows[1], CellMarker::Score), Some("190.00"));
        let header = controller.header().unwrap();
        let shown = |t: &MemoryTable| t.row(header).unwrap().controls.as_ref().unwrap().threshold;
        assert_eq!(shown(&t), 9999.0);

        assert!(!controller.threshold_input(&mut t, "abc"));
        assert!(!controller.threshold_input(&mut t, "-5"));
        assert!(!controller.threshold_input(&mut t, "0"));
        assert_eq!(controller.price_threshold(), 9999.0);
        assert_eq!(shown(&t), 9999.0);
    }

    #[test]
    fn test_threshold_does_not_resort() {
        let mut t = table(&["130", "100", "120"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        controller.refresh(&mut t);
        let before = controller.current_rows(&t);
        controller.set_price_threshold(&mut t, 110.0);
        assert_eq!(controller.current_rows(&t), before);
    }

    #[test]
    fn test_sort_before_refresh_is_noop() {
        let mut t = table(&["130", "100", "120"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        assert_eq!(controller.sort(&mut t), None);
        assert_eq!(controller.direction(), SortDirection::Ascending);
    }

    #[test]
    fn test_sort_reorders_and_ranks() {
        let mut t = table(&["130", "100", "120"]);
        let mut controller = Controller::new(ScoreConfig::default(), small_config());
        controller.refresh(&mut t);
        let original = controller.current_rows(&t);

        let order = controller.sort(&mut t).unwrap();
        assert_eq!(order, vec![original[1], original[2], original[0]]);
        assert_eq!(controller.current_rows(&t), order);
        assert_eq!(t.marked_text(order[0], CellMarker::Rank), Some("1"));
        assert_eq!(controller.direction(), SortDirection::Descending);
    }
}
