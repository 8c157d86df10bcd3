//! Table access abstraction.
//!
//! The scoring pipeline never touches a rendering surface directly. Everything
//! it needs from the host table goes through [`TableAccess`], which keeps the
//! controller testable against [`MemoryTable`].

/// Stable handle for a row. Survives reordering.
pub type RowId = usize;

/// Identifies a cell injected by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellMarker {
    Score,
    Rank,
}

impl CellMarker {
    /// Class name used to tag the cell on the host page.
    pub fn class_name(self) -> &'static str {
        match self {
            CellMarker::Score => "jsl-three-low",
            CellMarker::Rank => "jsl-rank",
        }
    }
}

/// Presentation applied to an injected cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub bold: bool,
    pub centered: bool,
    pub background: Option<&'static str>,
    pub color: Option<&'static str>,
}

/// Controls injected into the header row on the first successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderControls {
    /// Clickable sort label, including the direction arrow
    pub sort_label: String,
    /// Tooltip on the score header
    pub title: String,
    /// Initial value of the price threshold input
    pub threshold: f64,
    /// Text of the rank header
    pub rank_label: String,
}

/// Operations the pipeline needs from a rendered table.
pub trait TableAccess {
    /// Every row in document order, header rows included.
    fn rows(&self) -> Vec<RowId>;

    /// Header cell texts of `row` (empty for rows without header cells).
    fn header_cells(&self, row: RowId) -> Vec<String>;

    /// Data cell texts of `row`, injected cells included.
    fn data_cells(&self, row: RowId) -> Vec<String>;

    /// Position of the data cell carrying `marker`, if it exists.
    fn find_marked_cell(&self, row: RowId, marker: CellMarker) -> Option<usize>;

    /// Insert an empty data cell carrying `marker` at position `at`.
    fn insert_marked_cell(&mut self, row: RowId, at: usize, marker: CellMarker);

    /// Replace text and style of the data cell at `at`.
    fn write_cell(&mut self, row: RowId, at: usize, text: &str, style: &CellStyle);

    /// Whether header controls were already installed on `header`.
    fn has_header_controls(&self, header: RowId) -> bool;

    /// Append the score and rank headers to `header`.
    fn install_header_controls(&mut self, header: RowId, controls: &HeaderControls);

    /// Update the sort label installed on `header`.
    fn set_sort_label(&mut self, header: RowId, label: &str);

    /// Show `threshold` in the input installed on `header`.
    fn set_threshold_input(&mut self, header: RowId, threshold: f64);

    /// Move `order` to the end of their container, in the given order.
    fn reorder_rows(&mut self, order: &[RowId]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Data,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCell {
    pub text: String,
    pub marker: Option<CellMarker>,
    pub style: CellStyle,
}

impl MemoryCell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marker: None,
            style: CellStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    pub id: RowId,
    pub kind: RowKind,
    pub cells: Vec<MemoryCell>,
    pub controls: Option<HeaderControls>,
}

impl MemoryRow {
    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.text.clone()).collect()
    }
}

/// In-memory table, used for CSV snapshots and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Vec<MemoryRow>,
    next_id: RowId,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a header record followed by data records.
    pub fn from_records<I, R, S>(header: R, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        table.push_header(header);
        for record in records {
            table.push_row(record);
        }
        table
    }

    fn push(&mut self, kind: RowKind, cells: Vec<MemoryCell>) -> RowId {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(MemoryRow {
            id,
            kind,
            cells,
            controls: None,
        });
        id
    }

    pub fn push_header<I, S>(&mut self, cells: I) -> RowId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells = cells.into_iter().map(MemoryCell::plain).collect();
        self.push(RowKind::Header, cells)
    }

    pub fn push_row<I, S>(&mut self, cells: I) -> RowId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells = cells.into_iter().map(MemoryCell::plain).collect();
        self.push(RowKind::Data, cells)
    }

    pub fn row(&self, id: RowId) -> Option<&MemoryRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    fn row_mut(&mut self, id: RowId) -> Option<&mut MemoryRow> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    /// Rows in current order.
    pub fn all_rows(&self) -> &[MemoryRow] {
        &self.rows
    }

    /// Text of the cell carrying `marker` in `row`.
    pub fn marked_text(&self, row: RowId, marker: CellMarker) -> Option<&str> {
        self.row(row)?
            .cells
            .iter()
            .find(|c| c.marker == Some(marker))
            .map(|c| c.text.as_str())
    }

    /// Every row's cell texts in current order, as written to a snapshot.
    pub fn to_records(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(MemoryRow::texts).collect()
    }
}

impl TableAccess for MemoryTable {
    fn rows(&self) -> Vec<RowId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    fn header_cells(&self, row: RowId) -> Vec<String> {
        match self.row(row) {
            Some(r) if r.kind == RowKind::Header => r.texts(),
            _ => Vec::new(),
        }
    }

    fn data_cells(&self, row: RowId) -> Vec<String> {
        match self.row(row) {
            Some(r) if r.kind == RowKind::Data => r.texts(),
            _ => Vec::new(),
        }
    }

    fn find_marked_cell(&self, row: RowId, marker: CellMarker) -> Option<usize> {
        let r = self.row(row)?;
        if r.kind != RowKind::Data {
            return None;
        }
        r.cells.iter().position(|c| c.marker == Some(marker))
    }

    fn insert_marked_cell(&mut self, row: RowId, at: usize, marker: CellMarker) {
        if let Some(r) = self.row_mut(row) {
            let at = at.min(r.cells.len());
            r.cells.insert(
                at,
                MemoryCell {
                    text: String::new(),
                    marker: Some(marker),
                    style: CellStyle::default(),
                },
            );
        }
    }

    fn write_cell(&mut self, row: RowId, at: usize, text: &str, style: &CellStyle) {
        if let Some(cell) = self.row_mut(row).and_then(|r| r.cells.get_mut(at)) {
            cell.text = text.to_string();
            cell.style = style.clone();
        }
    }

    fn has_header_controls(&self, header: RowId) -> bool {
        self.row(header).is_some_and(|r| r.controls.is_some())
    }

    fn install_header_controls(&mut self, header: RowId, controls: &HeaderControls) {
        if let Some(r) = self.row_mut(header) {
            r.cells.push(MemoryCell {
                text: controls.sort_label.clone(),
                marker: Some(CellMarker::Score),
                style: CellStyle {
                    bold: true,
                    centered: true,
                    background: Some("#ffeb3b"),
                    color: None,
                },
            });
            r.cells.push(MemoryCell {
                text: controls.rank_label.clone(),
                marker: Some(CellMarker::Rank),
                style: CellStyle {
                    bold: true,
                    centered: true,
                    background: Some("#64b5f6"),
                    color: None,
                },
            });
            r.controls = Some(controls.clone());
        }
    }

    fn set_sort_label(&mut self, header: RowId, label: &str) {
        if let Some(r) = self.row_mut(header) {
            if let Some(cell) = r
                .cells
                .iter_mut()
                .find(|c| c.marker == Some(CellMarker::Score))
            {
                cell.text = label.to_string();
            }
            if let Some(controls) = r.controls.as_mut() {
                controls.sort_label = label.to_string();
            }
        }
    }

    fn set_threshold_input(&mut self, header: RowId, threshold: f64) {
        if let Some(controls) = self.row_mut(header).and_then(|r| r.controls.as_mut()) {
            controls.threshold = threshold;
        }
    }

    fn reorder_rows(&mut self, order: &[RowId]) {
        let mut moved = Vec::with_capacity(order.len());
        for id in order {
            if let Some(pos) = self.rows.iter().position(|r| r.id == *id) {
                moved.push(self.rows.remove(pos));
            }
        }
        self.rows.extend(moved);
    }
}
