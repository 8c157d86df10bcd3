//! Click-to-sort by three-low score.

use crate::annotate::update_ranks;
use crate::columns::FieldIndexMap;
use crate::score::{calculate_score, ScoreConfig};
use crate::table::{RowId, TableAccess};
use std::cmp::Ordering;

/// Header text of the score column, before the direction arrow.
pub const SORT_LABEL: &str = "三低";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Best (lowest) scores first
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }

    /// Header label announcing this direction.
    pub fn label(self) -> String {
        format!("{} {}", SORT_LABEL, self.arrow())
    }

    fn order(self, a: f64, b: f64) -> Ordering {
        match self {
            SortDirection::Ascending => a.total_cmp(&b),
            SortDirection::Descending => b.total_cmp(&a),
        }
    }
}

/// Stable-sort `rows` by score in `direction`.
///
/// Disqualified rows sort with the sentinel score.
pub fn sorted_by_score<T: TableAccess>(
    table: &T,
    rows: &[RowId],
    fields: &FieldIndexMap,
    config: &ScoreConfig,
    direction: SortDirection,
) -> Vec<RowId> {
    let mut keyed: Vec<(f64, RowId)> = rows
        .iter()
        .map(|&row| {
            let cells = table.data_cells(row);
            (calculate_score(&cells, fields, config).sort_key(), row)
        })
        .collect();
    keyed.sort_by(|a, b| direction.order(a.0, b.0));
    keyed.into_iter().map(|(_, row)| row).collect()
}

/// Sort the table's data rows, renumber ranks and flip the direction.
///
/// Returns the new row order. The header label shows the direction the next
/// sort will use.
pub fn sort_by_score<T: TableAccess>(
    table: &mut T,
    header: RowId,
    rows: &[RowId],
    fields: &FieldIndexMap,
    config: &ScoreConfig,
    direction: &mut SortDirection,
) -> Vec<RowId> {
    let order = sorted_by_score(table, rows, fields, config, *direction);
    table.reorder_rows(&order);
    update_ranks(table, &order);

    *direction = direction.flipped();
    table.set_sort_label(header, &direction.label());
    log::debug!("Sorted {} rows, next sort {:?}", order.len(), direction);
    order
}
