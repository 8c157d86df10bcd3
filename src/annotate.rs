//! Score and rank cell annotation.
//!
//! Both passes find their cell by marker and rewrite it in place, so running
//! them repeatedly never duplicates cells.

use crate::columns::FieldIndexMap;
use crate::score::{calculate_score, Score, ScoreConfig};
use crate::table::{CellMarker, CellStyle, RowId, TableAccess};

const WARNING_BACKGROUND: &str = "#ff5252";
const WARNING_COLOR: &str = "white";
const SCORE_BACKGROUND: &str = "#c8e6c9";
const RANK_BACKGROUND: &str = "#e3f2fd";

/// Every fifth rank is flagged.
pub const RANK_FLAG_INTERVAL: usize = 5;

fn highlighted(flagged: bool, normal_background: &'static str) -> CellStyle {
    CellStyle {
        bold: true,
        centered: true,
        background: Some(if flagged {
            WARNING_BACKGROUND
        } else {
            normal_background
        }),
        color: if flagged { Some(WARNING_COLOR) } else { None },
    }
}

/// Style for a score cell.
pub fn score_style(score: &Score) -> CellStyle {
    highlighted(score.is_disqualified(), SCORE_BACKGROUND)
}

/// Style for a 1-based rank cell.
pub fn rank_style(rank: usize) -> CellStyle {
    highlighted(rank % RANK_FLAG_INTERVAL == 0, RANK_BACKGROUND)
}

/// Position of the score cell in `row`, creating it if needed.
///
/// A new score cell goes right before the rank cell, or at the end of the
/// row when no rank cell exists yet.
fn ensure_score_cell<T: TableAccess>(table: &mut T, row: RowId) -> usize {
    if let Some(idx) = table.find_marked_cell(row, CellMarker::Score) {
        return idx;
    }
    let at = table
        .find_marked_cell(row, CellMarker::Rank)
        .unwrap_or_else(|| table.data_cells(row).len());
    table.insert_marked_cell(row, at, CellMarker::Score);
    at
}

fn ensure_rank_cell<T: TableAccess>(table: &mut T, row: RowId) -> usize {
    if let Some(idx) = table.find_marked_cell(row, CellMarker::Rank) {
        return idx;
    }
    let at = table.data_cells(row).len();
    table.insert_marked_cell(row, at, CellMarker::Rank);
    at
}

/// Score every row and write the result into its score cell.
///
/// Returns the scores in row order.
pub fn update_scores<T: TableAccess>(
    table: &mut T,
    rows: &[RowId],
    fields: &FieldIndexMap,
    config: &ScoreConfig,
) -> Vec<Score> {
    rows.iter()
        .map(|&row| {
            let cells = table.data_cells(row);
            let score = calculate_score(&cells, fields, config);
            let idx = ensure_score_cell(table, row);
            table.write_cell(row, idx, &score.to_string(), &score_style(&score));
            score
        })
        .collect()
}

/// Number rows 1..=N in the given order.
pub fn update_ranks<T: TableAccess>(table: &mut T, rows: &[RowId]) {
    for (i, &row) in rows.iter().enumerate() {
        let rank = i + 1;
        let idx = ensure_rank_cell(table, row);
        table.write_cell(row, idx, &rank.to_string(), &rank_style(rank));
    }
}
