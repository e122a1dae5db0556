//! Report export: original table plus one `<column>_status` column per key column.

use std::collections::HashMap;

use super::{ColumnMapping, Table};
use crate::model::CheckResult;

pub fn status_column_name(column: &str) -> String {
    format!("{column}_status")
}

/// Build the report table. An existing `<column>_status` header is reused
/// and its cells overwritten where a result exists; otherwise the column is
/// appended, empty for unchecked cells. With duplicate results for one cell
/// the first one wins.
///
/// Rows longer than the header keep every original cell: the header is
/// widened with blank names first, so appended status columns always land
/// past the widest row.
pub fn export_results(table: &Table, mapping: &ColumnMapping, results: &[CheckResult]) -> Table {
    let mut by_cell: HashMap<(usize, &str), &str> = HashMap::new();
    for r in results {
        by_cell
            .entry((r.source_row_index, r.source_column.as_str()))
            .or_insert(r.status.as_str());
    }

    let widest = table.rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut headers = table.headers.clone();
    // (key column, target index in the output row)
    let mut targets: Vec<(&str, usize)> = Vec::new();
    for col in mapping.key_columns() {
        let name = status_column_name(col);
        let index = match headers.iter().position(|h| *h == name) {
            Some(i) => i,
            None => {
                if headers.len() < widest {
                    headers.resize(widest, String::new());
                }
                headers.push(name);
                headers.len() - 1
            }
        };
        if !targets.iter().any(|&(_, i)| i == index) {
            targets.push((col, index));
        }
    }

    let width = headers.len();
    let rows = table
        .rows
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            let mut out = row.clone();
            if out.len() < width {
                out.resize(width, String::new());
            }
            for &(col, index) in &targets {
                if let Some(status) = by_cell.get(&(row_index, col)) {
                    out[index] = status.to_string();
                }
            }
            out
        })
        .collect();

    Table { headers, rows }
}
