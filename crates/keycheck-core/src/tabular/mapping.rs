//! Column mapping and Key Record extraction.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{status_column_name, Table, TabularError};
use crate::model::KeyRecord;

/// Values that always count as "include this row" in filtered mode.
const BUILTIN_TRUTHY: &[&str] = &["true", "1", "yes", "oui", "vrai"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFilterMode {
    #[default]
    All,
    Filtered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruthyToken {
    #[default]
    True,
    Yes,
    X,
}

impl TruthyToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            TruthyToken::True => "true",
            TruthyToken::Yes => "yes",
            TruthyToken::X => "x",
        }
    }
}

impl FromStr for TruthyToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(TruthyToken::True),
            "yes" => Ok(TruthyToken::Yes),
            "x" => Ok(TruthyToken::X),
            other => Err(format!("unknown truthy token '{other}' (expected true, yes or x)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub primary_key_column: String,
    #[serde(default)]
    pub secondary_key_column: Option<String>,
    #[serde(default)]
    pub include_secondary: bool,
    #[serde(default)]
    pub row_filter_mode: RowFilterMode,
    #[serde(default)]
    pub filter_column: Option<String>,
    #[serde(default)]
    pub filter_truthy_token: TruthyToken,
}

impl ColumnMapping {
    pub fn primary(column: impl Into<String>) -> Self {
        Self {
            primary_key_column: column.into(),
            secondary_key_column: None,
            include_secondary: false,
            row_filter_mode: RowFilterMode::All,
            filter_column: None,
            filter_truthy_token: TruthyToken::True,
        }
    }

    /// Key columns in check order: primary, then secondary when enabled.
    pub fn key_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.primary_key_column.as_str()];
        if self.include_secondary {
            if let Some(secondary) = self.secondary_key_column.as_deref() {
                cols.push(secondary);
            }
        }
        cols
    }

    fn is_truthy(&self, cell: &str) -> bool {
        let cell = cell.trim().to_lowercase();
        cell == self.filter_truthy_token.as_str() || BUILTIN_TRUTHY.contains(&cell.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Skip cells whose `<column>_status` cell already holds a value.
    pub skip_checked: bool,
}

struct KeyColumn<'a> {
    name: &'a str,
    index: usize,
    status_index: Option<usize>,
}

/// Key Records in processing order: row by row, primary before secondary.
/// Values are trimmed and empty cells skipped; duplicates are kept.
pub fn extract_keys(
    table: &Table,
    mapping: &ColumnMapping,
    opts: ExtractOptions,
) -> Result<Vec<KeyRecord>, TabularError> {
    let columns = mapping
        .key_columns()
        .into_iter()
        .map(|name| {
            Ok(KeyColumn {
                name,
                index: table.require_column(name)?,
                status_index: table.column_index(&status_column_name(name)),
            })
        })
        .collect::<Result<Vec<_>, TabularError>>()?;

    let filter_index = match mapping.row_filter_mode {
        RowFilterMode::All => None,
        RowFilterMode::Filtered => {
            let name = mapping
                .filter_column
                .as_deref()
                .ok_or(TabularError::FilterColumnUnset)?;
            Some(table.require_column(name)?)
        }
    };

    let mut keys = Vec::new();
    for (row_index, row) in table.rows.iter().enumerate() {
        if let Some(fi) = filter_index {
            let cell = row.get(fi).map(String::as_str).unwrap_or("");
            if !mapping.is_truthy(cell) {
                continue;
            }
        }
        for col in &columns {
            let value = row.get(col.index).map(|v| v.trim()).unwrap_or("");
            if value.is_empty() {
                continue;
            }
            if opts.skip_checked {
                let checked = col
                    .status_index
                    .and_then(|si| row.get(si))
                    .is_some_and(|s| !s.trim().is_empty());
                if checked {
                    continue;
                }
            }
            keys.push(KeyRecord::new(value, col.name, row_index));
        }
    }
    Ok(keys)
}
