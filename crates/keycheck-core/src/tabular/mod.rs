//! CSV import/export around a run: header row plus data rows, cells kept
//! verbatim so an exported report reproduces the input rows.

mod export;
mod mapping;

pub use export::{export_results, status_column_name};
pub use mapping::{extract_keys, ColumnMapping, ExtractOptions, RowFilterMode, TruthyToken};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("the file has no header row")]
    MissingHeader,
    #[error("column not found: {0}")]
    MissingColumn(String),
    #[error("row filter is enabled but no filter column is set")]
    FilterColumnUnset,
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse CSV text. The first record is the header row; rows may be
    /// shorter or longer than it.
    pub fn parse(text: &str) -> Result<Self, TabularError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => return Err(TabularError::MissingHeader),
        };
        let mut rows = Vec::new();
        for record in records {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn read_path(path: &Path) -> Result<Self, TabularError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn to_csv_string(&self) -> Result<String, TabularError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer.into_inner().map_err(|e| TabularError::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn write_path(&self, path: &Path) -> Result<(), TabularError> {
        std::fs::write(path, self.to_csv_string()?)?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub(crate) fn require_column(&self, name: &str) -> Result<usize, TabularError> {
        self.column_index(name)
            .ok_or_else(|| TabularError::MissingColumn(name.to_string()))
    }
}

/// `keys.csv` -> `keys_with_status.csv`, next to the input.
pub fn default_export_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "keys".to_string());
    input.with_file_name(format!("{stem}_with_status.csv"))
}
