//! CLI for keycheck.

mod commands;
mod control_socket;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use keycheck_core::config;
use keycheck_core::store::StateStore;
use keycheck_core::tabular::{ColumnMapping, RowFilterMode, TruthyToken};
use std::path::PathBuf;

use commands::{run_check, run_export, run_probe, run_reset, run_status, run_stop, CheckOptions};

/// Top-level CLI for keycheck.
#[derive(Debug, Parser)]
#[command(name = "keycheck")]
#[command(about = "keycheck: throttled bulk verification of activation keys", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Check every key in a CSV file and write a report with status columns.
    Check {
        /// CSV file with a header row.
        csv: PathBuf,
        /// Column holding the keys.
        #[arg(long, default_value = "key_1", value_name = "COLUMN")]
        key_column: String,
        /// Second key column, checked after the first one in each row.
        #[arg(long, value_name = "COLUMN")]
        secondary_column: Option<String>,
        /// Only check rows whose cell in this column is truthy.
        #[arg(long, value_name = "COLUMN")]
        filter_column: Option<String>,
        /// Extra value accepted as truthy in the filter column (true, yes or x).
        #[arg(long, default_value = "true", value_name = "TOKEN")]
        truthy_token: TruthyToken,
        /// Skip keys whose `<column>_status` cell already has a value.
        #[arg(long)]
        skip_checked: bool,
        /// Report path (default: `<input>_with_status.csv`).
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Cookie header of a logged-in browser session.
        #[arg(long, value_name = "COOKIE")]
        cookie: Option<String>,
        /// HAR capture of a logged-in session to take the cookie from.
        #[arg(long, value_name = "PATH")]
        har: Option<PathBuf>,
        /// Do not check the login state before starting.
        #[arg(long)]
        skip_probe: bool,
    },

    /// Show the state of the current or last run.
    Status,

    /// Stop the active run; results so far are kept.
    Stop,

    /// Clear the recorded run state.
    Reset,

    /// Write the report of the last run from the recorded state.
    Export {
        /// Report path (default: `<input>_with_status.csv`).
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Check whether the session cookie is logged in.
    Probe {
        #[arg(long, value_name = "COOKIE")]
        cookie: Option<String>,
        #[arg(long, value_name = "PATH")]
        har: Option<PathBuf>,
    },
}

/// Column mapping from the `check` flags: a secondary column enables it,
/// a filter column switches to filtered mode.
fn column_mapping(
    key_column: String,
    secondary_column: Option<String>,
    filter_column: Option<String>,
    truthy_token: TruthyToken,
) -> ColumnMapping {
    ColumnMapping {
        primary_key_column: key_column,
        include_secondary: secondary_column.is_some(),
        secondary_key_column: secondary_column,
        row_filter_mode: if filter_column.is_some() {
            RowFilterMode::Filtered
        } else {
            RowFilterMode::All
        },
        filter_column,
        filter_truthy_token: truthy_token,
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Check {
                csv,
                key_column,
                secondary_column,
                filter_column,
                truthy_token,
                skip_checked,
                output,
                cookie,
                har,
                skip_probe,
            } => {
                let store = StateStore::open_default().await?;
                let opts = CheckOptions {
                    csv,
                    mapping: column_mapping(key_column, secondary_column, filter_column, truthy_token),
                    skip_checked,
                    output,
                    cookie,
                    har,
                    skip_probe,
                };
                run_check(&cfg, store, opts).await?;
            }
            CliCommand::Status => run_status(&cfg, StateStore::open_default().await?).await?,
            CliCommand::Stop => run_stop().await?,
            CliCommand::Reset => run_reset(StateStore::open_default().await?).await?,
            CliCommand::Export { output } => {
                run_export(&cfg, StateStore::open_default().await?, output).await?;
            }
            CliCommand::Probe { cookie, har } => {
                run_probe(&cfg, cookie.as_deref(), har.as_deref()).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
