use keycheck_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Log to the state dir; keep going on stderr if that is not writable.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", e);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("keycheck error: {:#}", err);
        std::process::exit(1);
    }
}
