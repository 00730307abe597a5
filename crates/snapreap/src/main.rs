//! Snapreap CLI binary.

use colored::Colorize;
use snapreap::cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for fatal errors; 1 is reserved for runs where a group failed.
const EXIT_FATAL: u8 = 2;

/// Main entry point for the snapreap CLI.
///
/// Uses tokio's current_thread runtime: backend calls are awaited one at a
/// time, in dependency order.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // RUST_LOG wins over -v. Logs go to stderr so plans on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting snapreap CLI");

    match cli.execute().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {e:#}", "error".red().bold());
            ExitCode::from(EXIT_FATAL)
        }
    }
}
