//! Binary entry point for the testlink CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Report missing back-references, dangling links and orphans
//! testlink scan
//!
//! # Preview the fixes as a unified diff
//! testlink sync --dry-run
//!
//! # Write the fixes, removing test links nobody references back
//! testlink sync --prune
//!
//! # Which tests exercise a method?
//! testlink report --method 'App\Services\UserService::create' --format json
//! ```

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use testlink::cli::{Cli, Command, LogLevel, OutputFormat};
use testlink::commands::{run_report, run_scan, run_sync};
use testlink_core::output::{emit_response, ErrorResponse};
use testlink_core::{ExitStatus, LinkError, SyncOptions};

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    match execute(&cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            report_error(&err, cli.global.format);
            ExitCode::from(err.exit_status().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(cli: &Cli) -> Result<ExitStatus, LinkError> {
    match &cli.command {
        Command::Scan => run_scan(&cli.global),
        Command::Sync {
            dry_run,
            link_only,
            prune,
        } => {
            let options = SyncOptions {
                dry_run: *dry_run,
                link_only: *link_only,
                prune: *prune,
            };
            run_sync(&cli.global, &options)
        }
        Command::Report { method } => run_report(&cli.global, method.as_deref()),
    }
}

/// Report a run-ending error: JSON on stdout, or a one-line message on stderr.
fn report_error(err: &LinkError, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let mut stdout = io::stdout();
            let _ = emit_response(&ErrorResponse::from_error(err), &mut stdout);
            let _ = stdout.flush();
        }
        OutputFormat::Text => eprintln!("error: {err}"),
    }
}
