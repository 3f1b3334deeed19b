//! Command-line structure for the `testlink` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

/// Keep test links and production back-references in sync.
///
/// Tests declare which production methods they exercise (`->linksAndCovers()`
/// in Pest, `#[LinksAndCovers]` in PHPUnit); production methods declare
/// `#[TestedBy]` in return. testlink finds the missing halves and writes them.
#[derive(Parser, Debug)]
#[command(
    name = "testlink",
    version,
    about = "Keep test links and #[TestedBy] back-references in sync"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Project root holding composer.json (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    pub project_root: PathBuf,

    /// Test framework to scan.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub framework: Framework,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Log level for tracing output (`RUST_LOG` takes precedence).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Extra test autoload mapping in format `<dir>=<namespace>`.
    ///
    /// Can be specified multiple times; mappings given here take precedence
    /// over `autoload-dev` in composer.json, in the order given:
    /// - `--test-mapping tests/=Acme\App\Tests\`
    #[arg(long, global = true, value_parser = parse_test_mapping)]
    pub test_mapping: Vec<(String, String)>,
}

/// Malformed `--test-mapping` value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("invalid test mapping '{0}', expected '<dir>=<namespace>' (e.g., 'tests/=Tests\\')")]
    MissingSeparator(String),

    #[error("invalid test mapping '{0}': directory is empty")]
    EmptyDirectory(String),
}

/// Parse a test mapping in `<dir>=<namespace>` format.
pub fn parse_test_mapping(s: &str) -> Result<(String, String), MappingError> {
    let (directory, namespace) = s
        .split_once('=')
        .ok_or_else(|| MappingError::MissingSeparator(s.to_string()))?;
    if directory.trim().is_empty() {
        return Err(MappingError::EmptyDirectory(s.to_string()));
    }
    Ok((directory.trim().to_string(), namespace.trim().to_string()))
}

/// Framework selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Framework {
    /// Every framework the project uses (all of them when none is detected).
    #[default]
    Auto,
    /// Pest only.
    Pest,
    /// PHPUnit only.
    #[value(name = "phpunit")]
    PhpUnit,
}

impl Framework {
    /// Adapter name for an explicit selection, `None` for auto-detection.
    pub fn adapter_name(self) -> Option<&'static str> {
        match self {
            Framework::Auto => None,
            Framework::Pest => Some("pest"),
            Framework::PhpUnit => Some("phpunit"),
        }
    }
}

/// Output format for all commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default).
    #[default]
    Text,
    /// Full JSON response.
    Json,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Report link discrepancies without modifying files.
    Scan,
    /// Write missing back-references and test links.
    ///
    /// Dangling links, orphaned back-references and duplicate tests are
    /// reported but never fixed.
    Sync {
        /// Print the unified diff instead of writing files.
        #[arg(long)]
        dry_run: bool,
        /// Add plain links instead of coverage links.
        #[arg(long)]
        link_only: bool,
        /// Remove test links that have no back-reference instead of adding one.
        #[arg(long)]
        prune: bool,
    },
    /// Print the coverage map: production method -> linking tests.
    Report {
        /// Restrict the report to one method (`Class::method`) or class.
        #[arg(long)]
        method: Option<String>,
    },
}
