//! Error types and exit status codes for testlink.
//!
//! ## Exit Status Mapping
//!
//! - `0`: Clean (no findings, no collected file errors)
//! - `1`: Findings present (validation findings or per-file errors)
//! - `2`: Fatal error (configuration or argument failure)
//!
//! ## Propagation
//!
//! - **Per-file errors** (`Parse`, `Io`) are collected by the scanner and the
//!   sync engine and never abort a batch
//! - **Run-fatal errors** (`Config`, `InvalidArguments`) abort the run, since
//!   every namespace resolution depends on the configuration
//! - **Findings** are data in the report, not errors

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::link::LinkParseError;
use crate::patch::SpliceError;

// ============================================================================
// Exit Status
// ============================================================================

/// Process exit status for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    /// Nothing to report.
    Clean = 0,
    /// Findings or per-file errors were reported.
    Findings = 1,
    /// The run could not complete.
    Fatal = 2,
}

impl ExitStatus {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Syntax Errors
// ============================================================================

/// Malformed source text, located by 1-indexed line and column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct SyntaxError {
    /// What went wrong.
    pub message: String,
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed column (bytes).
    pub column: u32,
}

impl SyntaxError {
    /// Build a syntax error positioned at `offset` within `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = crate::text::byte_offset_to_position(source, offset);
        SyntaxError {
            message: message.into(),
            line,
            column,
        }
    }
}

// ============================================================================
// Modifier Errors
// ============================================================================

/// Errors produced while rewriting declarations.
#[derive(Debug, Error)]
pub enum ModifyError {
    /// The test to modify could not be located in the given text.
    #[error("test '{name}' not found in source")]
    TestNotFound { name: String },

    /// The production method to modify could not be located.
    #[error("method '{method}' not found in source")]
    MethodNotFound { method: String },

    /// The text no longer parses.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// A method argument was not a canonical link identifier.
    #[error("invalid link identifier: {0}")]
    InvalidIdentifier(#[from] LinkParseError),

    /// The computed splices conflict.
    #[error(transparent)]
    Conflict(#[from] SpliceError),

    /// The modifier was handed a test of another syntax kind.
    #[error("modifier '{modifier}' does not support {syntax} tests")]
    Unsupported { modifier: String, syntax: String },
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for scans, syncs and CLI output.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Malformed source; the file is skipped and the error collected.
    #[error("parse error in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// File unreadable or unwritable; fatal for that file only.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed project configuration; fatal for the run.
    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// Invalid arguments from the caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// A rewrite of the named file failed.
    #[error("cannot modify {}: {source}", path.display())]
    Modify {
        path: PathBuf,
        #[source]
        source: ModifyError,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl LinkError {
    /// Create a parse error for `path`.
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LinkError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LinkError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        LinkError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        LinkError::Internal {
            message: message.into(),
        }
    }

    /// True for errors that end the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::Config { .. } | LinkError::InvalidArguments { .. } | LinkError::Internal { .. }
        )
    }

    /// Short machine-readable kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::Parse { .. } => "parse_error",
            LinkError::Io { .. } => "io_error",
            LinkError::Config { .. } => "config_error",
            LinkError::InvalidArguments { .. } => "invalid_arguments",
            LinkError::Modify { .. } => "modify_error",
            LinkError::Internal { .. } => "internal_error",
        }
    }

    /// The file this error concerns, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            LinkError::Parse { path, .. }
            | LinkError::Io { path, .. }
            | LinkError::Config { path, .. }
            | LinkError::Modify { path, .. } => Some(path),
            LinkError::InvalidArguments { .. } | LinkError::Internal { .. } => None,
        }
    }

    /// The exit status this error leads to when it ends a run.
    pub fn exit_status(&self) -> ExitStatus {
        if self.is_fatal() {
            ExitStatus::Fatal
        } else {
            ExitStatus::Findings
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
