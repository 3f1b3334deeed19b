//! The `testlink` command-line front door.
//!
//! The binary wires the core scanner and sync engine to the PHP front end:
//! - `scan` reports link discrepancies without touching files
//! - `sync` writes the missing halves of links (or previews them)
//! - `report` prints which tests link each production method
//!
//! Argument parsing lives in [`cli`]; each command is implemented in
//! [`commands`] and returns the run's [`testlink_core::ExitStatus`].

pub mod cli;
pub mod commands;
