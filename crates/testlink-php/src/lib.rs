//! PHP front end for testlink.
//!
//! This crate provides:
//! - A span-preserving PHP tokenizer
//! - A winnow grammar for link declaration arguments
//! - Namespace and `use` import resolution
//! - The Pest (fluent chain) and PHPUnit (attribute list) adapters
//! - Production class parsing and `#[TestedBy]` back-reference writing
//!
//! All rewriting is text in, text out: the core sync engine owns file I/O.

pub mod adapter;
pub mod args;
pub mod attributes;
pub mod edits;
pub mod imports;
pub mod lexer;
pub mod members;
pub mod pest;
pub mod phpunit;
pub mod production;

pub use adapter::{adapter_for, all_adapters, available_adapters, PestAdapter, PhpUnitAdapter};
pub use imports::Imports;
pub use pest::{PestModifier, PestParser};
pub use phpunit::{PhpUnitModifier, PhpUnitParser};
pub use production::{PhpProductionParser, TestedByWriter};
