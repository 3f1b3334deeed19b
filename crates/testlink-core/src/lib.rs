//! Core infrastructure for testlink.
//!
//! This crate provides the language-agnostic parts of the link
//! synchronization engine:
//! - Link model (identifiers, declared links, parsed test cases)
//! - Byte spans and splices for minimal-diff source rewriting
//! - Adapter traits for pluggable test-declaration syntaxes
//! - The bidirectional link registry
//! - Autoload configuration and namespace resolution
//! - File discovery and the scanner
//! - The consistency/sync engine
//! - Error types, exit statuses, JSON/text output and unified diffs

pub mod adapter;
pub mod config;
pub mod diff;
pub mod error;
pub mod files;
pub mod link;
pub mod output;
pub mod patch;
pub mod registry;
pub mod scanner;
pub mod sync;
pub mod text;

pub use adapter::{
    BackReferenceWriter, FrameworkAdapter, ProductionParser, SourceModifier, TestParser,
};
pub use error::{ExitStatus, LinkError, ModifyError, SyntaxError};
pub use link::{
    DeclarationSyntax, DeclaredLink, LinkIdentifier, ParsedTestCase, ProductionClass,
    ProductionDeclaration, ProductionMethod, TestRecord, TestReference,
};
pub use config::{AutoloadMapping, ProjectConfig};
pub use registry::{ProductionEntry, ProductionIndex, TestLinkRegistry};
pub use scanner::{ScanError, ScanErrorKind, ScanReport, Scanner};
pub use sync::{
    CoverageEntry, FileChange, Finding, FindingKind, LinkingTest, SyncAction, SyncEngine,
    SyncOptions, SyncOutcome, SyncPlan, ValidationReport,
};
