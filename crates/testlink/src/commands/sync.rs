//! Implementation of the `testlink sync` command

use testlink_core::output::{write_sync_text, SyncResponse};
use testlink_core::{ExitStatus, Finding, LinkError, SyncOptions};
use testlink_php::TestedByWriter;
use tracing::info;

use super::{emit, Project};
use crate::cli::GlobalArgs;

/// Run the sync command.
///
/// Missing back-references and missing test links are written (or, with
/// `dry_run`, previewed as a unified diff). Findings sync cannot resolve are
/// reported as unresolved and keep the exit status at 1.
pub fn run_sync(global: &GlobalArgs, options: &SyncOptions) -> Result<ExitStatus, LinkError> {
    let project = Project::open(global)?;
    let scanned = project.scan()?;
    let engine = scanned.engine();

    let report = engine.validate();
    let plan = engine.plan(&report, options);
    info!(
        actions = plan.len(),
        dry_run = options.dry_run,
        prune = options.prune,
        "planned sync"
    );
    let outcome = engine.apply(
        &plan,
        project.root(),
        project.adapters(),
        &TestedByWriter,
        options,
    );

    let unresolved: Vec<Finding> = report
        .findings
        .iter()
        .filter(|f| !f.kind.is_fixable())
        .cloned()
        .collect();
    let response = SyncResponse::new(&plan, outcome, unresolved, scanned.errors());
    emit(global.format, &response, |w, r| write_sync_text(w, r))?;
    Ok(response.exit_status())
}
