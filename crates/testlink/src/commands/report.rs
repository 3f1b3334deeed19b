//! Implementation of the `testlink report` command

use testlink_core::output::{write_report_text, ReportResponse};
use testlink_core::{ExitStatus, LinkError, LinkIdentifier};

use super::{emit, Project};
use crate::cli::GlobalArgs;

/// Run the report command: production method -> linking tests.
///
/// `method` restricts the map to one method (`Class::method`) or to every
/// method of one class (`Class`); naming an unknown target is an argument
/// error.
pub fn run_report(global: &GlobalArgs, method: Option<&str>) -> Result<ExitStatus, LinkError> {
    let only = method
        .map(|m| {
            m.parse::<LinkIdentifier>()
                .map_err(|e| LinkError::invalid_args(format!("invalid --method '{m}': {e}")))
        })
        .transpose()?;

    let project = Project::open(global)?;
    let scanned = project.scan()?;
    if let Some(target) = &only {
        if !scanned.production.contains_target(target) {
            return Err(LinkError::invalid_args(format!(
                "no production {} '{}'",
                if target.is_class_level() { "class" } else { "method" },
                target
            )));
        }
    }

    let response = ReportResponse::new(scanned.engine().coverage(only.as_ref()), scanned.errors());
    emit(global.format, &response, |w, r| write_report_text(w, r))?;
    Ok(response.exit_status())
}
