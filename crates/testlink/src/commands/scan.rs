//! Implementation of the `testlink scan` command

use testlink_core::output::{write_scan_text, ScanResponse};
use testlink_core::{ExitStatus, LinkError};

use super::{emit, Project};
use crate::cli::GlobalArgs;

/// Run the scan command: report every discrepancy, modify nothing.
pub fn run_scan(global: &GlobalArgs) -> Result<ExitStatus, LinkError> {
    let project = Project::open(global)?;
    let scanned = project.scan()?;
    let report = scanned.engine().validate();

    let response = ScanResponse::new(scanned.summary(), &report, scanned.errors());
    emit(global.format, &response, |w, r| write_scan_text(w, r))?;
    Ok(response.exit_status())
}
