//! Per-file diagnostics.

use crate::engine::FileReport;
use std::path::Path;

/// Render one block per file.
///
/// A file that resolved is reported as `<file>: no issues found`. A failure
/// is reported as the file name, an error line with the outer message, and
/// one line per nested cause.
pub fn render(cwd: &Path, reports: &[FileReport]) -> String {
	let mut out = String::new();

	for report in reports {
		let file = report.file.strip_prefix(cwd).unwrap_or(&report.file);

		match &report.outcome {
			Ok(_) => out.push_str(&format!("{}: no issues found\n", file.display())),
			Err(err) => {
				out.push_str(&format!("{}\n", file.display()));
				let mut causes = err.causes().into_iter();
				if let Some(message) = causes.next() {
					out.push_str(&format!("  1:1  error  {}: {message}\n", err.kind()));
				}
				for cause in causes {
					out.push_str(&format!("{cause}\n"));
				}
			}
		}
	}

	out
}

/// Number of files that could not be configured.
pub fn failures(reports: &[FileReport]) -> usize {
	reports.iter().filter(|report| !report.is_ok()).count()
}
