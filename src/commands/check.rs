use anyhow::{Context, Result};
use fieldguard::FieldValidator;
use fieldguard::report::{OutputFormat, Reporter};
use std::process::ExitCode;

pub fn check_command(project: &str, quiet: bool, format: OutputFormat) -> Result<ExitCode> {
    let mut validator =
        FieldValidator::open(project).with_context(|| format!("Failed to open project: {project}"))?;

    let print_success = validator.settings().print_success && !quiet;
    let mut reporter = Reporter::stdout(format);

    if validator.run(&mut reporter, print_success) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
