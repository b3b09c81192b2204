use anyhow::{Context, Result};
use fieldguard::FieldValidator;

pub fn files_command(project: &str) -> Result<()> {
    let validator =
        FieldValidator::open(project).with_context(|| format!("Failed to open project: {project}"))?;

    let files = validator.files();
    if files.is_empty() {
        println!("  (none)");
    }
    for path in files {
        println!("{path}");
    }
    Ok(())
}
