use anyhow::{Context, Result};
use fieldguard::FieldValidator;
use fieldguard::model::TypeIdentity;

pub fn rules_command(project: &str, type_name: &str) -> Result<()> {
    let mut validator =
        FieldValidator::open(project).with_context(|| format!("Failed to open project: {project}"))?;

    if validator.host().classes().get(type_name).is_none() {
        anyhow::bail!("Type not found: {}", type_name);
    }

    let rules = validator.rules_for(&TypeIdentity::new(type_name));
    println!("Rules for {type_name}:");
    if rules.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for rule in rules.iter() {
        let mut flags = Vec::new();
        if rule.requires_single_value {
            flags.push("required");
        }
        if rule.requires_member_validity {
            flags.push("required members");
        }
        println!("  {} ({})", rule.member, flags.join(", "));
    }
    Ok(())
}
