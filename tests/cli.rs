use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

const TYPES: &str = r#"
types:
  - script: res://scripts/enemy.gd
    class_name: Enemy
    members:
      - { name: target, required: true, node: true }
      - { name: drops, required_members: true }
"#;

fn enemy_scene(target: bool) -> String {
    let target = if target { "target = NodePath(\"../Player\")\n" } else { "" };
    format!(
        r#"[gd_scene load_steps=2 format=3]

[ext_resource type="Script" path="res://scripts/enemy.gd" id="1_e"]

[node name="Arena" type="Node2D"]

[node name="Player" type="Node2D" parent="."]

[node name="Goblin" type="Node2D" parent="."]
script = ExtResource("1_e")
{target}drops = [1, null]
"#
    )
}

fn project(target: bool) -> Result<assert_fs::TempDir, Box<dyn std::error::Error>> {
    let dir = assert_fs::TempDir::new()?;
    dir.child("fieldguard.types.yml").write_str(TYPES)?;
    dir.child("scenes/arena.tscn").write_str(&enemy_scene(target))?;
    Ok(dir)
}

fn fieldguard(dir: &assert_fs::TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("fieldguard")?;
    cmd.arg("--project").arg(dir.path());
    Ok(cmd)
}

#[test]
fn check_reports_violations_and_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(false)?;

    fieldguard(&dir)?
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "res://scenes/arena.tscn :: Arena/Goblin :: target -> Assignment required",
        ))
        .stdout(predicate::str::contains(
            "res://scenes/arena.tscn :: Arena/Goblin :: drops -> Element [1] is not assigned",
        ))
        .stdout(predicate::str::contains("Validation failed: 2 error(s) in 1 file(s)"));

    Ok(())
}

#[test]
fn check_is_the_default_command() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(false)?;

    fieldguard(&dir)?
        .assert()
        .failure()
        .stdout(predicate::str::contains("Validation failed: 2 error(s)"));

    Ok(())
}

#[test]
fn passing_project_prints_summary_unless_quiet() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(true)?;
    dir.child("scenes/arena.tscn")
        .write_str(&enemy_scene(true).replace("drops = [1, null]", "drops = [1, 2]"))?;

    fieldguard(&dir)?
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed: 1 file(s) scanned"));

    fieldguard(&dir)?
        .args(["check", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    Ok(())
}

#[test]
fn settings_can_silence_success() -> Result<(), Box<dyn std::error::Error>> {
    let dir = assert_fs::TempDir::new()?;
    dir.child("fieldguard.yml").write_str("print_success: false\n")?;

    fieldguard(&dir)?
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    Ok(())
}

#[test]
fn first_check_creates_ignore_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(true)?;
    dir.child("addons/plugin/broken.tscn").write_str(&enemy_scene(false))?;

    fieldguard(&dir)?
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Validation failed: 1 error(s) in 1 file(s)"));

    dir.child(".fieldignore")
        .assert(predicate::str::contains("res://addons/"));
    Ok(())
}

#[test]
fn json_format_emits_one_object_per_line() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(false)?;

    let output = fieldguard(&dir)?
        .args(["check", "--format", "json"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output)?;
    let records: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line))
        .collect::<Result<_, _>>()?;

    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["member"], "target");
    assert_eq!(records[1]["detail"], "Element [1] is not assigned");
    assert_eq!(records[2]["passed"], false);
    assert_eq!(records[2]["error_count"], 2);
    Ok(())
}

#[test]
fn rules_lists_members_for_class_name() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(true)?;

    fieldguard(&dir)?
        .args(["rules", "Enemy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("target (required)"))
        .stdout(predicate::str::contains("drops (required members)"));

    fieldguard(&dir)?
        .args(["rules", "Missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Type not found: Missing"));

    Ok(())
}

#[test]
fn files_lists_scan_targets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = project(true)?;
    dir.child("addons/plugin/skipped.tscn").write_str(&enemy_scene(true))?;
    dir.child("tools/skipped.tres").write_str("[gd_resource format=3]\n[resource]\n")?;
    dir.child("tools/.gdignore").touch()?;
    dir.child("readme.txt").write_str("not a scene")?;

    fieldguard(&dir)?
        .arg("files")
        .assert()
        .success()
        .stdout("res://scenes/arena.tscn\n");

    Ok(())
}
