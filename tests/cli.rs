// ABOUTME: Integration tests for the regsweep CLI commands.
// ABOUTME: Validates --help output, init, config errors, and checkpoint management.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn regsweep_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("regsweep"))
}

const CONFIG: &str = "registry:\n  url: registry.invalid\n  image_types: [environment]\ncheckpoint_dir: state\n";

#[test]
fn help_shows_commands() {
    regsweep_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("checkpoints"));
}

#[test]
fn delete_help_documents_apply_flag() {
    regsweep_cmd()
        .args(["delete", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--apply"))
        .stdout(predicate::str::contains("--unused-since-days"))
        .stdout(predicate::str::contains("--operation-id"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--registry", "registry.internal:5000"])
        .assert()
        .success();

    let content = fs::read_to_string(temp_dir.path().join("regsweep.yml")).unwrap();
    assert!(content.contains("registry.internal:5000"));
    assert!(content.contains("image_types:"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("regsweep.yml"), "existing: config").unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn commands_fail_without_config() {
    let temp_dir = tempfile::tempdir().unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn delete_requires_evidence() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("regsweep.yml"), CONFIG).unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .arg("delete")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no evidence bundle"));
}

#[test]
fn checkpoints_list_show_and_clear() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("regsweep.yml"), CONFIG).unwrap();
    fs::create_dir_all(temp_dir.path().join("state")).unwrap();
    fs::write(
        temp_dir
            .path()
            .join("state/delete_unused_tags.checkpoint.json"),
        r#"{
            "operation_type": "delete_unused_tags",
            "started_at": "2024-06-01T00:00:00Z",
            "last_updated": "2024-06-01T00:10:00Z",
            "total_items": 3,
            "completed_items": ["environment:a"],
            "failed_items": ["environment:b"]
        }"#,
    )
    .unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["checkpoints", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2/3 processed (1 failed)"));

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["checkpoints", "show", "delete_unused_tags"])
        .assert()
        .success()
        .stdout(predicate::str::contains("environment:b"));

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["checkpoints", "clear", "delete_unused_tags"])
        .assert()
        .success();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["checkpoints", "show", "delete_unused_tags"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no checkpoint found"));
}

#[test]
fn json_mode_emits_structured_checkpoint_list() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("regsweep.yml"), CONFIG).unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["--json", "checkpoints", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"result""#));
}

/// A stand-in `skopeo` that serves tags `keep` and `other` and logs each call.
#[cfg(unix)]
fn fake_skopeo(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-skopeo");
    fs::write(
        &script,
        r#"#!/bin/sh
here="$(dirname "$0")"
echo "$1 $3" >> "$here/calls.log"
case "$1" in
  list-tags)
    if [ -n "$FAIL_SECOND_LIST" ] && [ -f "$here/listed" ]; then
      echo "dial tcp: connection refused" >&2
      exit 1
    fi
    touch "$here/listed"
    echo '{"Repository":"environment","Tags":["keep","other"]}'
    ;;
  inspect)
    tag="${3##*:}"
    echo "{\"Digest\":\"sha256:m-$tag\",\"LayersData\":[{\"Digest\":\"sha256:base\",\"Size\":100},{\"Digest\":\"sha256:own-$tag\",\"Size\":10}]}"
    ;;
esac
"#,
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    fs::write(
        dir.join("regsweep.yml"),
        format!(
            "registry:\n  url: reg.local\n  image_types: [environment]\n  skopeo_binary: {}\ncheckpoint_dir: state\n",
            script.display()
        ),
    )
    .unwrap();
    fs::write(
        dir.join("evidence.json"),
        r#"{"projects": [{"environment_docker_tag": "keep", "project_id": "p1"}]}"#,
    )
    .unwrap();
    script
}

#[cfg(unix)]
fn calls(dir: &std::path::Path) -> String {
    fs::read_to_string(dir.join("calls.log")).unwrap_or_default()
}

#[cfg(unix)]
#[test]
fn delete_with_unreadable_evidence_fails_before_touching_registry() {
    let temp_dir = tempfile::tempdir().unwrap();
    fake_skopeo(temp_dir.path());

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["delete", "--apply", "--force", "--evidence", "evidnce-typo.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read evidence file"));

    assert_eq!(calls(temp_dir.path()), "");
}

#[cfg(unix)]
#[test]
fn delete_with_malformed_evidence_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    fake_skopeo(temp_dir.path());
    fs::write(temp_dir.path().join("evidence.json"), "{ truncated").unwrap();

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["delete", "--apply", "--force", "--evidence", "evidence.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid evidence JSON"));

    assert!(!calls(temp_dir.path()).contains("delete "));
}

#[cfg(unix)]
#[test]
fn analyze_tolerates_unreadable_evidence() {
    let temp_dir = tempfile::tempdir().unwrap();
    fake_skopeo(temp_dir.path());

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["analyze", "--evidence", "missing.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("evidence unavailable"));
}

#[cfg(unix)]
#[test]
fn delete_apply_removes_only_unused_tags() {
    let temp_dir = tempfile::tempdir().unwrap();
    fake_skopeo(temp_dir.path());

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .args(["delete", "--apply", "--force", "--evidence", "evidence.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted environment:other"));

    let log = calls(temp_dir.path());
    assert!(log.contains("delete docker://reg.local/environment:other"));
    assert!(!log.contains("delete docker://reg.local/environment:keep"));
}

#[cfg(unix)]
#[test]
fn delete_apply_stops_when_registry_becomes_unreachable() {
    let temp_dir = tempfile::tempdir().unwrap();
    fake_skopeo(temp_dir.path());

    regsweep_cmd()
        .current_dir(temp_dir.path())
        .env("FAIL_SECOND_LIST", "1")
        .args(["delete", "--apply", "--force", "--evidence", "evidence.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("connection refused"));

    assert!(!calls(temp_dir.path()).contains("delete "));
}
