//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `tp` with logs and data kept inside a temp dir
fn tp(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tp").expect("binary built");
    cmd.env("XDG_DATA_HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .current_dir(home.path());
    cmd
}

fn write_config(home: &TempDir) -> std::path::PathBuf {
    let path = home.path().join("tripplanner.yml");
    let db = home.path().join("tp.db");
    std::fs::write(
        &path,
        format!(
            "llm:\n  provider: openai\nworkflow:\n  max-iterations: 3\nstorage:\n  db-path: {}\n",
            db.display()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    tp(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("Logs are written to"));
}

#[test]
fn test_config_prints_effective_yaml() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tp(&home)
        .arg("config")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("provider: openai"))
        .stdout(predicate::str::contains("max-iterations: 3"))
        .stdout(predicate::str::contains("candidate-limit: 10"));
}

#[test]
fn test_config_defaults_without_file() {
    let home = TempDir::new().unwrap();
    tp(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("provider: mistral"))
        .stdout(predicate::str::contains("max-iterations: 2"));
}

#[test]
fn test_cache_stats_on_fresh_store() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tp(&home)
        .args(["cache", "stats", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("entries: 0"));
}

#[test]
fn test_show_rejects_bad_id() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tp(&home)
        .args(["show", "not-a-uuid", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid trip id"));
}

#[test]
fn test_show_unknown_trip_fails() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tp(&home)
        .args(["show", "0190a5c4-0000-7000-8000-000000000000", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved trip"));
}

#[test]
fn test_plan_without_api_key_fails_fast() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    let request = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("paris.yml");
    tp(&home)
        .env_remove("OPENAI_API_KEY")
        .args(["plan", "--config"])
        .arg(&config)
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}
