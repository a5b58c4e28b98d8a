use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use winsvc_observer::config::Config;

fn write_config(dir: &Path, services: &[&str]) -> (PathBuf, PathBuf) {
    let status_log = dir.join("logs").join("WindowsServiceStatus.log");
    let config = Config {
        services: services.iter().map(|s| s.to_string()).collect(),
        status_log_path: status_log.clone(),
        ..Config::default()
    };

    let path = dir.join("config.yaml");
    config.save(path.clone()).unwrap();
    (path, status_log)
}

#[test]
fn prints_version() {
    Command::cargo_bin("winsvc-observer")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("winsvc-observer v"));
}

#[test]
fn empty_service_list_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_config(dir.path(), &[]);

    Command::cargo_bin("winsvc-observer")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No services configured"));
}

#[test]
fn check_prints_totals() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_config(dir.path(), &["dhcp", "FontCache"]);

    Command::cargo_bin("winsvc-observer")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Number of Monitored Services: 2"));
}

#[test]
fn service_flag_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_config(dir.path(), &["dhcp", "FontCache"]);

    Command::cargo_bin("winsvc-observer")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "check", "--service", "Spooler"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Number of Monitored Services: 1"));
}

#[cfg(not(windows))]
#[test]
fn check_audits_unresolved_services() {
    let dir = tempfile::tempdir().unwrap();
    let (config, status_log) = write_config(dir.path(), &["svcA", "svcB", "svcC"]);

    Command::cargo_bin("winsvc-observer")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "check"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Total Number of Running Services: 0")
                .and(predicate::str::contains("Total Number of NOT Running Services: 3"))
                .and(predicate::str::contains("Percent of Running Services: 0 %")),
        );

    let audit = std::fs::read_to_string(status_log).unwrap();
    let lines: Vec<&str> = audit.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(" | svcA | not found: "));
    assert!(lines[1].contains(" | svcB | not found: "));
    assert!(lines[2].contains(" | svcC | not found: "));
}

#[cfg(not(windows))]
#[test]
fn service_verbs_require_windows() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_config(dir.path(), &["dhcp"]);

    Command::cargo_bin("winsvc-observer")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "install"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires the Windows service control manager"));
}
