mod common;

use assert_cmd::prelude::*;
use common::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn scan_json_reports_periods_and_selection() {
    if !has_git() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    let repo = work.join("proj");
    init_git_repo(&repo, ME);
    git(&repo, &["remote", "add", "origin", "https://github.com/me/proj.git"]);
    write_file(&repo, "src/lib.rs", &lines(12));
    commit_all(&repo, "2025-09-15T10:00:00+00:00", "lib");
    write_file(&repo, "src/lib.rs", &lines(20));
    commit_all(&repo, "2025-09-22T10:00:00+00:00", "more");

    let config = dir.path().join("config.json");
    fs::write(&config, format!(r#"{{ "me_emails": ["{ME}"] }}"#)).unwrap();

    let mut cmd = Command::cargo_bin("gtally").unwrap();
    cmd.args(["--root"])
        .arg(&work)
        .arg("--config")
        .arg(&config)
        .args(["scan", "--period", "2025", "--json"]);
    let out = cmd.output().unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["schema_version"], 1);
    assert_eq!(v["repos"].as_array().unwrap().len(), 1);
    assert_eq!(v["repos"][0]["canonical_remote"], "github.com/me/proj");
    assert_eq!(v["periods"][0]["period"]["label"], "2025");
    assert_eq!(v["periods"][0]["totals"]["me"]["commits"], 2);
    assert_eq!(v["periods"][0]["totals"]["me"]["changed"], 20);
    let weeks = v["periods"][0]["weeks"].as_array().unwrap();
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0]["week_start"], "2025-09-15T00:00:00Z");
    assert_eq!(weeks[0]["repo_activity_top1_share_changed"], 1.0);
    assert!(v["failures"].as_array().unwrap().is_empty());
}

#[test]
fn scan_ndjson_prints_one_row_per_week() {
    if !has_git() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = tempdir().unwrap();
    let repo = dir.path().join("proj");
    init_git_repo(&repo, ME);
    write_file(&repo, "a.py", &lines(1));
    commit_all(&repo, "2024-01-02T10:00:00+00:00", "one");
    write_file(&repo, "b.py", &lines(1));
    commit_all(&repo, "2024-03-02T10:00:00+00:00", "two");

    let config = dir.path().join("missing.json");
    let out = Command::cargo_bin("gtally")
        .unwrap()
        .arg("--root")
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["scan", "--period", "2024H1", "--ndjson"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["period"], "2024H1");
        assert!(row.get("week_start").is_some());
    }
}

#[test]
fn repos_json_lists_selection_rows() {
    if !has_git() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = tempdir().unwrap();
    for name in ["one", "two"] {
        let repo = dir.path().join(name);
        init_git_repo(&repo, ME);
        git(&repo, &["remote", "add", "origin", "git@example.com:team/shared.git"]);
        write_file(&repo, "f.txt", &lines(1));
        commit_all(&repo, "2025-01-06T10:00:00+00:00", "init");
    }

    let out = Command::cargo_bin("gtally")
        .unwrap()
        .arg("--root")
        .arg(dir.path())
        .arg("--config")
        .arg(dir.path().join("none.json"))
        .args(["repos", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["candidates"], 2);
    let rows = v["selection"]["rows"].as_array().unwrap();
    let statuses: Vec<&str> = rows.iter().map(|r| r["status"].as_str().unwrap()).collect();
    assert!(statuses.contains(&"included"));
    assert!(statuses.contains(&"duplicate"));
    assert_eq!(v["selection"]["repos"].as_array().unwrap().len(), 1);
}

#[test]
fn invalid_config_fails_before_scanning() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{ "me_emails": ["x@y"], "bootstrap_addition_ratio": 1.5 }"#).unwrap();

    let out = Command::cargo_bin("gtally")
        .unwrap()
        .arg("--root")
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["scan", "--json"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Invalid configuration"), "{stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn unknown_period_is_rejected() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("gtally")
        .unwrap()
        .arg("--root")
        .arg(dir.path())
        .args(["scan", "--period", "2025Q3"])
        .assert()
        .failure();
}
