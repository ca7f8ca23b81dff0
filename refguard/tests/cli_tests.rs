use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A throwaway copy of the fixture project, so runs recorded by one test never leak into another.
struct RefGuardTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl RefGuardTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/project");

        let dest = tmp.path().join("project");
        Self::copy_dir(&fixture, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.content_only = true;

        std::fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn refguard(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("refguard"));
        cmd.current_dir(&self.root);
        cmd
    }

    fn json(&self, args: &[&str]) -> Result<(bool, Value)> {
        let output = self.refguard().args(args).args(["--format", "json"]).output()?;
        let stdout = String::from_utf8(output.stdout)?;
        let value = serde_json::from_str(&stdout)
            .with_context(|| format!("stdout is not JSON: {}", stdout))?;
        Ok((output.status.success(), value))
    }
}

#[test]
fn test_resolve_merges_layers() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    let output = env
        .refguard()
        .args(["resolve", "-p", "stock", "-e", "HKEX", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let content = stdout.trim_end();
    insta::assert_snapshot!("resolve_stock_hkex", content);
    Ok(())
}

#[test]
fn test_resolve_table_output() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    env.refguard()
        .args(["resolve", "-p", "stock", "-e", "HKEX"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 rules for stock on HKEX"))
        .stdout(predicate::str::contains("products/stock/HKEX.yaml"));
    Ok(())
}

#[test]
fn test_validate_clean_dataset() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    let (ok, result) = env.json(&["validate", "-p", "stock", "-e", "HKEX"])?;
    assert!(ok);
    assert_eq!(result["exchange"], "HKEX");
    assert_eq!(result["success"], true);
    assert_eq!(result["total_expectations"], 6);
    assert_eq!(result["failed_expectations"], 0);

    let results = result["results"]["expectation_results"]
        .as_array()
        .context("expectation_results should be a list")?;
    assert_eq!(results.len(), 6);
    assert_eq!(results[0]["ElementCount"], 3);
    assert_eq!(result["rules_applied"].as_array().map(Vec::len), Some(6));

    // The run is recorded
    assert!(env.root.join("refguard.duckdb").exists());
    Ok(())
}

#[test]
fn test_validate_custom_rules_fail() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    let (ok, result) = env.json(&["validate", "-p", "stock", "-e", "HKEX", "--custom", "strict"])?;
    assert!(!ok);
    assert_eq!(result["success"], false);
    assert_eq!(result["total_expectations"], 7);
    assert_eq!(result["failed_expectations"], 1);

    let failed = result["results"]["expectation_results"]
        .as_array()
        .context("expectation_results should be a list")?
        .iter()
        .find(|r| r["Success"] == false)
        .context("one result should fail")?;
    assert_eq!(failed["ColumnName"], "Isin");
    assert_eq!(failed["UnexpectedCount"], 1);
    assert_eq!(
        failed["ResultDetails"]["partial_unexpected_counts"][0]["value"],
        "KYG875721634"
    );
    Ok(())
}

#[test]
fn test_validate_writes_output_file() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    env.refguard()
        .args(["validate", "-p", "stock", "-e", "XTKS", "-o", "reports/xtks.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL"))
        .stderr(predicate::str::contains("1 of 5 expectations failed"));

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(env.root.join("reports/xtks.json"))?)?;
    assert_eq!(saved["exchange"], "XTKS");
    assert_eq!(saved["success"], false);
    Ok(())
}

#[test]
fn test_validate_missing_dataset() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    env.refguard()
        .args(["validate", "-p", "bond", "-e", "HKEX"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bond/HKEX"));
    Ok(())
}

#[test]
fn test_record_lookup_across_targets() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    let (ok, result) = env.json(&["record", "2002"])?;
    assert!(!ok);
    assert_eq!(result["exchange"], "XTKS");
    assert_eq!(result["failed_expectations"], 1);

    let (ok, result) = env.json(&["record", "1001", "-p", "stock", "-e", "HKEX"])?;
    assert!(ok);
    let results = result["results"]["expectation_results"]
        .as_array()
        .context("expectation_results should be a list")?;
    assert!(results.iter().all(|r| r["ElementCount"] == 1));
    Ok(())
}

#[test]
fn test_record_not_found() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    env.refguard()
        .args(["record", "9999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No record with MasterId = '9999'"));
    Ok(())
}

#[test]
fn test_batch_then_history_and_reports() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    let (ok, outcomes) = env.json(&["batch", "-w", "2"])?;
    assert!(!ok, "XTKS carries a EUR line");
    let outcomes = outcomes.as_array().context("batch output should be a list")?;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["target"]["exchange"], "HKEX");
    assert_eq!(outcomes[0]["run"]["success"], true);
    assert_eq!(outcomes[1]["target"]["exchange"], "XTKS");
    assert_eq!(outcomes[1]["run"]["success"], false);

    let (ok, runs) = env.json(&["runs"])?;
    assert!(ok);
    assert_eq!(runs.as_array().map(Vec::len), Some(2));

    let run_id = outcomes[0]["run"]["run_id"]
        .as_str()
        .context("run_id should be a string")?;
    let (ok, run) = env.json(&["runs", "--run-id", run_id])?;
    assert!(ok);
    assert_eq!(run["exchange"], "HKEX");
    assert_eq!(run["expectation_results"].as_array().map(Vec::len), Some(6));

    let (ok, heatmap) = env.json(&["report", "heatmap"])?;
    assert!(ok);
    let keys: Vec<&str> = heatmap["rows"]
        .as_array()
        .context("rows should be a list")?
        .iter()
        .filter_map(|r| r["key"].as_str())
        .collect();
    assert_eq!(keys, vec!["APAC/HKEX", "APAC/XTKS"]);
    assert_eq!(heatmap["overall"]["total"], 11);
    assert_eq!(heatmap["overall"]["successful"], 10);

    let (ok, trend) = env.json(&["report", "trend", "--exchange", "XTKS", "--days", "1"])?;
    assert!(ok);
    assert_eq!(trend["rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(trend["overall"]["runs"], 1);
    Ok(())
}

#[test]
fn test_check_rules() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    env.refguard()
        .arg("check-rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("5 rule files OK"));

    std::fs::write(
        env.root.join("rules/exchanges/XTKS.yaml"),
        "rules:\n  - column: Currency\n",
    )?;
    env.refguard()
        .arg("check-rules")
        .assert()
        .failure()
        .stdout(predicate::str::contains("exchanges/XTKS.yaml"));

    // Validation of the same scope fails fast on the broken layer
    env.refguard()
        .args(["validate", "-p", "stock", "-e", "XTKS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing 'type'"));
    Ok(())
}

#[test]
fn test_unsafe_names_are_rejected() -> Result<()> {
    let env = RefGuardTestEnv::new()?;

    env.refguard()
        .args(["resolve", "-p", "stock", "-e", "../HKEX"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsafe exchange name"));
    Ok(())
}

#[test]
fn test_missing_project_config() -> Result<()> {
    let tmp = tempfile::tempdir()?;

    Command::new(assert_cmd::cargo::cargo_bin!("refguard"))
        .args(["--project-dir", &tmp.path().to_string_lossy(), "check-rules"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load project configuration"));
    Ok(())
}
