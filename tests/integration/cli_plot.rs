#![allow(missing_docs)]

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use gitable_bench::{
    aggregate::{AggregatedResult, ConfigResult, ResultTable},
    matrix::ExperimentMatrix,
    report::ResultsFile,
};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn plot_writes_default_named_svg() {
    let dir = TempDir::new().expect("tempdir");
    cargo_bin_cmd!("gitbench")
        .current_dir(dir.path())
        .args(["--quiet", "plot", "--read", "readhot", "--time", "search"])
        .assert()
        .success();

    let svg = fs::read_to_string(dir.path().join("git_search_readhot.svg")).expect("svg written");
    assert!(svg.starts_with("<svg") || svg.contains("<svg"));
    assert!(svg.contains("Global Index Table(git) search time in readhot"));
    assert!(svg.contains("no_git"));
}

#[test]
fn plot_text_lists_series_values() {
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("build.svg");
    let assert = cargo_bin_cmd!("gitbench")
        .args(["--quiet", "plot", "--read", "readrandom", "--time", "build", "--output"])
        .arg(&output)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], "Global Index Table(git) build time in readrandom");
    assert!(lines[1].starts_with("variant"));
    assert!(lines[1].contains("100G"));
    assert!(lines[3].starts_with("git_wo_bf"));
    assert!(lines[3].contains("112077.33"));
    assert!(output.exists());
}

#[test]
fn plot_json_describes_the_chart() {
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("chart.svg");
    let assert = cargo_bin_cmd!("gitbench")
        .args(["--quiet", "--format", "json", "plot", "--output"])
        .arg(&output)
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");

    assert_eq!(json["title"], "Global Index Table(git) search time in readhot");
    assert_eq!(json["x_label"], "Database");
    assert_eq!(json["groups"], serde_json::json!(["10G", "50G", "100G"]));
    let series = json["series"].as_array().expect("series");
    assert_eq!(series.len(), 4);
    assert_eq!(series[0]["label"], "no_git");
    assert_eq!(
        series[0]["values"],
        serde_json::json!([752.72, 3617.10, 4558.41])
    );
    assert_eq!(series[3]["variant"], "git_w_block_filter");
}

#[test]
fn plot_reads_results_file() {
    let dir = TempDir::new().expect("tempdir");
    let matrix = ExperimentMatrix::standard();
    let table: ResultTable = matrix
        .configurations()
        .iter()
        .map(|cfg| ConfigResult {
            database: cfg.database.label.clone(),
            read: cfg.read,
            variant: cfg.variant,
            result: AggregatedResult {
                op_count: 3_000_000.0,
                build_ms: 42.0,
                search_ms: 600.0,
                runs: 1,
            },
        })
        .collect();
    let results = dir.path().join("results.json");
    ResultsFile::new(&table, 1, 3_000_000).save(&results).unwrap();

    let assert = cargo_bin_cmd!("gitbench")
        .args(["--quiet", "--format", "json", "plot", "--time", "build", "--results"])
        .arg(&results)
        .arg("--output")
        .arg(dir.path().join("fresh.svg"))
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    assert_eq!(json["series"][1]["values"], serde_json::json!([42.0, 42.0, 42.0]));
    assert!(dir.path().join("fresh.svg").exists());
}

#[test]
fn plot_rejects_unknown_read_pattern() {
    cargo_bin_cmd!("gitbench")
        .args(["plot", "--read", "readseq"])
        .assert()
        .failure();
}

#[test]
fn plot_reports_broken_results_file() {
    let dir = TempDir::new().expect("tempdir");
    let results = dir.path().join("broken.json");
    fs::write(&results, "{ not json").unwrap();
    let assert = cargo_bin_cmd!("gitbench")
        .arg("plot")
        .arg("--results")
        .arg(&results)
        .arg("--output")
        .arg(dir.path().join("never.svg"))
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("results file"), "{stderr}");
    assert!(!dir.path().join("never.svg").exists());
}
