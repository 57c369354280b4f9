#![cfg(unix)]
#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const REPORT_LINE_TAIL: &str = ", build time 12.50 ms, search time 20.00 ms per 100000 ops";
const DASHES: &str = "------------------------------------";
const STARS: &str = "*************************************************************************";

/// Writes a stand-in for db_bench that logs its arguments and prints a
/// result line, plus a config that runs it through `sh`.
fn setup(name: &str, body: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join("calls.log");
    let script = dir.path().join(format!("{name}.sh"));
    fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\" >> '{}'\n{body}\n", log.display()),
    )
    .expect("write script");

    let config = dir.path().join("bench.toml");
    fs::write(
        &config,
        format!(
            r#"
[bench]
binary = "{}"
elevate = true
elevate_with = "sh"
repetitions = 1
"#,
            script.display()
        ),
    )
    .expect("write config");
    (dir, config, log)
}

fn fake_db_bench() -> &'static str {
    "echo 'LevelDB:    version 1.23'\n\
     echo 'readhot      :       0.200 micros/op;'\n\
     echo 'gitable stats 3000000 12.5 600.0'"
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout")
}

fn call_count(log: &Path) -> usize {
    fs::read_to_string(log)
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

#[test]
fn run_prints_averaged_report_for_every_configuration() {
    let (_dir, config, log) = setup("ok", fake_db_bench());
    let stdout = stdout_of(
        cargo_bin_cmd!("gitbench")
            .arg("--config")
            .arg(&config)
            .args(["--quiet", "run", "--repetitions", "2"])
            .assert()
            .success(),
    );

    let lines: Vec<&str> = stdout.lines().collect();
    let report: Vec<&&str> = lines
        .iter()
        .filter(|l| l.ends_with(REPORT_LINE_TAIL))
        .collect();
    assert_eq!(report.len(), 24, "{stdout}");
    assert_eq!(lines.iter().filter(|l| **l == DASHES).count(), 6);
    assert_eq!(lines.iter().filter(|l| **l == STARS).count(), 3);
    assert!(lines[0].starts_with("10G readrandom no_gitable, "));
    assert!(lines[30].starts_with("100G readhot git_w_block_filter, "));

    assert_eq!(call_count(&log), 48);
    let calls = fs::read_to_string(&log).unwrap();
    let first = calls.lines().next().unwrap();
    assert_eq!(
        first,
        "--benchmarks=stats,readrandom --num=90400000 --reads=3000000 \
         --db=/data/gitable/test_data_10G --use_existing_db=1 --use_gitable=0 \
         --bloom_bits=-1 --use_file_gran_filter=1"
    );
}

#[test]
fn failing_benchmark_aborts_without_report() {
    let (_dir, config, log) = setup("fail", "echo 'open failed: /data' >&2\nexit 3");
    let assert = cargo_bin_cmd!("gitbench")
        .arg("--config")
        .arg(&config)
        .args(["--quiet", "run"])
        .assert()
        .failure();
    let output = assert.get_output();
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "{stderr}");
    assert!(stderr.contains("open failed: /data"), "{stderr}");
    assert_eq!(call_count(&log), 1);
}

#[test]
fn unparsable_output_is_fatal() {
    let (_dir, config, _log) = setup("garbage", "echo 'gitable stats many slow'");
    let assert = cargo_bin_cmd!("gitbench")
        .arg("--config")
        .arg(&config)
        .args(["--quiet", "run"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("expected at least 5"), "{stderr}");
}

#[test]
fn zero_operation_count_is_fatal() {
    let (_dir, config, log) = setup("idle", "echo 'gitable stats 0 12.5 600.0'");
    let assert = cargo_bin_cmd!("gitbench")
        .arg("--config")
        .arg(&config)
        .args(["--quiet", "run"])
        .assert()
        .failure();
    assert!(assert.get_output().stdout.is_empty());
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("expected a positive count"), "{stderr}");
    assert_eq!(call_count(&log), 1);
}

#[test]
fn json_format_and_exports() {
    let (dir, config, _log) = setup("json", fake_db_bench());
    let json_out = dir.path().join("results.json");
    let csv_out = dir.path().join("results.csv");
    let stdout = stdout_of(
        cargo_bin_cmd!("gitbench")
            .arg("--config")
            .arg(&config)
            .args(["--quiet", "--format", "json", "run"])
            .arg("--json-out")
            .arg(&json_out)
            .arg("--csv-out")
            .arg(&csv_out)
            .assert()
            .success(),
    );

    let json: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["repetitions"], 1);
    assert_eq!(json["reads"], 3_000_000);
    let results = json["results"].as_array().expect("results array");
    assert_eq!(results.len(), 24);
    assert_eq!(results[0]["database"], "10G");
    assert_eq!(results[0]["variant"], "no_gitable");
    assert_eq!(results[0]["search_ms_per_100k_ops"], 20.0);

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&json_out).unwrap()).expect("saved json");
    assert_eq!(saved, json);

    let csv = fs::read_to_string(&csv_out).unwrap();
    assert_eq!(csv.lines().count(), 25);
    assert!(csv.starts_with("database,read,variant,"));
}

#[test]
fn zero_repetitions_are_rejected() {
    let (_dir, config, log) = setup("zero", fake_db_bench());
    let assert = cargo_bin_cmd!("gitbench")
        .arg("--config")
        .arg(&config)
        .args(["run", "--repetitions", "0"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("bench.repetitions"), "{stderr}");
    assert_eq!(call_count(&log), 0);
}

#[test]
fn matrix_lists_default_commands() {
    let dir = TempDir::new().expect("tempdir");
    let stdout = stdout_of(
        cargo_bin_cmd!("gitbench")
            .arg("--config")
            .arg(dir.path().join("absent.toml"))
            .arg("matrix")
            .assert()
            .success(),
    );
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 24);
    assert_eq!(
        lines[3],
        "10G readrandom git_w_block_filter: sudo ./db_bench --benchmarks=stats,readrandom \
         --num=90400000 --reads=3000000 --db=/data/gitable/test_data_10G --use_existing_db=1 \
         --use_gitable=1 --bloom_bits=10 --use_file_gran_filter=0"
    );
    assert!(lines[23].starts_with("100G readhot git_w_block_filter: sudo "));
}

#[test]
fn matrix_json_exposes_argument_vectors() {
    let (_dir, config, _log) = setup("plan", fake_db_bench());
    let stdout = stdout_of(
        cargo_bin_cmd!("gitbench")
            .arg("--config")
            .arg(&config)
            .args(["--format", "json", "matrix"])
            .assert()
            .success(),
    );
    let json: Value = serde_json::from_str(&stdout).expect("valid json");
    let planned = json.as_array().expect("array");
    assert_eq!(planned.len(), 24);
    assert_eq!(planned[0]["program"], "sh");
    assert_eq!(planned[0]["args"].as_array().unwrap().len(), 9);
    assert_eq!(planned[5]["read"], "readhot");
}

#[test]
fn config_init_then_show() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("conf").join("bench.toml");

    cargo_bin_cmd!("gitbench")
        .arg("--config")
        .arg(&path)
        .args(["--quiet", "config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    cargo_bin_cmd!("gitbench")
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure();

    let stdout = stdout_of(
        cargo_bin_cmd!("gitbench")
            .arg("--config")
            .arg(&path)
            .args(["--quiet", "config", "show"])
            .assert()
            .success(),
    );
    assert!(stdout.contains("repetitions = 3"), "{stdout}");
    assert!(stdout.contains("[[databases]]"), "{stdout}");
    assert!(stdout.contains("test_data_100G"), "{stdout}");
}
