#![cfg(unix)]
#![allow(missing_docs)]

use std::thread;
use std::time::{Duration, Instant};

use gitable_bench::{
    driver::{Driver, DriverEvent, DriverOptions},
    executor::{BenchExecutor, CancelToken, ExecLimits, ProcessExecutor},
    invocation::{BenchParams, Invocation},
    matrix::{DatabaseTarget, ExperimentMatrix, GitVariant, ReadPattern},
    output::ResultLocator,
    BenchError,
};
use tempfile::TempDir;

fn shell(script: &str) -> Invocation {
    Invocation {
        program: "sh".into(),
        args: vec!["-c".into(), script.into()],
    }
}

fn executor() -> ProcessExecutor {
    ProcessExecutor::new().with_poll_interval(Duration::from_millis(10))
}

#[test]
fn captures_stdout_of_successful_run() {
    let out = executor()
        .execute(
            &shell("echo header; echo 'gitable stats 10 1.5 2.5'"),
            &ExecLimits::default(),
        )
        .unwrap();
    assert_eq!(out, "header\ngitable stats 10 1.5 2.5\n");
}

#[test]
fn non_zero_exit_carries_stderr_tail() {
    let err = executor()
        .execute(
            &shell("echo one >&2; echo two >&2; exit 7"),
            &ExecLimits::default(),
        )
        .unwrap_err();
    match err {
        BenchError::ExitStatus { stderr, .. } => assert_eq!(stderr, "one\ntwo"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn timeout_kills_the_child() {
    let limits = ExecLimits {
        timeout: Some(Duration::from_millis(200)),
        cancel: None,
    };
    let started = Instant::now();
    let err = executor()
        .execute(&shell("exec sleep 30"), &limits)
        .unwrap_err();
    assert!(matches!(err, BenchError::Timeout { .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn pre_cancelled_token_stops_the_run() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let limits = ExecLimits {
        timeout: None,
        cancel: Some(cancel),
    };
    let err = executor()
        .execute(&shell("exec sleep 30"), &limits)
        .unwrap_err();
    assert!(matches!(err, BenchError::Cancelled { .. }), "{err}");
}

#[test]
fn timeout_reaches_processes_started_by_the_wrapper() {
    let dir = TempDir::new().expect("tempdir");
    let marker = dir.path().join("finished");
    let script = dir.path().join("db_bench.sh");
    std::fs::write(
        &script,
        format!("sleep 2\necho done > '{}'\n", marker.display()),
    )
    .unwrap();

    // The outer shell stays alive as a wrapper, like sudo does.
    let invocation = shell(&format!("sh '{}'; true", script.display()));
    let limits = ExecLimits {
        timeout: Some(Duration::from_millis(300)),
        cancel: None,
    };
    let err = executor().execute(&invocation, &limits).unwrap_err();
    assert!(matches!(err, BenchError::Timeout { .. }), "{err}");

    thread::sleep(Duration::from_secs(3));
    assert!(!marker.exists(), "benchmark kept running after the timeout");
}

#[test]
fn cancelling_mid_run_stops_the_process() {
    let cancel = CancelToken::new();
    let limits = ExecLimits {
        timeout: None,
        cancel: Some(cancel.clone()),
    };
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        cancel.cancel();
    });

    let started = Instant::now();
    let err = executor()
        .execute(&shell("sleep 30; true"), &limits)
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, BenchError::Cancelled { .. }), "{err}");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "{elapsed:?}");
}

#[test]
fn driver_runs_a_script_end_to_end() {
    let dir = TempDir::new().expect("tempdir");
    let script = dir.path().join("db_bench.sh");
    // Reports more work on the block-filter variant so averages differ per config.
    std::fs::write(
        &script,
        "#!/bin/sh\n\
         echo 'gitable stats 1000 5 1' \n\
         case \"$*\" in\n\
           *--use_file_gran_filter=0*) echo 'gitable stats 2000 8 4' ;;\n\
         esac\n\
         echo 'trailing noise line'\n",
    )
    .unwrap();

    let matrix = ExperimentMatrix {
        databases: vec![DatabaseTarget::new("tiny", dir.path(), 1_000)],
        read_patterns: vec![ReadPattern::ReadHot],
        variants: vec![GitVariant::Disabled, GitVariant::BlockBloom],
    };
    let options = DriverOptions {
        params: BenchParams {
            binary: script,
            elevate_with: Some("sh".into()),
            reads: 1_000,
            ..BenchParams::default()
        },
        repetitions: 2,
        limits: ExecLimits {
            timeout: Some(Duration::from_secs(30)),
            cancel: None,
        },
        locator: ResultLocator::Tagged("gitable".into()),
    };
    let driver = Driver::new(matrix, options, executor());

    let mut finished_runs = 0;
    let table = driver
        .run(&mut |event| {
            if let DriverEvent::RunFinished { .. } = event {
                finished_runs += 1;
            }
        })
        .unwrap();

    assert_eq!(finished_runs, 4);
    let disabled = table.get("tiny", ReadPattern::ReadHot, GitVariant::Disabled).unwrap();
    assert_eq!(disabled.build_ms, 5.0);
    assert_eq!(disabled.search_ms_per_100k_ops(), 100.0);
    let block = table.get("tiny", ReadPattern::ReadHot, GitVariant::BlockBloom).unwrap();
    assert_eq!(block.op_count, 2000.0);
    assert_eq!(block.search_ms_per_100k_ops(), 200.0);
}
