// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests
//!
//! These run the `ktest-dup` binary (identical to ktest) in a scratch repository whose
//! collaborators are all the `fake-tool` helper. See `test-helpers/fake-tool.rs` for the
//! directives test files use to control it.

use pretty_assertions::assert_eq;

mod fixtures;

use fixtures::TestWorkspace;

const USAGE_ERROR: i32 = 96;
const SETUP_ERROR: i32 = 97;

fn assert_runtime_line(line: &str, identifier: &str) {
    let (elapsed, id) = line
        .split_once(' ')
        .unwrap_or_else(|| panic!("runtime line `{line}` has an elapsed time"));
    assert_eq!(id, identifier);
    let (secs, millis) = elapsed
        .split_once('.')
        .unwrap_or_else(|| panic!("elapsed `{elapsed}` has a fractional part"));
    assert!(secs.parse::<u64>().is_ok(), "elapsed `{elapsed}` is seconds");
    assert_eq!(millis.len(), 3, "elapsed `{elapsed}` has millisecond precision");
}

#[test]
fn test_profile_records_pass_and_fail() {
    let ws = TestWorkspace::new();
    ws.write("tests/VMTests/pass.json", "stdout=ok\n");
    ws.write(
        "tests/VMTests/fail.json",
        "stdout=bad\noutput=final state\nstderr=boom\nexit=2\n",
    );

    let output = ws
        .cli()
        .args(["test-profile", "tests/VMTests/pass.json"])
        .output();
    assert_eq!(output.stdout_as_str(), "", "passing runs echo nothing");
    assert_eq!(ws.read("logs/tests/VMTests/pass.json.out"), "ok\n");

    let output = ws
        .cli()
        .args(["test-profile", "tests/VMTests/fail.json"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(2), "{output}");
    assert_eq!(output.stdout_as_str(), "bad\nfinal state\n");
    assert!(output.stderr_as_str().contains("boom\n"), "{output}");
    assert_eq!(ws.read("logs/tests/VMTests/fail.json.err"), "boom\n");

    assert_eq!(ws.read("logs/passing.lastrun"), "tests/VMTests/pass.json\n");
    assert_eq!(ws.read("logs/failing.lastrun"), "tests/VMTests/fail.json\n");
    let runtime = ws.read("logs/runtime");
    let lines: Vec<_> = runtime.lines().collect();
    assert_eq!(lines.len(), 2, "runtime: {runtime}");
    assert_runtime_line(lines[0], "tests/VMTests/pass.json");
    assert_runtime_line(lines[1], "tests/VMTests/fail.json");
    assert!(ws.temp_dir_is_empty());
}

#[test]
fn repeated_runs_append() {
    let ws = TestWorkspace::new();
    ws.write("tests/VMTests/pass.json", "");
    for _ in 0..3 {
        ws.cli()
            .args(["test-profile", "tests/VMTests/pass.json"])
            .output();
    }
    assert_eq!(
        ws.read("logs/passing.lastrun"),
        "tests/VMTests/pass.json\n".repeat(3)
    );
    assert_eq!(ws.read("logs/runtime").lines().count(), 3);
    assert!(!ws.exists("logs/failing.lastrun"));
}

#[test]
fn interactive_mismatch_prints_diff() {
    let ws = TestWorkspace::new();
    ws.write("tests/interactive/add.evm", "stdout=42\nexit=1\n");
    ws.write("tests/interactive/add.evm.out", "41\n");

    let output = ws
        .cli()
        .args([
            "test",
            "tests/interactive/add.evm",
            "tests/interactive/add.evm.out",
        ])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(1), "{output}");
    assert_eq!(
        output.stdout_as_str(),
        "--- tests/interactive/add.evm.out\n+++ actual output\n@@ -1,1 +1,1 @@\n-41\n+42\n"
    );
    assert!(ws.temp_dir_is_empty());
    assert!(!ws.exists("logs"), "`test` doesn't record anything");
}

#[test]
fn interactive_without_expected_file_is_usage_error() {
    let ws = TestWorkspace::new();
    ws.write("tests/interactive/add.evm", "");

    let output = ws
        .cli()
        .args(["test-profile", "tests/interactive/add.evm"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(USAGE_ERROR), "{output}");
    assert!(
        output.stderr_as_str().contains("expected output file"),
        "{output}"
    );
    assert!(!ws.exists("logs"), "usage errors leave no trace");
}

#[test]
fn missing_test_file_is_usage_error() {
    let ws = TestWorkspace::new();
    let output = ws
        .cli()
        .args(["test-profile", "tests/VMTests/missing.json"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(USAGE_ERROR), "{output}");
    assert!(!ws.exists("logs"), "usage errors leave no trace");
}

#[test]
fn proof_debug_flag_by_subcommand() {
    let ws = TestWorkspace::new();
    ws.write("tests/proofs/sum-spec.k", "args\nexit=3\n");

    let output = ws
        .cli()
        .args(["prove", "tests/proofs/sum-spec.k", "--smt-timeout", "100"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(3), "{output}");
    assert!(
        output.stderr_as_str().contains(
            "[fake-prove] --directory .build/defn/llvm tests/proofs/sum-spec.k \
             --def-module VERIFICATION --smt-timeout 100\n"
        ),
        "`prove` doesn't add the debug flag: {output}"
    );

    let output = ws
        .cli()
        .args(["test", "tests/proofs/sum-spec.k"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(3), "{output}");
    assert!(
        output
            .stderr_as_str()
            .contains("--def-module VERIFICATION --debug\n"),
        "`test` adds the debug flag: {output}"
    );
}

#[test]
fn user_facing_runner_commands() {
    let ws = TestWorkspace::new();
    ws.write("prog.evm", "args\n");

    let output = ws.cli().args(["run-java", "prog.evm"]).output();
    assert!(
        output.stderr_as_str().contains(
            "[fake-run] --directory .build/defn/java -cSCHEDULE=`ISTANBUL_EVM`(.KList) \
             -cMODE=`NORMAL`(.KList) prog.evm\n"
        ),
        "{output}"
    );

    let output = ws
        .cli()
        .args(["--schedule", "BERLIN", "debug", "prog.evm", "--depth", "3"])
        .output();
    assert!(
        output.stderr_as_str().contains(
            "[fake-run] --directory .build/defn/llvm -cSCHEDULE=LblBERLIN'Unds'EVM{}() \
             -cMODE=LblNORMAL{}() prog.evm --debugger --depth 3\n"
        ),
        "{output}"
    );

    let output = ws.cli().args(["search", "prog.evm"]).output();
    assert!(
        output.stderr_as_str().contains("prog.evm --search\n"),
        "{output}"
    );
}

#[test]
fn sort_logs_normalizes() {
    let ws = TestWorkspace::new();
    ws.write("logs/passing.lastrun", "b\na\nb\n\n");
    ws.write("logs/failing.lastrun", "c\nc\n");
    ws.write("logs/runtime", "2.000 b\n1.000 a\n3.000 b\n");

    ws.cli().arg("sort-logs").output();
    assert_eq!(ws.read("logs/passing.lastrun"), "a\nb\n");
    assert_eq!(ws.read("logs/failing.lastrun"), "c\n");
    assert_eq!(ws.read("logs/runtime"), "1.000 a\n2.000 b\n");

    // A second pass changes nothing.
    ws.cli().arg("sort-logs").output();
    assert_eq!(ws.read("logs/passing.lastrun"), "a\nb\n");
    assert_eq!(ws.read("logs/runtime"), "1.000 a\n2.000 b\n");
}

#[test]
fn sort_logs_without_logs() {
    let ws = TestWorkspace::new();
    ws.cli().arg("sort-logs").output();
    assert!(!ws.exists("logs/passing.lastrun"));
    assert!(!ws.exists("logs/failing.lastrun"));
    assert!(!ws.exists("logs/runtime"));
}

#[test]
fn get_failing_samples_distinct_entries() {
    let ws = TestWorkspace::new();

    let output = ws.cli().arg("get-failing").output();
    assert_eq!(output.stdout_as_str(), "", "no failing log means no sample");

    ws.write("logs/failing.lastrun", "x\ny\nx\n");
    let output = ws.cli().args(["get-failing", "5"]).output();
    let mut lines: Vec<_> = output.stdout_as_str().lines().map(str::to_owned).collect();
    lines.sort();
    assert_eq!(lines, vec!["x", "y"]);

    let output = ws.cli().arg("get-failing").output();
    let stdout = output.stdout_as_str();
    assert!(stdout == "x\n" || stdout == "y\n", "{output}");
}

#[test]
fn unknown_or_missing_subcommand_prints_usage() {
    let ws = TestWorkspace::new();

    for args in [vec!["frobnicate"], vec![]] {
        let output = ws.cli().args(args).output();
        assert_eq!(output.exit_code(), Some(0), "{output}");
        assert!(output.stdout_as_str().contains("Usage: ktest"), "{output}");
    }
}

#[test]
fn bad_argument_is_usage_error() {
    let ws = TestWorkspace::new();
    let output = ws
        .cli()
        .args(["get-failing", "lots"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(USAGE_ERROR), "{output}");
}

#[test]
fn invalid_config_is_setup_error() {
    let ws = TestWorkspace::new();
    ws.write_config("backend = \"ocaml\"");
    ws.write("prog.evm", "");

    let output = ws
        .cli()
        .args(["run", "prog.evm"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(SETUP_ERROR), "{output}");
    assert!(
        output.stderr_as_str().contains("failed to parse ktest config"),
        "{output}"
    );
}

#[cfg(unix)]
#[test]
fn sigterm_interrupts_without_recording() {
    use std::time::{Duration, Instant};

    let ws = TestWorkspace::new();
    ws.write("tests/interactive/slow.evm", "sleep=60\n");
    ws.write("tests/interactive/slow.evm.out", "");

    let child = ws
        .cli()
        .args([
            "test-profile",
            "tests/interactive/slow.evm",
            "tests/interactive/slow.evm.out",
        ])
        .spawn();

    // The temp file for the runner's output is created after the signal handler is installed.
    let deadline = Instant::now() + Duration::from_secs(30);
    while ws.temp_dir_is_empty() {
        assert!(Instant::now() < deadline, "ktest never started the runner");
        std::thread::sleep(Duration::from_millis(20));
    }

    // SAFETY: sending a signal to a child process we own.
    let ret = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(ret, 0, "sent SIGTERM");

    let output = child.wait_with_output().expect("ktest exited");
    assert_eq!(
        output.status.code(),
        Some(128 + libc::SIGTERM),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(ws.temp_dir_is_empty(), "temp files are cleaned up");
    assert!(!ws.exists("logs/passing.lastrun"));
    assert!(!ws.exists("logs/failing.lastrun"));
    assert!(!ws.exists("logs/runtime"));
}

#[cfg(unix)]
#[test]
fn signal_as_collaborator_exits_is_not_recorded() {
    let ws = TestWorkspace::new();
    ws.write(
        "tests/VMTests/signal.json",
        &format!("signal-parent={}\n", libc::SIGTERM),
    );

    let output = ws
        .cli()
        .args(["test-profile", "tests/VMTests/signal.json"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(128 + libc::SIGTERM), "{output}");
    assert!(ws.temp_dir_is_empty(), "temp files are cleaned up");
    assert!(!ws.exists("logs/passing.lastrun"));
    assert!(!ws.exists("logs/failing.lastrun"));
    assert!(!ws.exists("logs/runtime"));
}
