// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a test under profiling: capture its output, time it and record the outcome.

use crate::{
    capture::{CaptureStreams, read_output},
    errors::{CaptureError, ProfileError},
    log_store::{CapturePaths, LogStore, RuntimeRecord},
    stopwatch::stopwatch,
    strategy::{StrategyOutcome, StrategyRequest, StrategyRunner},
};
use std::{io::Write, time::Duration};
use tracing::debug;

/// Wraps a [`StrategyRunner`], recording every completed run in a [`LogStore`].
#[derive(Clone, Debug)]
pub struct ProfilingRunner<'cfg> {
    runner: StrategyRunner<'cfg>,
    store: LogStore,
}

/// The result of a profiled run.
#[derive(Clone, Debug)]
pub struct ProfileOutcome {
    /// How the strategy ended.
    pub outcome: StrategyOutcome,

    /// Wall-clock time spent in the strategy.
    pub elapsed: Duration,

    /// Where the test's output was captured.
    pub captures: CapturePaths,
}

impl<'cfg> ProfilingRunner<'cfg> {
    /// Creates a new profiling runner.
    pub fn new(runner: StrategyRunner<'cfg>, store: LogStore) -> Self {
        Self { runner, store }
    }

    /// Returns the log store outcomes are recorded in.
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Runs `request` for the test `identifier`.
    ///
    /// On failure the captured stdout and stderr are copied to `echo_stdout` and `echo_stderr`.
    /// Interrupted runs are not recorded.
    pub fn run(
        &self,
        identifier: &str,
        request: &StrategyRequest,
        echo_stdout: &mut dyn Write,
        echo_stderr: &mut dyn Write,
    ) -> Result<ProfileOutcome, ProfileError> {
        // Usage errors must not leave capture files or log entries behind.
        request.validate()?;

        let captures = self.store.capture_paths(identifier);
        let mut streams = CaptureStreams::to_files(&captures.stdout, &captures.stderr)?;

        let start = stopwatch();
        let outcome = self.runner.run(request, &mut streams)?;
        let end = start.snapshot();
        drop(streams);

        debug!(
            "{identifier} ran from {} to {} ({:.3}s): {outcome:?}",
            end.start_time.to_rfc3339(),
            end.end_time().to_rfc3339(),
            end.duration.as_secs_f64(),
        );

        let result = ProfileOutcome {
            outcome,
            elapsed: end.duration,
            captures,
        };
        match outcome {
            StrategyOutcome::Interrupted(event) => {
                debug!("{identifier} interrupted by {event:?}, not recording");
                return Ok(result);
            }
            StrategyOutcome::Exited(0) => {
                self.store.append_passing(identifier)?;
            }
            StrategyOutcome::Exited(_) => {
                self.store.append_failing(identifier)?;
                echo(&result.captures.stdout, echo_stdout, "standard output")?;
                echo(&result.captures.stderr, echo_stderr, "standard error")?;
            }
        }
        self.store
            .append_runtime(&RuntimeRecord::new(end.duration, identifier))?;

        Ok(result)
    }
}

fn echo(
    capture: &camino::Utf8Path,
    writer: &mut dyn Write,
    stream: &str,
) -> Result<(), CaptureError> {
    let contents = read_output(capture)?;
    writer
        .write_all(&contents)
        .and_then(|()| writer.flush())
        .map_err(|error| CaptureError::Write {
            stream: stream.to_owned(),
            error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{HarnessConfig, test_helpers::config_from_toml},
        errors::UsageError,
        signal::SignalHandlerKind,
    };
    use camino::Utf8PathBuf;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn read(path: &camino::Utf8Path) -> String {
        std::fs::read_to_string(path).expect("file exists")
    }

    #[test]
    fn usage_error_leaves_no_trace() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let config = config_from_toml("");
        let store = LogStore::new(dir.path().join("logs"));
        let runner = ProfilingRunner::new(
            StrategyRunner::new(&config, SignalHandlerKind::Noop),
            store.clone(),
        );

        let request = StrategyRequest::Proof {
            spec: dir.path().join("missing-spec.k"),
            args: Vec::new(),
            debug: true,
        };
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let error = runner
            .run("missing-spec.k", &request, &mut out, &mut err)
            .expect_err("spec is missing");
        assert!(
            matches!(error, ProfileError::Usage(UsageError::MissingFile { .. })),
            "unexpected error: {error:?}"
        );
        assert!(!store.dir().exists(), "nothing written under the logs dir");
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use pretty_assertions::assert_eq;

        fn config(dir: &Utf8TempDir) -> HarnessConfig {
            // The prover's exit code and output come from the spec file itself.
            config_from_toml(&format!(
                "[harness]\nlogs-dir = \"{}\"\n\n[tools]\nprover = '''sh -c '. \"$2\"' '''\n",
                dir.path().join("logs"),
            ))
        }

        fn spec(dir: &Utf8TempDir, name: &str, script: &str) -> Utf8PathBuf {
            let path = dir.path().join(name);
            std::fs::write(&path, script).expect("wrote spec");
            path
        }

        #[test]
        fn passing_run_is_recorded() {
            let dir = Utf8TempDir::new().expect("temp dir created");
            let config = config(&dir);
            let store = LogStore::new(config.logs_dir());
            let runner = ProfilingRunner::new(
                StrategyRunner::new(&config, SignalHandlerKind::Noop),
                store.clone(),
            );

            let spec = spec(&dir, "ok-spec.k", "echo proved\n");
            let request = StrategyRequest::Proof {
                spec,
                args: Vec::new(),
                debug: false,
            };
            let (mut out, mut err) = (Vec::new(), Vec::new());
            let result = runner
                .run("tests/proofs/ok-spec.k", &request, &mut out, &mut err)
                .expect("run succeeded");

            assert!(result.outcome.is_success());
            assert_eq!(read(&store.passing_path()), "tests/proofs/ok-spec.k\n");
            assert!(!store.failing_path().exists());
            assert_eq!(read(&result.captures.stdout), "proved\n");
            assert_eq!(
                result.captures.stdout,
                store.dir().join("tests/proofs/ok-spec.k.out")
            );
            assert!(out.is_empty() && err.is_empty(), "nothing echoed on success");

            let runtime = read(&store.runtime_path());
            let record = RuntimeRecord::parse(runtime.trim_end()).expect("valid runtime record");
            assert_eq!(record.identifier, "tests/proofs/ok-spec.k");
            assert!(record.elapsed >= 0.0);
        }

        #[test]
        fn failing_run_is_recorded_and_echoed() {
            let dir = Utf8TempDir::new().expect("temp dir created");
            let config = config(&dir);
            let store = LogStore::new(config.logs_dir());
            let runner = ProfilingRunner::new(
                StrategyRunner::new(&config, SignalHandlerKind::Noop),
                store.clone(),
            );

            let spec = spec(&dir, "bad-spec.k", "echo partial\necho stuck >&2\nexit 2\n");
            let request = StrategyRequest::Proof {
                spec,
                args: Vec::new(),
                debug: false,
            };
            let (mut out, mut err) = (Vec::new(), Vec::new());
            let result = runner
                .run("bad-spec.k", &request, &mut out, &mut err)
                .expect("run succeeded");

            assert_eq!(result.outcome, StrategyOutcome::Exited(2));
            assert_eq!(read(&store.failing_path()), "bad-spec.k\n");
            assert!(!store.passing_path().exists());
            assert_eq!(String::from_utf8(out).expect("utf-8"), "partial\n");
            assert_eq!(String::from_utf8(err).expect("utf-8"), "stuck\n");
            assert_eq!(read(&store.runtime_path()).lines().count(), 1);
        }

        #[test]
        fn n_runs_m_passing() {
            let dir = Utf8TempDir::new().expect("temp dir created");
            let config = config(&dir);
            let store = LogStore::new(config.logs_dir());
            let runner = ProfilingRunner::new(
                StrategyRunner::new(&config, SignalHandlerKind::Noop),
                store.clone(),
            );
            let pass = spec(&dir, "pass-spec.k", "exit 0\n");
            let fail = spec(&dir, "fail-spec.k", "exit 1\n");

            let ids = ["t/a", "t/b", "t/c", "t/d", "t/e"];
            for (idx, id) in ids.iter().enumerate() {
                let spec = if idx % 2 == 0 { &pass } else { &fail };
                let request = StrategyRequest::Proof {
                    spec: spec.clone(),
                    args: Vec::new(),
                    debug: false,
                };
                runner
                    .run(id, &request, &mut std::io::sink(), &mut std::io::sink())
                    .expect("run succeeded");
            }

            assert_eq!(read(&store.passing_path()), "t/a\nt/c\nt/e\n");
            assert_eq!(read(&store.failing_path()), "t/b\nt/d\n");
            let runtime = read(&store.runtime_path());
            let records: Vec<_> = runtime
                .lines()
                .map(|line| RuntimeRecord::parse(line).expect("valid record"))
                .collect();
            assert_eq!(records.len(), ids.len());
            assert!(records.iter().all(|r| r.elapsed >= 0.0));
        }
    }
}
