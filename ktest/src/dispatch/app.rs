// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use super::{EarlyArgs, common::ConfigOpts};
use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::{Args, Subcommand};
use itertools::Itertools;
use ktest_runner::{
    capture::CaptureStreams,
    config::HarnessConfig,
    log_store::{LogStore, LogSummary},
    profile::ProfilingRunner,
    sampler::{DEFAULT_SAMPLE_SIZE, sample_failing},
    signal::SignalHandlerKind,
    strategy::{StrategyOutcome, StrategyRequest, StrategyRunner},
    test_command::Backend,
};
use owo_colors::OwoColorize;
use std::io::Write;
use tracing::{info, warn};

/// Runs interpreter and prover test suites, recording pass/fail status and timing.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    bin_name = "ktest",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
    arg_required_else_help = true
)]
pub struct KtestApp {
    /// Early args flattened at root for early extraction.
    #[clap(flatten)]
    early_args: EarlyArgs,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(subcommand)]
    command: Command,
}

impl KtestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        OutputOpts {
            color: self.early_args.color,
        }
        .init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Run(opts) => {
                let config = self.config_opts.make_config()?;
                run_direct(&config, output, opts.into_run(Vec::new()))
            }
            Command::RunJava(opts) => {
                let mut config = self.config_opts.make_config()?;
                config.set_backend(Backend::Java);
                run_direct(&config, output, opts.into_run(Vec::new()))
            }
            Command::Debug(opts) => {
                let config = self.config_opts.make_config()?;
                run_direct(&config, output, opts.into_run(vec!["--debugger"]))
            }
            Command::Search(opts) => {
                let config = self.config_opts.make_config()?;
                run_direct(&config, output, opts.into_run(vec!["--search"]))
            }
            Command::Prove(opts) => {
                let config = self.config_opts.make_config()?;
                let request = StrategyRequest::Proof {
                    spec: opts.spec,
                    args: opts.args,
                    debug: false,
                };
                run_direct(&config, output, request)
            }
            Command::Interpret(opts) => {
                let config = self.config_opts.make_config()?;
                let request = StrategyRequest::FastInterpret {
                    test: opts.test,
                    args: opts.args,
                };
                run_direct(&config, output, request)
            }
            Command::Test(opts) => {
                let config = self.config_opts.make_config()?;
                let request = StrategyRequest::dispatch(opts.test, opts.args, &config)?;
                run_direct(&config, output, request)
            }
            Command::TestProfile(opts) => {
                let config = self.config_opts.make_config()?;
                exec_test_profile(&config, output, opts, output_writer)
            }
            Command::SortLogs => {
                let config = self.config_opts.make_config()?;
                exec_sort_logs(&config)
            }
            Command::GetFailing { count } => {
                let config = self.config_opts.make_config()?;
                exec_get_failing(&config, count, output_writer)
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a program with the interactive runner.
    Run(ProgramOpts),

    /// Run a program with the interactive runner on the Java backend.
    RunJava(ProgramOpts),

    /// Run a program under the interactive runner's debugger.
    Debug(ProgramOpts),

    /// Explore every execution path of a program with the interactive runner.
    Search(ProgramOpts),

    /// Check a specification with the prover.
    Prove(ProveOpts),

    /// Run a test through the fast interpreter.
    Interpret(TestOpts),

    /// Run a test with the strategy selected by its path.
    ///
    /// Paths containing `proofs/` are proved (with the debug flag), paths containing
    /// `interactive/` are run and diffed against the expected-output file given as the first
    /// extra argument, and everything else goes through the fast interpreter.
    Test(TestOpts),

    /// Run a test like `test`, capturing its output and recording the outcome in the logs.
    ///
    /// Output is written to `<logs-dir>/<test>.out` and `<logs-dir>/<test>.err`. The test is
    /// appended to `passing.lastrun` or `failing.lastrun`, and its duration to `runtime`. On
    /// failure the captured output is echoed.
    TestProfile(TestOpts),

    /// Deduplicate and sort the pass/fail/runtime logs.
    SortLogs,

    /// Print random failing tests from the failing log.
    GetFailing {
        /// Number of failing tests to print.
        #[arg(default_value_t = DEFAULT_SAMPLE_SIZE)]
        count: usize,
    },
}

#[derive(Debug, Args)]
struct ProgramOpts {
    /// The program to run.
    program: Utf8PathBuf,

    /// Extra arguments passed to the runner.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl ProgramOpts {
    fn into_run(self, prefix: Vec<&str>) -> StrategyRequest {
        let args = prefix
            .into_iter()
            .map(str::to_owned)
            .chain(self.args)
            .collect();
        StrategyRequest::Run {
            program: self.program,
            args,
        }
    }
}

#[derive(Debug, Args)]
struct ProveOpts {
    /// The specification to prove.
    spec: Utf8PathBuf,

    /// Extra arguments passed to the prover.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct TestOpts {
    /// The test file. Its path also identifies it in the logs.
    test: Utf8PathBuf,

    /// Extra arguments passed through to the strategy.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn strategy_runner(config: &HarnessConfig, output: OutputContext) -> StrategyRunner<'_> {
    let mut runner = StrategyRunner::new(config, SignalHandlerKind::Standard);
    runner.set_colorize_diffs(output.colorize_stdout());
    runner
}

fn run_direct(
    config: &HarnessConfig,
    output: OutputContext,
    request: StrategyRequest,
) -> Result<i32> {
    let runner = strategy_runner(config, output);
    let outcome = runner.run(&request, &mut CaptureStreams::inherit())?;
    Ok(report_outcome(outcome, output))
}

fn exec_test_profile(
    config: &HarnessConfig,
    output: OutputContext,
    opts: TestOpts,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let identifier = opts.test.to_string();
    let request = StrategyRequest::dispatch(opts.test, opts.args, config)?;
    let profiler = ProfilingRunner::new(
        strategy_runner(config, output),
        LogStore::new(config.logs_dir()),
    );

    let (mut stdout, mut stderr) = output_writer.split();
    let result = profiler.run(&identifier, &request, &mut stdout, &mut stderr)?;
    stdout
        .flush()
        .map_err(|err| ExpectedError::write_error("standard output", err))?;
    stderr
        .flush()
        .map_err(|err| ExpectedError::write_error("standard error", err))?;

    Ok(report_outcome(result.outcome, output))
}

fn report_outcome(outcome: StrategyOutcome, output: OutputContext) -> i32 {
    if let StrategyOutcome::Interrupted(event) = outcome {
        let styles = output.stderr_styles();
        let message = format!(
            "interrupted by signal {} ({event:?}), exiting",
            event.signal_number()
        );
        warn!("{}", message.style(styles.warning_text));
    }
    outcome.exit_code()
}

fn exec_sort_logs(config: &HarnessConfig) -> Result<i32> {
    let store = LogStore::new(config.logs_dir());
    let summary = store.normalize()?;

    let sorted = [
        (LogStore::PASSING_FILE_NAME, summary.passing),
        (LogStore::FAILING_FILE_NAME, summary.failing),
        (LogStore::RUNTIME_FILE_NAME, summary.runtime),
    ]
    .into_iter()
    .filter_map(|(name, summary)| summary.map(|s: LogSummary| format!("{name}: {s}")))
    .collect::<Vec<_>>();

    if sorted.is_empty() {
        info!("no logs found in {}", store.dir());
    } else {
        info!("sorted logs in {}\n  {}", store.dir(), sorted.iter().join("\n  "));
    }
    Ok(0)
}

fn exec_get_failing(
    config: &HarnessConfig,
    count: usize,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let store = LogStore::new(config.logs_dir());
    let sample = sample_failing(&store, count)?;

    let mut writer = output_writer.stdout_writer();
    for identifier in &sample {
        writeln!(writer, "{identifier}")
            .map_err(|err| ExpectedError::write_error("standard output", err))?;
    }
    writer
        .flush()
        .map_err(|err| ExpectedError::write_error("standard output", err))?;
    Ok(0)
}
