// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a single test with one of the execution strategies.
//!
//! A [`StrategyRequest`] says what to run. It is either produced by classifying a test path
//! ([`StrategyRequest::dispatch`]) or built directly by the user-facing subcommands.
//! [`StrategyRunner`] validates the request, spawns the collaborators and returns a
//! [`StrategyOutcome`].

use crate::{
    capture::{CaptureStreams, ChildOutcome, ChildRunner, read_output, scoped_temp_file},
    classify::Strategy,
    config::HarnessConfig,
    diff::DiffReporter,
    errors::{CaptureError, RequiredFileKind, StrategyError, UsageError},
    signal::{ShutdownEvent, SignalHandlerKind},
    test_command::CommandBuilder,
};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// A fully-specified strategy invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StrategyRequest {
    /// Run the prover on a specification.
    Proof {
        /// The specification file.
        spec: Utf8PathBuf,

        /// Extra arguments passed to the prover.
        args: Vec<String>,

        /// Whether to append the configured debug flag.
        debug: bool,
    },

    /// Run the interactive runner and diff its output on failure.
    Interactive {
        /// The program to run.
        program: Utf8PathBuf,

        /// The file holding the expected output.
        expected: Utf8PathBuf,

        /// Extra arguments passed to the runner.
        args: Vec<String>,
    },

    /// Convert the test and run it through the fast interpreter.
    FastInterpret {
        /// The test file.
        test: Utf8PathBuf,

        /// Extra arguments passed to the interpreter.
        args: Vec<String>,
    },

    /// Run the interactive runner with no output comparison.
    Run {
        /// The program to run.
        program: Utf8PathBuf,

        /// Extra arguments passed to the runner.
        args: Vec<String>,
    },
}

impl StrategyRequest {
    /// Classifies `test` and builds the request for its strategy.
    ///
    /// Interactive tests take the expected-output file as the first of `args`.
    pub fn dispatch(
        test: impl Into<Utf8PathBuf>,
        mut args: Vec<String>,
        config: &HarnessConfig,
    ) -> Result<Self, UsageError> {
        let test = test.into();
        let strategy = Strategy::classify(test.as_str(), config.markers());
        debug!("classified {test} as {strategy}");

        match strategy {
            Strategy::Proof => Ok(Self::Proof {
                spec: test,
                args,
                debug: true,
            }),
            Strategy::Interactive => {
                if args.is_empty() {
                    return Err(UsageError::MissingArgument {
                        name: "expected output file",
                    });
                }
                let expected = Utf8PathBuf::from(args.remove(0));
                Ok(Self::Interactive {
                    program: test,
                    expected,
                    args,
                })
            }
            Strategy::FastInterpret => Ok(Self::FastInterpret { test, args }),
        }
    }

    /// Checks that every file the request needs exists.
    pub fn validate(&self) -> Result<(), UsageError> {
        match self {
            Self::Proof { spec, .. } => require_file(RequiredFileKind::ProofSpec, spec),
            Self::Interactive {
                program, expected, ..
            } => {
                require_file(RequiredFileKind::TestFile, program)?;
                require_file(RequiredFileKind::ExpectedOutput, expected)
            }
            Self::FastInterpret { test, .. } => require_file(RequiredFileKind::TestFile, test),
            Self::Run { program, .. } => require_file(RequiredFileKind::Program, program),
        }
    }
}

fn require_file(kind: RequiredFileKind, path: &Utf8Path) -> Result<(), UsageError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(UsageError::MissingFile {
            kind,
            path: path.to_owned(),
        })
    }
}

/// How a strategy ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StrategyOutcome {
    /// The strategy ran to completion with this exit code.
    Exited(i32),

    /// The run was cut short by a shutdown signal.
    Interrupted(ShutdownEvent),
}

impl StrategyOutcome {
    /// Returns the exit code the harness should exit with.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Interrupted(event) => event.exit_code(),
        }
    }

    /// Returns true if the strategy exited with code 0.
    pub fn is_success(self) -> bool {
        self == Self::Exited(0)
    }
}

impl From<ChildOutcome> for StrategyOutcome {
    fn from(outcome: ChildOutcome) -> Self {
        match outcome {
            ChildOutcome::Exited(code) => Self::Exited(code),
            ChildOutcome::Interrupted(event) => Self::Interrupted(event),
        }
    }
}

/// Runs [`StrategyRequest`]s.
#[derive(Clone, Debug)]
pub struct StrategyRunner<'cfg> {
    config: &'cfg HarnessConfig,
    signal_kind: SignalHandlerKind,
    colorize_diffs: bool,
}

impl<'cfg> StrategyRunner<'cfg> {
    /// Creates a new runner.
    pub fn new(config: &'cfg HarnessConfig, signal_kind: SignalHandlerKind) -> Self {
        Self {
            config,
            signal_kind,
            colorize_diffs: false,
        }
    }

    /// Colorizes diff reports written to a terminal.
    pub fn set_colorize_diffs(&mut self, colorize: bool) -> &mut Self {
        self.colorize_diffs = colorize;
        self
    }

    /// Returns the config used by this runner.
    pub fn config(&self) -> &'cfg HarnessConfig {
        self.config
    }

    /// Runs `request` on a current-thread runtime, sending its output to `streams`.
    ///
    /// Usage errors are reported before anything is spawned or written.
    pub fn run(
        &self,
        request: &StrategyRequest,
        streams: &mut CaptureStreams,
    ) -> Result<StrategyOutcome, StrategyError> {
        request.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| CaptureError::RuntimeBuild { error })?;
        runtime.block_on(self.run_async(request, streams))
    }

    async fn run_async(
        &self,
        request: &StrategyRequest,
        streams: &mut CaptureStreams,
    ) -> Result<StrategyOutcome, StrategyError> {
        let mut signals = self.signal_kind.build()?;
        let mut children = ChildRunner::new(&mut signals, self.config.termination_grace_period());
        let commands = CommandBuilder::new(self.config);
        let temp_dir = self.config.temp_dir();

        let outcome: StrategyOutcome = match request {
            StrategyRequest::Proof { spec, args, debug } => {
                let command = commands.prover(spec, args, *debug);
                children.run(&command, streams, None).await?.into()
            }
            StrategyRequest::Run { program, args } => {
                let command = commands.runner(program, args);
                children.run(&command, streams, None).await?.into()
            }
            StrategyRequest::Interactive {
                program,
                expected,
                args,
            } => {
                let actual = scoped_temp_file(temp_dir, ".out")?;
                let command = commands.runner(program, args);
                let outcome = children
                    .run(&command, streams, Some(actual.as_file()))
                    .await?;
                if let ChildOutcome::Exited(code) = outcome {
                    if code != 0 {
                        self.report_diff(expected, actual.path(), streams)?;
                    }
                }
                outcome.into()
            }
            StrategyRequest::FastInterpret { test, args } => {
                let converted = scoped_temp_file(temp_dir, ".kore")?;
                let convert = commands.converter(test);
                match children
                    .run(&convert, streams, Some(converted.as_file()))
                    .await?
                {
                    ChildOutcome::Exited(0) => {}
                    other => {
                        debug!("conversion of {test} did not succeed: {other:?}");
                        return Ok(other.into());
                    }
                }

                let output = scoped_temp_file(temp_dir, ".out")?;
                let interpret = commands.interpreter(converted.path(), output.path(), args);
                let outcome = children.run(&interpret, streams, None).await?;
                if let ChildOutcome::Exited(code) = outcome {
                    if code != 0 {
                        let contents = read_output(output.path())?;
                        streams.write_stdout(&contents)?;
                    }
                }
                outcome.into()
            }
        };

        Ok(outcome)
    }

    fn report_diff(
        &self,
        expected: &Utf8Path,
        actual: &Utf8Path,
        streams: &mut CaptureStreams,
    ) -> Result<(), CaptureError> {
        let expected_text = read_output(expected)?;
        let actual_text = read_output(actual)?;

        let mut reporter = DiffReporter::new();
        if self.colorize_diffs && streams.stdout_is_terminal() {
            reporter.colorize();
        }

        let diff = reporter.render(
            expected.as_str(),
            &String::from_utf8_lossy(&expected_text),
            "actual output",
            &String::from_utf8_lossy(&actual_text),
        );
        match diff {
            Some(diff) => streams.write_stdout(diff.as_bytes()),
            None => {
                debug!("output matches {expected} ignoring whitespace");
                Ok(())
            }
        }
    }
}
