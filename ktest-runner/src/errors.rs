// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by ktest.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse ktest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A tool command line could not be split into words.
    #[error("invalid command line for `tools.{tool}`: {input:?}")]
    InvalidToolCommand {
        /// The name of the tool.
        tool: &'static str,

        /// The command line as written in the config.
        input: String,

        /// The underlying parse error.
        #[source]
        err: shell_words::ParseError,
    },

    /// A tool command line was empty.
    #[error("command line for `tools.{tool}` is empty")]
    EmptyToolCommand {
        /// The name of the tool.
        tool: &'static str,
    },
}

/// Error returned while parsing a [`Backend`](crate::test_command::Backend) value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for backend: {input}\n(known values: {})",
    crate::test_command::Backend::variants().join(", ")
)]
pub struct BackendParseError {
    input: String,
}

impl BackendParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// A problem with the arguments or files handed to a strategy, detected before anything runs.
///
/// Usage errors never mutate the log store.
#[derive(Debug, Error)]
pub enum UsageError {
    /// A file that the strategy needs does not exist.
    #[error("{kind} `{path}` does not exist")]
    MissingFile {
        /// What the file is used for.
        kind: RequiredFileKind,

        /// The path that was checked.
        path: Utf8PathBuf,
    },

    /// A required positional argument was not supplied.
    #[error("missing required argument: {name}")]
    MissingArgument {
        /// The name of the argument.
        name: &'static str,
    },
}

/// The role of a file checked by [`UsageError::MissingFile`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequiredFileKind {
    /// The test file itself.
    TestFile,

    /// A proof specification.
    ProofSpec,

    /// The expected output of an interactive test.
    ExpectedOutput,

    /// A program handed to the interactive runner.
    Program,
}

impl fmt::Display for RequiredFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestFile => f.write_str("test file"),
            Self::ProofSpec => f.write_str("proof spec"),
            Self::ExpectedOutput => f.write_str("expected output file"),
            Self::Program => f.write_str("program"),
        }
    }
}

/// An error that occurred while capturing the output of a collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// Creating the directory for capture files failed.
    #[error("failed to create capture directory `{path}`")]
    CreateDir {
        /// The directory that could not be created.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Opening a capture file failed.
    #[error("failed to open capture file `{path}`")]
    OpenFile {
        /// The capture file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Duplicating a capture handle for a child process failed.
    #[error("failed to duplicate handle for `{path}`")]
    CloneHandle {
        /// The capture file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Creating a scoped temporary file failed.
    #[error("failed to create temporary file in `{dir}`")]
    TempFile {
        /// The directory the temporary file was created in.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Reading a file produced by a collaborator failed.
    #[error("failed to read `{path}`")]
    ReadOutput {
        /// The file that could not be read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Writing to a capture destination failed.
    #[error("failed to write {stream}")]
    Write {
        /// The stream or file that could not be written.
        stream: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Waiting on a child process failed.
    #[error("failed to wait for `{command}`")]
    Wait {
        /// The command being waited on.
        command: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Building the async runtime failed.
    #[error("failed to build the tokio runtime")]
    RuntimeBuild {
        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while reading or writing the log store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogStoreError {
    /// Creating the logs directory failed.
    #[error("failed to create logs directory `{path}`")]
    CreateDir {
        /// The directory that could not be created.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Appending a record to a log failed.
    #[error("failed to append to `{path}`")]
    Append {
        /// The log that could not be appended to.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Reading a log failed.
    #[error("failed to read `{path}`")]
    Read {
        /// The log that could not be read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Atomically replacing a log failed.
    #[error("failed to rewrite `{path}`")]
    Rewrite {
        /// The log that could not be rewritten.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<io::Error>,
    },
}

/// An error that occurred while running a test under the profiling runner.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The strategy's arguments were invalid.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Capturing output failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Recording the outcome failed.
    #[error(transparent)]
    LogStore(#[from] LogStoreError),

    /// The signal handler could not be installed.
    #[error(transparent)]
    SignalSetup(#[from] SignalHandlerSetupError),
}

/// An error that occurred while running a strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The strategy's arguments were invalid.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Capturing output failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The signal handler could not be installed.
    #[error(transparent)]
    SignalSetup(#[from] SignalHandlerSetupError),
}

impl From<StrategyError> for ProfileError {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::Usage(err) => Self::Usage(err),
            StrategyError::Capture(err) => Self::Capture(err),
            StrategyError::SignalSetup(err) => Self::SignalSetup(err),
        }
    }
}

/// An error that occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("failed to install signal handler")]
pub struct SignalHandlerSetupError(#[from] io::Error);
