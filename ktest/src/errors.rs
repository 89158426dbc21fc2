// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use ktest_runner::{errors::*, exit_codes::HarnessExitCode};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that ktest expects to be able to report, as opposed to a bug.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("usage error")]
    UsageError {
        #[from]
        err: UsageError,
    },
    #[error("capture error")]
    CaptureError {
        #[from]
        err: CaptureError,
    },
    #[error("log store error")]
    LogStoreError {
        #[from]
        err: LogStoreError,
    },
    #[error("signal handler setup error")]
    SignalHandlerSetupError {
        #[from]
        err: SignalHandlerSetupError,
    },
    #[error("error writing to {stream}")]
    WriteError {
        stream: &'static str,
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_error(stream: &'static str, err: std::io::Error) -> Self {
        Self::WriteError { stream, err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::UsageError { .. } => HarnessExitCode::USAGE_ERROR,
            Self::ConfigParseError { .. } | Self::SignalHandlerSetupError { .. } => {
                HarnessExitCode::SETUP_ERROR
            }
            Self::CaptureError { .. } | Self::LogStoreError { .. } | Self::WriteError { .. } => {
                HarnessExitCode::LOG_STORE_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse ktest config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::UsageError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::CaptureError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::LogStoreError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::SignalHandlerSetupError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::WriteError { stream, err } => {
                tracing::error!("failed to write to {stream}");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: "ktest::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

impl From<StrategyError> for ExpectedError {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::Usage(err) => Self::UsageError { err },
            StrategyError::Capture(err) => Self::CaptureError { err },
            StrategyError::SignalSetup(err) => Self::SignalHandlerSetupError { err },
        }
    }
}

impl From<ProfileError> for ExpectedError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Usage(err) => Self::UsageError { err },
            ProfileError::Capture(err) => Self::CaptureError { err },
            ProfileError::LogStore(err) => Self::LogStoreError { err },
            ProfileError::SignalSetup(err) => Self::SignalHandlerSetupError { err },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let usage: ExpectedError = UsageError::MissingArgument {
            name: "expected output file",
        }
        .into();
        assert_eq!(usage.process_exit_code(), HarnessExitCode::USAGE_ERROR);

        let write = ExpectedError::write_error(
            "standard output",
            std::io::Error::other("broken pipe"),
        );
        assert_eq!(write.process_exit_code(), HarnessExitCode::LOG_STORE_ERROR);

        let config = ktest_runner::config::HarnessConfig::from_sources(
            camino::Utf8Path::new("."),
            Some(camino::Utf8Path::new("/nonexistent/ktest.toml")),
        )
        .expect_err("config file is missing");
        assert_eq!(
            ExpectedError::from(config).process_exit_code(),
            HarnessExitCode::SETUP_ERROR
        );
    }
}
