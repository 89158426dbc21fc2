// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running collaborators with their output redirected.
//!
//! A strategy writes to two [`OutputDest`]s: the terminal when run directly, or the per-test
//! `.out`/`.err` capture files when run under the profiling runner. Child processes get a
//! duplicate of the same handle, so in-process output (diff reports, diagnostics) and child output
//! end up interleaved in the same place.

use crate::{
    errors::CaptureError,
    exit_codes::HarnessExitCode,
    helpers::{display_exited_with, exit_code_from_status},
    signal::{ShutdownEvent, SignalHandler},
    test_command::TestCommand,
};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::NamedUtf8TempFile;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    process::Stdio,
    time::Duration,
};
use tracing::debug;

/// Where one output stream of a strategy goes.
#[derive(Debug)]
pub enum OutputDest {
    /// The harness's own stream.
    Inherit,

    /// A capture file, truncated when opened.
    File {
        /// The path of the capture file.
        path: Utf8PathBuf,

        /// The open capture file.
        file: File,
    },
}

impl OutputDest {
    /// Creates (or truncates) a capture file at `path`, creating parent directories on demand.
    pub fn create(path: impl Into<Utf8PathBuf>) -> Result<Self, CaptureError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| CaptureError::CreateDir {
                path: parent.to_owned(),
                error,
            })?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|error| CaptureError::OpenFile {
                path: path.clone(),
                error,
            })?;
        Ok(Self::File { path, file })
    }

    /// Returns the capture file path, if any.
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Inherit => None,
            Self::File { path, .. } => Some(path),
        }
    }

    fn to_stdio(&self) -> Result<Stdio, CaptureError> {
        match self {
            Self::Inherit => Ok(Stdio::inherit()),
            Self::File { path, file } => {
                let clone = file.try_clone().map_err(|error| CaptureError::CloneHandle {
                    path: path.clone(),
                    error,
                })?;
                Ok(Stdio::from(clone))
            }
        }
    }
}

/// The pair of destinations used by a strategy.
#[derive(Debug)]
pub struct CaptureStreams {
    /// Standard output.
    pub stdout: OutputDest,

    /// Standard error.
    pub stderr: OutputDest,
}

impl CaptureStreams {
    /// Both streams go to the harness's own stdout and stderr.
    pub fn inherit() -> Self {
        Self {
            stdout: OutputDest::Inherit,
            stderr: OutputDest::Inherit,
        }
    }

    /// Both streams go to freshly truncated capture files.
    pub fn to_files(
        stdout: impl Into<Utf8PathBuf>,
        stderr: impl Into<Utf8PathBuf>,
    ) -> Result<Self, CaptureError> {
        Ok(Self {
            stdout: OutputDest::create(stdout)?,
            stderr: OutputDest::create(stderr)?,
        })
    }

    /// Writes bytes produced in-process to the stdout destination.
    pub(crate) fn write_stdout(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        match &mut self.stdout {
            OutputDest::Inherit => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)
                    .and_then(|()| out.flush())
                    .map_err(|error| write_error("standard output", error))
            }
            OutputDest::File { path, file } => file
                .write_all(bytes)
                .map_err(|error| write_error(path.as_str(), error)),
        }
    }

    /// Writes bytes produced in-process to the stderr destination.
    pub(crate) fn write_stderr(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        match &mut self.stderr {
            OutputDest::Inherit => {
                let mut err = io::stderr().lock();
                err.write_all(bytes)
                    .and_then(|()| err.flush())
                    .map_err(|error| write_error("standard error", error))
            }
            OutputDest::File { path, file } => file
                .write_all(bytes)
                .map_err(|error| write_error(path.as_str(), error)),
        }
    }

    /// Returns true if in-process stdout output goes to a terminal.
    pub(crate) fn stdout_is_terminal(&self) -> bool {
        match self.stdout {
            OutputDest::Inherit => io::IsTerminal::is_terminal(&io::stdout()),
            OutputDest::File { .. } => false,
        }
    }
}

fn write_error(stream: &str, error: io::Error) -> CaptureError {
    CaptureError::Write {
        stream: stream.to_owned(),
        error,
    }
}

/// How a single child process ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ChildOutcome {
    /// The child exited (or was killed by a signal it didn't get from us) with this code.
    Exited(i32),

    /// A shutdown signal arrived while the child was running.
    Interrupted(ShutdownEvent),
}

/// Spawns collaborators and waits for them, watching for shutdown signals.
#[derive(Debug)]
pub(crate) struct ChildRunner<'a> {
    signals: &'a mut SignalHandler,
    grace_period: Duration,
}

impl<'a> ChildRunner<'a> {
    pub(crate) fn new(signals: &'a mut SignalHandler, grace_period: Duration) -> Self {
        Self {
            signals,
            grace_period,
        }
    }

    /// Runs `command` with stderr going to `streams.stderr` and stdout going to either
    /// `stdout_override` or `streams.stdout`.
    ///
    /// A command that cannot be spawned is reported on the stderr destination and mapped to the
    /// exit code a shell would use.
    pub(crate) async fn run(
        &mut self,
        command: &TestCommand,
        streams: &mut CaptureStreams,
        stdout_override: Option<&File>,
    ) -> Result<ChildOutcome, CaptureError> {
        let stdout = match stdout_override {
            Some(file) => Stdio::from(file.try_clone().map_err(|error| {
                CaptureError::CloneHandle {
                    path: Utf8PathBuf::from("<temporary file>"),
                    error,
                }
            })?),
            None => streams.stdout.to_stdio()?,
        };
        let stderr = streams.stderr.to_stdio()?;

        let mut cmd = command.to_tokio();
        cmd.stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        debug!("running `{command}`");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(error) => {
                let code = if error.kind() == io::ErrorKind::NotFound {
                    HarnessExitCode::COMMAND_NOT_FOUND
                } else {
                    HarnessExitCode::COMMAND_NOT_EXECUTABLE
                };
                debug!("failed to spawn `{}`: {error}", command.program());
                let message = format!(
                    "ktest: failed to spawn `{}`: {error}\n",
                    command.program()
                );
                streams.write_stderr(message.as_bytes())?;
                return Ok(ChildOutcome::Exited(code));
            }
        };

        let wait_error = |error| CaptureError::Wait {
            command: command.to_string(),
            error,
        };

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(wait_error)?;
                debug!("`{}` {}", command.program(), display_exited_with(status));
                // A terminal Ctrl-C reaches the child too, and the child can be reaped before
                // the harness sees its own signal.
                if let Some(event) = self.signals.pending().await {
                    debug!("received {event:?} as `{}` exited", command.program());
                    return Ok(ChildOutcome::Interrupted(event));
                }
                Ok(ChildOutcome::Exited(exit_code_from_status(status)))
            }
            event = self.signals.recv() => {
                debug!("received {event:?} while running `{}`", command.program());
                forward_shutdown(&mut child, event);
                match tokio::time::timeout(self.grace_period, child.wait()).await {
                    Ok(status) => {
                        status.map_err(wait_error)?;
                    }
                    Err(_) => {
                        debug!(
                            "`{}` did not exit within {:?}, killing it",
                            command.program(),
                            self.grace_period
                        );
                        // An error here means the child already exited.
                        _ = child.start_kill();
                        child.wait().await.map_err(wait_error)?;
                    }
                }
                Ok(ChildOutcome::Interrupted(event))
            }
        }
    }
}

#[cfg(unix)]
fn forward_shutdown(child: &mut tokio::process::Child, event: ShutdownEvent) {
    if let Some(pid) = child.id() {
        // SAFETY: https://www.man7.org/linux/man-pages/man2/kill.2.html
        unsafe {
            libc::kill(pid as libc::pid_t, event.signal_number());
        }
    }
}

#[cfg(not(unix))]
fn forward_shutdown(child: &mut tokio::process::Child, _event: ShutdownEvent) {
    // There's no way to forward Ctrl-C to a single process, so terminate it outright.
    _ = child.start_kill();
}

/// Creates a scoped temporary file that is removed when dropped.
pub(crate) fn scoped_temp_file(
    temp_dir: Option<&Utf8Path>,
    suffix: &str,
) -> Result<NamedUtf8TempFile, CaptureError> {
    let mut builder = camino_tempfile::Builder::new();
    builder.prefix("ktest-").suffix(suffix);
    let result = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    result.map_err(|error| CaptureError::TempFile {
        dir: temp_dir.map_or_else(
            || Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().into_owned()),
            Utf8Path::to_owned,
        ),
        error,
    })
}

/// Reads a file written by a collaborator.
pub(crate) fn read_output(path: &Utf8Path) -> Result<Vec<u8>, CaptureError> {
    std::fs::read(path).map_err(|error| CaptureError::ReadOutput {
        path: path.to_owned(),
        error,
    })
}
