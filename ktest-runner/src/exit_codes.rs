// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Documented exit codes for ktest.

/// Documented exit codes for `ktest` failures.
///
/// When a test runs to completion, ktest exits with the exit code of the underlying interpreter,
/// prover or runner, unchanged. The codes here are only used when ktest itself fails before or
/// after running anything.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum HarnessExitCode {}

impl HarnessExitCode {
    /// A required argument or input file was missing.
    pub const USAGE_ERROR: i32 = 96;

    /// The configuration could not be read or was invalid.
    pub const SETUP_ERROR: i32 = 97;

    /// Reading or writing the log store or capture files failed.
    pub const LOG_STORE_ERROR: i32 = 98;

    /// A collaborator could not be found on disk or on `PATH`.
    pub const COMMAND_NOT_FOUND: i32 = 127;

    /// A collaborator was found but could not be executed.
    pub const COMMAND_NOT_EXECUTABLE: i32 = 126;

    /// The base added to a signal number when a process is terminated by that signal.
    pub const SIGNAL_BASE: i32 = 128;
}
