// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for ktest-runner.

use crate::exit_codes::HarnessExitCode;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::process::ExitStatus;

/// Utilities for pluralizing various words based on count.
pub(crate) mod plural {
    /// Returns "entry" if `count` is 1, otherwise "entries".
    pub(crate) fn entries_str(count: usize) -> &'static str {
        if count == 1 { "entry" } else { "entries" }
    }

    /// Returns "line" if `count` is 1, otherwise "lines".
    pub(crate) fn lines_str(count: usize) -> &'static str {
        if count == 1 { "line" } else { "lines" }
    }
}

/// Converts a child's exit status into the integer a shell would report.
///
/// A process killed by signal `N` maps to `128 + N`.
pub(crate) fn exit_code_from_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::process::ExitStatusExt;
            match status.signal() {
                Some(signal) => HarnessExitCode::SIGNAL_BASE + signal,
                None => HarnessExitCode::SIGNAL_BASE,
            }
        } else {
            HarnessExitCode::SIGNAL_BASE
        }
    }
}

// "exited with"/"aborted with"
pub(crate) fn display_exited_with(status: ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return match signal_str(sig) {
                Some(s) => format!("aborted with signal {sig} (SIG{s})"),
                None => format!("aborted with signal {sig}"),
            };
        }
    }

    match status.code() {
        Some(code) => format!("exited with exit code {code}"),
        None => "exited with an unknown error".to_owned(),
    }
}

#[cfg(unix)]
pub(crate) fn signal_str(signal: i32) -> Option<&'static str> {
    // These signal numbers are the same on at least Linux, macOS, FreeBSD and illumos.
    match signal {
        1 => Some("HUP"),
        2 => Some("INT"),
        3 => Some("QUIT"),
        4 => Some("ILL"),
        5 => Some("TRAP"),
        6 => Some("ABRT"),
        8 => Some("FPE"),
        9 => Some("KILL"),
        11 => Some("SEGV"),
        13 => Some("PIPE"),
        14 => Some("ALRM"),
        15 => Some("TERM"),
        _ => None,
    }
}

/// Maps a test identifier to a path relative to the logs root.
///
/// Root and prefix components are dropped, `.` is skipped and `..` becomes `__`, so the result
/// always stays inside the logs root.
pub(crate) fn capture_rel_path(identifier: &str) -> Utf8PathBuf {
    let normalized = identifier.replace('\\', "/");
    let mut out = Utf8PathBuf::new();
    for component in Utf8Path::new(&normalized).components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir | Utf8Component::CurDir => {}
            Utf8Component::ParentDir => out.push("__"),
            Utf8Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Appends `suffix` (for example `.out`) to the file name of `path`.
pub(crate) fn with_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let mut s = path.as_str().to_owned();
    s.push_str(suffix);
    Utf8PathBuf::from(s)
}
