// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::env::{OVERRIDE_VARS, test_env};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    borrow::Cow,
    collections::HashMap,
    ffi::OsString,
    fmt,
    process::{Child, Command, ExitStatus, Stdio},
};

/// A builder for ktest invocations.
#[derive(Clone, Debug)]
pub struct KtestCli {
    bin: Utf8PathBuf,
    args: Vec<String>,
    envs: HashMap<OsString, OsString>,
    current_dir: Option<Utf8PathBuf>,
    unchecked: bool,
}

impl KtestCli {
    /// Creates a new invocation of the ktest binary at `bin`.
    pub fn new(bin: impl Into<Utf8PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            args: Vec::new(),
            envs: HashMap::new(),
            current_dir: None,
            unchecked: false,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(&mut self, arg: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(arg.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, k: impl Into<OsString>, v: impl Into<OsString>) -> &mut Self {
        self.envs.insert(k.into(), v.into());
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Utf8Path>) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Don't panic if ktest exits with a non-zero code.
    pub fn unchecked(&mut self, unchecked: bool) -> &mut Self {
        self.unchecked = unchecked;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.bin);
        command.args(&self.args);
        for var in OVERRIDE_VARS {
            command.env_remove(var);
        }
        command.envs(test_env());
        command.envs(&self.envs);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }

    /// Runs ktest to completion.
    pub fn output(&self) -> KtestOutput {
        let mut command = self.command();
        let output = command.output().expect("failed to execute ktest");

        let ret = KtestOutput {
            command,
            exit_status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if !self.unchecked && !output.status.success() {
            panic!("command failed:\n\n{ret}");
        }

        ret
    }

    /// Starts ktest with piped output, for tests that need to interact with the process.
    pub fn spawn(&self) -> Child {
        self.command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn ktest")
    }
}

pub struct KtestOutput {
    pub command: Command,
    pub exit_status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl KtestOutput {
    pub fn stdout_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Returns the exit code, or `None` if ktest was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.code()
    }
}

impl fmt::Display for KtestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command: {:?}\nexit code: {:?}\n\
                   --- stdout ---\n{}\n\n--- stderr ---\n{}\n\n",
            self.command,
            self.exit_status.code(),
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr)
        )
    }
}

impl fmt::Debug for KtestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Quotes `path` for use in a tool command line in the config.
pub fn quote_tool(path: &Utf8Path, role: &str) -> String {
    shell_words::join([path.as_str(), role])
}
