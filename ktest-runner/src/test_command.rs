// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command lines for the external collaborators.
//!
//! ktest never discovers or builds its collaborators. Each one is a configured [`ToolCommand`],
//! and [`CommandBuilder`] extends it with the arguments a particular strategy needs.

use crate::{
    config::HarnessConfig,
    errors::{BackendParseError, ConfigParseErrorKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// The backend a definition was compiled with.
///
/// The backend selects the definition directory and the format of schedule and mode tokens.
#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// The LLVM backend.
    Llvm,

    /// The Java backend.
    Java,

    /// The Haskell backend.
    Haskell,
}

impl Backend {
    /// Returns the string values accepted by [`FromStr`].
    pub fn variants() -> &'static [&'static str] {
        &["llvm", "java", "haskell"]
    }

    /// Returns the name of this backend, which is also its directory name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Llvm => "llvm",
            Self::Java => "java",
            Self::Haskell => "haskell",
        }
    }

    /// Formats a schedule name as a configuration token for this backend.
    pub fn schedule_token(self, schedule: &str) -> String {
        match self {
            Self::Llvm => format!("Lbl{schedule}'Unds'EVM{{}}()"),
            Self::Java | Self::Haskell => format!("`{schedule}_EVM`(.KList)"),
        }
    }

    /// Formats a mode name as a configuration token for this backend.
    pub fn mode_token(self, mode: &str) -> String {
        match self {
            Self::Llvm => format!("Lbl{mode}{{}}()"),
            Self::Java | Self::Haskell => format!("`{mode}`(.KList)"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = BackendParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llvm" => Ok(Self::Llvm),
            "java" => Ok(Self::Java),
            "haskell" => Ok(Self::Haskell),
            other => Err(BackendParseError::new(other)),
        }
    }
}

/// A configured collaborator command line, split into words.
///
/// Words may contain the `{backend-dir}` placeholder, which is substituted when the command is
/// built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    const BACKEND_DIR_PLACEHOLDER: &'static str = "{backend-dir}";

    /// Parses a command line using shell quoting rules.
    pub fn parse(tool: &'static str, input: &str) -> Result<Self, ConfigParseErrorKind> {
        let mut words = shell_words::split(input)
            .map_err(|err| ConfigParseErrorKind::InvalidToolCommand {
                tool,
                input: input.to_owned(),
                err,
            })?
            .into_iter();
        let program = words
            .next()
            .ok_or(ConfigParseErrorKind::EmptyToolCommand { tool })?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// Returns the program, before substitution.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the configured arguments, before substitution.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn instantiate(&self, backend_dir: &Utf8Path) -> TestCommand {
        let subst = |word: &str| word.replace(Self::BACKEND_DIR_PLACEHOLDER, backend_dir.as_str());
        TestCommand {
            program: subst(&self.program),
            args: self.args.iter().map(|arg| subst(arg)).collect(),
        }
    }
}

/// A fully-resolved collaborator invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCommand {
    program: String,
    args: Vec<String>,
}

impl TestCommand {
    /// Returns the program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    fn args_from<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Converts this into a tokio command ready to be configured and spawned.
    pub(crate) fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for TestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

/// Builds collaborator invocations from a [`HarnessConfig`].
#[derive(Clone, Copy, Debug)]
pub struct CommandBuilder<'cfg> {
    config: &'cfg HarnessConfig,
}

impl<'cfg> CommandBuilder<'cfg> {
    /// Creates a new builder.
    pub fn new(config: &'cfg HarnessConfig) -> Self {
        Self { config }
    }

    /// `<converter> <test-file>`
    pub fn converter(&self, test_file: &Utf8Path) -> TestCommand {
        let mut cmd = self.config.tools().converter.instantiate(&self.backend_dir());
        cmd.arg(test_file.as_str());
        cmd
    }

    /// `<interpreter> <definition> <input> --schedule <token> --mode <token> --output-file <out>
    /// <extra...>`
    pub fn interpreter(
        &self,
        input: &Utf8Path,
        output_file: &Utf8Path,
        extra: &[String],
    ) -> TestCommand {
        let backend_dir = self.backend_dir();
        let backend = self.config.backend();
        let definition = self.definition_file();
        let mut cmd = self.config.tools().interpreter.instantiate(&backend_dir);
        cmd.arg(definition.as_str())
            .arg(input.as_str())
            .arg("--schedule")
            .arg(backend.schedule_token(self.config.schedule()))
            .arg("--mode")
            .arg(backend.mode_token(self.config.mode()))
            .arg("--output-file")
            .arg(output_file.as_str())
            .args_from(extra.iter().cloned());
        cmd
    }

    /// `<prover> --directory <backend-dir> <spec> --def-module <module> <extra...> [<debug-flag>]`
    pub fn prover(&self, spec: &Utf8Path, extra: &[String], debug: bool) -> TestCommand {
        let backend_dir = self.backend_dir();
        let mut cmd = self.config.tools().prover.instantiate(&backend_dir);
        cmd.arg("--directory")
            .arg(backend_dir.as_str())
            .arg(spec.as_str())
            .arg("--def-module")
            .arg(self.config.proof_module())
            .args_from(extra.iter().cloned());
        if debug {
            cmd.arg(self.config.proof_debug_flag());
        }
        cmd
    }

    /// `<runner> --directory <backend-dir> -cSCHEDULE=<token> -cMODE=<token> <program> <extra...>`
    pub fn runner(&self, program: &Utf8Path, extra: &[String]) -> TestCommand {
        let backend_dir = self.backend_dir();
        let backend = self.config.backend();
        let mut cmd = self.config.tools().runner.instantiate(&backend_dir);
        cmd.arg("--directory")
            .arg(backend_dir.as_str())
            .arg(format!(
                "-cSCHEDULE={}",
                backend.schedule_token(self.config.schedule())
            ))
            .arg(format!("-cMODE={}", backend.mode_token(self.config.mode())))
            .arg(program.as_str())
            .args_from(extra.iter().cloned());
        cmd
    }

    fn backend_dir(&self) -> Utf8PathBuf {
        self.config.backend_dir()
    }

    // The compiled interpreter definition shipped alongside the backend directory.
    fn definition_file(&self) -> Utf8PathBuf {
        self.backend_dir()
            .join("driver-kompiled")
            .join("definition.kore")
    }
}
