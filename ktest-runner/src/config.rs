// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for ktest.
//!
//! The configuration is layered: the embedded default config is read first, then the
//! repository's `.config/ktest.toml` (or an explicitly passed file), and finally any overrides
//! from the command line or environment.

use crate::{
    classify::Markers,
    errors::{ConfigParseError, ConfigParseErrorKind},
    test_command::{Backend, ToolCommand},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::{debug, warn};

/// Overall configuration for a harness invocation.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    backend: Backend,
    schedule: String,
    mode: String,
    definitions_dir: Utf8PathBuf,
    logs_dir: Utf8PathBuf,
    temp_dir: Option<Utf8PathBuf>,
    proof_module: String,
    proof_debug_flag: String,
    termination_grace_period: Duration,
    tools: ToolsConfig,
    markers: Markers,
}

impl HarnessConfig {
    /// The default location of the config within a repository.
    pub const CONFIG_PATH: &'static str = ".config/ktest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from `<root>/.config/ktest.toml` if it exists, or from `config_file` if
    /// one is given. A missing explicit config file is an error.
    pub fn from_sources(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (
                file.to_owned(),
                File::new(file.as_str(), FileFormat::Toml).required(true),
            ),
            None => {
                let file = root.join(Self::CONFIG_PATH);
                let source = File::new(file.as_str(), FileFormat::Toml).required(false);
                (file, source)
            }
        };
        debug!("reading config from {config_file}");

        let builder = Self::make_default_config().add_source(source);
        Self::build(&builder, &config_file)
    }

    /// Returns the default configuration, with no repository config applied.
    pub fn default_config() -> Result<Self, ConfigParseError> {
        Self::build(&Self::make_default_config(), Utf8Path::new("<default config>"))
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build(
        builder: &ConfigBuilder<DefaultState>,
        config_file: &Utf8Path,
    ) -> Result<Self, ConfigParseError> {
        let (raw, ignored) = Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))?;

        if !ignored.is_empty() {
            let keys = ignored
                .iter()
                .map(|key| format!("  - {key}"))
                .collect::<Vec<_>>()
                .join("\n");
            warn!("ignoring unknown configuration keys in {config_file}:\n{keys}");
        }

        Self::from_deserialized(raw).map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(HarnessConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: HarnessConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // The config crate also reports the key. Keep only the path from
                // serde_path_to_error so it isn't printed twice.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }

    fn from_deserialized(raw: HarnessConfigDeserialize) -> Result<Self, ConfigParseErrorKind> {
        let HarnessConfigDeserialize {
            harness,
            tools,
            markers,
        } = raw;
        Ok(Self {
            backend: harness.backend,
            schedule: harness.schedule,
            mode: harness.mode,
            definitions_dir: harness.definitions_dir,
            logs_dir: harness.logs_dir,
            temp_dir: harness.temp_dir,
            proof_module: harness.proof_module,
            proof_debug_flag: harness.proof_debug_flag,
            termination_grace_period: harness.termination_grace_period,
            tools: ToolsConfig {
                converter: ToolCommand::parse("converter", &tools.converter)?,
                interpreter: ToolCommand::parse("interpreter", &tools.interpreter)?,
                prover: ToolCommand::parse("prover", &tools.prover)?,
                runner: ToolCommand::parse("runner", &tools.runner)?,
            },
            markers,
        })
    }

    /// Returns the selected backend.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Returns the schedule name, before conversion to a backend token.
    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    /// Returns the mode name, before conversion to a backend token.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Returns the directory containing the compiled definition for the selected backend.
    pub fn backend_dir(&self) -> Utf8PathBuf {
        self.definitions_dir.join(self.backend.as_str())
    }

    /// Returns the root of the log store.
    pub fn logs_dir(&self) -> &Utf8Path {
        &self.logs_dir
    }

    /// Returns the configured directory for scoped temporary files, if any.
    pub fn temp_dir(&self) -> Option<&Utf8Path> {
        self.temp_dir.as_deref()
    }

    /// Returns the module that proofs are checked against.
    pub fn proof_module(&self) -> &str {
        &self.proof_module
    }

    /// Returns the flag appended to proofs run through test dispatch.
    pub fn proof_debug_flag(&self) -> &str {
        &self.proof_debug_flag
    }

    /// Returns how long a collaborator is given to exit after a shutdown signal is forwarded.
    pub fn termination_grace_period(&self) -> Duration {
        self.termination_grace_period
    }

    /// Returns the path markers used to classify tests.
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub(crate) fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    /// Overrides the backend.
    pub fn set_backend(&mut self, backend: Backend) -> &mut Self {
        self.backend = backend;
        self
    }

    /// Overrides the schedule.
    pub fn set_schedule(&mut self, schedule: impl Into<String>) -> &mut Self {
        self.schedule = schedule.into();
        self
    }

    /// Overrides the mode.
    pub fn set_mode(&mut self, mode: impl Into<String>) -> &mut Self {
        self.mode = mode.into();
        self
    }

    /// Overrides the logs directory.
    pub fn set_logs_dir(&mut self, logs_dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.logs_dir = logs_dir.into();
        self
    }
}

/// The parsed collaborator command lines.
#[derive(Clone, Debug)]
pub(crate) struct ToolsConfig {
    pub(crate) converter: ToolCommand,
    pub(crate) interpreter: ToolCommand,
    pub(crate) prover: ToolCommand,
    pub(crate) runner: ToolCommand,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HarnessConfigDeserialize {
    harness: HarnessSection,
    tools: ToolsSection,
    markers: Markers,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HarnessSection {
    backend: Backend,
    schedule: String,
    mode: String,
    definitions_dir: Utf8PathBuf,
    logs_dir: Utf8PathBuf,
    #[serde(default)]
    temp_dir: Option<Utf8PathBuf>,
    proof_module: String,
    proof_debug_flag: String,
    #[serde(with = "humantime_serde")]
    termination_grace_period: Duration,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ToolsSection {
    converter: String,
    interpreter: String,
    prover: String,
    runner: String,
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    /// Builds a config from the defaults plus `toml`.
    pub(crate) fn config_from_toml(toml: &str) -> HarnessConfig {
        let builder =
            HarnessConfig::make_default_config().add_source(File::from_str(toml, FileFormat::Toml));
        HarnessConfig::build(&builder, Utf8Path::new("test-config.toml"))
            .expect("test config is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_helpers::config_from_toml;

    #[test]
    fn default_config_values() {
        let config = HarnessConfig::default_config().expect("default config is valid");
        assert_eq!(config.backend(), Backend::Llvm);
        assert_eq!(config.schedule(), "ISTANBUL");
        assert_eq!(config.mode(), "NORMAL");
        assert_eq!(config.backend_dir(), Utf8PathBuf::from(".build/defn/llvm"));
        assert_eq!(config.logs_dir(), Utf8Path::new(".build/logs"));
        assert_eq!(config.temp_dir(), None);
        assert_eq!(config.proof_module(), "VERIFICATION");
        assert_eq!(config.proof_debug_flag(), "--debug");
        assert_eq!(config.termination_grace_period(), Duration::from_secs(10));
        assert_eq!(config.markers(), &Markers::default());
        assert_eq!(config.tools().prover.program(), "kprove");
    }

    #[test]
    fn repository_config_overrides_defaults() {
        let config = config_from_toml(indoc! {r#"
            [harness]
            backend = "haskell"
            logs-dir = "out/logs"
            temp-dir = "out/tmp"
            termination-grace-period = "250ms"

            [markers]
            proofs = "specs/"
        "#});
        assert_eq!(config.backend(), Backend::Haskell);
        assert_eq!(config.backend_dir(), Utf8PathBuf::from(".build/defn/haskell"));
        assert_eq!(config.logs_dir(), Utf8Path::new("out/logs"));
        assert_eq!(config.temp_dir(), Some(Utf8Path::new("out/tmp")));
        assert_eq!(
            config.termination_grace_period(),
            Duration::from_millis(250)
        );
        assert_eq!(config.markers().proofs, "specs/");
        assert_eq!(config.markers().interactive, "interactive/");
    }

    #[test]
    fn overrides_apply_last() {
        let mut config = config_from_toml("");
        config
            .set_backend(Backend::Java)
            .set_schedule("BERLIN")
            .set_mode("VMTESTS")
            .set_logs_dir("elsewhere");
        assert_eq!(config.backend_dir(), Utf8PathBuf::from(".build/defn/java"));
        assert_eq!(config.schedule(), "BERLIN");
        assert_eq!(config.mode(), "VMTESTS");
        assert_eq!(config.logs_dir(), Utf8Path::new("elsewhere"));
    }

    #[test]
    fn from_sources_reads_repository_config() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        std::fs::create_dir_all(dir.path().join(".config")).expect("created .config");
        std::fs::write(
            dir.path().join(HarnessConfig::CONFIG_PATH),
            "[harness]\nschedule = \"LONDON\"\n",
        )
        .expect("wrote config");

        let config = HarnessConfig::from_sources(dir.path(), None).expect("config is valid");
        assert_eq!(config.schedule(), "LONDON");
    }

    #[test]
    fn from_sources_without_repository_config() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let config = HarnessConfig::from_sources(dir.path(), None).expect("config is valid");
        assert_eq!(config.schedule(), "ISTANBUL");
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let missing = dir.path().join("missing.toml");
        let err = HarnessConfig::from_sources(dir.path(), Some(&missing))
            .expect_err("missing config file is an error");
        assert_eq!(err.config_file(), &missing);
        assert!(
            matches!(err.kind(), ConfigParseErrorKind::BuildError(_)),
            "unexpected error kind: {:?}",
            err.kind()
        );
    }

    #[test]
    fn invalid_backend_reports_path() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let file = dir.path().join("ktest.toml");
        std::fs::write(&file, "[harness]\nbackend = \"ocaml\"\n").expect("wrote config");

        let err = HarnessConfig::from_sources(dir.path(), Some(&file))
            .expect_err("unknown backend is an error");
        match err.kind() {
            ConfigParseErrorKind::DeserializeError(error) => {
                assert_eq!(error.path().to_string(), "harness.backend");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn empty_tool_command_is_rejected() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let file = dir.path().join("ktest.toml");
        std::fs::write(&file, "[tools]\nrunner = \"\"\n").expect("wrote config");

        let err = HarnessConfig::from_sources(dir.path(), Some(&file))
            .expect_err("empty tool command is an error");
        assert!(
            matches!(
                err.kind(),
                ConfigParseErrorKind::EmptyToolCommand { tool: "runner" }
            ),
            "unexpected error kind: {:?}",
            err.kind()
        );
    }
}
