// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Options shared by every subcommand.

use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use ktest_runner::{config::HarnessConfig, test_command::Backend};

/// Configuration options for ktest.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Config options")]
pub(crate) struct ConfigOpts {
    /// Config file [default: .config/ktest.toml].
    #[arg(long, global = true, value_name = "PATH", env = "KTEST_CONFIG_FILE")]
    pub(crate) config_file: Option<Utf8PathBuf>,

    /// Backend the definition was compiled with [possible values: llvm, java, haskell].
    #[arg(long, global = true, env = "KTEST_BACKEND")]
    pub(crate) backend: Option<Backend>,

    /// Schedule passed to the interpreter and runner.
    #[arg(long, global = true, env = "KTEST_SCHEDULE")]
    pub(crate) schedule: Option<String>,

    /// Mode passed to the interpreter and runner.
    #[arg(long, global = true, env = "KTEST_MODE")]
    pub(crate) mode: Option<String>,

    /// Directory holding the pass/fail/runtime logs and output captures.
    #[arg(long, global = true, value_name = "DIR", env = "KTEST_LOGS_DIR")]
    pub(crate) logs_dir: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    /// Reads the config relative to the current directory and applies command-line overrides.
    pub(crate) fn make_config(&self) -> Result<HarnessConfig> {
        let mut config =
            HarnessConfig::from_sources(Utf8Path::new("."), self.config_file.as_deref())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut HarnessConfig) {
        if let Some(backend) = self.backend {
            config.set_backend(backend);
        }
        if let Some(schedule) = &self.schedule {
            config.set_schedule(schedule.clone());
        }
        if let Some(mode) = &self.mode {
            config.set_mode(mode.clone());
        }
        if let Some(logs_dir) = &self.logs_dir {
            config.set_logs_dir(logs_dir.clone());
        }
    }
}
