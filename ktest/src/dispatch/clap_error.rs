// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clap error handling.
//!
//! An unknown or missing subcommand is not an error for ktest: the usage text is printed to
//! stdout and ktest exits successfully. Other argument errors are usage errors.
//!
//! The early argument extraction uses clap's own parsing with `ignore_errors` so that `--color`
//! is honored even when the rest of the command line doesn't parse.

use crate::output::Color;
use clap::{ArgAction, Args, Command};
use ktest_runner::exit_codes::HarnessExitCode;
use std::io::Write;

/// Early setup information needed before full CLI parsing.
#[derive(Debug)]
pub(crate) struct EarlySetup {
    /// Early arguments extracted before full parsing.
    pub(crate) early_args: EarlyArgs,
}

impl EarlySetup {
    /// Extracts early args from the command line.
    pub(crate) fn new(cli_args: &[String], app: &Command) -> Self {
        Self {
            early_args: extract_early_args(cli_args, app),
        }
    }
}

/// Early arguments extracted before full CLI parsing.
#[derive(Clone, Debug, Default, Args)]
pub(crate) struct EarlyArgs {
    /// Produce color output: auto, always, never.
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "KTEST_COLOR"
    )]
    pub(crate) color: Color,
}

fn extract_early_args(args: &[String], app: &Command) -> EarlyArgs {
    // Help and version flags would stop parsing early, so replace help with a counter and
    // disable version.
    let early_cmd = app
        .clone()
        .disable_version_flag(true)
        .disable_help_flag(true)
        .arg(
            clap::Arg::new("help")
                .short('h')
                .long("help")
                .global(true)
                .action(ArgAction::Count),
        )
        .ignore_errors(true);

    match early_cmd.try_get_matches_from(args) {
        Ok(matches) => {
            let color = matches
                .try_get_one::<Color>("color")
                .ok()
                .flatten()
                .copied()
                .unwrap_or_default();
            EarlyArgs { color }
        }
        Err(_) => EarlyArgs::default(),
    }
}

/// Handles a clap error.
///
/// Returns the exit code to use.
pub(crate) fn handle_clap_error(err: clap::Error, mut app: Command, early_setup: &EarlySetup) -> i32 {
    use clap::error::ErrorKind;

    let colorize = early_setup
        .early_args
        .color
        .should_colorize(supports_color::Stream::Stdout);

    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let rendered = err.render();
            write_usage(&if colorize {
                rendered.ansi().to_string()
            } else {
                rendered.to_string()
            });
            0
        }
        ErrorKind::InvalidSubcommand | ErrorKind::MissingSubcommand => {
            let rendered = app.render_help();
            write_usage(&if colorize {
                rendered.ansi().to_string()
            } else {
                rendered.to_string()
            });
            0
        }
        ErrorKind::DisplayVersion => {
            _ = err.print();
            0
        }
        _ => {
            _ = err.print();
            HarnessExitCode::USAGE_ERROR
        }
    }
}

fn write_usage(text: &str) {
    let mut stdout = std::io::stdout().lock();
    // A closed stdout isn't worth failing over when printing usage.
    _ = stdout.write_all(text.as_bytes());
    _ = stdout.flush();
}
