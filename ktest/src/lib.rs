// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A test harness for interpreter and prover test suites.
//!
//! `ktest` picks a strategy for each test file from its path, runs the configured collaborator
//! commands, and keeps pass/fail/runtime logs that CI jobs can merge and sort. The core logic
//! lives in the `ktest-runner` crate; this crate is the command-line front end.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
