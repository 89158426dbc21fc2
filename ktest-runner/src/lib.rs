// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [ktest](https://crates.io/crates/ktest): classifying test files,
//! running them against the external interpreter and prover, capturing their output, and
//! maintaining the pass/fail/runtime logs used by CI.
//!
//! The basic flow is:
//!
//! 1. [`classify::Strategy::classify`] picks an execution strategy from the test path.
//! 2. [`strategy::StrategyRunner`] runs that strategy, spawning collaborators through
//!    [`capture`].
//! 3. [`profile::ProfilingRunner`] times the run and records the outcome in the
//!    [`log_store::LogStore`].

pub mod capture;
pub mod classify;
pub mod config;
pub mod diff;
pub mod errors;
pub mod exit_codes;
mod helpers;
pub mod log_store;
pub mod profile;
pub mod sampler;
pub mod signal;
mod stopwatch;
pub mod strategy;
pub mod test_command;
