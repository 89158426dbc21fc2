// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command dispatch and execution.

mod app;
mod clap_error;
mod common;
mod imp;

pub use app::KtestApp;
pub(crate) use clap_error::EarlyArgs;
pub use imp::main_impl;
