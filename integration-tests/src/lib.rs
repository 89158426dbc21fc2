// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for ktest's integration tests.

pub mod env;
pub mod ktest_cli;
