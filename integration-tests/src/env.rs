// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Environment variables that would let the outer environment change ktest's behavior.
///
/// These are removed from every ktest invocation made by the tests.
pub const OVERRIDE_VARS: &[&str] = &[
    "KTEST_CONFIG_FILE",
    "KTEST_BACKEND",
    "KTEST_SCHEDULE",
    "KTEST_MODE",
    "KTEST_LOGS_DIR",
    "KTEST_LOG",
];

/// Environment variables set on every ktest invocation made by the tests.
pub fn test_env() -> Vec<(&'static str, &'static str)> {
    // ANSI color codes would interfere with output comparisons.
    vec![("KTEST_COLOR", "never")]
}
