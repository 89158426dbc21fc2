// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Picking random failing tests to look at.

use crate::{errors::LogStoreError, log_store::LogStore};
use rand::seq::SliceRandom;

/// The number of failures returned when no count is given.
pub const DEFAULT_SAMPLE_SIZE: usize = 1;

/// Returns up to `count` distinct identifiers from the failing log, chosen uniformly at random.
///
/// A missing or empty failing log produces an empty sample.
pub fn sample_failing(store: &LogStore, count: usize) -> Result<Vec<String>, LogStoreError> {
    let failing = store.read_failing()?;
    Ok(sample(failing, count))
}

fn sample(mut entries: Vec<String>, count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    entries.shuffle(&mut rand::rng());
    entries.truncate(count);
    entries
}
