// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pass/fail/runtime logs shared by every harness invocation.
//!
//! During a run the logs are append-only, and several harness processes may append to them at
//! once. Each record is written with a single `write` call on a file opened in append mode, so
//! records never interleave within a line.
//!
//! [`LogStore::normalize`] is the only read-modify-write operation. It deduplicates and sorts each
//! log, then atomically replaces it. The passing and failing logs are never reconciled with each
//! other: a test that used to fail and now passes appears in both.

use crate::{
    errors::LogStoreError,
    helpers::{capture_rel_path, plural, with_suffix},
};
use atomicwrites::{AllowOverwrite, AtomicFile};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::OpenOptions,
    io::{self, Write},
    time::Duration,
};
use tracing::{debug, warn};

/// The directory holding the logs and the per-test output captures.
#[derive(Clone, Debug)]
pub struct LogStore {
    dir: Utf8PathBuf,
}

impl LogStore {
    /// The file name of the passing log.
    pub const PASSING_FILE_NAME: &'static str = "passing.lastrun";

    /// The file name of the failing log.
    pub const FAILING_FILE_NAME: &'static str = "failing.lastrun";

    /// The file name of the runtime log.
    pub const RUNTIME_FILE_NAME: &'static str = "runtime";

    /// Creates a store rooted at `dir`. Nothing is created on disk until a record is appended.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the root directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the path of the passing log.
    pub fn passing_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::PASSING_FILE_NAME)
    }

    /// Returns the path of the failing log.
    pub fn failing_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::FAILING_FILE_NAME)
    }

    /// Returns the path of the runtime log.
    pub fn runtime_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::RUNTIME_FILE_NAME)
    }

    /// Returns the stdout and stderr capture paths for a test.
    pub fn capture_paths(&self, identifier: &str) -> CapturePaths {
        let base = self.dir.join(capture_rel_path(identifier));
        CapturePaths {
            stdout: with_suffix(&base, ".out"),
            stderr: with_suffix(&base, ".err"),
        }
    }

    /// Records a passing test.
    pub fn append_passing(&self, identifier: &str) -> Result<(), LogStoreError> {
        self.append_line(&self.passing_path(), identifier)
    }

    /// Records a failing test.
    pub fn append_failing(&self, identifier: &str) -> Result<(), LogStoreError> {
        self.append_line(&self.failing_path(), identifier)
    }

    /// Records how long a test took.
    pub fn append_runtime(&self, record: &RuntimeRecord) -> Result<(), LogStoreError> {
        self.append_line(&self.runtime_path(), &record.to_string())
    }

    fn append_line(&self, path: &Utf8Path, line: &str) -> Result<(), LogStoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|error| LogStoreError::CreateDir {
            path: self.dir.clone(),
            error,
        })?;

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        debug!("appending `{line}` to {path}");
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|error| LogStoreError::Append {
                path: path.to_owned(),
                error,
            })?;
        file.write_all(record.as_bytes())
            .map_err(|error| LogStoreError::Append {
                path: path.to_owned(),
                error,
            })
    }

    /// Returns the entries of the failing log, in file order, with duplicates and blank lines
    /// removed.
    ///
    /// A missing failing log has no entries.
    pub fn read_failing(&self) -> Result<Vec<String>, LogStoreError> {
        let path = self.failing_path();
        let Some(contents) = read_if_exists(&path)? else {
            return Ok(Vec::new());
        };

        let mut seen = BTreeSet::new();
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| seen.insert(*line))
            .map(str::to_owned)
            .collect())
    }

    /// Deduplicates and sorts every log that exists.
    ///
    /// The passing and failing logs are sorted bytewise. The runtime log is keyed by identifier:
    /// the first record for each identifier is kept, and records are sorted by identifier.
    /// Normalizing twice has the same effect as normalizing once.
    pub fn normalize(&self) -> Result<NormalizeSummary, LogStoreError> {
        let summary = NormalizeSummary {
            passing: self.normalize_one(&self.passing_path(), normalize_set)?,
            failing: self.normalize_one(&self.failing_path(), normalize_set)?,
            runtime: self.normalize_one(&self.runtime_path(), normalize_runtime)?,
        };
        Ok(summary)
    }

    fn normalize_one(
        &self,
        path: &Utf8Path,
        normalize: fn(&str) -> NormalizedLog,
    ) -> Result<Option<LogSummary>, LogStoreError> {
        let Some(contents) = read_if_exists(path)? else {
            debug!("{path} does not exist, skipping");
            return Ok(None);
        };

        let normalized = normalize(&contents);
        let atomic_file = AtomicFile::new(path, AllowOverwrite);
        atomic_file
            .write(|f| f.write_all(normalized.contents.as_bytes()))
            .map_err(|error| LogStoreError::Rewrite {
                path: path.to_owned(),
                error,
            })?;

        let summary = LogSummary {
            before: normalized.before,
            after: normalized.after,
        };
        debug!("normalized {path}: {summary}");
        Ok(Some(summary))
    }
}

/// Where a test's output is captured.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapturePaths {
    /// The `.out` file.
    pub stdout: Utf8PathBuf,

    /// The `.err` file.
    pub stderr: Utf8PathBuf,
}

/// What [`LogStore::normalize`] did to each log. `None` means the log did not exist.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NormalizeSummary {
    /// The passing log.
    pub passing: Option<LogSummary>,

    /// The failing log.
    pub failing: Option<LogSummary>,

    /// The runtime log.
    pub runtime: Option<LogSummary>,
}

/// Entry counts for a single normalized log.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LogSummary {
    /// Non-blank lines before normalization.
    pub before: usize,

    /// Entries after normalization.
    pub after: usize,
}

impl fmt::Display for LogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let removed = self.before - self.after;
        write!(
            f,
            "{} {} ({} duplicate {} removed)",
            self.after,
            plural::entries_str(self.after),
            removed,
            plural::lines_str(removed),
        )
    }
}

/// A parsed line of the runtime log.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeRecord {
    /// How long the test took, in seconds.
    pub elapsed: f64,

    /// The test identifier.
    pub identifier: String,
}

impl RuntimeRecord {
    /// Creates a record from a measured duration.
    pub fn new(elapsed: Duration, identifier: impl Into<String>) -> Self {
        Self {
            elapsed: elapsed.as_secs_f64(),
            identifier: identifier.into(),
        }
    }

    /// Parses a line of the form `<elapsed> <identifier>`.
    ///
    /// Returns `None` if the line has no space or the elapsed field is not a non-negative number.
    pub fn parse(line: &str) -> Option<Self> {
        let (elapsed, identifier) = line.split_once(' ')?;
        let elapsed: f64 = elapsed.parse().ok()?;
        (elapsed.is_finite() && elapsed >= 0.0).then(|| Self {
            elapsed,
            identifier: identifier.to_owned(),
        })
    }
}

impl fmt::Display for RuntimeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.elapsed, self.identifier)
    }
}

struct NormalizedLog {
    contents: String,
    before: usize,
    after: usize,
}

fn non_blank_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents.lines().filter(|line| !line.trim().is_empty())
}

fn normalize_set(contents: &str) -> NormalizedLog {
    let mut before = 0;
    let unique: BTreeSet<&str> = non_blank_lines(contents).inspect(|_| before += 1).collect();
    NormalizedLog {
        contents: join_lines(unique.iter().copied()),
        before,
        after: unique.len(),
    }
}

// The sort key is everything after the first space, or the whole line if there is none.
fn runtime_key(line: &str) -> &str {
    line.split_once(' ').map_or(line, |(_, identifier)| identifier)
}

fn normalize_runtime(contents: &str) -> NormalizedLog {
    let mut before = 0;
    let mut by_identifier = BTreeMap::new();
    for line in non_blank_lines(contents) {
        before += 1;
        by_identifier.entry(runtime_key(line)).or_insert(line);
    }
    NormalizedLog {
        contents: join_lines(by_identifier.values().copied()),
        before,
        after: by_identifier.len(),
    }
}

fn join_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Reads a log, replacing bytes that aren't UTF-8 so that a stray record can't make the whole log
/// unreadable.
fn read_if_exists(path: &Utf8Path) -> Result<Option<String>, LogStoreError> {
    match std::fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) => {
                warn!("{path} contains invalid UTF-8, replacing invalid bytes");
                Ok(Some(String::from_utf8_lossy(error.as_bytes()).into_owned()))
            }
        },
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(LogStoreError::Read {
            path: path.to_owned(),
            error,
        }),
    }
}
