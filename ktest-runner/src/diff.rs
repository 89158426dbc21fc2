// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable diffs between expected and actual output.
//!
//! Lines are compared with all whitespace removed, so output that differs only in spacing or
//! indentation is considered equal. The lines that are printed are the original ones.

use difference::{Changeset, Difference};
use owo_colors::{OwoColorize, Style};
use std::fmt::Write as _;

/// Renders unified-style diffs.
#[derive(Clone, Debug)]
pub struct DiffReporter {
    styles: DiffStyles,
    context: usize,
}

impl Default for DiffReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffReporter {
    /// The number of unchanged lines shown around each change.
    pub const DEFAULT_CONTEXT: usize = 3;

    /// Creates a reporter that produces uncolored output.
    pub fn new() -> Self {
        Self {
            styles: DiffStyles::default(),
            context: Self::DEFAULT_CONTEXT,
        }
    }

    /// Colorizes output.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Returns a diff from `expected` to `actual`, or `None` if the two are equal ignoring
    /// whitespace.
    pub fn render(
        &self,
        expected_label: &str,
        expected: &str,
        actual_label: &str,
        actual: &str,
    ) -> Option<String> {
        let old: Vec<&str> = expected.lines().collect();
        let new: Vec<&str> = actual.lines().collect();
        let old_norm: Vec<String> = old.iter().map(|line| strip_whitespace(line)).collect();
        let new_norm: Vec<String> = new.iter().map(|line| strip_whitespace(line)).collect();
        if old_norm == new_norm {
            return None;
        }

        let ops = line_ops(&old_norm, &new_norm);
        let mut out = String::new();
        _ = writeln!(
            out,
            "{}",
            format_args!("--- {expected_label}").style(self.styles.header)
        );
        _ = writeln!(
            out,
            "{}",
            format_args!("+++ {actual_label}").style(self.styles.header)
        );
        for hunk in hunks(&ops, self.context) {
            self.write_hunk(&mut out, &ops[hunk.start..hunk.end], hunk, &old, &new);
        }
        Some(out)
    }

    fn write_hunk(&self, out: &mut String, ops: &[LineOp], hunk: Hunk, old: &[&str], new: &[&str]) {
        let old_count = ops.iter().filter(|op| op.old_index().is_some()).count();
        let new_count = ops.iter().filter(|op| op.new_index().is_some()).count();
        // Unified diffs number an empty range by the line before it.
        let old_start = if old_count == 0 {
            hunk.old_pos
        } else {
            hunk.old_pos + 1
        };
        let new_start = if new_count == 0 {
            hunk.new_pos
        } else {
            hunk.new_pos + 1
        };
        _ = writeln!(
            out,
            "{}",
            format_args!("@@ -{old_start},{old_count} +{new_start},{new_count} @@")
                .style(self.styles.hunk)
        );

        for op in ops {
            match *op {
                LineOp::Same(i, _) => {
                    _ = writeln!(out, " {}", old[i]);
                }
                LineOp::Removed(i) => {
                    _ = writeln!(
                        out,
                        "{}",
                        format_args!("-{}", old[i]).style(self.styles.removed)
                    );
                }
                LineOp::Added(j) => {
                    _ = writeln!(
                        out,
                        "{}",
                        format_args!("+{}", new[j]).style(self.styles.added)
                    );
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
struct DiffStyles {
    header: Style,
    hunk: Style,
    removed: Style,
    added: Style,
}

impl DiffStyles {
    fn colorize(&mut self) {
        self.header = Style::new().bold();
        self.hunk = Style::new().cyan();
        self.removed = Style::new().red();
        self.added = Style::new().green();
    }
}

fn strip_whitespace(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum LineOp {
    Same(usize, usize),
    Removed(usize),
    Added(usize),
}

impl LineOp {
    fn old_index(self) -> Option<usize> {
        match self {
            Self::Same(i, _) | Self::Removed(i) => Some(i),
            Self::Added(_) => None,
        }
    }

    fn new_index(self) -> Option<usize> {
        match self {
            Self::Same(_, j) | Self::Added(j) => Some(j),
            Self::Removed(_) => None,
        }
    }

    fn is_change(self) -> bool {
        !matches!(self, Self::Same(..))
    }
}

fn line_ops(old: &[String], new: &[String]) -> Vec<LineOp> {
    // Splitting an empty string yields one empty item, so an empty side is handled directly.
    if old.is_empty() {
        return (0..new.len()).map(LineOp::Added).collect();
    }
    if new.is_empty() {
        return (0..old.len()).map(LineOp::Removed).collect();
    }

    // Every line gets a marker so that no line, and no side made of one blank line, is empty
    // once joined.
    let changeset = Changeset::new(&marked(old), &marked(new), "\n");
    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(chunk) => {
                for _ in chunk.split('\n') {
                    if i < old.len() && j < new.len() {
                        ops.push(LineOp::Same(i, j));
                    }
                    i += 1;
                    j += 1;
                }
            }
            Difference::Rem(chunk) => {
                for _ in chunk.split('\n') {
                    if i < old.len() {
                        ops.push(LineOp::Removed(i));
                    }
                    i += 1;
                }
            }
            Difference::Add(chunk) => {
                for _ in chunk.split('\n') {
                    if j < new.len() {
                        ops.push(LineOp::Added(j));
                    }
                    j += 1;
                }
            }
        }
    }
    ops
}

fn marked(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format!("\u{1}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A range of ops plus the number of old and new lines before it.
#[derive(Copy, Clone, Debug)]
struct Hunk {
    start: usize,
    end: usize,
    old_pos: usize,
    new_pos: usize,
}

fn hunks(ops: &[LineOp], context: usize) -> Vec<Hunk> {
    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_change())
        .map(|(idx, _)| idx)
        .collect();

    // Group changes separated by at most 2 * context unchanged lines.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &idx in &changes {
        match ranges.last_mut() {
            Some((_, last)) if idx - *last <= 2 * context + 1 => *last = idx,
            _ => ranges.push((idx, idx)),
        }
    }

    ranges
        .into_iter()
        .map(|(first, last)| {
            let start = first.saturating_sub(context);
            let end = (last + context + 1).min(ops.len());
            let before = &ops[..start];
            Hunk {
                start,
                end,
                old_pos: before.iter().filter(|op| op.old_index().is_some()).count(),
                new_pos: before.iter().filter(|op| op.new_index().is_some()).count(),
            }
        })
        .collect()
}
