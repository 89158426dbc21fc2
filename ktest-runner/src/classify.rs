// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting an execution strategy from a test's path.
//!
//! Test corpora are laid out so that the directory a test lives in says how it should be run.
//! Classification is a pure function of the path and the configured [`Markers`], so it can be
//! tested without running anything.

use serde::Deserialize;
use std::fmt;

/// The way a single test file is executed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Strategy {
    /// Run the prover on the file, with the debug flag appended.
    Proof,

    /// Run the interactive runner on the file and diff its output against an expected-output
    /// file on failure.
    Interactive,

    /// Convert the file to the interpreter's input format and run the fast interpreter on it.
    FastInterpret,
}

impl Strategy {
    /// Selects the strategy for `test_path`.
    ///
    /// The proofs marker wins over the interactive marker, and anything matching neither is run
    /// through the fast interpreter.
    pub fn classify(test_path: &str, markers: &Markers) -> Self {
        // Windows-style separators are matched as if they were forward slashes.
        let normalized = test_path.replace('\\', "/");
        if normalized.contains(markers.proofs.as_str()) {
            Strategy::Proof
        } else if normalized.contains(markers.interactive.as_str()) {
            Strategy::Interactive
        } else {
            Strategy::FastInterpret
        }
    }

    /// Returns a short, stable name for this strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Proof => "proof",
            Strategy::Interactive => "interactive",
            Strategy::FastInterpret => "fast-interpret",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path substrings that select a [`Strategy`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Markers {
    /// Paths containing this substring are proofs.
    pub proofs: String,

    /// Paths containing this substring (and not the proofs marker) are interactive tests.
    pub interactive: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            proofs: "proofs/".to_owned(),
            interactive: "interactive/".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test_case("tests/specs/proofs/sum-spec.k", Strategy::Proof; "proof")]
    #[test_case("tests/interactive/add.evm", Strategy::Interactive; "interactive")]
    #[test_case("tests/ethereum-tests/VMTests/add0.json", Strategy::FastInterpret; "fallback")]
    #[test_case("tests/interactive/proofs/x.k", Strategy::Proof; "proofs wins over interactive")]
    #[test_case("tests/proofs/interactive/x.k", Strategy::Proof; "proofs wins regardless of order")]
    #[test_case("tests\\interactive\\add.evm", Strategy::Interactive; "backslash separators")]
    #[test_case("tests/proofs", Strategy::FastInterpret; "marker needs trailing slash")]
    #[test_case("myproofs/a.k", Strategy::Proof; "substring match")]
    fn classify_default_markers(path: &str, expected: Strategy) {
        assert_eq!(Strategy::classify(path, &Markers::default()), expected);
    }

    #[test]
    fn classify_custom_markers() {
        let markers = Markers {
            proofs: "specs/".to_owned(),
            interactive: "repl/".to_owned(),
        };
        assert_eq!(
            Strategy::classify("tests/specs/a.k", &markers),
            Strategy::Proof
        );
        assert_eq!(
            Strategy::classify("tests/repl/a.evm", &markers),
            Strategy::Interactive
        );
        assert_eq!(
            Strategy::classify("tests/proofs/a.k", &markers),
            Strategy::FastInterpret
        );
    }

    #[proptest]
    fn proofs_marker_always_wins(prefix: String, middle: String, suffix: String) {
        let markers = Markers::default();
        for path in [
            format!("{prefix}proofs/{middle}interactive/{suffix}"),
            format!("{prefix}interactive/{middle}proofs/{suffix}"),
            format!("{prefix}proofs/{suffix}"),
        ] {
            assert_eq!(Strategy::classify(&path, &markers), Strategy::Proof);
        }
    }

    #[proptest]
    fn interactive_without_proofs(prefix: String, suffix: String) {
        let markers = Markers::default();
        let path = format!("{prefix}interactive/{suffix}");
        let expected = if path.replace('\\', "/").contains("proofs/") {
            Strategy::Proof
        } else {
            Strategy::Interactive
        };
        assert_eq!(Strategy::classify(&path, &markers), expected);
    }
}
