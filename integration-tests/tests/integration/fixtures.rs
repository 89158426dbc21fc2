// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use integration_tests::ktest_cli::{KtestCli, quote_tool};

pub fn ktest_bin() -> &'static str {
    env!("CARGO_BIN_EXE_ktest-dup")
}

pub fn fake_tool_bin() -> &'static Utf8Path {
    Utf8Path::new(env!("CARGO_BIN_EXE_fake-tool"))
}

/// A scratch repository whose config points every collaborator at `fake-tool`.
pub struct TestWorkspace {
    dir: Utf8TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = Utf8TempDir::with_prefix("ktest-it-").expect("temp dir created");
        let workspace = Self { dir };
        workspace.write_config("");
        std::fs::create_dir(workspace.path("tmp")).expect("created tmp");
        workspace
    }

    pub fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> Utf8PathBuf {
        self.dir.path().join(rel)
    }

    /// Writes `.config/ktest.toml`, with `extra` appended to the `[harness]` table.
    pub fn write_config(&self, extra: &str) {
        let fake = fake_tool_bin();
        let config = format!(
            "[harness]\n\
             logs-dir = \"logs\"\n\
             temp-dir = \"tmp\"\n\
             termination-grace-period = \"5s\"\n\
             {extra}\n\
             [tools]\n\
             converter = '''{}'''\n\
             interpreter = '''{}'''\n\
             prover = '''{}'''\n\
             runner = '''{}'''\n",
            quote_tool(fake, "convert"),
            quote_tool(fake, "interpret"),
            quote_tool(fake, "prove"),
            quote_tool(fake, "run"),
        );
        self.write(".config/ktest.toml", &config);
    }

    pub fn write(&self, rel: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("created parent dir");
        }
        std::fs::write(&path, contents).expect("wrote file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).unwrap_or_else(|err| panic!("reading {rel}: {err}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn temp_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.path("tmp"))
            .expect("read tmp")
            .next()
            .is_none()
    }

    pub fn cli(&self) -> KtestCli {
        let mut cli = KtestCli::new(ktest_bin());
        cli.current_dir(self.root());
        cli
    }
}
