//! Common test utilities for deckhand integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/deckhand/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with an isolated data directory.
///
/// The `dh()` method returns a `Command` that sets `DH_DATA_DIR`
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize the tracker.
    pub fn init() -> Self {
        let env = Self::new();
        env.dh().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the dh binary with the isolated data directory.
    pub fn dh(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_dh"));
        cmd.env("DH_DATA_DIR", self.data_dir.path());
        cmd
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
