//! Test support utilities for skiff integration tests.
//!
//! Each [`Test`] owns a temp directory holding a config file, fake `oci`,
//! `rclone` and `systemctl` scripts, and the state those scripts read and
//! record. Nothing outside the temp directory is touched, so tests can run
//! in parallel.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated test environment.
pub struct Test {
    pub dir: TempDir,
}

impl Test {
    /// Environment with fake tools installed and no config written yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let t = Self { dir };
        t.install_fake_tools();
        t
    }

    /// Environment with two valid secrets and the default config.
    pub fn ready() -> Self {
        let t = Self::new();
        t.secret("key-id", "AKIAEXAMPLE\n");
        t.secret("secret-key", "wJalrXUtnFEMI/K7MDENG\n");
        t.write_config("");
        t
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("skiff.toml")
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).unwrap_or_default()
    }
}
