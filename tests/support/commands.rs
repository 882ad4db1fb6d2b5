//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// A skiff command pointed at this environment's config.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("skiff").expect("failed to find skiff binary");
        cmd.env("SKIFF_CONFIG", self.config_path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("SKIFF_LOG");
        cmd.current_dir(self.dir.path());
        cmd
    }

    fn output(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to run skiff {:?}: {}", args, e))
    }

    /// Shortcut for `skiff run`.
    pub fn run(&self) -> Output {
        self.output(&["run"])
    }

    /// Shortcut for `skiff bootstrap`.
    pub fn bootstrap(&self) -> Output {
        self.output(&["bootstrap"])
    }

    /// Shortcut for `skiff enable`.
    pub fn enable(&self) -> Output {
        self.output(&["enable"])
    }

    /// Shortcut for `skiff notify --exit-code <code>`.
    pub fn notify(&self, code: &str) -> Output {
        self.output(&["notify", "--exit-code", code])
    }

    /// Shortcut for `skiff check`.
    pub fn check(&self) -> Output {
        self.output(&["check"])
    }
}
