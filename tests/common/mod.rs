//! Common test utilities for Berth CLI tests.
//!
//! Provides `TestEnv` - an isolated environment with a temp directory for
//! the target checkout, log file and config file, plus helpers to run the
//! berth binary.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Result of running a Berth CLI command
#[derive(Debug)]
pub struct TestResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    /// Combine stdout and stderr
    #[allow(dead_code)]
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Isolated test environment rooted in a temp directory.
pub struct TestEnv {
    pub root: TempDir,
    berth_bin: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create temp dir"),
            berth_bin: PathBuf::from(env!("CARGO_BIN_EXE_berth")),
        }
    }

    /// Get path relative to the environment root
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    /// Write a config file pointing target dir and log file into the
    /// environment root, and return its path.
    pub fn write_config(&self) -> PathBuf {
        let config = format!(
            r#"
[repo]
url = "https://git.example.com/site.git"
branch = "main"

[deploy]
target_dir = "{target}"
user = "deploy"

[log]
file = "{log}"

[retry]
attempts = 2
delay_secs = 0
"#,
            target = self.path("site").display(),
            log = self.path("berth.log").display(),
        );

        let path = self.path("berth.toml");
        std::fs::write(&path, config).expect("Failed to write config");
        path
    }

    /// Run berth in this environment
    pub fn run(&self, args: &[&str]) -> TestResult {
        let output = Command::new(&self.berth_bin)
            .current_dir(self.root.path())
            .args(args)
            .output()
            .expect("Failed to execute berth");

        output_to_result(output)
    }
}

fn output_to_result(output: Output) -> TestResult {
    TestResult {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// Whether the test process itself runs as root. Tests that depend on the
/// privilege check branch on this instead of assuming a uid.
#[allow(dead_code)]
pub fn is_root() -> bool {
    let output = Command::new("id").arg("-u").output().expect("id -u failed");
    String::from_utf8_lossy(&output.stdout).trim() == "0"
}
