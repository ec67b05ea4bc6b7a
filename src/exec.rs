//! Subprocess invocation layer.
//!
//! All external commands flow through the [`CommandRunner`] trait so the
//! deployment state machine can be exercised in tests without root, git or
//! a network. The identity a command runs under is part of the command
//! description itself: checkout-mutating git operations carry the deploy
//! user, everything else runs as the invoking (root) identity.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{BerthError, BerthResult};

/// OS identity a command executes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The identity that invoked berth (root in production)
    Invoker,
    /// A named user, entered via `sudo -u`
    User(String),
}

/// A fully-described subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub identity: Identity,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            identity: Identity::Invoker,
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn as_user(mut self, name: &str) -> Self {
        self.identity = Identity::User(name.to_string());
        self
    }

    /// Rendered command line, used in log and error messages.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Program and argument list after identity expansion.
    fn resolved(&self) -> (String, Vec<String>) {
        match &self.identity {
            Identity::Invoker => (self.program.clone(), self.args.clone()),
            Identity::User(name) => {
                let mut args = vec![
                    "-u".to_string(),
                    name.clone(),
                    "--".to_string(),
                    self.program.clone(),
                ];
                args.extend(self.args.iter().cloned());
                ("sudo".to_string(), args)
            }
        }
    }
}

/// Captured result of a completed subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Abstract subprocess runner.
///
/// `run` blocks until the command completes. A non-zero exit is an `Ok`
/// with `success() == false`; only spawn failures are `Err`.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> BerthResult<CommandOutput>;
}

/// Runner backed by `std::process::Command`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> BerthResult<CommandOutput> {
        let (program, args) = spec.resolved();

        let mut cmd = Command::new(&program);
        cmd.args(&args).stdin(Stdio::null());

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run a command, converting an unsuccessful exit into a fatal error.
pub fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> BerthResult<CommandOutput> {
    let output = runner.run(spec)?;

    if !output.success() {
        return Err(BerthError::CommandFailed {
            program: spec.display(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

/// Check whether `program` is runnable by asking it for its version.
pub fn probe(runner: &dyn CommandRunner, program: &str) -> bool {
    let spec = CommandSpec::new(program).arg("--version");
    runner
        .run(&spec)
        .map(|output| output.success())
        .unwrap_or(false)
}

/// Mock runner for testing
///
/// Records every invocation and answers from scripted rules. Uses
/// `Arc<Mutex<>>` internally so it can be cloned and shared.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockRunner {
    calls: std::sync::Arc<std::sync::Mutex<Vec<CommandSpec>>>,
    rules: std::sync::Arc<std::sync::Mutex<Vec<MockRule>>>,
}

#[cfg(test)]
struct MockRule {
    needle: String,
    outcomes: std::collections::VecDeque<CommandOutput>,
}

#[cfg(test)]
impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script responses for commands whose rendered line contains `needle`.
    /// Responses are consumed in order; the last one repeats forever.
    pub fn respond(&self, needle: &str, outcomes: Vec<CommandOutput>) {
        let mut rules = self.rules.lock().unwrap();
        rules.push(MockRule {
            needle: needle.to_string(),
            outcomes: outcomes.into(),
        });
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines of every recorded call, in order.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(|spec| spec.display()).collect()
    }
}

#[cfg(test)]
pub fn ok() -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[cfg(test)]
pub fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[cfg(test)]
impl CommandRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> BerthResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let line = spec.display();
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if line.contains(&rule.needle) {
                // Consume from the front, keep the final outcome sticky
                let output = if rule.outcomes.len() > 1 {
                    rule.outcomes.pop_front().unwrap()
                } else {
                    rule.outcomes.front().cloned().unwrap_or_else(ok)
                };
                return Ok(output);
            }
        }

        // Unscripted commands succeed silently
        Ok(ok())
    }
}
