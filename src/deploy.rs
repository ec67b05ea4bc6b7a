//! Deployment state machine: setup-or-update against the remote branch.
//!
//! Two states, keyed off the target directory:
//!
//! - `Absent`: create the directory, hand it to the deploy user,
//!   initialize a sparse non-cone checkout, fetch, force-checkout.
//! - `Initialized`: fetch, hard-reset to the remote ref.
//!
//! Re-entry is idempotent: an initialized checkout only ever takes the
//! fetch-and-reset path, so the remote is never registered twice. On any
//! fatal error the target directory is left in whatever partial state the
//! last successful step produced; there is no rollback.

use std::fs;

use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::exec::{run_checked, CommandRunner, CommandSpec};
use crate::logger::Logger;
use crate::preflight;
use crate::repo::{detect_state, Checkout, RepoState};
use crate::retry::run_with_retry;

/// Summary of a completed deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOutcome {
    /// State the target directory was in before this run
    pub state_before: RepoState,
    /// Fetch attempts spent, including the successful one
    pub fetch_attempts: u32,
}

/// Run a full deployment: preflight, then the state-machine branch.
pub fn run(
    config: &Config,
    logger: &Logger,
    runner: &dyn CommandRunner,
) -> BerthResult<DeployOutcome> {
    if let Err(e) = preflight::ensure_root() {
        logger.error(&e.to_string());
        return Err(e);
    }

    if let Err(e) = preflight::ensure_git(runner, logger) {
        logger.error(&e.to_string());
        return Err(e);
    }

    let result = execute(config, logger, runner);

    match &result {
        Ok(outcome) => {
            logger.log(&format!(
                "deployment complete ({} fetch attempt(s))",
                outcome.fetch_attempts
            ));
        }
        // The retry wrapper has already written its own summary line.
        Err(BerthError::RetriesExhausted { .. }) => {}
        Err(e) => logger.error(&e.to_string()),
    }

    result
}

/// The state-machine core, past preflight. Split out so the setup and
/// update paths are testable without root privileges.
pub fn execute(
    config: &Config,
    logger: &Logger,
    runner: &dyn CommandRunner,
) -> BerthResult<DeployOutcome> {
    let state_before = detect_state(&config.deploy.target_dir);

    let fetch_attempts = match state_before {
        RepoState::Absent => initialize(config, logger, runner)?,
        RepoState::Initialized => update(config, logger, runner)?,
    };

    Ok(DeployOutcome {
        state_before,
        fetch_attempts,
    })
}

/// Absent path: create and chown the directory, then build the sparse
/// checkout from scratch.
fn initialize(config: &Config, logger: &Logger, runner: &dyn CommandRunner) -> BerthResult<u32> {
    let dir = &config.deploy.target_dir;
    let user = &config.deploy.user;

    logger.log(&format!("initializing checkout in {}", dir.display()));

    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    // Ownership moves to the deploy user before any git metadata exists,
    // so everything git writes below belongs to that user.
    let chown = CommandSpec::new("chown")
        .arg("-R")
        .arg(user)
        .arg(&dir.display().to_string());
    run_checked(runner, &chown)?;

    let checkout = Checkout::new(dir, user);
    checkout.init(runner)?;
    checkout.remote_add(runner, &config.repo.url)?;
    checkout.enable_sparse_checkout(runner)?;

    let attempts = fetch_with_retry(config, logger, runner, &checkout)?;
    checkout.checkout(runner, &config.repo.branch)?;

    Ok(attempts)
}

/// Initialized path: fetch and hard-reset, discarding local changes.
fn update(config: &Config, logger: &Logger, runner: &dyn CommandRunner) -> BerthResult<u32> {
    let dir = &config.deploy.target_dir;

    logger.log(&format!("updating checkout in {}", dir.display()));

    let checkout = Checkout::new(dir, &config.deploy.user);
    let attempts = fetch_with_retry(config, logger, runner, &checkout)?;
    checkout.reset_hard(runner, &config.repo.branch)?;

    Ok(attempts)
}

/// Only the fetch is retried; checkout and reset fail fast. The network
/// step is the only one treated as transient.
fn fetch_with_retry(
    config: &Config,
    logger: &Logger,
    runner: &dyn CommandRunner,
    checkout: &Checkout<'_>,
) -> BerthResult<u32> {
    let mut attempts = 0u32;

    run_with_retry(config.retry.policy(), logger, "fetch", || {
        attempts += 1;
        checkout
            .fetch(runner, &config.repo.branch)
            .map_err(|e| e.to_string())
    })?;

    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{failed, ok, Identity, MockRunner};
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.deploy.target_dir = root.join("site");
        config.deploy.user = "deploy".to_string();
        config.log.file = root.join("berth.log");
        config.repo.url = "https://git.example.com/site.git".to_string();
        config.repo.branch = "main".to_string();
        config.retry.delay_secs = 0;
        config
    }

    fn test_logger(dir: &TempDir) -> Logger {
        Logger::open(&dir.path().join("berth.log"), false).unwrap()
    }

    fn warning_lines(dir: &TempDir) -> usize {
        std::fs::read_to_string(dir.path().join("berth.log"))
            .unwrap_or_default()
            .lines()
            .filter(|line| line.contains("WARNING:"))
            .count()
    }

    #[test]
    fn test_absent_target_runs_full_initialization_sequence() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = MockRunner::new();

        let outcome = execute(&config, &test_logger(&dir), &runner).unwrap();

        assert_eq!(outcome.state_before, RepoState::Absent);
        assert_eq!(outcome.fetch_attempts, 1);
        assert!(config.deploy.target_dir.is_dir());

        let lines = runner.call_lines();
        assert_eq!(
            lines,
            vec![
                format!("chown -R deploy {}", config.deploy.target_dir.display()),
                "git init -q".to_string(),
                "git remote add origin https://git.example.com/site.git".to_string(),
                "git sparse-checkout init --no-cone".to_string(),
                "git sparse-checkout set --no-cone _site/*".to_string(),
                "git fetch origin main".to_string(),
                "git checkout -f main".to_string(),
            ]
        );
    }

    #[test]
    fn test_initialization_runs_git_as_deploy_user_and_chown_as_invoker() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = MockRunner::new();

        execute(&config, &test_logger(&dir), &runner).unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].identity, Identity::Invoker);
        for call in &calls[1..] {
            assert_eq!(call.identity, Identity::User("deploy".to_string()));
        }
    }

    #[test]
    fn test_initialized_target_only_fetches_and_resets() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.deploy.target_dir.join(".git")).unwrap();
        let runner = MockRunner::new();

        let outcome = execute(&config, &test_logger(&dir), &runner).unwrap();

        assert_eq!(outcome.state_before, RepoState::Initialized);
        assert_eq!(
            runner.call_lines(),
            vec!["git fetch origin main", "git reset --hard origin/main"]
        );
    }

    #[test]
    fn test_reentry_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.deploy.target_dir.join(".git")).unwrap();
        let runner = MockRunner::new();
        let logger = test_logger(&dir);

        execute(&config, &logger, &runner).unwrap();
        execute(&config, &logger, &runner).unwrap();

        // Two identical fetch+reset rounds, never a second initialization
        assert_eq!(
            runner.call_lines(),
            vec![
                "git fetch origin main",
                "git reset --hard origin/main",
                "git fetch origin main",
                "git reset --hard origin/main",
            ]
        );
    }

    #[test]
    fn test_fetch_recovers_within_attempt_budget() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.deploy.target_dir.join(".git")).unwrap();
        let runner = MockRunner::new();
        runner.respond(
            "git fetch",
            vec![
                failed("timeout"),
                failed("timeout"),
                failed("timeout"),
                failed("timeout"),
                ok(),
            ],
        );

        let outcome = execute(&config, &test_logger(&dir), &runner).unwrap();

        assert_eq!(outcome.fetch_attempts, 5);
        assert_eq!(warning_lines(&dir), 4);
    }

    #[test]
    fn test_fetch_exhaustion_aborts_before_reset() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(config.deploy.target_dir.join(".git")).unwrap();
        let runner = MockRunner::new();
        runner.respond("git fetch", vec![failed("no route to host")]);

        let err = execute(&config, &test_logger(&dir), &runner).unwrap_err();

        assert!(matches!(err, BerthError::RetriesExhausted { .. }));
        assert_eq!(warning_lines(&dir), 5);
        // Reset never ran
        assert!(runner
            .call_lines()
            .iter()
            .all(|line| !line.contains("reset")));
    }

    #[test]
    fn test_checkout_failure_is_fatal_without_retry() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = MockRunner::new();
        runner.respond("git checkout", vec![failed("pathspec error")]);

        let err = execute(&config, &test_logger(&dir), &runner).unwrap_err();

        assert!(matches!(err, BerthError::CommandFailed { .. }));
        // One checkout invocation only; the retry wrapper never saw it
        let checkouts = runner
            .call_lines()
            .iter()
            .filter(|line| line.contains("checkout -f"))
            .count();
        assert_eq!(checkouts, 1);
    }

    #[test]
    fn test_chown_failure_aborts_before_git_runs() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let runner = MockRunner::new();
        runner.respond("chown", vec![failed("no such user")]);

        let err = execute(&config, &test_logger(&dir), &runner).unwrap_err();

        assert!(matches!(err, BerthError::CommandFailed { .. }));
        assert_eq!(runner.calls().len(), 1);
    }
}
