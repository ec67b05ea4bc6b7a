//! Privilege and dependency checks that run before any mutation.
//!
//! Two consumers: the deployment path calls [`ensure_root`] and
//! [`ensure_git`] (which installs git when a known package manager is
//! present), and the `doctor` command evaluates the same conditions
//! read-only into a [`PreflightReport`].

use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::exec::{probe, run_checked, CommandRunner, CommandSpec};
use crate::logger::Logger;
use crate::repo::{detect_state, RepoState};

/// Package managers berth knows how to install git with, in probe order.
pub const PACKAGE_MANAGERS: &[&str] = &["apt-get", "yum"];

/// Effective uid of the current process.
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no failure modes and touches no memory
    unsafe { libc::geteuid() as u32 }
}

/// Deployment must run as root: it chowns the checkout and switches to the
/// deploy user for every mutating git command.
pub fn ensure_root() -> BerthResult<()> {
    let uid = effective_uid();
    if uid != 0 {
        return Err(BerthError::NotRoot { uid });
    }
    Ok(())
}

/// Ensure git is installed, installing it when a package manager is found.
pub fn ensure_git(runner: &dyn CommandRunner, logger: &Logger) -> BerthResult<()> {
    if probe(runner, "git") {
        return Ok(());
    }

    logger.log("git not found, attempting installation");

    let Some(manager) = PACKAGE_MANAGERS.iter().find(|m| probe(runner, m)) else {
        return Err(BerthError::MissingDependency {
            tool: "git".to_string(),
        });
    };

    let install = CommandSpec::new(manager).args(["install", "-y", "git"]);
    run_checked(runner, &install).map_err(|e| BerthError::InstallFailed {
        tool: "git".to_string(),
        detail: e.to_string(),
    })?;

    logger.log(&format!("installed git via {manager}"));
    Ok(())
}

/// Status of a single preflight check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

/// One evaluated preflight condition
#[derive(Debug, Clone)]
pub struct PreflightCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

/// Doctor validation results
#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub checks: Vec<PreflightCheck>,
}

impl PreflightReport {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    fn add(&mut self, name: &str, status: CheckStatus, message: &str) {
        self.checks.push(PreflightCheck {
            name: name.to_string(),
            status,
            message: message.to_string(),
        });
    }

    pub fn add_pass(&mut self, name: &str, message: &str) {
        self.add(name, CheckStatus::Pass, message);
    }

    pub fn add_warning(&mut self, name: &str, message: &str) {
        self.add(name, CheckStatus::Warning, message);
    }

    pub fn add_error(&mut self, name: &str, message: &str) {
        self.add(name, CheckStatus::Error, message);
    }

    pub fn passes(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Pass)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warning)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Error)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.errors() == 0
    }
}

/// Evaluate every preflight condition without mutating anything.
pub fn run_doctor(config: &Config, runner: &dyn CommandRunner) -> PreflightReport {
    let mut report = PreflightReport::new();

    check_privilege(&mut report);
    check_git(runner, &mut report);
    check_target(config, &mut report);
    check_log_path(config, &mut report);

    report
}

fn check_privilege(report: &mut PreflightReport) {
    let uid = effective_uid();
    if uid == 0 {
        report.add_pass("privilege", "running as root");
    } else {
        report.add_error(
            "privilege",
            &format!("effective uid is {uid}, deployment requires root"),
        );
    }
}

fn check_git(runner: &dyn CommandRunner, report: &mut PreflightReport) {
    if probe(runner, "git") {
        report.add_pass("git", "git is installed");
        return;
    }

    match PACKAGE_MANAGERS.iter().find(|m| probe(runner, m)) {
        Some(manager) => report.add_warning(
            "git",
            &format!("git is missing, will be installed via {manager} on deploy"),
        ),
        None => report.add_error(
            "git",
            "git is missing and neither apt-get nor yum is available",
        ),
    }
}

fn check_target(config: &Config, report: &mut PreflightReport) {
    let dir = &config.deploy.target_dir;
    match detect_state(dir) {
        RepoState::Initialized => report.add_pass(
            "target",
            &format!("{} is an initialized checkout, deploy will fetch and reset", dir.display()),
        ),
        RepoState::Absent => report.add_pass(
            "target",
            &format!("{} has no checkout yet, deploy will initialize it", dir.display()),
        ),
    }
}

fn check_log_path(config: &Config, report: &mut PreflightReport) {
    let file = &config.log.file;
    match file.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => {
            report.add_pass("log", &format!("log directory for {} exists", file.display()));
        }
        Some(parent) => report.add_warning(
            "log",
            &format!("log directory {} is missing, it will be created", parent.display()),
        ),
        None => report.add_warning("log", "log file path has no parent directory"),
    }
}
