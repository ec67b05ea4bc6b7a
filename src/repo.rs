//! Git working-tree operations for the deployment checkout.
//!
//! Every function shells out to the system `git` binary through the
//! [`CommandRunner`] layer. Mutating operations carry the deploy user's
//! identity so the checkout is owned by the serving user, never root.

use std::path::Path;

use crate::error::BerthResult;
use crate::exec::{run_checked, CommandRunner, CommandSpec};

/// The only pattern materialized in the sparse checkout. Everything else
/// in the repository stays absent from disk.
pub const SPARSE_PATTERN: &str = "_site/*";

/// Observable state of the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    /// No directory, or a directory without Git metadata
    Absent,
    /// A Git working tree
    Initialized,
}

/// Classify the target directory. A plain directory without a `.git`
/// metadata subdirectory counts as absent: initialization is what turns
/// it into a working tree.
pub fn detect_state(target_dir: &Path) -> RepoState {
    if target_dir.join(".git").is_dir() {
        RepoState::Initialized
    } else {
        RepoState::Absent
    }
}

/// Handle binding the target directory to the deploy identity.
pub struct Checkout<'a> {
    target_dir: &'a Path,
    user: &'a str,
}

impl<'a> Checkout<'a> {
    pub fn new(target_dir: &'a Path, user: &'a str) -> Self {
        Self { target_dir, user }
    }

    fn git(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("git")
            .args(args)
            .cwd(self.target_dir)
            .as_user(self.user)
    }

    /// `git init` an empty repository in the target directory.
    pub fn init(&self, runner: &dyn CommandRunner) -> BerthResult<()> {
        run_checked(runner, &self.git(&["init", "-q"]))?;
        Ok(())
    }

    /// Register the deployment remote under the fixed name `origin`.
    pub fn remote_add(&self, runner: &dyn CommandRunner, url: &str) -> BerthResult<()> {
        run_checked(runner, &self.git(&["remote", "add", "origin", url]))?;
        Ok(())
    }

    /// Restrict the working tree to [`SPARSE_PATTERN`] in non-cone mode.
    ///
    /// Non-cone mode is required: the pattern matches files under `_site/`,
    /// not a cone of directories, and the sparse-checkout file must end up
    /// containing exactly this one pattern line.
    pub fn enable_sparse_checkout(&self, runner: &dyn CommandRunner) -> BerthResult<()> {
        run_checked(runner, &self.git(&["sparse-checkout", "init", "--no-cone"]))?;
        run_checked(
            runner,
            &self.git(&["sparse-checkout", "set", "--no-cone", SPARSE_PATTERN]),
        )?;
        Ok(())
    }

    /// Fetch the deployment branch from origin.
    pub fn fetch(&self, runner: &dyn CommandRunner, branch: &str) -> BerthResult<()> {
        run_checked(runner, &self.git(&["fetch", "origin", branch]))?;
        Ok(())
    }

    /// Force-checkout the deployment branch, discarding local state.
    pub fn checkout(&self, runner: &dyn CommandRunner, branch: &str) -> BerthResult<()> {
        run_checked(runner, &self.git(&["checkout", "-f", branch]))?;
        Ok(())
    }

    /// Hard-reset the local branch to the fetched remote ref. Local
    /// divergence is never preserved; the remote is the source of truth.
    pub fn reset_hard(&self, runner: &dyn CommandRunner, branch: &str) -> BerthResult<()> {
        let remote_ref = format!("origin/{branch}");
        run_checked(runner, &self.git(&["reset", "--hard", &remote_ref]))?;
        Ok(())
    }
}
