//! Berth - sparse-checkout deployment tool for static sites
//!
//! Berth keeps a web server document root in sync with the `_site` build
//! output of one Git branch. Only that subtree is materialized on disk
//! (sparse checkout in non-cone mode), and every mutating git operation
//! runs under the deploy user's identity rather than root's.

pub mod config;
pub mod deploy;
pub mod error;
pub mod exec;
pub mod logger;
pub mod preflight;
pub mod repo;
pub mod retry;

// Re-exports for convenience
pub use config::{Config, ConfigWarning, DEFAULT_CONFIG_PATH};
pub use deploy::DeployOutcome;
pub use error::{BerthError, BerthResult};
pub use exec::{CommandRunner, CommandSpec, Identity, SystemRunner};
pub use logger::Logger;
pub use preflight::{run_doctor, CheckStatus, PreflightReport};
pub use repo::{detect_state, RepoState, SPARSE_PATTERN};
pub use retry::RetryPolicy;
