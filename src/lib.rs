//! Adapter for Plastic SCM repositories that expose no API beyond the `cm`
//! command-line client.
//!
//! The crate bridges a build-automation host to the external tool: it spawns
//! `cm`, keeps a local workspace registered and bound to the configured
//! repository/branch, parses line-oriented command output into directory
//! trees and revision fingerprints, and caches detected tool versions
//! process-wide. The host supplies configuration ([`ProviderConfig`]) and
//! receives plain data structures or raw bytes back.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub mod errors;
pub mod exec;
pub mod listing;
pub mod paths;
pub mod provider;
pub mod revision;
pub mod version;
pub mod workspace;

pub use errors::{exit_code_for_error, Error, Result};
pub use exec::CmRunner;
pub use listing::{DirectoryEntry, FileEntry};
pub use provider::PlasticProvider;
pub use revision::Fingerprint;
pub use version::{ToolVersion, FALLBACK_VERSION};
pub use workspace::{WorkspaceInfo, WorkspaceLock, WorkspaceManager};

/// Branch targeted when the host configures none.
pub const DEFAULT_BRANCH: &str = "br:/main";

/// Configuration the host supplies for one repository binding. Values are
/// opaque to this layer except where noted; persistence is the host's
/// concern.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Path to the cm executable.
    pub exe_path: PathBuf,
    /// Repository name on the configured server.
    pub repository: String,
    /// Branch spec, e.g. `br:/main`.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Explicit workspace name. When set it names both the local directory
    /// and the workspace registered with cm; otherwise both derive from
    /// repository + created_stamp.
    #[serde(default)]
    pub workspace_name: Option<String>,
    /// Opaque creation stamp making the derived workspace directory stable
    /// per host configuration.
    #[serde(default)]
    pub created_stamp: u64,
    /// Parent directory for workspace checkouts; a temp-dir default applies
    /// when unset.
    #[serde(default)]
    pub workspaces_root: Option<PathBuf>,
    /// Deadline for a single cm invocation, in seconds. Unset means wait
    /// indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl ProviderConfig {
    pub fn workspaces_root(&self) -> PathBuf {
        self.workspaces_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("plastic-workspaces"))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Short branch name as it appears in query text: `br:/main` → `main`.
    /// Embedded single quotes are escaped by the query builders before the
    /// name lands inside a quoted literal.
    pub fn branch_short(&self) -> &str {
        self.branch
            .trim_start_matches("br:")
            .trim_start_matches('/')
    }

    pub fn runner(&self) -> CmRunner {
        CmRunner::new(&self.exe_path, self.timeout())
    }
}
