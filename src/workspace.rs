//! Workspace lifecycle: Unbound → Registered → BranchSelected → Updated.
//!
//! Each step's postcondition is the next step's precondition, and nothing is
//! assumed sticky across calls: every operation re-asserts branch binding
//! before reading the tree. The workspace directory itself persists across
//! calls for reuse; this layer never destroys it.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::errors::{Error, Result};
use crate::exec::CmRunner;
use crate::ProviderConfig;

/// Prefix for workspace names registered with cm when no explicit name is
/// configured.
const WORKSPACE_NAME_PREFIX: &str = "plastic-bridge";

/// A local working copy bound (or about to be bound) to one repository and
/// branch. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    pub name: Option<String>,
    pub location: PathBuf,
}

/// Advisory lock serializing the ensure → switch → update → act sequence for
/// one workspace path across processes. The external tool mutates shared
/// on-disk workspace state, so two concurrent operations against the same
/// path would corrupt each other. Blocks until the lock is granted; unlocks
/// and removes the lock file on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    pub fn acquire(workspace_path: &Path) -> io::Result<Self> {
        let mut name = workspace_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string());
        name.push_str(".lock");
        let path = workspace_path
            .parent()
            .map(|p| p.join(&name))
            .unwrap_or_else(|| PathBuf::from(&name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(Self { file, path })
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        // Best-effort unlock; ignore errors
        let _ = self.file.unlock();
        let _ = fs::remove_file(&self.path);
    }
}

/// Drives a single (repository, branch) configuration through the workspace
/// state machine. Holds no state of its own; convergence is re-checked on
/// every call, so a failed call is retryable from Unbound.
pub struct WorkspaceManager<'a> {
    cfg: &'a ProviderConfig,
    runner: &'a CmRunner,
}

impl<'a> WorkspaceManager<'a> {
    pub fn new(cfg: &'a ProviderConfig, runner: &'a CmRunner) -> Self {
        Self { cfg, runner }
    }

    /// Deterministic local path for this configuration:
    /// `<workspaces_root>/<workspace_name>` when a name is configured,
    /// otherwise `<workspaces_root>/<repository>_<created_stamp>`.
    pub fn workspace_path(&self) -> PathBuf {
        self.cfg.workspaces_root().join(self.directory_name())
    }

    fn directory_name(&self) -> String {
        match &self.cfg.workspace_name {
            Some(name) => name.clone(),
            None => format!("{}_{}", self.cfg.repository, self.cfg.created_stamp),
        }
    }

    fn registered_name(&self) -> String {
        match &self.cfg.workspace_name {
            Some(name) => name.clone(),
            None => format!(
                "{}_{}_{}",
                WORKSPACE_NAME_PREFIX, self.cfg.repository, self.cfg.created_stamp
            ),
        }
    }

    /// Probe `cm wi` at `path`. A non-zero exit or a "not in a workspace"
    /// report is the expected state of a fresh directory, not a failure.
    fn workspace_status(&self, path: &Path) -> Result<Option<Vec<String>>> {
        match self.runner.run_in(path, "wi", &[]) {
            Ok(lines) => {
                if lines.is_empty() || lines[0].contains("not in a workspace") {
                    Ok(None)
                } else {
                    Ok(Some(lines))
                }
            }
            Err(Error::Tool { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Unbound → Registered: make sure the local directory exists and is
    /// known to cm, registering and branch-binding it when it is not.
    pub fn ensure(&self) -> Result<WorkspaceInfo> {
        let path = self.workspace_path();
        fs::create_dir_all(&path).map_err(|e| {
            Error::WorkspaceUnavailable(format!(
                "cannot create workspace directory {}: {e}",
                path.display()
            ))
        })?;

        if self.workspace_status(&path)?.is_none() {
            let name = self.registered_name();
            let path_arg = path.to_string_lossy();
            tracing::info!(workspace = %name, path = %path_arg, "registering workspace");
            self.runner.run("mkwk", &[name.as_str(), path_arg.as_ref()])?;
            self.switch_branch_at(&path)?;
        }

        Ok(WorkspaceInfo {
            name: Some(self.registered_name()),
            location: path,
        })
    }

    /// Registered → BranchSelected. Re-invoked before every tree-reading
    /// operation; branch binding is not assumed to survive from a prior call.
    pub fn switch_branch(&self, workspace: &WorkspaceInfo) -> Result<()> {
        self.switch_branch_at(&workspace.location)
    }

    fn switch_branch_at(&self, location: &Path) -> Result<()> {
        let repo_arg = format!("--repository={}", self.cfg.repository);
        self.runner
            .run_in(location, "stb", &[self.cfg.branch.as_str(), repo_arg.as_str()])?;
        Ok(())
    }

    /// Bind the workspace to a label instead of the configured branch, for
    /// fetching labeled content.
    pub fn switch_label(&self, workspace: &WorkspaceInfo, label: &str) -> Result<()> {
        let label_arg = format!("--label={label}");
        let repo_arg = format!("--repository={}", self.cfg.repository);
        self.runner.run_in(
            &workspace.location,
            "stb",
            &[label_arg.as_str(), repo_arg.as_str()],
        )?;
        Ok(())
    }

    /// BranchSelected → Updated: sync the local tree to the tip of whatever
    /// the workspace is currently bound to.
    pub fn update(&self, workspace: &WorkspaceInfo) -> Result<()> {
        self.runner.run_in(&workspace.location, "upd", &["."])?;
        Ok(())
    }
}
