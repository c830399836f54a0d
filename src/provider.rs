//! The provider surface the host calls. Every operation takes the workspace
//! lock, re-runs the lifecycle steps it depends on, issues cm commands, and
//! hands back plain data or raw bytes.

use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};
use crate::exec::CmRunner;
use crate::listing::{self, DirectoryEntry};
use crate::paths;
use crate::revision::{self, Fingerprint};
use crate::workspace::{WorkspaceInfo, WorkspaceLock, WorkspaceManager};
use crate::ProviderConfig;

/// Adapter for one configured (repository, branch) pair.
pub struct PlasticProvider {
    cfg: ProviderConfig,
    runner: CmRunner,
}

impl PlasticProvider {
    pub fn new(cfg: ProviderConfig) -> Self {
        let runner = CmRunner::new(&cfg.exe_path, cfg.timeout());
        Self { cfg, runner }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.cfg
    }

    fn manager(&self) -> WorkspaceManager<'_> {
        WorkspaceManager::new(&self.cfg, &self.runner)
    }

    /// Ensure + lock. The lock spans the whole operation so concurrent
    /// callers cannot interleave lifecycle steps on the shared on-disk
    /// workspace state.
    fn locked_workspace(&self) -> Result<(WorkspaceLock, WorkspaceInfo)> {
        let mgr = self.manager();
        let lock = WorkspaceLock::acquire(&mgr.workspace_path())?;
        let ws = mgr.ensure()?;
        Ok((lock, ws))
    }

    /// Check that the configured server is reachable (`cm cc`).
    pub fn validate_connection(&self) -> Result<()> {
        self.runner.run("cc", &[])?;
        Ok(())
    }

    /// Repositories visible to the configured executable, sorted by name.
    pub fn repositories(runner: &CmRunner) -> Result<Vec<String>> {
        let mut repos = runner.run("lrep", &["--format={1}"])?;
        repos.sort();
        Ok(repos)
    }

    /// Sync the branch tip and copy `source` (repository path, may be empty
    /// for the root) into `target` recursively.
    pub fn get_latest(&self, source: &str, target: &Path) -> Result<()> {
        let (_lock, ws) = self.locked_workspace()?;
        let mgr = self.manager();
        mgr.switch_branch(&ws)?;
        mgr.update(&ws)?;
        self.copy_out(&ws, source, target)
    }

    /// Like [`get_latest`](Self::get_latest) but at the revisions a label
    /// marks instead of the branch tip.
    pub fn get_labeled(&self, label: &str, source: &str, target: &Path) -> Result<()> {
        let (_lock, ws) = self.locked_workspace()?;
        let mgr = self.manager();
        mgr.switch_label(&ws, label)?;
        mgr.update(&ws)?;
        self.copy_out(&ws, source, target)
    }

    /// Raw bytes of one file at the branch tip.
    pub fn get_file_contents(&self, file_path: &str) -> Result<Vec<u8>> {
        let (_lock, ws) = self.locked_workspace()?;
        let mgr = self.manager();
        mgr.switch_branch(&ws)?;
        mgr.update(&ws)?;

        let local = paths::to_local(&ws.location, file_path);
        match fs::read(&local) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(file_path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One level of the repository tree rooted at `source` (empty for the
    /// repository root). Never recurses.
    pub fn get_directory_entry(&self, source: &str) -> Result<DirectoryEntry> {
        let (_lock, ws) = self.locked_workspace()?;
        self.manager().switch_branch(&ws)?;

        let source = paths::normalize_repo_path(source);
        let lines =
            self.runner
                .run_in(&ws.location, "dir", &[source.as_str(), listing::DIR_FORMAT])?;
        Ok(listing::parse_listing(&lines, &source))
    }

    /// Current-state fingerprint of the whole repository (empty path) or of
    /// one subpath. `Ok(None)` when nothing matches the path.
    pub fn get_current_revision(&self, path: &str) -> Result<Option<Fingerprint>> {
        let (_lock, ws) = self.locked_workspace()?;
        let branch = self.cfg.branch_short();
        if path.is_empty() {
            revision::repository_fingerprint(&self.runner, &ws.location, branch)
        } else {
            revision::path_fingerprint(&self.runner, &ws.location, branch, path)
        }
    }

    /// Create `label` and apply it recursively from `source` (repository
    /// root when empty). The steps are separate cm invocations with no
    /// rollback: a label object can exist unapplied if the final step fails.
    pub fn apply_label(&self, label: &str, source: &str) -> Result<()> {
        let (_lock, ws) = self.locked_workspace()?;
        let mgr = self.manager();
        mgr.switch_branch(&ws)?;
        mgr.update(&ws)?;

        self.runner.run_in(&ws.location, "mklb", &[label])?;

        let scope = paths::normalize_repo_path(source);
        let scope = scope.trim_matches('/');
        let scope = if scope.is_empty() { "." } else { scope };
        let label_arg = format!("lb:{label}");
        self.runner
            .run_in(&ws.location, "label", &[label_arg.as_str(), "-R", scope])?;
        Ok(())
    }

    fn copy_out(&self, ws: &WorkspaceInfo, source: &str, target: &Path) -> Result<()> {
        let from = paths::to_local(&ws.location, source);
        if !from.exists() {
            return Err(Error::NotFound(source.to_string()));
        }
        copy_tree(&from, target)?;
        Ok(())
    }
}

/// Recursive copy of `from` into `target`. A file source copies to
/// `target/<file name>`; a directory source copies its contents.
fn copy_tree(from: &Path, target: &Path) -> std::io::Result<()> {
    if from.is_file() {
        fs::create_dir_all(target)?;
        let name = from.file_name().unwrap_or_default();
        fs::copy(from, target.join(name))?;
        return Ok(());
    }
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
