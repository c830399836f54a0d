//! Repository-path ↔ local-path translation.
//!
//! Repository paths are forward-slash separated regardless of host OS; hosts
//! occasionally hand us backslash paths, which are normalized first.

use std::path::{Path, PathBuf};

/// Normalize a repository path to forward slashes and strip any leading
/// separator so it joins as a relative path.
pub fn normalize_repo_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Resolve a repository-relative path against a workspace root, translating
/// forward-slash components to native separators.
pub fn to_local(workspace_root: &Path, repo_path: &str) -> PathBuf {
    let mut out = workspace_root.to_path_buf();
    for comp in normalize_repo_path(repo_path)
        .split('/')
        .filter(|c| !c.is_empty())
    {
        out.push(comp);
    }
    out
}

/// Parent prefix for building child repository paths: empty for the root,
/// otherwise the path with exactly one trailing slash.
pub fn child_prefix(repo_path: &str) -> String {
    if repo_path.is_empty() {
        String::new()
    } else {
        format!("{}/", repo_path.trim_end_matches('/'))
    }
}

/// Display name of a repository path: the last segment, the whole path when
/// it has no separator, or empty for the root.
pub fn display_name(repo_path: &str) -> &str {
    match repo_path.rfind('/') {
        Some(i) => &repo_path[i + 1..],
        None => repo_path,
    }
}
