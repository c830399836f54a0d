//! One-level directory listing parsed from `cm dir --format={2}|{5}` output.

use crate::paths;

/// One level of the repository tree. Children carry empty grandchildren
/// vectors; this layer never recurses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Repository-relative, forward-slash path.
    pub path: String,
    pub subdirectories: Vec<DirectoryEntry>,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
}

/// Field layout requested from cm: `{2}|{5}` = entry kind, entry name.
pub const DIR_FORMAT: &str = "--format={2}|{5}";

/// Token cm emits for directory entries; everything else is a file.
const KIND_DIR: &str = "dir";

/// Parse listing output for `source_path` into a single tree level.
///
/// The self-referential `.` entry is discarded. A line without the `|`
/// separator violates the two-field contract and is skipped; a wrong entry
/// is recoverable here, unlike revision parsing.
pub fn parse_listing(lines: &[String], source_path: &str) -> DirectoryEntry {
    let prefix = paths::child_prefix(source_path);
    let mut subdirectories = Vec::new();
    let mut files = Vec::new();

    for line in lines {
        let Some((kind, name)) = line.split_once('|') else {
            tracing::warn!(line = %line, "skipping malformed cm dir line");
            continue;
        };
        if name == "." {
            continue;
        }
        let path = format!("{prefix}{name}");
        if kind == KIND_DIR {
            subdirectories.push(DirectoryEntry {
                name: name.to_string(),
                path,
                subdirectories: Vec::new(),
                files: Vec::new(),
            });
        } else {
            files.push(FileEntry {
                name: name.to_string(),
                path,
            });
        }
    }

    DirectoryEntry {
        name: paths::display_name(source_path).to_string(),
        path: source_path.to_string(),
        subdirectories,
        files,
    }
}
