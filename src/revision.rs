//! Revision fingerprints: opaque byte values detecting "has anything
//! changed" between two observations. Equality is the only guaranteed
//! semantics; callers must not order them.

use std::path::Path;

use crate::errors::{Error, Result};
use crate::exec::CmRunner;
use crate::paths;
use crate::version::{self, tip_changeset_query};

/// Fixed-width little-endian encoding of a 64-bit changeset/revision id.
pub type Fingerprint = [u8; 8];

/// Whole-repository fingerprint: the newest changeset id on the branch. One
/// id is a sufficient proxy for change anywhere in the repository, avoiding
/// a full tree walk. `Ok(None)` when the branch has no changesets.
pub fn repository_fingerprint(
    runner: &CmRunner,
    workspace: &Path,
    branch_short: &str,
) -> Result<Option<Fingerprint>> {
    let query = tip_changeset_query(branch_short);
    let lines = runner.run_in(workspace, "query", &[query.as_str()])?;
    parse_tip_lines(&lines)
}

/// Subpath fingerprint: highest revision id among tracked items whose
/// resolved local path matches `repo_path` under the workspace root,
/// case-insensitively. `Ok(None)` when the path is not tracked.
///
/// The query text is gated on the detected tool version; detection failures
/// fall back to the modern unfiltered variant inside [`version::tool_version`].
pub fn path_fingerprint(
    runner: &CmRunner,
    workspace: &Path,
    branch_short: &str,
    repo_path: &str,
) -> Result<Option<Fingerprint>> {
    let ver = version::tool_version(runner);
    let query = ver.max_revision_query(branch_short);
    let lines = runner.run_in(workspace, "query", &[query.as_str(), "--solvepath=itemid"])?;

    let needle = paths::to_local(workspace, repo_path)
        .to_string_lossy()
        .to_lowercase();
    scan_revision_lines(&lines, &needle)
}

/// Tip-changeset output: a header line followed by the id. Header-only
/// output means no changeset exists yet. An unparseable id fails the call;
/// a wrong fingerprint is worse than none.
fn parse_tip_lines(lines: &[String]) -> Result<Option<Fingerprint>> {
    if lines.len() < 2 {
        return Ok(None);
    }
    let last = &lines[lines.len() - 1];
    let id: i64 = last
        .trim()
        .parse()
        .map_err(|_| Error::MalformedOutput(format!("changeset id expected, got {last:?}")))?;
    Ok(Some(id.to_le_bytes()))
}

/// Per-item revision output: header line, then `<id> <resolved path>` pairs
/// ordered by id descending, so the first path match carries the maximum
/// revision id for that path.
fn scan_revision_lines(lines: &[String], needle: &str) -> Result<Option<Fingerprint>> {
    for line in lines.iter().skip(1) {
        if !line.to_lowercase().contains(needle) {
            continue;
        }
        let id_field = line
            .split_whitespace()
            .next()
            .ok_or_else(|| Error::MalformedOutput(format!("empty revision line {line:?}")))?;
        let id: i64 = id_field.parse().map_err(|_| {
            Error::MalformedOutput(format!("revision id expected, got {id_field:?}"))
        })?;
        return Ok(Some(id.to_le_bytes()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tip_parse_takes_last_line_as_id() {
        let fp = parse_tip_lines(&lines(&["1 rows", "4711"])).expect("parse");
        assert_eq!(fp, Some(4711i64.to_le_bytes()));
    }

    #[test]
    fn tip_parse_header_only_is_absent() {
        assert_eq!(parse_tip_lines(&lines(&["0 rows"])).expect("parse"), None);
        assert_eq!(parse_tip_lines(&[]).expect("parse"), None);
    }

    #[test]
    fn tip_parse_fails_fast_on_garbage() {
        assert!(parse_tip_lines(&lines(&["1 rows", "not-a-number"])).is_err());
    }

    #[test]
    fn scan_returns_first_match_descending() {
        let out = lines(&[
            "3 rows",
            "900 /ws/src/other.rs",
            "850 /ws/src/lib.rs",
            "120 /ws/src/lib.rs",
        ]);
        let fp = scan_revision_lines(&out, "/ws/src/lib.rs").expect("scan");
        assert_eq!(fp, Some(850i64.to_le_bytes()));
    }

    #[test]
    fn scan_matches_case_insensitively() {
        let out = lines(&["1 rows", "7 /WS/Docs/README.md"]);
        let fp = scan_revision_lines(&out, "/ws/docs/readme.md").expect("scan");
        assert_eq!(fp, Some(7i64.to_le_bytes()));
    }

    #[test]
    fn scan_untracked_path_is_absent_not_error() {
        let out = lines(&["1 rows", "7 /ws/a"]);
        assert_eq!(scan_revision_lines(&out, "/ws/zzz").expect("scan"), None);
    }

    #[test]
    fn scan_fails_fast_on_unparseable_id() {
        let out = lines(&["1 rows", "abc /ws/a"]);
        assert!(scan_revision_lines(&out, "/ws/a").is_err());
    }

    #[test]
    fn equal_ids_produce_equal_fingerprints() {
        let a = parse_tip_lines(&lines(&["h", "99"])).expect("a");
        let b = parse_tip_lines(&lines(&["h", "99"])).expect("b");
        let c = parse_tip_lines(&lines(&["h", "100"])).expect("c");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
