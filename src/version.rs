//! Detected cm version, cached process-wide per executable path.
//!
//! The tool at a given path is assumed immutable for the process lifetime,
//! so entries are never invalidated. Version-gated behavior must always have
//! a deterministic default: any detection failure yields [`FALLBACK_VERSION`]
//! rather than an error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::exec::CmRunner;

/// Assumed version when `cm version` cannot be run or parsed (modern
/// generation, unfiltered revision query).
pub const FALLBACK_VERSION: &str = "4.0.0.0";

static VERSION_CACHE: Lazy<RwLock<HashMap<PathBuf, ToolVersion>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Parsed cm version. The raw string is kept for display; query-variant
/// selection uses the parsed major only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub raw: String,
}

impl ToolVersion {
    /// Parse "3.0.187.34" style strings. Missing or non-numeric components
    /// make the whole string unparseable.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some(Self {
            major,
            minor,
            raw: trimmed.to_string(),
        })
    }

    pub fn fallback() -> Self {
        Self::parse(FALLBACK_VERSION).unwrap_or(Self {
            major: 4,
            minor: 0,
            raw: FALLBACK_VERSION.to_string(),
        })
    }

    /// The per-item max-revision query for subpath fingerprints. The v3
    /// generation reports in-progress checkouts as revisionnumber = -1 and
    /// must exclude them; later generations dropped the field.
    ///
    /// `branch_short` is embedded as a quoted literal; see
    /// [`quote_branch_literal`] for the escaping rule.
    pub fn max_revision_query(&self, branch_short: &str) -> String {
        let branch_short = quote_branch_literal(branch_short);
        if self.major == 3 {
            format!(
                "select max(revisions.objectid) as maxrevision, revisions.itemid \
                 from revisions,branch where revisions.branchid = branch.iobjid \
                 and branch.sname='{branch_short}' and revisions.revisionnumber >= 0 \
                 group by revisions.itemid order by max(revisions.objectid) desc"
            )
        } else {
            format!(
                "select max(revisions.objectid) as maxrevision, revisions.itemid \
                 from revisions,branch where revisions.branchid = branch.iobjid \
                 and branch.sname='{branch_short}' \
                 group by revisions.itemid order by max(revisions.objectid) desc"
            )
        }
    }
}

/// Branch name as it may appear inside single-quoted query text: embedded
/// `'` characters are doubled, the usual SQL literal rule. Branch names
/// never legitimately contain quotes, but a stray one must not be able to
/// change the query's meaning.
fn quote_branch_literal(branch_short: &str) -> String {
    branch_short.replace('\'', "''")
}

/// Query for the single newest changeset id on a branch; its id alone is a
/// sufficient proxy for "has anything changed anywhere in the repository".
pub fn tip_changeset_query(branch_short: &str) -> String {
    let branch_short = quote_branch_literal(branch_short);
    format!(
        "select top 1 changeset.iobjid from changeset,branch \
         where changeset.fidbranch=branch.iobjid and branch.sname='{branch_short}' \
         order by changeset.iobjid desc"
    )
}

/// Detected version for the runner's executable. Fast path is a shared read
/// of the process-wide map; the write path re-checks under the exclusive
/// lock so concurrent first callers trigger at most one detection.
pub fn tool_version(runner: &CmRunner) -> ToolVersion {
    let key = runner.exe().to_path_buf();

    match VERSION_CACHE.read() {
        Ok(cache) => {
            if let Some(v) = cache.get(&key) {
                return v.clone();
            }
        }
        Err(_) => return ToolVersion::fallback(),
    }

    let Ok(mut cache) = VERSION_CACHE.write() else {
        return ToolVersion::fallback();
    };
    if let Some(v) = cache.get(&key) {
        return v.clone();
    }

    // Only a successful detection is cached. A transient failure must not
    // pin the fallback for the process lifetime: the next call re-probes,
    // so a v3 tool behind a hiccup still ends up on the filtered query.
    let Some(detected) = detect(runner) else {
        tracing::warn!(exe = %key.display(), fallback = FALLBACK_VERSION,
            "cm version detection failed, assuming modern tool");
        return ToolVersion::fallback();
    };
    cache.insert(key, detected.clone());
    detected
}

fn detect(runner: &CmRunner) -> Option<ToolVersion> {
    let lines = runner.run("version", &[]).ok()?;
    ToolVersion::parse(lines.first()?)
}
