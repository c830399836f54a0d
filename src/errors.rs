//! Error taxonomy for the cm adapter.
//!
//! Expected absences ("path not in a workspace", "no matching revision") are
//! NOT errors — they come back as `Ok(None)` from the functions that probe
//! for them. Everything here is an operational failure that propagates to
//! the caller; nothing is retried automatically.

use std::fmt;
use std::io;
use std::time::Duration;

/// Operational failures of the adapter layer.
#[derive(Debug)]
pub enum Error {
    /// The external tool exited non-zero. `output` is every captured line
    /// with newlines stripped, exposed as a single diagnostic string.
    Tool { output: String },
    /// The external tool did not finish within the configured deadline and
    /// was killed.
    Timeout { command: String, after: Duration },
    /// An output line did not match the field contract for the command
    /// issued. Used fail-fast where a wrong answer is worse than no answer
    /// (revision id parsing); directory listing skips lines instead.
    MalformedOutput(String),
    /// Workspace registration lookup/creation did not converge to a usable
    /// local path.
    WorkspaceUnavailable(String),
    /// A requested label, workspace, or repository path does not resolve.
    NotFound(String),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Tool { output } => write!(f, "cm exited with an error: {output}"),
            Error::Timeout { command, after } => {
                write!(f, "cm {command} timed out after {after:?} and was killed")
            }
            Error::MalformedOutput(s) => write!(f, "unexpected cm output: {s}"),
            Error::WorkspaceUnavailable(s) => write!(f, "workspace unavailable: {s}"),
            Error::NotFound(s) => write!(f, "not found: {s}"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map an adapter error to a process exit code for the CLI:
/// 127 for a missing executable, 1 for everything else.
pub fn exit_code_for_error(e: &Error) -> u8 {
    match e {
        Error::Io(ioe) if ioe.kind() == io::ErrorKind::NotFound => 127,
        _ => 1,
    }
}
