use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stand-in for the build-automation host: exercises every provider
/// operation from the command line.
#[derive(Parser, Debug)]
#[command(name = "plastic-bridge", version, about)]
pub(crate) struct Cli {
    /// JSON config file with the provider settings; flags below override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the cm executable (default: `cm` on PATH).
    #[arg(long, global = true)]
    pub exe: Option<PathBuf>,

    /// Repository name.
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Branch spec, e.g. br:/main.
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Explicit workspace name (overrides the derived directory name).
    #[arg(long = "workspace-name", global = true)]
    pub workspace_name: Option<String>,

    /// Stable creation stamp for the derived workspace directory.
    #[arg(long, global = true)]
    pub stamp: Option<u64>,

    /// Parent directory for workspace checkouts.
    #[arg(long = "workspaces-root", global = true)]
    pub workspaces_root: Option<PathBuf>,

    /// Per-invocation deadline in seconds (default: wait indefinitely).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Cmd {
    /// Copy the branch tip (or a subpath of it) into a target directory
    Latest {
        /// Target directory
        target: PathBuf,
        /// Repository path to fetch; empty for the whole tree
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Copy labeled content into a target directory
    Labeled {
        /// Label name (without the lb: prefix)
        label: String,
        /// Target directory
        target: PathBuf,
        /// Repository path to fetch; empty for the whole tree
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Print the contents of one repository file to stdout
    Cat {
        /// Repository file path
        path: String,
    },
    /// List one level of the repository tree
    Dir {
        /// Repository path; empty for the root
        #[arg(default_value = "")]
        path: String,
    },
    /// Print the current revision fingerprint (hex) for the repository or a subpath
    Revision {
        /// Repository path; empty means whole-repository mode
        #[arg(default_value = "")]
        path: String,
    },
    /// Create a label and apply it recursively
    Label {
        /// Label name (without the lb: prefix)
        name: String,
        /// Repository path to label from; empty for the root
        #[arg(default_value = "")]
        path: String,
    },
    /// List repositories visible to the configured executable
    Repos,
    /// Verify the server connection (cm cc)
    Check,
    /// Report tool location, detected version, and configuration
    Doctor,
}
