use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;

use plastic_bridge::{
    exit_code_for_error, CmRunner, Error, PlasticProvider, ProviderConfig, DEFAULT_BRANCH,
};

mod cli;
use cli::{Cli, Cmd};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if matches!(cli.cmd, Cmd::Doctor) {
        run_doctor(&cli);
        return ExitCode::SUCCESS;
    }

    let cfg = match build_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("plastic-bridge: {e:#}");
            return ExitCode::from(2);
        }
    };

    match dispatch(&cli.cmd, cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("plastic-bridge: {e}");
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

/// Build the provider configuration: config file first, then flag overrides.
fn build_config(cli: &Cli) -> anyhow::Result<ProviderConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {}", path.display()))?;
            serde_json::from_str::<ProviderConfig>(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => {
            let Some(repo) = cli.repo.clone() else {
                bail!("--repo (or --config) is required");
            };
            ProviderConfig {
                exe_path: PathBuf::from("cm"),
                repository: repo,
                branch: DEFAULT_BRANCH.to_string(),
                workspace_name: None,
                created_stamp: 0,
                workspaces_root: None,
                timeout_secs: None,
            }
        }
    };

    if let Some(exe) = &cli.exe {
        cfg.exe_path = exe.clone();
    }
    if let Some(repo) = &cli.repo {
        cfg.repository = repo.clone();
    }
    if let Some(branch) = &cli.branch {
        cfg.branch = branch.clone();
    }
    if let Some(name) = &cli.workspace_name {
        cfg.workspace_name = Some(name.clone());
    }
    if let Some(stamp) = cli.stamp {
        cfg.created_stamp = stamp;
    }
    if let Some(root) = &cli.workspaces_root {
        cfg.workspaces_root = Some(root.clone());
    }
    if let Some(secs) = cli.timeout {
        cfg.timeout_secs = Some(secs);
    }
    Ok(cfg)
}

fn dispatch(cmd: &Cmd, cfg: ProviderConfig) -> Result<(), Error> {
    let provider = PlasticProvider::new(cfg);
    match cmd {
        Cmd::Latest { source, target } => provider.get_latest(source, target),
        Cmd::Labeled {
            label,
            source,
            target,
        } => provider.get_labeled(label, source, target),
        Cmd::Cat { path } => {
            let bytes = provider.get_file_contents(path)?;
            io::stdout().write_all(&bytes)?;
            Ok(())
        }
        Cmd::Dir { path } => {
            let entry = provider.get_directory_entry(path)?;
            for d in &entry.subdirectories {
                println!("dir  {}", d.path);
            }
            for f in &entry.files {
                println!("file {}", f.path);
            }
            Ok(())
        }
        Cmd::Revision { path } => {
            match provider.get_current_revision(path)? {
                Some(fp) => {
                    let hex: String = fp.iter().map(|b| format!("{b:02x}")).collect();
                    println!("{hex}");
                }
                None => println!("(no revision)"),
            }
            Ok(())
        }
        Cmd::Label { name, path } => provider.apply_label(name, path),
        Cmd::Repos => {
            let runner = provider.config().runner();
            for repo in PlasticProvider::repositories(&runner)? {
                println!("{repo}");
            }
            Ok(())
        }
        Cmd::Check => provider.validate_connection(),
        Cmd::Doctor => unreachable!("handled before config construction"),
    }
}

fn run_doctor(cli: &Cli) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("plastic-bridge doctor");
    eprintln!("  version: v{}", version);
    eprintln!(
        "  host: {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let exe = cli
        .exe
        .clone()
        .or_else(|| which::which("cm").ok())
        .unwrap_or_else(|| PathBuf::from("cm"));
    eprintln!("  cm: {}", exe.display());

    if exe.exists() || which::which(&exe).is_ok() {
        let runner = CmRunner::new(&exe, cli.timeout.map(std::time::Duration::from_secs));
        let detected = plastic_bridge::version::tool_version(&runner);
        eprintln!("  cm version: {}", detected.raw);
        eprintln!(
            "  revision query generation: {}",
            if detected.major == 3 {
                "v3 (checkout-filtered)"
            } else {
                "modern (unfiltered)"
            }
        );
    } else {
        eprintln!("  cm version: (executable not found)");
    }

    if let Some(repo) = &cli.repo {
        eprintln!("  repository: {}", repo);
    }
    eprintln!(
        "  branch: {}",
        cli.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    );
    if let Some(root) = &cli.workspaces_root {
        eprintln!("  workspaces root: {}", root.display());
    } else {
        eprintln!(
            "  workspaces root: {} (default)",
            std::env::temp_dir().join("plastic-workspaces").display()
        );
    }
}
