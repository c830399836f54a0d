#![cfg(unix)]
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use plastic_bridge::ProviderConfig;

/// Scripted stand-in for the cm executable.
///
/// Every invocation appends its argv to `cm.log`. `wi`/`mkwk` model
/// workspace registration (absent until `mkwk` has run); any other command
/// replies with the contents of `responses/<command>.out` and exits with
/// `responses/<command>.code` (default 0).
pub struct FakeCm {
    pub dir: PathBuf,
    pub exe: PathBuf,
}

impl FakeCm {
    pub fn install(dir: &Path) -> Self {
        let responses = dir.join("responses");
        fs::create_dir_all(&responses).expect("responses dir");
        let exe = dir.join("cm");
        let script = format!(
            "#!/bin/sh\n\
             dir={dir}\n\
             echo \"$@\" >> \"$dir/cm.log\"\n\
             case \"$1\" in\n\
             mkwk) touch \"$dir/registered\"; exit 0 ;;\n\
             wi)\n\
               if [ -f \"$dir/registered\" ]; then echo 'wk@local'; exit 0\n\
               else echo 'not in a workspace'; exit 1; fi ;;\n\
             esac\n\
             out=\"$dir/responses/$1.out\"\n\
             [ -f \"$out\" ] && cat \"$out\"\n\
             code=\"$dir/responses/$1.code\"\n\
             [ -f \"$code\" ] && exit \"$(cat \"$code\")\"\n\
             exit 0\n",
            dir = dir.display()
        );
        fs::write(&exe, script).expect("write fake cm");
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).expect("chmod");
        Self {
            dir: dir.to_path_buf(),
            exe,
        }
    }

    /// Stdout the fake emits for `command`.
    pub fn respond(&self, command: &str, stdout: &str) {
        fs::write(self.dir.join(format!("responses/{command}.out")), stdout)
            .expect("write response");
    }

    /// Exit code the fake returns for `command`.
    pub fn exit_with(&self, command: &str, code: i32) {
        fs::write(
            self.dir.join(format!("responses/{command}.code")),
            code.to_string(),
        )
        .expect("write exit code");
    }

    /// Mark the workspace as already registered so `wi` succeeds immediately.
    pub fn preregister(&self) {
        fs::write(self.dir.join("registered"), "").expect("marker");
    }

    /// Every invocation so far, one argv line each.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.join("cm.log"))
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls()
            .iter()
            .filter(|l| l.starts_with(&format!("{command} ")) || *l == command)
            .count()
    }

    /// Provider config pointing at this fake, with workspaces under the
    /// fake's directory.
    pub fn config(&self, repository: &str) -> ProviderConfig {
        ProviderConfig {
            exe_path: self.exe.clone(),
            repository: repository.to_string(),
            branch: "br:/main".to_string(),
            workspace_name: None,
            created_stamp: 7,
            workspaces_root: Some(self.dir.join("workspaces")),
            timeout_secs: Some(30),
        }
    }

    /// Local path of the workspace the provider will use for `repository`.
    pub fn workspace_dir(&self, repository: &str) -> PathBuf {
        self.dir.join("workspaces").join(format!("{repository}_7"))
    }
}
