//! Subprocess bridge to the cm executable.
//!
//! Arguments are handed to the OS as an argv vector; there is no command-line
//! string assembly and therefore no quoting rule to get wrong. Output is
//! consumed by reader threads line by line while the child runs, and the
//! child is waited on with an optional deadline instead of polling.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::errors::{Error, Result};

/// Environment variable overridden on every invocation so the tool resolves
/// a real user profile even under service-account identities whose default
/// resolution is unreliable.
#[cfg(windows)]
const PROFILE_ENV: &str = "USERPROFILE";
#[cfg(not(windows))]
const PROFILE_ENV: &str = "HOME";

/// Invoker for the external cm client. Cheap to clone; holds no process
/// state between calls.
#[derive(Debug, Clone)]
pub struct CmRunner {
    exe: PathBuf,
    timeout: Option<Duration>,
}

impl CmRunner {
    pub fn new(exe: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            exe: exe.into(),
            timeout,
        }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Run `cm <command> <args...>` with no working directory override.
    pub fn run(&self, command: &str, args: &[&str]) -> Result<Vec<String>> {
        self.invoke(None, command, args)
    }

    /// Run `cm <command> <args...>` inside `dir` (typically a workspace).
    pub fn run_in(&self, dir: &Path, command: &str, args: &[&str]) -> Result<Vec<String>> {
        self.invoke(Some(dir), command, args)
    }

    fn invoke(&self, dir: Option<&Path>, command: &str, args: &[&str]) -> Result<Vec<String>> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg(command).args(args);
        if let Some(d) = dir {
            cmd.current_dir(d);
        }
        if let Some(profile) = home::home_dir() {
            cmd.env(PROFILE_ENV, profile);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        tracing::debug!(
            exe = %self.exe.display(),
            command,
            args = args.len(),
            cwd = dir.map(|d| d.display().to_string()).unwrap_or_default(),
            "invoking cm"
        );

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes concurrently so neither can fill and stall the
        // child. lines() strips the terminator; blank lines are dropped here,
        // non-blank lines keep emission order within each stream.
        let out_reader = spawn_line_reader(stdout);
        let err_reader = spawn_line_reader(stderr);

        let status = match self.timeout {
            None => child.wait()?,
            Some(deadline) => match child.wait_timeout(deadline)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Let the readers drain whatever the child managed to
                    // write before the kill, then discard it.
                    let _ = out_reader.join();
                    let _ = err_reader.join();
                    return Err(Error::Timeout {
                        command: command.to_string(),
                        after: deadline,
                    });
                }
            },
        };

        let out_lines = out_reader.join().unwrap_or_default();
        let err_lines = err_reader.join().unwrap_or_default();

        if !status.success() {
            // Everything collected, newlines already stripped, one string.
            let mut output = out_lines.concat();
            output.push_str(&err_lines.concat());
            tracing::debug!(command, code = status.code(), "cm failed");
            return Err(Error::Tool { output });
        }

        Ok(out_lines)
    }
}

fn spawn_line_reader<R: Read + Send + 'static>(
    stream: Option<R>,
) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let mut lines = Vec::new();
        if let Some(stream) = stream {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(l) if !l.is_empty() => lines.push(l),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
        lines
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use std::fs;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let p = dir.join("cm");
        fs::write(&p, format!("#!/bin/sh\n{body}\n")).expect("write fake cm");
        fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).expect("chmod");
        p
    }

    #[cfg(unix)]
    #[test]
    fn success_preserves_order_and_drops_blank_lines() {
        let td = tempfile::tempdir().expect("tmpdir");
        let exe = fake_tool(td.path(), "printf 'one\\n\\ntwo\\nthree\\n'");
        let runner = CmRunner::new(&exe, None);
        let lines = runner.run("dir", &[]).expect("run");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_concatenates_all_output() {
        let td = tempfile::tempdir().expect("tmpdir");
        let exe = fake_tool(
            td.path(),
            "printf 'alpha\\nbeta\\n'; printf 'gamma\\n' >&2; exit 3",
        );
        let runner = CmRunner::new(&exe, None);
        match runner.run("upd", &[]) {
            Err(Error::Tool { output }) => {
                assert!(output.contains("alpha"));
                assert!(output.contains("beta"));
                assert!(output.contains("gamma"));
                assert!(!output.contains('\n'));
            }
            other => panic!("expected Tool error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_child_is_killed_after_deadline() {
        let td = tempfile::tempdir().expect("tmpdir");
        let exe = fake_tool(td.path(), "sleep 30");
        let runner = CmRunner::new(&exe, Some(Duration::from_millis(200)));
        match runner.run("query", &[]) {
            Err(Error::Timeout { command, .. }) => assert_eq!(command, "query"),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn args_pass_through_argv_byte_exact() {
        let td = tempfile::tempdir().expect("tmpdir");
        // Echo back the second argument exactly as received.
        let exe = fake_tool(td.path(), "printf '%s\\n' \"$2\"");
        let runner = CmRunner::new(&exe, None);
        let tricky = r#"a "quoted|arg" with spaces"#;
        let lines = runner.run("query", &[tricky]).expect("run");
        assert_eq!(lines, vec![tricky.to_string()]);
    }

    #[test]
    fn missing_executable_surfaces_io_error() {
        let runner = CmRunner::new("/nonexistent/cm-binary", None);
        match runner.run("version", &[]) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
