#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;

use common::FakeCm;
use plastic_bridge::{CmRunner, PlasticProvider};

#[test]
fn int_profile_env_is_overridden_for_the_tool() {
    let td = tempfile::tempdir().expect("tmpdir");
    let exe = td.path().join("cm");
    fs::write(&exe, "#!/bin/sh\necho \"$HOME\"\n").expect("write");
    fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).expect("chmod");

    let runner = CmRunner::new(&exe, None);
    let lines = runner.run("wi", &[]).expect("run");
    let expected = home::home_dir().expect("home");
    assert_eq!(lines, vec![expected.to_string_lossy().to_string()]);
}

#[test]
fn int_repositories_sorted_by_name() {
    let td = tempfile::tempdir().expect("tmpdir");
    let cm = FakeCm::install(td.path());
    cm.respond("lrep", "zeta\nacme\nmiddle\n");

    let runner = CmRunner::new(&cm.exe, None);
    let repos = PlasticProvider::repositories(&runner).expect("lrep");
    assert_eq!(repos, vec!["acme", "middle", "zeta"]);
}

#[test]
fn int_validate_connection_runs_cc() {
    let td = tempfile::tempdir().expect("tmpdir");
    let cm = FakeCm::install(td.path());
    let provider = PlasticProvider::new(cm.config("acme"));
    provider.validate_connection().expect("cc");
    assert_eq!(cm.count("cc"), 1);

    cm.respond("cc", "server unreachable\n");
    cm.exit_with("cc", 1);
    match provider.validate_connection() {
        Err(plastic_bridge::Error::Tool { output }) => {
            assert!(output.contains("server unreachable"));
        }
        other => panic!("expected Tool error, got {other:?}"),
    }
}

#[test]
fn int_failed_registration_leaves_no_partial_state_and_is_retryable() {
    let td = tempfile::tempdir().expect("tmpdir");
    let cm = FakeCm::install(td.path());
    // Break branch binding so registration fails after mkwk.
    cm.respond("stb", "branch does not exist\n");
    cm.exit_with("stb", 1);

    let provider = PlasticProvider::new(cm.config("acme"));
    assert!(provider.get_directory_entry("").is_err());

    // Next call starts from Unbound again: the probe and binding are
    // re-driven rather than trusting the failed attempt.
    let _ = fs::remove_file(td.path().join("responses/stb.code"));
    cm.respond("dir", "dir|src\n");
    let entry = provider.get_directory_entry("").expect("retry converges");
    assert_eq!(entry.subdirectories[0].name, "src");
}
