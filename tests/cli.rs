use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn reelview() -> Command {
    Command::cargo_bin("reelview").expect("reelview binary")
}

#[test]
fn prints_version() {
    reelview()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    reelview()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelview").and(predicate::str::contains("--offline")));
}

#[test]
fn offline_channels_hide_inactive() {
    let dir = tempdir().unwrap();
    reelview()
        .arg("--config")
        .arg(dir.path().join("config.yaml"))
        .args(["--offline", "channels"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("reelshorts")
                .and(predicate::str::contains("dramabox"))
                .and(predicate::str::contains("reelarchive").not()),
        );
}

#[test]
fn offline_category_loads_two_pages() {
    let dir = tempdir().unwrap();
    reelview()
        .arg("--config")
        .arg(dir.path().join("config.yaml"))
        .args(["--offline", "category", "tv", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tv-9\ttv title 10"));
}

#[test]
fn unknown_command_fails() {
    reelview()
        .args(["--offline", "rewind"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command rewind"));
}
