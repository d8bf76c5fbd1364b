//! Integration tests for the vmount binary.
//!
//! These tests exercise the full CLI: argument parsing, configuration
//! loading, exit codes, and the cross-process mount hold.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

/// A scratch directory with a global config pointing at a hook bundle.
struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let bundle = dir.path().join("bundle");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("read-object"), "#!/bin/sh\nexit 0\n").unwrap();
        fs::write(bundle.join("virtual-filesystem"), "#!/bin/sh\nexit 0\n").unwrap();

        let config = dir.path().join("config.toml");
        fs::write(
            &config,
            format!(
                "hooks_source_dir = {:?}\nunmount_poll_ms = 50\nmaintenance_timeout_secs = 20\n",
                bundle.display().to_string()
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn enlistment(&self) -> PathBuf {
        self.path().join("enlistment")
    }

    /// A `vmount` command run from `cwd` with this workspace's config.
    fn vmount(&self, cwd: &Path) -> Command {
        let mut cmd = Command::cargo_bin("vmount").unwrap();
        cmd.env("VMOUNT_CONFIG", &self.config)
            .env_remove("RUST_LOG")
            .arg("--cwd")
            .arg(cwd);
        cmd
    }

    fn init(&self, layout_version: Option<u64>) {
        let mut cmd = self.vmount(self.path());
        cmd.arg("init").arg("enlistment");
        if let Some(v) = layout_version {
            cmd.arg("--layout-version").arg(v.to_string());
        }
        cmd.assert().success();
    }

    /// Start a foreground `vmount mount` and wait until it holds the mount.
    fn spawn_holder(&self) -> Child {
        let holder = StdCommand::new(assert_cmd::cargo::cargo_bin("vmount"))
            .env("VMOUNT_CONFIG", &self.config)
            .arg("--cwd")
            .arg(self.enlistment())
            .arg("mount")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        // Wait on the session marker; probing the lock could race the holder.
        let marker = self.enlistment().join(".vmount/mount-session.json");
        let deadline = Instant::now() + Duration::from_secs(30);
        while !marker.exists() {
            assert!(Instant::now() < deadline, "holder never mounted");
            thread::sleep(Duration::from_millis(50));
        }
        holder
    }

    fn status_json(&self) -> serde_json::Value {
        let output = self
            .vmount(&self.enlistment())
            .args(["status", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

// =============================================================================
// Basics
// =============================================================================

#[test]
fn version_flag_works() {
    Command::cargo_bin("vmount")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vmount"));
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("vmount")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vmount"));
}

#[test]
fn init_then_status() {
    let ws = Workspace::new();
    ws.init(None);

    ws.vmount(&ws.enlistment())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("unmounted"))
        .stdout(predicate::str::contains("current"));

    let json = ws.status_json();
    assert_eq!(json["mounted"], false);
    assert_eq!(json["disk_layout_version"], 12);
}

#[test]
fn init_refuses_existing_enlistment() {
    let ws = Workspace::new();
    ws.init(None);
    ws.vmount(ws.path())
        .args(["init", "enlistment"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already an enlistment"));
}

// =============================================================================
// Mount exit codes
// =============================================================================

#[test]
fn mount_no_wait_succeeds_and_installs_hooks() {
    let ws = Workspace::new();
    ws.init(None);

    ws.vmount(&ws.enlistment())
        .args(["mount", "--no-wait"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mounted"));

    let hooks = ws.enlistment().join("src/.git/hooks");
    assert!(hooks.join("read-object").is_file());
    assert!(hooks.join("virtual-filesystem").is_file());
    assert_eq!(ws.status_json()["mounted"], false);
}

#[test]
fn mount_removes_stale_index_lock() {
    let ws = Workspace::new();
    ws.init(None);
    let lock = ws.enlistment().join("src/.git/index.lock");
    fs::write(&lock, "Bogus lock file contents").unwrap();

    ws.vmount(&ws.enlistment())
        .args(["mount", "--no-wait"])
        .assert()
        .success();
    assert!(!lock.exists());
}

#[test]
fn mount_outside_enlistment_exits_5() {
    let ws = Workspace::new();
    ws.vmount(ws.path())
        .args(["mount", "--no-wait"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("is not a valid vmount enlistment"));
}

#[test]
fn legacy_exit_codes_collapse_failures_to_3() {
    let ws = Workspace::new();
    ws.vmount(ws.path())
        .args(["mount", "--no-wait", "--legacy-exit-codes"])
        .assert()
        .code(3);
}

#[test]
fn missing_metadata_exits_6() {
    let ws = Workspace::new();
    ws.init(None);
    fs::remove_file(ws.enlistment().join(".vmount/repo-metadata.json")).unwrap();

    ws.vmount(&ws.enlistment())
        .args(["mount", "--no-wait"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Failed to upgrade repo disk layout"));
}

#[test]
fn newer_layout_exits_7() {
    let ws = Workspace::new();
    ws.init(Some(13));

    ws.vmount(&ws.enlistment())
        .args(["mount", "--no-wait"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("do not allow mounting after downgrade"));

    ws.vmount(&ws.enlistment())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("newer build"));
}

#[test]
fn ancient_layout_exits_8() {
    let ws = Workspace::new();
    ws.init(Some(1));

    ws.vmount(&ws.enlistment())
        .args(["mount", "--no-wait"])
        .assert()
        .code(8)
        .stderr(predicate::str::contains(
            "Breaking change to vmount disk layout has been made since cloning",
        ));
}

#[test]
fn old_layout_is_upgraded_on_mount() {
    let ws = Workspace::new();
    ws.init(Some(9));

    ws.vmount(&ws.enlistment())
        .args(["mount", "--no-wait"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Upgraded disk layout from version 9 to 12"));
    assert_eq!(ws.status_json()["disk_layout_version"], 12);
}

#[test]
fn unmount_without_holder_exits_12() {
    let ws = Workspace::new();
    ws.init(None);
    ws.vmount(&ws.enlistment())
        .arg("unmount")
        .assert()
        .code(12)
        .stderr(predicate::str::contains("is not mounted"));
}

// =============================================================================
// Held mount across processes
// =============================================================================

#[test]
fn held_mount_blocks_second_mount_until_unmount() {
    let ws = Workspace::new();
    ws.init(None);

    let mut holder = ws.spawn_holder();

    let nested = ws.enlistment().join("src");
    ws.vmount(&nested)
        .args(["mount", "--no-wait"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("already mounted"));
    ws.vmount(&nested)
        .args(["mount", "--no-wait", "--legacy-exit-codes"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("already mounted"))
        .stderr(predicate::str::contains("error").not());

    let status = ws.status_json();
    assert_eq!(status["session"]["pid"], holder.id());

    ws.vmount(&ws.enlistment())
        .arg("unmount")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unmounted"));

    let exit = holder.wait().unwrap();
    assert!(exit.success());
    assert_eq!(ws.status_json()["mounted"], false);
}

#[test]
fn held_mount_exits_when_enlistment_is_removed() {
    let ws = Workspace::new();
    ws.init(None);
    let mut holder = ws.spawn_holder();

    fs::remove_dir_all(ws.enlistment()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let exit = loop {
        if let Some(exit) = holder.try_wait().unwrap() {
            break exit;
        }
        if Instant::now() >= deadline {
            let _ = holder.kill();
            panic!("holder kept running after its enlistment was removed");
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(exit.code(), Some(3));
}
