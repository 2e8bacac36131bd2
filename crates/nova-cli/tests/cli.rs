//! End-to-end tests that exercise the `nova` binary as a subprocess against
//! a fresh, isolated `NOVA_HOME`.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

/// Test context that sets up a temporary Nova home directory.
struct TestContext {
    _temp_dir: TempDir,
    nova_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let nova_home = temp_dir.path().join(".nova");
        std::fs::create_dir_all(&nova_home).expect("failed to create nova home");
        Self { _temp_dir: temp_dir, nova_home }
    }

    fn nova_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_nova");
        let mut cmd = Command::new(bin_path);
        cmd.env("NOVA_HOME", &self.nova_home);
        cmd
    }
}

fn build_bundle_archive() -> Vec<u8> {
    let manifest = br#"
name: hello
version: 0.1.0
type: function
functions:
  - key: greet
    runtime: python3.12
    handler: main.handler
    files: ["functions/greet/main.py"]
"#;

    let mut tar_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_bytes);
        append(&mut builder, "manifest.yaml", manifest);
        append(&mut builder, "functions/greet/main.py", b"def handler(event):\n    return event\n");
        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

fn append(builder: &mut tar::Builder<&mut Vec<u8>>, path: &str, contents: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, contents).unwrap();
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.nova_cmd().arg("--help").output().expect("failed to run nova");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.nova_cmd().arg("--version").output().expect("failed to run nova");
    assert!(output.status.success());
}

#[test]
fn test_extract_prints_manifest() {
    let ctx = TestContext::new();
    let archive_path = ctx.nova_home.join("bundle.tar.gz");
    std::fs::write(&archive_path, build_bundle_archive()).unwrap();

    let output = ctx
        .nova_cmd()
        .arg("extract")
        .arg(&archive_path)
        .output()
        .expect("failed to run nova extract");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("greet"));
    assert!(stdout.contains("python3.12"));
}

#[test]
fn test_plan_against_unpublished_release_reports_invalid() {
    let ctx = TestContext::new();
    let output = ctx
        .nova_cmd()
        .args([
            "plan",
            "--namespace",
            "demo",
            "--app-id",
            "hello",
            "--version",
            "0.1.0",
            "--install-name",
            "hello-install",
        ])
        .output()
        .expect("failed to run nova plan");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("valid: false"));
    assert!(stdout.contains("not found"));
}

#[test]
fn test_status_unknown_installation_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .nova_cmd()
        .args(["status", "install-does-not-exist"])
        .output()
        .expect("failed to run nova status");

    assert!(!output.status.success());
}
