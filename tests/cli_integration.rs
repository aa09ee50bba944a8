//! CLI integration tests
//!
//! Runs the lifevault binary end-to-end against a temporary data directory.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const PASSPHRASE: &str = "Str0ngPass!";

/// Run lifevault against `data_dir`, feeding `passphrase` on stdin.
fn run_lifevault(data_dir: &Path, args: &[&str], passphrase: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_lifevault"))
        .arg("--passphrase-stdin")
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--kdf-log-n", "10"])
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        let _ = stdin.write_all(format!("{}\n", passphrase).as_bytes());
    }

    child.wait_with_output().unwrap()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_status_before_and_after_setup() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("vault");

    let output = run_lifevault(&data_dir, &["status"], "");
    assert_success(&output, "status");
    assert!(stdout(&output).starts_with("uninitialized"));

    let output = run_lifevault(&data_dir, &["setup"], PASSPHRASE);
    assert_success(&output, "setup");
    assert!(stderr(&output).contains("strong"));

    let output = run_lifevault(&data_dir, &["status"], "");
    assert_success(&output, "status");
    assert!(stdout(&output).starts_with("locked"));
}

#[test]
fn test_setup_twice_fails() {
    let temp_dir = TempDir::new().unwrap();

    assert_success(&run_lifevault(temp_dir.path(), &["setup"], PASSPHRASE), "setup");

    let output = run_lifevault(temp_dir.path(), &["setup"], PASSPHRASE);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error: vault is already set up"));
}

#[test]
fn test_setup_rejects_weak_passphrase() {
    let temp_dir = TempDir::new().unwrap();

    let output = run_lifevault(temp_dir.path(), &["setup"], "password");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("uppercase"));

    let output = run_lifevault(temp_dir.path(), &["status"], "");
    assert!(stdout(&output).starts_with("uninitialized"));
}

#[test]
fn test_data_at_rest_is_encrypted() {
    let temp_dir = TempDir::new().unwrap();
    let backup = temp_dir.path().join("backup.json");
    let data_dir = temp_dir.path().join("vault");

    assert_success(&run_lifevault(&data_dir, &["setup"], PASSPHRASE), "setup");
    assert_success(
        &run_lifevault(&data_dir, &["export", "-o", backup.to_str().unwrap()], PASSPHRASE),
        "export",
    );

    let mut bundle: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&backup).unwrap()).unwrap();
    bundle["appData"][0]["financialPlan"]["personalInfo"]["name"] = "Alice".into();
    fs::write(&backup, bundle.to_string()).unwrap();
    assert_success(
        &run_lifevault(&data_dir, &["import", "-i", backup.to_str().unwrap()], PASSPHRASE),
        "import",
    );

    let record = fs::read_to_string(data_dir.join("default.json")).unwrap();
    assert!(!record.contains("Alice"));
    let key = fs::read_to_string(data_dir.join("encryption_key.json")).unwrap();
    assert!(key.contains("\"wrappedKey\":\"lifevault1:"));
}

#[test]
fn test_export_import_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("vault");
    let first = temp_dir.path().join("first.json");
    let second = temp_dir.path().join("second.json");

    assert_success(&run_lifevault(&data_dir, &["setup"], PASSPHRASE), "setup");
    assert_success(
        &run_lifevault(&data_dir, &["export", "-o", first.to_str().unwrap()], PASSPHRASE),
        "export",
    );

    let mut bundle: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
    assert_eq!(bundle["version"], "1.0");
    assert_eq!(bundle["appData"][0]["id"], "default");
    bundle["appData"][0]["estatePlan"]["will"]["exists"] = true.into();
    bundle["appData"][0]["id"] = "elsewhere".into();
    fs::write(&first, bundle.to_string()).unwrap();

    assert_success(
        &run_lifevault(&data_dir, &["import", "-i", first.to_str().unwrap()], PASSPHRASE),
        "import",
    );
    assert_success(
        &run_lifevault(&data_dir, &["export", "-o", second.to_str().unwrap()], PASSPHRASE),
        "export",
    );

    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&second).unwrap()).unwrap();
    assert_eq!(exported["appData"][0]["id"], "default");
    assert_eq!(exported["appData"][0]["estatePlan"]["will"]["exists"], true);
}

#[test]
#[cfg(unix)]
fn test_export_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let backup = temp_dir.path().join("backup.json");

    assert_success(&run_lifevault(temp_dir.path(), &["setup"], PASSPHRASE), "setup");
    assert_success(
        &run_lifevault(temp_dir.path(), &["export", "-o", backup.to_str().unwrap()], PASSPHRASE),
        "export",
    );

    let mode = fs::metadata(&backup).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_wrong_passphrase() {
    let temp_dir = TempDir::new().unwrap();
    let backup = temp_dir.path().join("backup.json");

    assert_success(&run_lifevault(temp_dir.path(), &["setup"], PASSPHRASE), "setup");

    let output = run_lifevault(
        temp_dir.path(),
        &["export", "-o", backup.to_str().unwrap()],
        "wrongpass",
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Incorrect passphrase"));
    assert!(!backup.exists());
}

#[test]
fn test_export_before_setup() {
    let temp_dir = TempDir::new().unwrap();
    let backup = temp_dir.path().join("backup.json");

    let output = run_lifevault(
        temp_dir.path(),
        &["export", "-o", backup.to_str().unwrap()],
        PASSPHRASE,
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not set up"));
}

#[test]
fn test_import_invalid_bundle() {
    let temp_dir = TempDir::new().unwrap();
    let bogus = temp_dir.path().join("bogus.json");
    fs::write(&bogus, "{\"hello\": \"world\"}").unwrap();

    assert_success(&run_lifevault(temp_dir.path(), &["setup"], PASSPHRASE), "setup");

    let output = run_lifevault(temp_dir.path(), &["import", "-i", bogus.to_str().unwrap()], PASSPHRASE);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not a valid export bundle"));
}

#[test]
fn test_wipe() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("vault");

    assert_success(&run_lifevault(&data_dir, &["setup"], PASSPHRASE), "setup");

    let output = run_lifevault(&data_dir, &["wipe"], "");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--yes"));
    assert!(data_dir.join("encryption_key.json").exists());

    assert_success(&run_lifevault(&data_dir, &["wipe", "--yes"], ""), "wipe");
    assert!(!data_dir.join("encryption_key.json").exists());
    assert!(!data_dir.join("default.json").exists());

    let output = run_lifevault(&data_dir, &["status"], "");
    assert!(stdout(&output).starts_with("uninitialized"));

    // A fresh setup with a different passphrase works after a wipe.
    assert_success(&run_lifevault(&data_dir, &["setup"], "An0therPass"), "setup");
}
