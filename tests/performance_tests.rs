use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_batch_volume() {
    let dir = tempfile::tempdir().unwrap();
    let ops_path = dir.path().join("batch.csv");
    common::generate_ops_csv(&ops_path, 500).expect("Failed to generate ops CSV");

    let output = Command::new(cargo_bin!("billpay"))
        .arg(&ops_path)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Binary failed on 500-bill batch");
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Header plus one line per bill
    assert_eq!(stdout.lines().count(), 501);
}

#[test]
fn test_batch_volume_db() {
    let dir = tempfile::tempdir().unwrap();
    let ops_path = dir.path().join("batch.csv");
    common::generate_ops_csv(&ops_path, 500).expect("Failed to generate ops CSV");

    let db_dir = tempfile::tempdir().unwrap();
    let output = Command::new(cargo_bin!("billpay"))
        .arg(&ops_path)
        .arg("--db-path")
        .arg(db_dir.path().join("batch_db"))
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Binary failed on 500-bill batch");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 501);
}
