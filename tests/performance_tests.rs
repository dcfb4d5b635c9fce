use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_large_batch_settles_completely() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("large_batch.csv");
    common::generate_settled_batch(&input, 5_000).expect("Failed to generate batch");

    let output = Command::new(cargo_bin!("settlement-recon"))
        .arg(&input)
        .arg("--run-for-ms")
        .arg("60000")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Binary failed to settle the batch");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<&str> = stdout.lines().skip(1).collect();
    assert_eq!(rows.len(), 5_000);
    assert!(rows.iter().all(|row| row.contains(",COMPLETE,")));
}
