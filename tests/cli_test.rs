use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let batch = common::write_batch(&[
        "p1,userA,userB,100.50,RUB,success,acct-999",
        "p2,userA,userC,7,USD,success,acct-777",
    ]);

    let mut cmd = Command::new(cargo_bin!("settlement-recon"));
    cmd.arg(batch.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("id,status,amount,currency"))
        .stdout(predicate::str::contains("p1,COMPLETE,100.50,RUB"))
        .stdout(predicate::str::contains("p2,COMPLETE,7,USD"))
        .stderr(predicate::str::contains("Transfer issued"));

    Ok(())
}

#[test]
fn test_refused_transfer_is_rolled_back() {
    let batch = common::write_batch(&["p1,userA,userB,10,RUB,success,acct-999"]);

    let mut cmd = Command::new(cargo_bin!("settlement-recon"));
    cmd.arg(batch.path())
        .arg("--reject-destination")
        .arg("acct-999")
        .arg("--run-for-ms")
        .arg("300");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("p1,SUCCESS,10,RUB"))
        .stderr(predicate::str::contains("Transfer failed"));
}

#[test]
fn test_pending_payment_stays_pending_until_deadline() {
    let batch = common::write_batch(&[
        "p1,userA,userB,10,RUB,in_progress,acct-999",
        "p2,userA,userB,20,RUB,success,acct-999",
    ]);

    let mut cmd = Command::new(cargo_bin!("settlement-recon"));
    cmd.arg(batch.path()).arg("--run-for-ms").arg("300");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("p1,PENDING,10,RUB"))
        .stdout(predicate::str::contains("p2,COMPLETE,20,RUB"))
        .stderr(predicate::str::contains("Run time elapsed"));
}

#[test]
fn test_max_attempts_dead_letters_refused_payment() {
    let batch = common::write_batch(&["p1,userA,userB,10,RUB,refused,acct-999"]);

    let mut cmd = Command::new(cargo_bin!("settlement-recon"));
    cmd.arg(batch.path())
        .arg("--max-attempts")
        .arg("2")
        .arg("--retry-pause-ms")
        .arg("0");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("p1,FAILED,10,RUB"))
        .stderr(predicate::str::contains("Retry limit reached"));
}

#[test]
fn test_unknown_receiver_is_retried() {
    let batch = common::write_batch(&["p1,userA,nobody,10,RUB,success,"]);

    let mut cmd = Command::new(cargo_bin!("settlement-recon"));
    cmd.arg(batch.path()).arg("--run-for-ms").arg("200");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("p1,SUCCESS,10,RUB"))
        .stderr(predicate::str::contains("Failed to get receiver"));
}
