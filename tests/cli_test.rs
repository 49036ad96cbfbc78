use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billpay"));
    cmd.arg("tests/fixtures/sample_ops.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "bill,number,vendor,status,category,total,currency,paid",
        ))
        // Ingested, auto-approved and paid by card
        .stdout(predicate::str::contains("web-hosting,BILL-"))
        .stdout(predicate::str::contains(",Acme Corp,paid,software,129.60,USD,"))
        // Over the vendor threshold, approved by hand, never scheduled
        .stdout(predicate::str::contains(
            ",Studio North,approved,professional_services,1800,USD,",
        ));

    Ok(())
}

#[test]
fn test_cli_rejects_missing_input() {
    let mut cmd = Command::new(cargo_bin!("billpay"));
    cmd.arg("tests/fixtures/no_such_file.csv");

    cmd.assert().failure();
}
