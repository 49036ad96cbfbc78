use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_autopay_after_approval() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,bill,actor,arg,value,notes").unwrap();
    writeln!(file, "vendor,acct-1,,,Acme Corp,autopay;methods=ach,").unwrap();
    writeln!(file, "manual,acct-1,b1,,Acme Corp,amount=40;due=2027-09-30,").unwrap();
    // Auto-pay already scheduled the transfer; drive it to settlement
    writeln!(file, "execute,,b1,,,,").unwrap();
    writeln!(file, "reconcile,,b1,,completed,,").unwrap();

    let mut cmd = Command::new(cargo_bin!("billpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",Acme Corp,paid,"));
}

#[test]
fn test_card_payment_completes() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,bill,actor,arg,value,notes").unwrap();
    writeln!(file, "vendor,acct-1,,,Acme Corp,methods=card,").unwrap();
    writeln!(file, "manual,acct-1,b1,,Acme Corp,amount=60;due=2027-09-30,").unwrap();
    writeln!(file, "schedule,,b1,,card,2026-09-01,").unwrap();
    writeln!(file, "execute,,b1,,,,").unwrap();

    let mut cmd = Command::new(cargo_bin!("billpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",Acme Corp,paid,"));
}

#[test]
fn test_execute_twice_is_noop() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,bill,actor,arg,value,notes").unwrap();
    writeln!(file, "vendor,acct-1,,,Acme Corp,methods=card,").unwrap();
    writeln!(file, "manual,acct-1,b1,,Acme Corp,amount=60;due=2027-09-30,").unwrap();
    writeln!(file, "schedule,,b1,,card,,").unwrap();
    writeln!(file, "execute,,b1,,,,").unwrap();
    writeln!(file, "execute,,b1,,,,").unwrap();

    let mut cmd = Command::new(cargo_bin!("billpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error applying operation").not())
        .stdout(predicate::str::contains(",Acme Corp,paid,"));
}

#[test]
fn test_failed_settlement_allows_reschedule() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,bill,actor,arg,value,notes").unwrap();
    writeln!(file, "vendor,acct-1,,,Acme Corp,methods=ach,").unwrap();
    writeln!(file, "manual,acct-1,b1,,Acme Corp,amount=75;due=2027-09-30,").unwrap();
    writeln!(file, "schedule,,b1,,ach,,").unwrap();
    writeln!(file, "execute,,b1,,,,").unwrap();
    // Bank bounced the transfer; the bill goes back to payable
    writeln!(file, "reconcile,,b1,,failed,,").unwrap();
    writeln!(file, "schedule,,b1,,ach,,").unwrap();
    writeln!(file, "execute,,b1,,,,").unwrap();
    writeln!(file, "reconcile,,b1,,completed,,").unwrap();

    let mut cmd = Command::new(cargo_bin!("billpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error applying operation").not())
        .stdout(predicate::str::contains(",Acme Corp,paid,"));
}
