// Command-line surface: help, machine listing and simulated dialogues

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn engine(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ussd-menu-engine").unwrap();
    cmd.current_dir(workdir.path())
        .env("USSD_ENGINE__OBSERVABILITY__LOG_LEVEL", "error");
    cmd
}

#[test]
fn help_lists_the_subcommands() {
    let workdir = TempDir::new().unwrap();

    engine(&workdir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("machines"))
        .stdout(predicate::str::contains("session"));
}

#[test]
fn machines_prints_every_flow_with_tagged_states() {
    let workdir = TempDir::new().unwrap();

    engine(&workdir)
        .arg("machines")
        .assert()
        .success()
        .stdout(predicate::str::contains("transfer"))
        .stdout(predicate::str::contains("enteringRecipient"))
        .stdout(predicate::str::contains("confirmingTransfer.retryingPin"))
        .stdout(predicate::str::contains("registration"))
        .stdout(predicate::str::contains("Languages: eng, swa"));
}

#[test]
fn simulate_walks_a_balance_check_over_stdin() {
    let workdir = TempDir::new().unwrap();

    engine(&workdir)
        .args(["simulate", "--phone", "+254700000001", "--session", "cli-1"])
        .write_stdin("3\n3\n1234\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("CON Active voucher: SRF"))
        .stdout(predicate::str::contains("END Your balance is 100.00 SRF."));
}

#[test]
fn simulated_sessions_are_journaled() {
    let workdir = TempDir::new().unwrap();

    engine(&workdir)
        .args(["simulate", "--phone", "+254700000001", "--session", "cli-2"])
        .write_stdin("")
        .assert()
        .success();

    engine(&workdir)
        .args(["session", "cli-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mainMenu\""))
        .stdout(predicate::str::contains("\"version\": 1"));

    engine(&workdir)
        .args(["session", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No session 'missing'"));
}
