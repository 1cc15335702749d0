// PIN attempts: counting, reset on success and lockout across flows

mod fixtures;

use fixtures::harness::*;
use ussd_menu_engine::collaborators::AccountStatus;
use ussd_menu_engine::machine::MachineId;

async fn at_transfer_pin_prompt(harness: &Harness, session_id: &str) {
    let outcome = harness.walk(session_id, ALICE, &["", "1", BOB_LOCAL, "10"]).await;
    assert_eq!(outcome.state, "confirmingTransfer.enteringPin");
}

#[tokio::test]
async fn three_failures_block_the_account() {
    let harness = Harness::new();
    at_transfer_pin_prompt(&harness, "S1").await;

    let first = harness.send("S1", ALICE, WRONG_PIN).await;
    assert_eq!(first.state, "confirmingTransfer.retryingPin");
    assert!(first.response.text().contains("You have 2 attempts remaining"));

    harness.send("S1", ALICE, "1").await;
    // A malformed PIN counts the same as a wrong one
    let second = harness.send("S1", ALICE, "12").await;
    assert_eq!(second.state, "confirmingTransfer.retryingPin");
    assert_eq!(harness.account(ALICE).pin_attempts, 2);

    harness.send("S1", ALICE, "1").await;
    let blocked = harness.send("S1", ALICE, WRONG_PIN).await;
    assert_eq!(blocked.state, "accountBlocked");
    assert!(blocked.response.is_end());

    let account = harness.account(ALICE);
    assert_eq!(account.status, AccountStatus::Blocked);
    assert_eq!(account.pin_attempts, 3);
    assert_eq!(harness.ledger.balance_of("0xalice", "0xsrf"), 100.0);
}

#[tokio::test]
async fn blocked_accounts_land_on_account_blocked_in_any_flow() {
    let harness = Harness::new();
    let mut account = harness.account(ALICE);
    account.status = AccountStatus::Blocked;
    harness.accounts.insert(account);

    for (session_id, input) in [("B1", ""), ("B2", "1"), ("B3", "3")] {
        let outcome = harness.send(session_id, ALICE, input).await;
        assert_eq!((outcome.machine, outcome.state.as_str()), (MachineId::Auth, "accountBlocked"));
        assert!(outcome.response.is_end());
    }
}

#[tokio::test]
async fn blocked_mid_session_moves_to_account_blocked() {
    let harness = Harness::new();
    harness.walk("S1", ALICE, &["", "3"]).await;

    let mut account = harness.account(ALICE);
    account.status = AccountStatus::Blocked;
    harness.accounts.insert(account);

    let outcome = harness.send("S1", ALICE, "1").await;
    assert!(outcome.jumped);
    assert_eq!((outcome.machine, outcome.state.as_str()), (MachineId::Auth, "accountBlocked"));

    let again = harness.send("S1", ALICE, "1").await;
    assert!(again.no_op);
    assert_eq!(again.version, outcome.version);
}

#[tokio::test]
async fn correct_pin_resets_the_attempt_counter() {
    let harness = Harness::new();
    at_transfer_pin_prompt(&harness, "S1").await;
    harness.set_attempts(ALICE, 2);

    let outcome = harness.send("S1", ALICE, PIN).await;

    assert_eq!(outcome.state, "transferInitiated");
    assert_eq!(harness.account(ALICE).pin_attempts, 0);
    assert_eq!(harness.account(ALICE).status, AccountStatus::Active);
}

#[tokio::test]
async fn back_from_the_pin_prompt_returns_to_the_amount() {
    let harness = Harness::new();
    at_transfer_pin_prompt(&harness, "S1").await;

    let outcome = harness.send("S1", ALICE, "0").await;

    assert_eq!(outcome.state, "enteringAmount");
    assert_eq!(harness.account(ALICE).pin_attempts, 0);
}

#[tokio::test]
async fn empty_pin_submission_is_not_an_attempt() {
    let harness = Harness::new();
    at_transfer_pin_prompt(&harness, "S1").await;

    let outcome = harness.send("S1", ALICE, "").await;

    assert!(outcome.no_op);
    assert_eq!(outcome.state, "confirmingTransfer.enteringPin");
    assert_eq!(harness.account(ALICE).pin_attempts, 0);
}
