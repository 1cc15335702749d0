//! The PIN authorization group shared by every flow that asks for a PIN.
//!
//! A group is a compound state `<parent>` with three children:
//! `enteringPin` takes the PIN, `authorizing` checks it through the attempt
//! tracker, and `retryingPin` offers a retry after a wrong PIN. A lockout
//! leaves the group for the machine's `accountBlocked` terminal state.

use tracing::debug;

use crate::attempts::PinCheck;
use crate::collaborators::Services;
use crate::machine::{
    Candidate, ErrorRoute, Invoke, MachineContext, MachineErrorCode, StateNode, StepError, StepFuture, Tag,
};
use crate::registry::ACCOUNT_BLOCKED;

use super::guards;

pub const ENTERING_PIN: &str = "enteringPin";
pub const AUTHORIZING: &str = "authorizing";
pub const RETRYING_PIN: &str = "retryingPin";

/// States of a PIN group under `parent`, continuing to `on_success`.
///
/// `back` is where `0` leads from any state inside the group.
pub fn pin_group(parent: &str, on_success: &str, back: &str) -> Vec<StateNode> {
    let entering = format!("{parent}.{ENTERING_PIN}");
    let authorizing = format!("{parent}.{AUTHORIZING}");
    let retrying = format!("{parent}.{RETRYING_PIN}");

    vec![
        StateNode::compound(parent, ENTERING_PIN).on_back(Candidate::to(back)),
        StateNode::new(entering.clone())
            .on_transit(Candidate::to(authorizing.clone()).when(guards::has_input)),
        StateNode::new(authorizing).invoke(
            Invoke::new("authorizePin", authorize_pin)
                .on_done(Candidate::to(on_success))
                .on_error(ErrorRoute::on(MachineErrorCode::AccountBlocked, ACCOUNT_BLOCKED))
                .on_error(ErrorRoute::on(MachineErrorCode::InvalidPin, retrying.clone())),
        ),
        StateNode::new(retrying)
            .tag(Tag::Error)
            .on_retry(Candidate::to(entering)),
    ]
}

/// Terminal state every PIN-authorizing flow ends in after a lockout.
pub fn account_blocked() -> StateNode {
    StateNode::new(ACCOUNT_BLOCKED).terminal()
}

/// Check the submitted PIN, recording exactly one success or failure.
pub fn authorize_pin<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let pin = ctx.input().to_string();
        let mut account = ctx.account()?.clone();
        let check = services
            .attempts
            .authorize(&mut account, &pin, &services.hasher)
            .await?;
        ctx.account = Some(account);

        debug!(check = ?check, "PIN checked");
        match check {
            PinCheck::Authorized => Ok(()),
            PinCheck::Rejected { remaining } => Err(StepError::machine(
                MachineErrorCode::InvalidPin,
                format!("{remaining}"),
            )),
            PinCheck::Blocked => Err(StepError::machine(
                MachineErrorCode::AccountBlocked,
                "account blocked",
            )),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_paths_are_nested_under_the_parent() {
        let states = pin_group("confirmingTransfer", "processingTransfer", "enteringAmount");
        let paths: Vec<_> = states.iter().map(|node| node.path.as_str()).collect();

        assert_eq!(
            paths,
            vec![
                "confirmingTransfer",
                "confirmingTransfer.enteringPin",
                "confirmingTransfer.authorizing",
                "confirmingTransfer.retryingPin",
            ]
        );
        assert!(states[2].has_tag(Tag::Invoked));
        assert!(states[3].has_tag(Tag::Error));
    }
}
